//! Transaction input referencing a previous output.
//!
//! Besides the wire fields, an input can carry what is known about the output
//! it spends: the full source transaction, or just that output's satoshis and
//! locking script (as the extended format provides). Signing and
//! verification read the spent output through [`TransactionInput::source_output`],
//! which rejects a parent whose txid is not the outpoint's.

use std::fmt;
use std::sync::Arc;

use bsv_core_primitives::chainhash::Hash;
use bsv_core_primitives::util::{BsvReader, BsvWriter, VarInt};
use bsv_core_script::{LockingScript, UnlockingScript};

use crate::template::UnlockingScriptTemplate;
use crate::transaction::Transaction;
use crate::TransactionError;

/// Default sequence number indicating a finalized input (no relative lock-time).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// The output an input spends, as far as it is known locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceOutput<'a> {
    pub satoshis: u64,
    pub locking_script: &'a LockingScript,
}

/// A single input in a transaction.
///
/// # Wire format (standard)
///
/// | Field               | Size             |
/// |---------------------|------------------|
/// | source_txid         | 32 bytes         |
/// | source_output_index | 4 bytes (LE)     |
/// | script length       | VarInt           |
/// | unlocking_script    | variable         |
/// | sequence            | 4 bytes (LE)     |
///
/// The extended format follows each input with the source satoshis (8 bytes
/// LE) and the varint-prefixed source locking script.
#[derive(Clone)]
pub struct TransactionInput {
    /// Txid of the output being spent, in internal byte order.
    pub source_txid: Hash,
    pub source_output_index: u32,
    pub sequence: u32,
    /// `None` until the input is signed.
    pub unlocking_script: Option<UnlockingScript>,
    /// Produces `unlocking_script` on [`Transaction::sign`].
    pub unlocking_script_template: Option<Arc<dyn UnlockingScriptTemplate>>,
    /// The transaction being spent. Several inputs may share one parent.
    pub source_transaction: Option<Arc<Transaction>>,
    pub source_satoshis: Option<u64>,
    pub source_locking_script: Option<LockingScript>,
}

impl TransactionInput {
    /// An unsigned input spending `source_txid:source_output_index`.
    pub fn new(source_txid: Hash, source_output_index: u32) -> Self {
        TransactionInput {
            source_txid,
            source_output_index,
            sequence: DEFAULT_SEQUENCE_NUMBER,
            unlocking_script: None,
            unlocking_script_template: None,
            source_transaction: None,
            source_satoshis: None,
            source_locking_script: None,
        }
    }

    /// An input spending output `source_output_index` of `source`, with the
    /// txid taken from it.
    pub fn from_source_transaction(source: Arc<Transaction>, source_output_index: u32) -> Self {
        let mut input = TransactionInput::new(source.tx_id(), source_output_index);
        input.source_transaction = Some(source);
        input
    }

    pub fn with_template(mut self, template: impl UnlockingScriptTemplate + 'static) -> Self {
        self.unlocking_script_template = Some(Arc::new(template));
        self
    }

    /// Record the spent output's value and script directly.
    pub fn set_source_output(&mut self, satoshis: u64, locking_script: LockingScript) {
        self.source_satoshis = Some(satoshis);
        self.source_locking_script = Some(locking_script);
    }

    /// The output being spent.
    ///
    /// When `source_transaction` is set its txid must be `source_txid`, and
    /// an explicit `source_satoshis`/`source_locking_script` pair must agree
    /// with the output it points to.
    ///
    /// # Returns
    /// `MissingSourceOutput` when nothing describes the output, or
    /// `SourceMismatch` when the known descriptions disagree. `index` is this
    /// input's position, used in both errors.
    pub fn source_output(&self, index: usize) -> Result<SourceOutput<'_>, TransactionError> {
        let explicit = match (self.source_satoshis, self.source_locking_script.as_ref()) {
            (Some(satoshis), Some(locking_script)) => Some(SourceOutput { satoshis, locking_script }),
            _ => None,
        };

        let Some(source) = &self.source_transaction else {
            return explicit.ok_or(TransactionError::MissingSourceOutput { index });
        };
        if source.tx_id() != self.source_txid {
            return Err(TransactionError::SourceMismatch { index });
        }
        let output = source
            .outputs
            .get(self.source_output_index as usize)
            .ok_or(TransactionError::MissingSourceOutput { index })?;
        let from_parent = SourceOutput { satoshis: output.satoshis, locking_script: &output.locking_script };

        match explicit {
            Some(explicit) if explicit != from_parent => Err(TransactionError::SourceMismatch { index }),
            _ => Ok(from_parent),
        }
    }

    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading source txid: {}", e))
        })?;
        let source_txid = Hash::from_bytes(txid_bytes)?;

        let source_output_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;

        let script = reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;

        let sequence = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence number: {}", e))
        })?;

        let mut input = TransactionInput::new(source_txid, source_output_index);
        input.unlocking_script = Some(UnlockingScript::from_bytes(script));
        input.sequence = sequence;
        Ok(input)
    }

    /// Read an input in the extended format, filling the source output.
    pub fn read_ef_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader.read_bytes(32).map_err(|e| {
            TransactionError::SerializationError(format!("reading source txid: {}", e))
        })?;
        let source_txid = Hash::from_bytes(txid_bytes)?;
        let source_output_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;
        let script = reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;
        let sequence = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence number: {}", e))
        })?;
        let source_satoshis = reader.read_u64_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading source satoshis: {}", e))
        })?;
        let source_script = reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading source locking script: {}", e))
        })?;

        let mut input = TransactionInput::new(source_txid, source_output_index);
        input.unlocking_script = Some(UnlockingScript::from_bytes(script));
        input.sequence = sequence;
        input.set_source_output(source_satoshis, LockingScript::from_bytes(source_script));
        Ok(input)
    }

    /// Write the standard form. An unsigned input is written with an empty
    /// script.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_bytes(self.source_txid.as_bytes());
        writer.write_u32_le(self.source_output_index);
        writer.write_var_bytes(self.unlocking_script_bytes());
        writer.write_u32_le(self.sequence);
    }

    /// Write the extended form. Fails when the source output is unknown.
    pub fn write_ef_to(&self, writer: &mut BsvWriter, index: usize) -> Result<(), TransactionError> {
        let source = self.source_output(index)?;
        writer.write_bytes(self.source_txid.as_bytes());
        writer.write_u32_le(self.source_output_index);
        writer.write_var_bytes(self.unlocking_script_bytes());
        writer.write_u32_le(self.sequence);
        writer.write_u64_le(source.satoshis);
        writer.write_var_bytes(source.locking_script.as_bytes());
        Ok(())
    }

    /// Serialized length in the standard format, using `script_len` for the
    /// unlocking script.
    pub(crate) fn size_with_script_len(script_len: usize) -> usize {
        32 + 4 + VarInt::from(script_len).length() + script_len + 4
    }

    fn unlocking_script_bytes(&self) -> &[u8] {
        self.unlocking_script.as_ref().map(|s| s.as_bytes()).unwrap_or_default()
    }
}

impl Default for TransactionInput {
    fn default() -> Self {
        TransactionInput::new(Hash::default(), 0)
    }
}

impl fmt::Debug for TransactionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionInput")
            .field("source_txid", &self.source_txid)
            .field("source_output_index", &self.source_output_index)
            .field("sequence", &self.sequence)
            .field("unlocking_script", &self.unlocking_script)
            .field("has_template", &self.unlocking_script_template.is_some())
            .field("source_transaction", &self.source_transaction.as_ref().map(|tx| tx.tx_id()))
            .field("source_satoshis", &self.source_satoshis)
            .field("source_locking_script", &self.source_locking_script)
            .finish()
    }
}
