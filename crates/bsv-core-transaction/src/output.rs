//! Transaction output with satoshi value and locking script.

use bsv_core_primitives::util::{BsvReader, BsvWriter, VarInt};
use bsv_core_script::LockingScript;

use crate::TransactionError;

/// A single output in a transaction.
///
/// The `change` flag is a local annotation used by
/// [`Transaction::fee`](crate::Transaction::fee) to pick the outputs that
/// receive leftover satoshis; it is not serialized.
///
/// # Wire format
///
/// | Field            | Size           |
/// |------------------|----------------|
/// | satoshis         | 8 bytes (LE)   |
/// | script length    | VarInt         |
/// | locking_script   | variable       |
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionOutput {
    pub satoshis: u64,
    pub locking_script: LockingScript,
    pub change: bool,
}

impl TransactionOutput {
    pub fn new(satoshis: u64, locking_script: LockingScript) -> Self {
        TransactionOutput { satoshis, locking_script, change: false }
    }

    /// An output whose value is filled in by fee computation.
    pub fn change(locking_script: LockingScript) -> Self {
        TransactionOutput { satoshis: 0, locking_script, change: true }
    }

    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading satoshis: {}", e))
        })?;
        let script = reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading locking script: {}", e))
        })?;
        Ok(TransactionOutput::new(satoshis, LockingScript::from_bytes(script)))
    }

    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_u64_le(self.satoshis);
        writer.write_var_bytes(self.locking_script.as_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialized length in bytes.
    pub fn size(&self) -> usize {
        8 + VarInt::from(self.locking_script.len()).length() + self.locking_script.len()
    }
}
