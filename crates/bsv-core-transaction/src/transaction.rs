//! Core transaction type.
//!
//! Represents a complete transaction with version, inputs, outputs and
//! locktime. Supports the standard wire format and the extended format, txid
//! computation, template-driven signing and fee application.

use std::fmt;

use bsv_core_primitives::chainhash::Hash;
use bsv_core_primitives::util::{BsvReader, BsvWriter, VarInt};
use bsv_core_script::LockingScript;
use bsv_core_spv::MerklePath;

use crate::fee_model::FeeModel;
use crate::input::TransactionInput;
use crate::output::TransactionOutput;
use crate::sighash;
use crate::TransactionError;

/// Bytes following the version field that mark the extended format.
const EF_MARKER: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0xEF];

/// A transaction consisting of a version, a set of inputs, a set of
/// outputs, and a lock time.
///
/// # Wire format
///
/// | Field        | Size                      |
/// |--------------|---------------------------|
/// | version      | 4 bytes (LE)              |
/// | input count  | VarInt                    |
/// | inputs       | variable (per input)      |
/// | output count | VarInt                    |
/// | outputs      | variable (per output)     |
/// | lock_time    | 4 bytes (LE)              |
///
/// The extended format inserts `00 00 00 00 00 EF` after the version and
/// follows every input with the output it spends.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Block height or Unix time before which the transaction is not final.
    pub lock_time: u32,
    /// Proof that this transaction was mined, when known.
    pub merkle_path: Option<MerklePath>,
}

impl Transaction {
    /// Create a new empty transaction with version 1 and lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            merkle_path: None,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction in either format from hex.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::SerializationError(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse exactly one transaction in either format.
    ///
    /// # Returns
    /// `Ok(Transaction)` on success, or a `TransactionError` if the data
    /// is truncated, malformed, or has trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = BsvReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(TransactionError::SerializationError(format!(
                "trailing {} bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Parse a transaction that must be in the extended format.
    pub fn from_bytes_ef(bytes: &[u8]) -> Result<Self, TransactionError> {
        if bytes.get(4..4 + EF_MARKER.len()) != Some(&EF_MARKER[..]) {
            return Err(TransactionError::SerializationError(
                "missing extended format marker".to_string(),
            ));
        }
        Self::from_bytes(bytes)
    }

    pub fn from_hex_ef(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::SerializationError(format!("invalid hex: {}", e)))?;
        Self::from_bytes_ef(&bytes)
    }

    /// Read one transaction from `reader`, detecting the extended format by
    /// its marker. Inputs parsed from the extended format carry their source
    /// output.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading version: {}", e))
        })?;

        let extended = reader.peek_bytes(EF_MARKER.len()) == Some(&EF_MARKER[..]);
        if extended {
            reader.read_bytes(EF_MARKER.len()).map_err(|e| {
                TransactionError::SerializationError(format!("reading marker: {}", e))
            })?;
        }

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading input count: {}", e))
        })?;
        let mut inputs = Vec::with_capacity(capacity_hint(input_count, reader));
        for _ in 0..input_count.value() {
            inputs.push(if extended {
                TransactionInput::read_ef_from(reader)?
            } else {
                TransactionInput::read_from(reader)?
            });
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading output count: {}", e))
        })?;
        let mut outputs = Vec::with_capacity(capacity_hint(output_count, reader));
        for _ in 0..output_count.value() {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading lock time: {}", e))
        })?;

        Ok(Transaction { version, inputs, outputs, lock_time, merkle_path: None })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Serialize to the standard wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::with_capacity(256);
        writer.write_u32_le(self.version);

        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(&mut writer);
        }

        self.write_outputs_and_lock_time(&mut writer);
        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Serialize to the extended format.
    ///
    /// # Returns
    /// The encoded bytes, or `MissingSourceOutput` for the first input whose
    /// spent output is unknown.
    pub fn to_bytes_ef(&self) -> Result<Vec<u8>, TransactionError> {
        let mut writer = BsvWriter::with_capacity(512);
        writer.write_u32_le(self.version);
        writer.write_bytes(&EF_MARKER);

        writer.write_varint(VarInt::from(self.inputs.len()));
        for (index, input) in self.inputs.iter().enumerate() {
            input.write_ef_to(&mut writer, index)?;
        }

        self.write_outputs_and_lock_time(&mut writer);
        Ok(writer.into_bytes())
    }

    pub fn to_hex_ef(&self) -> Result<String, TransactionError> {
        Ok(hex::encode(self.to_bytes_ef()?))
    }

    fn write_outputs_and_lock_time(&self, writer: &mut BsvWriter) {
        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(writer);
        }
        writer.write_u32_le(self.lock_time);
    }

    // -----------------------------------------------------------------
    // Transaction ID
    // -----------------------------------------------------------------

    /// Double SHA-256 of the standard serialization, in internal byte order.
    pub fn tx_id(&self) -> Hash {
        Hash::hash256(&self.to_bytes())
    }

    /// The txid as conventionally displayed (byte-reversed hex).
    pub fn tx_id_hex(&self) -> String {
        self.tx_id().to_string()
    }

    // -----------------------------------------------------------------
    // Inputs and outputs
    // -----------------------------------------------------------------

    pub fn add_input(&mut self, input: TransactionInput) {
        self.inputs.push(input);
    }

    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.push(output);
    }

    /// Add an input spending `prev_tx_id:vout`, recording the spent output's
    /// script and value.
    ///
    /// # Arguments
    /// * `prev_tx_id` - The txid being spent, in display order.
    /// * `vout` - The output index being spent.
    /// * `prev_locking_script_hex` - Hex of the spent output's locking script.
    /// * `satoshis` - The value of the spent output.
    pub fn add_input_from(
        &mut self,
        prev_tx_id: &str,
        vout: u32,
        prev_locking_script_hex: &str,
        satoshis: u64,
    ) -> Result<(), TransactionError> {
        let mut input = TransactionInput::new(Hash::from_hex(prev_tx_id)?, vout);
        input.set_source_output(satoshis, LockingScript::from_hex(prev_locking_script_hex)?);
        self.inputs.push(input);
        Ok(())
    }

    /// Sum of the output values, saturating at `u64::MAX`.
    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs.iter().fold(0u64, |total, o| total.saturating_add(o.satoshis))
    }

    /// Sum of the values of the spent outputs.
    ///
    /// # Returns
    /// The total, or `MissingSourceOutput` for the first input whose spent
    /// output is unknown.
    pub fn total_input_satoshis(&self) -> Result<u64, TransactionError> {
        self.inputs.iter().enumerate().try_fold(0u64, |total, (index, input)| {
            let source = input.source_output(index)?;
            total.checked_add(source.satoshis).ok_or_else(|| {
                TransactionError::InvalidTransaction("input total overflows".to_string())
            })
        })
    }

    /// Inputs minus outputs.
    pub fn get_fee(&self) -> Result<u64, TransactionError> {
        let inputs = self.total_input_satoshis()?;
        let outputs = self.total_output_satoshis();
        inputs
            .checked_sub(outputs)
            .ok_or(TransactionError::OutputsExceedInputs { inputs, outputs })
    }

    /// A coinbase transaction has exactly one input with an all-zero txid
    /// and either output index or sequence `0xFFFFFFFF`.
    pub fn is_coinbase(&self) -> bool {
        match self.inputs.as_slice() {
            [input] => {
                input.source_txid == Hash::default()
                    && (input.source_output_index == 0xFFFF_FFFF || input.sequence == 0xFFFF_FFFF)
            }
            _ => false,
        }
    }

    /// Length of the standard serialization.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Serialized size once every input is signed.
    ///
    /// Inputs that still wait for their template use the template's
    /// estimate; signed inputs use their actual script.
    pub fn estimate_size(&self) -> Result<usize, TransactionError> {
        let mut size = 4 + VarInt::from(self.inputs.len()).length();
        for (index, input) in self.inputs.iter().enumerate() {
            let signed_len = input.unlocking_script.as_ref().map(|s| s.len()).filter(|len| *len > 0);
            let script_len = match (signed_len, &input.unlocking_script_template) {
                (Some(len), _) => len,
                (None, Some(template)) => template.estimate_length(self, index) as usize,
                (None, None) => match &input.unlocking_script {
                    Some(_) => 0,
                    None => return Err(TransactionError::MissingUnlockingScript { index }),
                },
            };
            size += TransactionInput::size_with_script_len(script_len);
        }
        size += VarInt::from(self.outputs.len()).length();
        size += self.outputs.iter().map(TransactionOutput::size).sum::<usize>();
        Ok(size + 4)
    }

    // -----------------------------------------------------------------
    // Signing and fees
    // -----------------------------------------------------------------

    /// The digest input `input_index` signs with `sighash_flag`, committing
    /// to the spent output's locking script.
    pub fn calc_input_signature_hash(
        &self,
        input_index: usize,
        sighash_flag: u32,
    ) -> Result<[u8; 32], TransactionError> {
        let input = self.inputs.get(input_index).ok_or(TransactionError::InputIndexOutOfRange {
            index: input_index,
            count: self.inputs.len(),
        })?;
        let source = input.source_output(input_index)?;
        sighash::signature_hash(
            self,
            input_index,
            source.locking_script.as_bytes(),
            sighash_flag,
            source.satoshis,
        )
    }

    /// Fill the unlocking script of every input that has a template.
    ///
    /// Digests never cover other inputs' scripts, so inputs are signed in
    /// any order against the same transaction.
    pub fn sign(&mut self) -> Result<(), TransactionError> {
        let mut scripts = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            if let Some(template) = &input.unlocking_script_template {
                scripts.push((index, template.sign(self, index)?));
            }
        }
        log::debug!("signed {} of {} inputs", scripts.len(), self.inputs.len());
        for (index, script) in scripts {
            self.inputs[index].unlocking_script = Some(script);
        }
        Ok(())
    }

    /// Charge the fee computed by `model` and split what is left over
    /// equally across the change outputs.
    ///
    /// Any remainder of the split goes to the first change output. When the
    /// leftover cannot give every change output at least one satoshi, the
    /// change outputs are removed and the leftover goes to the miner.
    ///
    /// # Returns
    /// The fee `model` asks for the transaction as it is left, recomputed
    /// after any change outputs are removed. `InsufficientFee` when the
    /// inputs cannot cover the fixed outputs plus the fee.
    pub async fn fee<M: FeeModel>(&mut self, model: &M) -> Result<u64, TransactionError> {
        let fee = model.compute_fee(self).await?;
        let total_in = self.total_input_satoshis()?;
        let fixed_out = self
            .outputs
            .iter()
            .filter(|o| !o.change)
            .fold(0u64, |total, o| total.saturating_add(o.satoshis));

        let available = total_in.saturating_sub(fixed_out);
        let change = available.checked_sub(fee).ok_or(TransactionError::InsufficientFee {
            paid: available,
            required: fee,
        })?;

        let change_count = self.outputs.iter().filter(|o| o.change).count() as u64;
        if change_count == 0 {
            return Ok(fee);
        }
        if change < change_count {
            log::debug!("dropping {} change outputs, {} satoshis left", change_count, change);
            self.outputs.retain(|o| !o.change);
            return model.compute_fee(self).await;
        }

        let share = change / change_count;
        let mut remainder = change % change_count;
        for output in self.outputs.iter_mut().filter(|o| o.change) {
            output.satoshis = share + remainder;
            remainder = 0;
        }
        Ok(fee)
    }
}

/// Bounds a declared element count by the bytes left, so a corrupt count
/// cannot force a huge allocation.
fn capacity_hint(count: VarInt, reader: &BsvReader) -> usize {
    usize::try_from(count.value()).unwrap_or(usize::MAX).min(reader.remaining())
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    /// Display the transaction as its hex-encoded serialization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee_model::SatoshisPerKilobyte;
    use crate::input::DEFAULT_SEQUENCE_NUMBER;
    use crate::template::{ScriptTemplate, P2PKH};
    use bsv_core_primitives::ec::PrivateKey;
    use bsv_core_script::UnlockingScript;

    /// A standard transaction: one input, a P2PKH-with-OP_RETURN output and a
    /// P2PKH output.
    const SOURCE_RAW_TX: &str = "010000000138c7c61c14ffb063c3bb2664041a3e29ea6ea0412a0c18ff725ba4e9e12afae2030000006a47304402203e9ab8e4c14addf3b4741540b556cfb0e0efb67dc1a7b5ce84c3ac56b3fd447802203c9f49f7bd893ebd7060176dfc36bcaff9d2c443d9a0dd6cd2d59b372c024d20412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02dc050000000000002076a914eb0bd5edba389198e73f8efabddfc61666969ff788ac6a0568656c6c6faa0d0000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";

    const COINBASE_TX_HEX: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff17033f250d2f43555656452f2c903fb60859897700d02700ffffffff01d864a012000000001976a914d648686cf603c11850f39600e37312738accca8f88ac00000000";

    /// Version 2, three inputs with sequence 0xFFFFFFFE, lock time 103.
    const MULTI_INPUT_TX_HEX: &str = "0200000003a9bc457fdc6a54d99300fb137b23714d860c350a9d19ff0f571e694a419ff3a0010000006b48304502210086c83beb2b2663e4709a583d261d75be538aedcafa7766bd983e5c8db2f8b2fc02201a88b178624ab0ad1748b37c875f885930166237c88f5af78ee4e61d337f935f412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff0092bb9a47e27bf64fc98f557c530c04d9ac25e2f2a8b600e92a0b1ae7c89c20010000006b483045022100f06b3db1c0a11af348401f9cebe10ae2659d6e766a9dcd9e3a04690ba10a160f02203f7fbd7dfcfc70863aface1a306fcc91bbadf6bc884c21a55ef0d32bd6b088c8412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff9d0d4554fa692420a0830ca614b6c60f1bf8eaaa21afca4aa8c99fb052d9f398000000006b483045022100d920f2290548e92a6235f8b2513b7f693a64a0d3fa699f81a034f4b4608ff82f0220767d7d98025aff3c7bd5f2a66aab6a824f5990392e6489aae1e1ae3472d8dffb412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff02807c814a000000001976a9143a6bf34ebfcf30e8541bbb33a7882845e5a29cb488ac76b0e60e000000001976a914bd492b67f90cb85918494767ebb23102c4f06b7088ac67000000";

    const P2PKH_HEX: &str = "76a914eb0bd5edba389198e73f8efabddfc61666969ff788ac";

    #[test]
    fn test_from_hex_roundtrip() {
        let tx = Transaction::from_hex(SOURCE_RAW_TX).expect("should parse source tx hex");
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.lock_time, 0);
        assert_eq!(tx.outputs[0].satoshis, 1500);
        assert_eq!(tx.outputs[1].satoshis, 3498);
        assert_eq!(tx.outputs[1].locking_script.to_hex(), P2PKH_HEX);
        assert_eq!(tx.to_hex(), SOURCE_RAW_TX, "hex roundtrip should produce identical output");
        assert_eq!(tx.size(), SOURCE_RAW_TX.len() / 2);
        assert_eq!(format!("{}", tx), SOURCE_RAW_TX, "Display should output hex");
    }

    #[test]
    fn test_multi_input_roundtrip() {
        let tx = Transaction::from_hex(MULTI_INPUT_TX_HEX).expect("should parse multi-input tx");
        assert_eq!(tx.version, 2);
        assert_eq!(tx.inputs.len(), 3);
        assert_eq!(tx.lock_time, 103);
        assert!(tx.inputs.iter().all(|i| i.sequence == 0xFFFF_FFFE));
        assert_eq!(tx.to_hex(), MULTI_INPUT_TX_HEX);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Transaction::from_hex(&format!("{}deadbeef", SOURCE_RAW_TX)).is_err());
        assert!(Transaction::from_hex("not_valid_hex").is_err());
        assert!(Transaction::from_bytes(&[]).is_err());
        assert!(Transaction::from_hex(&SOURCE_RAW_TX[..SOURCE_RAW_TX.len() - 2]).is_err());
    }

    /// The input's outpoint is stored in wire byte order and displayed
    /// reversed.
    #[test]
    fn test_tx_id_and_outpoint_order() {
        let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
        let input = &tx.inputs[0];
        assert_eq!(
            hex::encode(input.source_txid.as_bytes()),
            "38c7c61c14ffb063c3bb2664041a3e29ea6ea0412a0c18ff725ba4e9e12afae2"
        );
        assert_eq!(input.source_output_index, 3);

        let txid = tx.tx_id();
        assert_eq!(txid, Hash::hash256(&hex::decode(SOURCE_RAW_TX).unwrap()));
        let mut reversed = *txid.as_bytes();
        reversed.reverse();
        assert_eq!(tx.tx_id_hex(), hex::encode(reversed));
        assert_eq!(Hash::from_hex(&tx.tx_id_hex()).unwrap(), txid);
    }

    #[test]
    fn test_is_coinbase() {
        assert!(Transaction::from_hex(COINBASE_TX_HEX).unwrap().is_coinbase());
        assert!(!Transaction::from_hex(SOURCE_RAW_TX).unwrap().is_coinbase());
        assert!(!Transaction::new().is_coinbase());
    }

    #[test]
    fn test_empty_transaction() {
        let tx = Transaction::new();
        let bytes = tx.to_bytes();
        assert_eq!(bytes.len(), 10, "version + two zero counts + lock time");
        let parsed = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, 1);
        assert!(parsed.inputs.is_empty() && parsed.outputs.is_empty());
    }

    #[test]
    fn test_extended_format_roundtrip() {
        let mut tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
        assert!(matches!(tx.to_bytes_ef(), Err(TransactionError::MissingSourceOutput { index: 0 })));

        tx.inputs[0].set_source_output(5_000, LockingScript::from_hex(P2PKH_HEX).unwrap());
        let ef = tx.to_bytes_ef().unwrap();
        assert_eq!(&ef[4..10], &EF_MARKER);

        let parsed = Transaction::from_bytes(&ef).unwrap();
        let source = parsed.inputs[0].source_output(0).unwrap();
        assert_eq!(source.satoshis, 5_000);
        assert_eq!(source.locking_script.to_hex(), P2PKH_HEX);
        assert_eq!(parsed.to_hex(), SOURCE_RAW_TX);
        assert_eq!(parsed.tx_id(), tx.tx_id());
        assert_eq!(Transaction::from_hex_ef(&tx.to_hex_ef().unwrap()).unwrap().to_bytes_ef().unwrap(), ef);
        assert!(Transaction::from_hex_ef(SOURCE_RAW_TX).is_err());
    }

    #[test]
    fn test_max_sequence_survives_both_formats() {
        let mut tx = Transaction::new();
        let mut input = TransactionInput::new(Hash::new([0x5a; 32]), 1);
        input.sequence = 0xFFFF_FFFF;
        input.unlocking_script = Some(UnlockingScript::from_asm("OP_1").unwrap());
        input.set_source_output(1, LockingScript::from_asm("OP_1").unwrap());
        tx.add_input(input);
        tx.add_output(TransactionOutput::new(1, LockingScript::from_asm("OP_1").unwrap()));

        let standard = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(standard.inputs[0].sequence, DEFAULT_SEQUENCE_NUMBER);
        let ef = Transaction::from_bytes(&tx.to_bytes_ef().unwrap()).unwrap();
        assert_eq!(ef.inputs[0].sequence, 0xFFFF_FFFF);
        assert_eq!(ef.to_bytes(), tx.to_bytes());
    }

    #[test]
    fn test_totals_and_fee() {
        let mut tx = Transaction::new();
        tx.add_input_from(
            "45be95d2f2c64e99518ffbbce03fb15a7758f20ee5eecf0df07938d977add71d",
            0,
            P2PKH_HEX,
            2_000,
        )
        .unwrap();
        tx.add_output(TransactionOutput::new(1_500, LockingScript::from_hex(P2PKH_HEX).unwrap()));
        assert_eq!(tx.total_input_satoshis().unwrap(), 2_000);
        assert_eq!(tx.get_fee().unwrap(), 500);

        tx.outputs[0].satoshis = 2_500;
        assert!(matches!(
            tx.get_fee(),
            Err(TransactionError::OutputsExceedInputs { inputs: 2_000, outputs: 2_500 })
        ));

        tx.add_input(TransactionInput::new(Hash::new([1u8; 32]), 0));
        assert!(matches!(
            tx.total_input_satoshis(),
            Err(TransactionError::MissingSourceOutput { index: 1 })
        ));
    }

    #[test]
    fn test_signature_hash_errors() {
        let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
        assert!(matches!(
            tx.calc_input_signature_hash(4, sighash::SIGHASH_ALL_FORKID),
            Err(TransactionError::InputIndexOutOfRange { index: 4, count: 1 })
        ));
        assert!(matches!(
            tx.calc_input_signature_hash(0, sighash::SIGHASH_ALL_FORKID),
            Err(TransactionError::MissingSourceOutput { index: 0 })
        ));
    }

    fn funded(key: &PrivateKey, satoshis: u64) -> (Transaction, LockingScript) {
        let script = P2PKH.lock(key.pub_key().hash160()).unwrap();
        let mut input = TransactionInput::new(Hash::new([0x77; 32]), 0).with_template(P2PKH.unlock(key.clone()));
        input.set_source_output(satoshis, script.clone());
        let mut tx = Transaction::new();
        tx.add_input(input);
        (tx, script)
    }

    /// Signing replaces the template estimate with a script no longer than
    /// it.
    #[test]
    fn test_sign_and_estimate() {
        let key = PrivateKey::from_bytes(&[0x31; 32]).unwrap();
        let (mut tx, script) = funded(&key, 10_000);
        tx.add_output(TransactionOutput::new(9_000, script));

        let estimate = tx.estimate_size().unwrap();
        assert_eq!(estimate, 193);
        tx.sign().unwrap();
        assert!(tx.inputs[0].unlocking_script.as_ref().is_some_and(|s| !s.is_empty()));
        assert!(tx.size() <= estimate);
        assert_eq!(tx.estimate_size().unwrap(), tx.size());
    }

    #[tokio::test]
    async fn test_fee_splits_change() {
        let key = PrivateKey::from_bytes(&[0x32; 32]).unwrap();
        let (mut tx, script) = funded(&key, 10_000);
        tx.add_output(TransactionOutput::new(1_000, script.clone()));
        tx.add_output(TransactionOutput::change(script.clone()));
        tx.add_output(TransactionOutput::change(script));

        // 4 + 1 + 149 + 1 + 3 * 34 + 4 = 261 bytes
        let fee = tx.fee(&SatoshisPerKilobyte::new(1000)).await.unwrap();
        assert_eq!(fee, 261);
        // 10,000 - 1,000 - 261 = 8,739 split in two
        assert_eq!(tx.outputs[1].satoshis, 4_370);
        assert_eq!(tx.outputs[2].satoshis, 4_369);
        assert_eq!(tx.get_fee().unwrap(), fee);
    }

    #[tokio::test]
    async fn test_fee_drops_change_when_nothing_left() {
        let key = PrivateKey::from_bytes(&[0x33; 32]).unwrap();
        let (mut tx, script) = funded(&key, 1_000);
        tx.add_output(TransactionOutput::new(1_000 - 227, script.clone()));
        tx.add_output(TransactionOutput::change(script));

        // 227 bytes with the change output, 193 once it is gone
        let fee = tx.fee(&SatoshisPerKilobyte::new(1000)).await.unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert!(!tx.outputs[0].change);
        assert_eq!(fee, 193);
        assert_eq!(fee, tx.estimate_size().unwrap() as u64);
        assert_eq!(tx.get_fee().unwrap(), 227);
    }

    #[tokio::test]
    async fn test_fee_insufficient_funds() {
        let key = PrivateKey::from_bytes(&[0x34; 32]).unwrap();
        let (mut tx, script) = funded(&key, 1_000);
        tx.add_output(TransactionOutput::new(900, script.clone()));
        tx.add_output(TransactionOutput::change(script));

        assert!(matches!(
            tx.fee(&SatoshisPerKilobyte::new(1000)).await,
            Err(TransactionError::InsufficientFee { paid: 100, required: 227 })
        ));
        assert_eq!(tx.outputs.len(), 2);
    }
}
