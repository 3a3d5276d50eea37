//! Signature hash computation for transaction signing.
//!
//! Two digest algorithms exist. Signatures whose sighash type carries
//! [`SIGHASH_FORKID`] use the replay-protected algorithm, which commits to
//! the spent value and hashes inputs, sequences and outputs separately.
//! Everything else uses the original algorithm, which hashes a modified copy
//! of the whole transaction.
//!
//! See <https://github.com/bitcoin-sv/bitcoin-sv/blob/master/doc/abc/replay-protected-sighash.md#digest-algorithm>

use bsv_core_primitives::hash::sha256d;
use bsv_core_primitives::util::{BsvWriter, VarInt};
use bsv_core_script::opcodes::OP_CODESEPARATOR;
use bsv_core_script::Script;

use crate::transaction::Transaction;
use crate::TransactionError;

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs, allowing outputs to be modified.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Combined with another flag: only sign the current input, allowing other
/// inputs to be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Selects the replay-protected digest.
pub const SIGHASH_FORKID: u32 = 0x40;

/// The standard sighash type: ALL | FORKID.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Mask applied to extract the base sighash type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

/// Digest returned by the original algorithm for `SIGHASH_SINGLE` without a
/// matching output: the number one as a little-endian 256-bit integer.
pub const SIGHASH_SINGLE_BUG: [u8; 32] = {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
};

/// Compute the digest signed for input `input_index`.
///
/// The algorithm is picked by the [`SIGHASH_FORKID`] bit of `sighash_type`.
///
/// # Arguments
/// * `tx`           - The transaction being signed.
/// * `input_index`  - Index of the input being signed.
/// * `script_code`  - The script the signature commits to, normally the
///   locking script of the output being spent.
/// * `sighash_type` - The sighash flags (e.g. `SIGHASH_ALL | SIGHASH_FORKID`).
/// * `satoshis`     - The value of the output being spent. Only the FORKID
///   digest commits to it.
///
/// # Returns
/// A 32-byte double-SHA256 hash to be signed by ECDSA.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<[u8; 32], TransactionError> {
    if sighash_type & SIGHASH_FORKID != 0 {
        let preimage = calc_preimage(tx, input_index, script_code, sighash_type, satoshis)?;
        Ok(sha256d(&preimage))
    } else {
        legacy_signature_hash(tx, input_index, script_code, sighash_type)
    }
}

/// The FORKID pre-image, before double hashing.
///
/// The preimage consists of:
/// 1. nVersion (4 bytes LE)
/// 2. hashPrevouts (32 bytes) - sha256d of all outpoints unless ANYONECANPAY
/// 3. hashSequence (32 bytes) - sha256d of all sequences unless ANYONECANPAY/SINGLE/NONE
/// 4. outpoint (32+4 bytes) - txid + vout of the input being signed
/// 5. scriptCode (varint + script)
/// 6. value (8 bytes LE) - satoshis of the output being spent
/// 7. nSequence (4 bytes LE) - sequence of the input being signed
/// 8. hashOutputs (32 bytes) - sha256d of all outputs or one output
/// 9. nLocktime (4 bytes LE)
/// 10. sighashType (4 bytes LE)
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<Vec<u8>, TransactionError> {
    let input = tx.inputs.get(input_index).ok_or(TransactionError::InputIndexOutOfRange {
        index: input_index,
        count: tx.inputs.len(),
    })?;
    let base_type = sighash_type & SIGHASH_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    let hash_prevouts = if !anyone_can_pay { prevouts_hash(tx) } else { [0u8; 32] };

    let hash_sequence =
        if !anyone_can_pay && base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
            sequence_hash(tx)
        } else {
            [0u8; 32]
        };

    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        outputs_hash(tx, None)
    } else if base_type == SIGHASH_SINGLE && input_index < tx.outputs.len() {
        outputs_hash(tx, Some(input_index))
    } else {
        [0u8; 32]
    };

    let mut writer = BsvWriter::with_capacity(156 + script_code.len());
    writer.write_u32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    writer.write_bytes(input.source_txid.as_bytes());
    writer.write_u32_le(input.source_output_index);
    writer.write_var_bytes(script_code);
    writer.write_u64_le(satoshis);
    writer.write_u32_le(input.sequence);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(sighash_type);

    Ok(writer.into_bytes())
}

/// The original digest: double SHA-256 of a modified copy of `tx`.
///
/// Every input script is emptied except the signed input's, which carries
/// `script_code` with its `OP_CODESEPARATOR`s removed. `NONE` drops the
/// outputs, `SINGLE` keeps outputs up to the signed index with earlier ones
/// blanked, and both zero the other inputs' sequences. `ANYONECANPAY` keeps
/// only the signed input.
pub fn legacy_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
) -> Result<[u8; 32], TransactionError> {
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InputIndexOutOfRange {
            index: input_index,
            count: tx.inputs.len(),
        });
    }
    let base_type = sighash_type & SIGHASH_MASK;
    if base_type == SIGHASH_SINGLE && input_index >= tx.outputs.len() {
        return Ok(SIGHASH_SINGLE_BUG);
    }
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let zero_other_sequences = base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE;
    let script_code = without_code_separators(script_code);

    let mut writer = BsvWriter::with_capacity(256);
    writer.write_u32_le(tx.version);

    let signed: Vec<usize> = if anyone_can_pay {
        vec![input_index]
    } else {
        (0..tx.inputs.len()).collect()
    };
    writer.write_varint(VarInt::from(signed.len()));
    for i in signed {
        let input = &tx.inputs[i];
        writer.write_bytes(input.source_txid.as_bytes());
        writer.write_u32_le(input.source_output_index);
        if i == input_index {
            writer.write_var_bytes(&script_code);
            writer.write_u32_le(input.sequence);
        } else {
            writer.write_var_bytes(&[]);
            writer.write_u32_le(if zero_other_sequences { 0 } else { input.sequence });
        }
    }

    match base_type {
        SIGHASH_NONE => writer.write_varint(VarInt(0)),
        SIGHASH_SINGLE => {
            writer.write_varint(VarInt::from(input_index + 1));
            for _ in 0..input_index {
                writer.write_u64_le(u64::MAX);
                writer.write_var_bytes(&[]);
            }
            tx.outputs[input_index].write_to(&mut writer);
        }
        _ => {
            writer.write_varint(VarInt::from(tx.outputs.len()));
            for output in &tx.outputs {
                output.write_to(&mut writer);
            }
        }
    }

    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(sighash_type);
    Ok(sha256d(writer.as_bytes()))
}

/// Unparseable script code is signed as-is.
fn without_code_separators(script_code: &[u8]) -> Vec<u8> {
    match Script::from_bytes(script_code).chunks() {
        Ok(chunks) if chunks.iter().any(|c| c.op == OP_CODESEPARATOR) => {
            let kept: Vec<_> = chunks.into_iter().filter(|c| c.op != OP_CODESEPARATOR).collect();
            Script::from_chunks(&kept).into_bytes()
        }
        _ => script_code.to_vec(),
    }
}

fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = BsvWriter::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        writer.write_bytes(input.source_txid.as_bytes());
        writer.write_u32_le(input.source_output_index);
    }
    sha256d(writer.as_bytes())
}

fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = BsvWriter::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence);
    }
    sha256d(writer.as_bytes())
}

/// All outputs, or only output `n` for `SIGHASH_SINGLE`.
fn outputs_hash(tx: &Transaction, n: Option<usize>) -> [u8; 32] {
    let mut writer = BsvWriter::new();
    match n {
        Some(n) => tx.outputs[n].write_to(&mut writer),
        None => {
            for output in &tx.outputs {
                output.write_to(&mut writer);
            }
        }
    }
    sha256d(writer.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TransactionInput;
    use crate::output::TransactionOutput;
    use bsv_core_primitives::chainhash::Hash;
    use bsv_core_script::LockingScript;

    const P2PKH: &str = "76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac";

    fn two_in_two_out() -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(TransactionInput::new(Hash::new([1u8; 32]), 0));
        tx.add_input(TransactionInput::new(Hash::new([2u8; 32]), 1));
        tx.inputs[1].sequence = 7;
        tx.add_output(TransactionOutput::new(1000, LockingScript::from_hex(P2PKH).unwrap()));
        tx.add_output(TransactionOutput::new(2000, LockingScript::from_hex(P2PKH).unwrap()));
        tx
    }

    #[test]
    fn test_preimage_layout() {
        let tx = two_in_two_out();
        let code = hex::decode(P2PKH).unwrap();
        let preimage = calc_preimage(&tx, 0, &code, SIGHASH_ALL_FORKID, 5000).unwrap();
        // version, two hashes, outpoint, code, value, sequence, outputs, locktime, type
        assert_eq!(preimage.len(), 4 + 32 + 32 + 36 + 1 + code.len() + 8 + 4 + 32 + 4 + 4);
        assert_eq!(&preimage[..4], &1u32.to_le_bytes());
        assert_eq!(&preimage[preimage.len() - 4..], &SIGHASH_ALL_FORKID.to_le_bytes());
    }

    #[test]
    fn test_forkid_commits_to_value() {
        let tx = two_in_two_out();
        let code = hex::decode(P2PKH).unwrap();
        let a = signature_hash(&tx, 0, &code, SIGHASH_ALL_FORKID, 5000).unwrap();
        let b = signature_hash(&tx, 0, &code, SIGHASH_ALL_FORKID, 5001).unwrap();
        assert_ne!(a, b);

        // the original algorithm ignores the value
        let a = signature_hash(&tx, 0, &code, SIGHASH_ALL, 5000).unwrap();
        let b = signature_hash(&tx, 0, &code, SIGHASH_ALL, 5001).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_range() {
        let tx = two_in_two_out();
        for flag in [SIGHASH_ALL, SIGHASH_ALL_FORKID] {
            assert!(matches!(
                signature_hash(&tx, 2, &[], flag, 0),
                Err(TransactionError::InputIndexOutOfRange { index: 2, count: 2 })
            ));
        }
    }

    #[test]
    fn test_single_without_output() {
        let mut tx = two_in_two_out();
        tx.outputs.truncate(1);
        let code = hex::decode(P2PKH).unwrap();
        assert_eq!(legacy_signature_hash(&tx, 1, &code, SIGHASH_SINGLE).unwrap(), SIGHASH_SINGLE_BUG);
        assert_ne!(legacy_signature_hash(&tx, 0, &code, SIGHASH_SINGLE).unwrap(), SIGHASH_SINGLE_BUG);
    }

    #[test]
    fn test_legacy_flag_coverage() {
        let code = hex::decode(P2PKH).unwrap();
        let base = two_in_two_out();

        // NONE ignores outputs
        let mut changed = base.clone();
        changed.outputs[1].satoshis += 1;
        assert_eq!(
            legacy_signature_hash(&base, 0, &code, SIGHASH_NONE).unwrap(),
            legacy_signature_hash(&changed, 0, &code, SIGHASH_NONE).unwrap()
        );
        assert_ne!(
            legacy_signature_hash(&base, 0, &code, SIGHASH_ALL).unwrap(),
            legacy_signature_hash(&changed, 0, &code, SIGHASH_ALL).unwrap()
        );

        // SINGLE on input 0 ignores output 1 and other sequences
        let mut changed = base.clone();
        changed.outputs[1].satoshis += 1;
        changed.inputs[1].sequence = 99;
        assert_eq!(
            legacy_signature_hash(&base, 0, &code, SIGHASH_SINGLE).unwrap(),
            legacy_signature_hash(&changed, 0, &code, SIGHASH_SINGLE).unwrap()
        );

        // ANYONECANPAY ignores the other inputs entirely
        let mut changed = base.clone();
        changed.inputs[1].source_output_index = 5;
        let flag = SIGHASH_ALL | SIGHASH_ANYONECANPAY;
        assert_eq!(
            legacy_signature_hash(&base, 0, &code, flag).unwrap(),
            legacy_signature_hash(&changed, 0, &code, flag).unwrap()
        );
        assert_ne!(
            legacy_signature_hash(&base, 0, &code, SIGHASH_ALL).unwrap(),
            legacy_signature_hash(&changed, 0, &code, SIGHASH_ALL).unwrap()
        );
    }

    #[test]
    fn test_legacy_ignores_code_separators_and_other_scripts() {
        let mut tx = two_in_two_out();
        let code = hex::decode(P2PKH).unwrap();
        let mut with_separator = vec![OP_CODESEPARATOR];
        with_separator.extend_from_slice(&code);

        let plain = legacy_signature_hash(&tx, 0, &code, SIGHASH_ALL).unwrap();
        assert_eq!(legacy_signature_hash(&tx, 0, &with_separator, SIGHASH_ALL).unwrap(), plain);

        tx.inputs[1].unlocking_script = Some(bsv_core_script::UnlockingScript::from_bytes(&[0x51]));
        assert_eq!(legacy_signature_hash(&tx, 0, &code, SIGHASH_ALL).unwrap(), plain);
    }

    /// BIP143 native P2WPKH example. The FORKID preimage has the same layout.
    const BIP143_TX: &str = "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000";
    const BIP143_CODE: &str = "76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac";

    #[test]
    fn test_preimage_vector() {
        let tx = Transaction::from_hex(BIP143_TX).unwrap();
        let code = hex::decode(BIP143_CODE).unwrap();

        let preimage = calc_preimage(&tx, 1, &code, SIGHASH_ALL, 600_000_000).unwrap();
        assert_eq!(
            hex::encode(&preimage),
            "01000000\
             96b827c8483d4e9b96712b6713a7b68d6e8003a781feba36c31143470b4efd37\
             52b0a642eea2fb7ae638c36f6252b6750293dbe574a806984b8e4d8548339a3b\
             ef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a01000000\
             1976a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac\
             0046c32300000000\
             ffffffff\
             863ef3e1a92afbfdb97f31ad0fc7683ee943e9abcf2501590ff8f6551f47e5e5\
             11000000\
             01000000"
        );
        assert_eq!(
            hex::encode(sha256d(&preimage)),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }

    #[test]
    fn test_forkid_vectors() {
        let tx = Transaction::from_hex(BIP143_TX).unwrap();
        let code = hex::decode(BIP143_CODE).unwrap();
        let digest = |flag| hex::encode(signature_hash(&tx, 1, &code, flag, 600_000_000).unwrap());

        assert_eq!(digest(SIGHASH_ALL_FORKID), "467f411d178762db122a6aced76370a1c8324355bf0796502bf82eeaeda86a35");
        assert_eq!(
            digest(SIGHASH_SINGLE | SIGHASH_FORKID),
            "abb61ba86e14313425d25846ed3a30904de1f081e013d80c385e165c2af1e020"
        );
        assert_eq!(
            digest(SIGHASH_NONE | SIGHASH_FORKID),
            "c0876aa9dfd131ac207be062e389741416a87a5d1b28e4857c178990454dd498"
        );
        assert_eq!(
            digest(SIGHASH_ALL_FORKID | SIGHASH_ANYONECANPAY),
            "a5890ce40dc95a89717ae6fa3c9d60bcf9372539058c7e9a0cd8ff7909723326"
        );
    }

    /// First row of Bitcoin Core's sighash.json: three inputs, two outputs
    /// and an unusual hash type whose base is ALL.
    const CORE_TX: &str = "907c2bc503ade11cc3b04eb2918b6f547b0630ab569273824748c87ea14b0696526c66ba740200000004ab65ababfd1f9bdd4ef073c7afc4ae00da8a66f429c917a0081ad1e1dabce28d373eab81d8628de802000000096aab5253ab52000052ad042b5f25efb33beec9f3364e8a9139e8439d9d7e26529c3c30b6c3fd89f8684cfd68ea0200000009ab53526500636a52ab599ac2fe02a526ed040000000008535300516352515164370e010000000003006300ab2ec229";

    /// Digest in display (reversed) order, as the vector files print it.
    fn legacy_hex(tx: &Transaction, index: usize, code: &str, flag: u32) -> String {
        let mut digest = legacy_signature_hash(tx, index, &hex::decode(code).unwrap(), flag).unwrap();
        digest.reverse();
        hex::encode(digest)
    }

    #[test]
    fn test_legacy_vectors() {
        let tx = Transaction::from_hex(CORE_TX).unwrap();
        assert_eq!(tx.inputs.len(), 3);
        assert_eq!(tx.outputs.len(), 2);

        let cases = [
            (2, "", 1_864_164_639, "31af167a6cf3f9d5f6875caa4d31704ceb0eba078d132b78dab52c3b8997317e"),
            (0, "", SIGHASH_NONE, "07a80744e947cfddc2db0f6f8f5e84691e568c2c4cdaefa8f290872824fdd41f"),
            (1, "", SIGHASH_SINGLE, "bf99ca455cbd3a4b0a84777b22a66e10431b1ec973f496fd8c1eff803382f8aa"),
            (
                1,
                "",
                SIGHASH_SINGLE | SIGHASH_ANYONECANPAY,
                "a8d1311d082fc4de2b14e33a873345f0725763cd86b9ed0af9dc2b3830cf37b2",
            ),
            (
                0,
                "",
                SIGHASH_NONE | SIGHASH_ANYONECANPAY,
                "5fc9aef094dcf8a1d188deb73e0976fb514e91625b417d1bb566a86eb022fe9d",
            ),
            (
                1,
                "",
                SIGHASH_ALL | SIGHASH_ANYONECANPAY,
                "f38ef37fd57113e4c0f05a12d03a1025e50e9974d91e46f1a35529cabcf3caf4",
            ),
            (0, "51ab52", SIGHASH_ALL, "6a25f3c267ba88122bd1555556db292a6c48d68ca264998e48f78f348bef0491"),
            (0, "5152", SIGHASH_ALL, "6a25f3c267ba88122bd1555556db292a6c48d68ca264998e48f78f348bef0491"),
        ];
        for (index, code, flag, expected) in cases {
            assert_eq!(legacy_hex(&tx, index, code, flag), expected, "input {} flag {:#x}", index, flag);
        }

        // SINGLE past the last output
        assert_eq!(legacy_signature_hash(&tx, 2, &[], SIGHASH_SINGLE).unwrap(), SIGHASH_SINGLE_BUG);
    }
}
