//! R-puzzle template.
//!
//! The locking script extracts the `r` value from the spender's DER
//! signature and compares it (or its hash) with a committed value, then
//! checks the signature against the supplied public key. Anyone who knows
//! the nonce `k` behind `r` can spend, with any key.

use bsv_core_primitives::ec::PrivateKey;
use bsv_core_primitives::hash;
use bsv_core_script::opcodes::*;
use bsv_core_script::{LockingScript, ScriptChunk, UnlockingScript};

use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::{signature_for_input, ScriptTemplate, UnlockingScriptTemplate};
use crate::transaction::Transaction;
use crate::TransactionError;

/// How the committed value relates to `r`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RPuzzleType {
    /// The value is `r` itself.
    #[default]
    Raw,
    Sha1,
    Sha256,
    Hash256,
    Ripemd160,
    Hash160,
}

impl RPuzzleType {
    fn opcode(self) -> Option<u8> {
        match self {
            RPuzzleType::Raw => None,
            RPuzzleType::Sha1 => Some(OP_SHA1),
            RPuzzleType::Sha256 => Some(OP_SHA256),
            RPuzzleType::Hash256 => Some(OP_HASH256),
            RPuzzleType::Ripemd160 => Some(OP_RIPEMD160),
            RPuzzleType::Hash160 => Some(OP_HASH160),
        }
    }

    /// The value a locking script of this type commits to for `r`.
    pub fn commit(self, r: &[u8]) -> Vec<u8> {
        match self {
            RPuzzleType::Raw => r.to_vec(),
            RPuzzleType::Sha1 => hash::sha1(r).to_vec(),
            RPuzzleType::Sha256 => hash::sha256(r).to_vec(),
            RPuzzleType::Hash256 => hash::sha256d(r).to_vec(),
            RPuzzleType::Ripemd160 => hash::ripemd160(r).to_vec(),
            RPuzzleType::Hash160 => hash::hash160(r).to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RPuzzle {
    pub puzzle_type: RPuzzleType,
}

impl RPuzzle {
    pub fn new(puzzle_type: RPuzzleType) -> Self {
        RPuzzle { puzzle_type }
    }
}

impl ScriptTemplate for RPuzzle {
    /// The committed value: `r` as it appears in DER (with any sign padding),
    /// or its hash.
    type LockArgs = Vec<u8>;
    /// The nonce `k` and the key to sign with.
    type UnlockArgs = ([u8; 32], PrivateKey);
    type Unlocker = RPuzzleUnlocker;

    fn lock(&self, value: Vec<u8>) -> Result<LockingScript, TransactionError> {
        if value.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "r-puzzle value must not be empty".to_string(),
            ));
        }
        // sig pubkey -> sig pubkey r
        let mut chunks: Vec<ScriptChunk> = [
            OP_OVER, OP_3, OP_SPLIT, OP_NIP, OP_1, OP_SPLIT, OP_SWAP, OP_SPLIT, OP_DROP,
        ]
        .into_iter()
        .map(ScriptChunk::opcode)
        .collect();
        if let Some(op) = self.puzzle_type.opcode() {
            chunks.push(ScriptChunk::opcode(op));
        }
        chunks.push(ScriptChunk::push(&value));
        chunks.push(ScriptChunk::opcode(OP_EQUALVERIFY));
        chunks.push(ScriptChunk::opcode(OP_CHECKSIG));
        Ok(LockingScript::from_chunks(&chunks))
    }

    fn unlock(&self, (k, private_key): ([u8; 32], PrivateKey)) -> RPuzzleUnlocker {
        RPuzzleUnlocker { k, private_key, sighash_flag: SIGHASH_ALL_FORKID }
    }
}

/// Signs with the puzzle's nonce.
#[derive(Clone, Debug)]
pub struct RPuzzleUnlocker {
    k: [u8; 32],
    private_key: PrivateKey,
    sighash_flag: u32,
}

impl RPuzzleUnlocker {
    pub fn with_sighash_flag(mut self, sighash_flag: u32) -> Self {
        self.sighash_flag = sighash_flag;
        self
    }
}

impl UnlockingScriptTemplate for RPuzzleUnlocker {
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<UnlockingScript, TransactionError> {
        let sig = signature_for_input(tx, input_index, self.sighash_flag, |digest| {
            self.private_key.sign_with_k(digest, &self.k)
        })?;
        let pub_key = self.private_key.pub_key().to_compressed();

        let mut script = UnlockingScript::new();
        script.append_push_data(&sig)?;
        script.append_push_data(&pub_key)?;
        Ok(script)
    }

    fn estimate_length(&self, _tx: &Transaction, _input_index: usize) -> u32 {
        108
    }
}

/// The `r` value of any signature made with nonce `k`, in its DER form
/// (leading zeros dropped, a zero byte added when the top bit is set).
///
/// This is what a [`RPuzzleType::Raw`] lock commits to.
pub fn r_value(k: &[u8; 32]) -> Result<Vec<u8>, TransactionError> {
    let point = PrivateKey::from_bytes(k)?.pub_key().to_compressed();
    let x = &point[1..];
    let start = x.iter().position(|&b| b != 0).unwrap_or(x.len() - 1);
    let mut r = Vec::with_capacity(33);
    if x[start] & 0x80 != 0 {
        r.push(0);
    }
    r.extend_from_slice(&x[start..]);
    Ok(r)
}

/// The `r` field of a DER signature, including sign padding.
pub fn der_r(der: &[u8]) -> Option<&[u8]> {
    let len = *der.get(3)? as usize;
    der.get(4..4 + len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsv_core_primitives::ec::Signature;

    #[test]
    fn test_lock_shape() {
        let script = RPuzzle::default().lock(vec![0xab; 32]).unwrap();
        assert_eq!(
            script.to_asm(),
            format!(
                "OP_OVER OP_3 OP_SPLIT OP_NIP OP_1 OP_SPLIT OP_SWAP OP_SPLIT OP_DROP {} OP_EQUALVERIFY OP_CHECKSIG",
                "ab".repeat(32)
            )
        );

        let script = RPuzzle::new(RPuzzleType::Hash160).lock(vec![0xcd; 20]).unwrap();
        assert!(script.to_asm().contains("OP_DROP OP_HASH160 cdcd"));
        assert!(RPuzzle::default().lock(Vec::new()).is_err());
    }

    #[test]
    fn test_same_k_same_r() {
        let k = [7u8; 32];
        let a = PrivateKey::from_bytes(&[1u8; 32]).unwrap();
        let b = PrivateKey::from_bytes(&[2u8; 32]).unwrap();
        let sig_a = a.sign_with_k(&[3u8; 32], &k).unwrap();
        let sig_b = b.sign_with_k(&[4u8; 32], &k).unwrap();
        assert_eq!(sig_a.r(), sig_b.r());

        let der = sig_a.to_der();
        assert_eq!(Signature::from_der(&der).unwrap(), sig_a);
        assert_eq!(trim(der_r(&der).unwrap()), trim(sig_a.r()));
        assert_eq!(r_value(&k).unwrap(), der_r(&der).unwrap());
    }

    fn trim(bytes: &[u8]) -> &[u8] {
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        &bytes[start..]
    }
}
