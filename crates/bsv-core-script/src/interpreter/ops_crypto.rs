//! Hashing and signature-checking operations.

use bsv_core_primitives::hash;

use crate::chunk::ScriptChunk;
use crate::opcodes::{OP_CODESEPARATOR, OP_PUSHDATA4};
use crate::script::Script;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::spend::Spend;
use super::TxContext;

const SIGHASH_FORKID: u32 = 0x40;
const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Half the secp256k1 group order, big-endian.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

pub(crate) enum HashType {
    Ripemd160,
    Sha1,
    Sha256,
    Hash160,
    Hash256,
}

/// True when the big-endian unsigned integer `s` exceeds half the curve order.
fn is_high_s(s: &[u8]) -> bool {
    let start = s.iter().position(|b| *b != 0).unwrap_or(s.len());
    let s = &s[start..];
    match s.len().cmp(&HALF_ORDER.len()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => s > &HALF_ORDER[..],
    }
}

/// Drop the pushes whose data is exactly one of `sigs` and every
/// `OP_CODESEPARATOR`, as required for pre-FORKID signature hashing.
fn strip_signatures(chunks: &[ScriptChunk], sigs: &[Vec<u8>]) -> Vec<ScriptChunk> {
    chunks
        .iter()
        .filter(|chunk| chunk.op != OP_CODESEPARATOR)
        .filter(|chunk| {
            if chunk.op > OP_PUSHDATA4 || !chunk.is_minimal_push() {
                return true;
            }
            let Some(data) = chunk.data.as_deref() else {
                return true;
            };
            !sigs.iter().any(|sig| !sig.is_empty() && data == sig.as_slice())
        })
        .cloned()
        .collect()
}

impl<'a> Spend<'a> {
    pub(crate) fn op_hash(&mut self, hash_type: HashType) -> Result<(), InterpreterError> {
        let buf = self.stack.pop()?;
        let digest = match hash_type {
            HashType::Ripemd160 => hash::ripemd160(&buf).to_vec(),
            HashType::Sha1 => hash::sha1(&buf).to_vec(),
            HashType::Sha256 => hash::sha256(&buf).to_vec(),
            HashType::Hash160 => hash::hash160(&buf).to_vec(),
            HashType::Hash256 => hash::sha256d(&buf).to_vec(),
        };
        self.stack.push(digest);
        Ok(())
    }

    fn require_tx_context(&self, op: &str) -> Result<&'a dyn TxContext, InterpreterError> {
        self.tx_context.ok_or_else(|| {
            InterpreterError::new(
                InterpreterErrorCode::InvalidParams,
                format!("no transaction context for {}", op),
            )
        })
    }

    /// The part of the current script after the last executed
    /// `OP_CODESEPARATOR`, with signatures stripped unless every signature
    /// commits to the FORKID algorithm.
    fn signing_script(&self, sigs: &[Vec<u8>], forkid: bool) -> Script {
        let start = self.last_code_separator.map_or(0, |pc| pc + 1);
        let chunks = &self.current_script()[start..];
        if forkid {
            Script::from_chunks(chunks)
        } else {
            Script::from_chunks(&strip_signatures(chunks, sigs))
        }
    }

    fn uses_forkid(&self, shf: u32) -> bool {
        self.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) && shf & SIGHASH_FORKID != 0
    }

    /// Check encodings, then ask the transaction context whether `full_sig`
    /// signs this input for `pub_key`. Verification errors count as a
    /// failed signature.
    fn check_one_signature(
        &self,
        ctx: &dyn TxContext,
        full_sig: &[u8],
        pub_key: &[u8],
        script: &Script,
    ) -> Result<bool, InterpreterError> {
        let Some((&shf, sig)) = full_sig.split_last() else {
            return Ok(false);
        };
        let shf = shf as u32;
        self.check_hash_type_encoding(shf)?;
        self.check_signature_encoding(sig)?;
        self.check_pub_key_encoding(pub_key)?;
        match ctx.verify_signature(full_sig, pub_key, script, self.input_index, shf) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                log::trace!("signature verification error: {}", e);
                Ok(false)
            }
        }
    }

    pub(crate) fn op_checksig(&mut self) -> Result<(), InterpreterError> {
        let pub_key = self.stack.pop()?;
        let full_sig = self.stack.pop()?;

        if full_sig.is_empty() {
            self.stack.push_bool(false);
            return Ok(());
        }
        let ctx = self.require_tx_context("OP_CHECKSIG")?;

        let shf = full_sig[full_sig.len() - 1] as u32;
        let script = self.signing_script(std::slice::from_ref(&full_sig), self.uses_forkid(shf));
        let valid = self.check_one_signature(ctx, &full_sig, &pub_key, &script)?;

        if !valid && self.has_flag(ScriptFlags::VERIFY_NULL_FAIL) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "signature not empty on failed checksig",
            ));
        }
        self.stack.push_bool(valid);
        Ok(())
    }

    pub(crate) fn op_checkmultisig(&mut self) -> Result<(), InterpreterError> {
        let n = self.stack.pop_num()?;
        let max_keys = self.cfg.max_pub_keys_per_multisig();
        if n.is_negative() || n > max_keys {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPubKeyCount,
                format!("number of pubkeys {} is out of range 0..={}", n, max_keys),
            ));
        }
        let num_keys = n.to_usize().unwrap_or(usize::MAX);
        if num_keys > self.stack.depth() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackOperation,
                format!("{} pubkeys requested with stack size {}", num_keys, self.stack.depth()),
            ));
        }

        self.num_ops += num_keys;
        if self.num_ops > self.cfg.max_ops() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::TooManyOperations,
                format!("exceeded max operation limit of {}", self.cfg.max_ops()),
            ));
        }

        let mut pub_keys = Vec::with_capacity(num_keys);
        for _ in 0..num_keys {
            pub_keys.push(self.stack.pop()?);
        }

        let m = self.stack.pop_num()?;
        if m.is_negative() || m > num_keys {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidSignatureCount,
                format!("number of signatures {} is out of range 0..={}", m, num_keys),
            ));
        }
        let num_sigs = m.to_usize().unwrap_or(usize::MAX);
        let mut sigs = Vec::with_capacity(num_sigs);
        for _ in 0..num_sigs {
            sigs.push(self.stack.pop()?);
        }

        let dummy = self.stack.pop()?;
        if self.has_flag(ScriptFlags::STRICT_MULTI_SIG) && !dummy.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigNullDummy,
                format!("multisig dummy argument has length {} instead of 0", dummy.len()),
            ));
        }

        if num_sigs == 0 {
            self.stack.push_bool(true);
            return Ok(());
        }
        let ctx = self.require_tx_context("OP_CHECKMULTISIG")?;

        let forkid = sigs
            .iter()
            .filter_map(|s| s.last())
            .all(|shf| self.uses_forkid(*shf as u32));
        let script = self.signing_script(&sigs, forkid);

        // Signatures must appear in the same order as their keys. Each key is
        // tried once; a signature that matches no remaining key fails the op.
        let mut success = true;
        let mut key_idx = 0;
        let mut sig_idx = 0;
        while sig_idx < sigs.len() {
            if sigs.len() - sig_idx > pub_keys.len() - key_idx {
                success = false;
                break;
            }
            let sig = &sigs[sig_idx];
            let pub_key = &pub_keys[key_idx];
            key_idx += 1;
            if sig.is_empty() {
                continue;
            }
            if self.check_one_signature(ctx, sig, pub_key, &script)? {
                sig_idx += 1;
            }
        }

        if !success
            && self.has_flag(ScriptFlags::VERIFY_NULL_FAIL)
            && sigs.iter().any(|s| !s.is_empty())
        {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "not all signatures empty on failed checkmultisig",
            ));
        }
        self.stack.push_bool(success);
        Ok(())
    }

    fn check_hash_type_encoding(&self, shf: u32) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::VERIFY_STRICT_ENCODING) {
            return Ok(());
        }
        let base = shf & !(SIGHASH_FORKID | SIGHASH_ANYONECANPAY);
        if !(1..=3).contains(&base) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidSigHashType,
                format!("invalid hash type {:#x}", shf),
            ));
        }
        let has_forkid = shf & SIGHASH_FORKID != 0;
        let forkid_enabled = self.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID);
        if has_forkid && !forkid_enabled {
            return Err(InterpreterError::new(
                InterpreterErrorCode::IllegalForkID,
                "fork id sighash set without flag",
            ));
        }
        if !has_forkid && forkid_enabled {
            return Err(InterpreterError::new(
                InterpreterErrorCode::IllegalForkID,
                "fork id sighash not set with flag",
            ));
        }
        Ok(())
    }

    fn check_pub_key_encoding(&self, pub_key: &[u8]) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::VERIFY_STRICT_ENCODING) {
            return Ok(());
        }
        match pub_key {
            [0x02 | 0x03, ..] if pub_key.len() == 33 => Ok(()),
            [0x04, ..] if pub_key.len() == 65 => Ok(()),
            _ => Err(InterpreterError::new(
                InterpreterErrorCode::PubKeyType,
                "unsupported public key type",
            )),
        }
    }

    /// Strict DER layout checks, and the low-S rule when enabled. `sig`
    /// excludes the trailing hash-type byte.
    fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), InterpreterError> {
        if !self.has_any(&[
            ScriptFlags::VERIFY_DER_SIGNATURES,
            ScriptFlags::VERIFY_LOW_S,
            ScriptFlags::VERIFY_STRICT_ENCODING,
        ]) || sig.is_empty()
        {
            return Ok(());
        }

        let err = |code, msg: String| Err(InterpreterError::new(code, msg));
        let sig_len = sig.len();
        if sig_len < 8 {
            return err(
                InterpreterErrorCode::SigTooShort,
                format!("malformed signature: too short: {} < 8", sig_len),
            );
        }
        if sig_len > 72 {
            return err(
                InterpreterErrorCode::SigTooLong,
                format!("malformed signature: too long: {} > 72", sig_len),
            );
        }
        if sig[0] != 0x30 {
            return err(
                InterpreterErrorCode::SigInvalidSeqID,
                format!("malformed signature: format has wrong type: {:#x}", sig[0]),
            );
        }
        if sig[1] as usize != sig_len - 2 {
            return err(
                InterpreterErrorCode::SigInvalidDataLen,
                format!("malformed signature: bad length: {} != {}", sig[1], sig_len - 2),
            );
        }

        let r_len = sig[3] as usize;
        let s_type_offset = 4 + r_len;
        let s_len_offset = s_type_offset + 1;
        if s_type_offset >= sig_len {
            return err(
                InterpreterErrorCode::SigMissingSTypeID,
                "malformed signature: S type indicator missing".to_string(),
            );
        }
        if s_len_offset >= sig_len {
            return err(
                InterpreterErrorCode::SigMissingSLen,
                "malformed signature: S length missing".to_string(),
            );
        }
        let s_offset = s_len_offset + 1;
        let s_len = sig[s_len_offset] as usize;
        if s_offset + s_len != sig_len {
            return err(
                InterpreterErrorCode::SigInvalidSLen,
                "malformed signature: invalid S length".to_string(),
            );
        }

        if sig[2] != 0x02 {
            return err(
                InterpreterErrorCode::SigInvalidRIntID,
                format!("malformed signature: R integer marker: {:#x} != 0x02", sig[2]),
            );
        }
        if r_len == 0 {
            return err(
                InterpreterErrorCode::SigZeroRLen,
                "malformed signature: R length is zero".to_string(),
            );
        }
        if sig[4] & 0x80 != 0 {
            return err(
                InterpreterErrorCode::SigNegativeR,
                "malformed signature: R is negative".to_string(),
            );
        }
        if r_len > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
            return err(
                InterpreterErrorCode::SigTooMuchRPadding,
                "malformed signature: R value has too much padding".to_string(),
            );
        }

        if sig[s_type_offset] != 0x02 {
            return err(
                InterpreterErrorCode::SigInvalidSIntID,
                format!(
                    "malformed signature: S integer marker: {:#x} != 0x02",
                    sig[s_type_offset]
                ),
            );
        }
        if s_len == 0 {
            return err(
                InterpreterErrorCode::SigZeroSLen,
                "malformed signature: S length is zero".to_string(),
            );
        }
        if sig[s_offset] & 0x80 != 0 {
            return err(
                InterpreterErrorCode::SigNegativeS,
                "malformed signature: S is negative".to_string(),
            );
        }
        if s_len > 1 && sig[s_offset] == 0x00 && sig[s_offset + 1] & 0x80 == 0 {
            return err(
                InterpreterErrorCode::SigTooMuchSPadding,
                "malformed signature: S value has too much padding".to_string(),
            );
        }

        if self.has_flag(ScriptFlags::VERIFY_LOW_S) && is_high_s(&sig[s_offset..]) {
            return err(
                InterpreterErrorCode::SigHighS,
                "signature is not canonical due to unnecessarily high S value".to_string(),
            );
        }
        Ok(())
    }
}
