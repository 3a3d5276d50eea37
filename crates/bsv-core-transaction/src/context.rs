//! Binds a transaction to the interpreter's signature and lock-time checks.

use bsv_core_primitives::ec::{PublicKey, Signature};
use bsv_core_script::interpreter::{InterpreterError, InterpreterErrorCode, TxContext};
use bsv_core_script::Script;

use crate::sighash::{self, SIGHASH_FORKID};
use crate::transaction::Transaction;

/// The spending transaction as seen by the interpreter.
pub struct TransactionContext<'a> {
    tx: &'a Transaction,
    forkid_enabled: bool,
}

impl<'a> TransactionContext<'a> {
    /// # Arguments
    /// * `tx` - The spending transaction. Every input being evaluated must
    ///   know its source output.
    /// * `forkid_enabled` - Whether signatures carrying the FORKID bit are
    ///   checked against the FORKID digest.
    pub fn new(tx: &'a Transaction, forkid_enabled: bool) -> Self {
        TransactionContext { tx, forkid_enabled }
    }
}

impl TxContext for TransactionContext<'_> {
    fn verify_signature(
        &self,
        full_sig: &[u8],
        pub_key: &[u8],
        sub_script: &Script,
        input_idx: usize,
        sighash_flag: u32,
    ) -> Result<bool, InterpreterError> {
        let Some((_, der)) = full_sig.split_last() else {
            return Ok(false);
        };
        let (Ok(signature), Ok(key)) = (Signature::from_der(der), PublicKey::from_bytes(pub_key))
        else {
            return Ok(false);
        };

        let satoshis = self
            .tx
            .inputs
            .get(input_idx)
            .ok_or_else(|| {
                InterpreterError::new(
                    InterpreterErrorCode::InvalidParams,
                    format!("input {} out of range", input_idx),
                )
            })?
            .source_output(input_idx)
            .map(|source| source.satoshis)
            .map_err(|e| InterpreterError::new(InterpreterErrorCode::InvalidParams, e.to_string()))?;

        let digest = if self.forkid_enabled && sighash_flag & SIGHASH_FORKID != 0 {
            sighash::signature_hash(self.tx, input_idx, sub_script.as_bytes(), sighash_flag, satoshis)
        } else {
            sighash::legacy_signature_hash(self.tx, input_idx, sub_script.as_bytes(), sighash_flag)
        }
        .map_err(|e| InterpreterError::new(InterpreterErrorCode::Internal, e.to_string()))?;

        Ok(signature.verify(&digest, &key))
    }

    fn lock_time(&self) -> u32 {
        self.tx.lock_time
    }

    fn tx_version(&self) -> u32 {
        self.tx.version
    }

    fn input_sequence(&self, input_idx: usize) -> u32 {
        self.tx.inputs.get(input_idx).map_or(0, |input| input.sequence)
    }
}
