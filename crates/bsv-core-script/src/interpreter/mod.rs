//! Script interpreter.
//!
//! A [`Spend`] evaluates one unlocking script against the locking script it
//! claims to satisfy. It can run to completion with [`Spend::validate`] or be
//! stepped one chunk at a time with [`Spend::step`], and any failure comes
//! back as a [`SpendError`] holding the state at the failing instruction.
//!
//! The interpreter does not depend on the transaction crate. Signature and
//! lock-time opcodes go through a caller-supplied [`TxContext`].
//!
//! # Example
//!
//! ```
//! use bsv_core_script::interpreter::{Spend, SpendParams};
//! use bsv_core_script::{LockingScript, UnlockingScript};
//!
//! let unlocking = UnlockingScript::from_asm("OP_2 OP_3").unwrap();
//! let locking = LockingScript::from_asm("OP_ADD OP_5 OP_EQUAL").unwrap();
//! let mut spend = Spend::new(SpendParams::new(&unlocking, &locking)).unwrap();
//! assert!(spend.validate().is_ok());
//! ```

pub mod config;
pub mod error;
pub mod flags;
mod ops_arithmetic;
mod ops_crypto;
mod ops_data;
mod ops_flow;
mod ops_stack;
pub mod spend;
pub mod stack;

pub use config::{Config, DEFAULT_MEMORY_LIMIT};
pub use error::{ExecutionContext, InterpreterError, InterpreterErrorCode, SpendError};
pub use flags::ScriptFlags;
pub use spend::{Spend, SpendParams};
pub use stack::Stack;

use crate::Script;

/// Transaction data needed by `OP_CHECKSIG`, `OP_CHECKMULTISIG`,
/// `OP_CHECKLOCKTIMEVERIFY` and `OP_CHECKSEQUENCEVERIFY`.
pub trait TxContext {
    /// Verify a signature over the input being spent.
    ///
    /// # Arguments
    /// * `full_sig` - DER signature followed by the sighash byte.
    /// * `pub_key` - Encoded public key.
    /// * `sub_script` - Script code the signature commits to.
    /// * `input_idx` - Index of the input being verified.
    /// * `sighash_flag` - The sighash byte.
    ///
    /// # Returns
    /// `Ok(true)` for a valid signature, `Ok(false)` for an invalid one. An
    /// `Err` is treated by the interpreter as an invalid signature.
    fn verify_signature(
        &self,
        full_sig: &[u8],
        pub_key: &[u8],
        sub_script: &Script,
        input_idx: usize,
        sighash_flag: u32,
    ) -> Result<bool, InterpreterError>;

    fn lock_time(&self) -> u32;

    fn tx_version(&self) -> u32;

    fn input_sequence(&self, input_idx: usize) -> u32;
}
