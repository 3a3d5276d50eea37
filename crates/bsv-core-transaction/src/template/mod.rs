//! Script templates.
//!
//! A [`ScriptTemplate`] builds locking scripts of one shape and hands out
//! [`UnlockingScriptTemplate`]s able to satisfy them. Transactions hold
//! unlockers as trait objects, so signing and size estimation work without
//! knowing which template produced them.

pub mod p2pkh;
pub mod push_drop;
pub mod rpuzzle;

pub use p2pkh::{P2PKHUnlocker, P2PKH};
pub use push_drop::{LockPosition, PushDrop, PushDropFields, PushDropUnlocker};
pub use rpuzzle::{RPuzzle, RPuzzleType, RPuzzleUnlocker};

use bsv_core_primitives::ec::Signature;
use bsv_core_primitives::PrimitivesError;
use bsv_core_script::{LockingScript, UnlockingScript};

use crate::transaction::Transaction;
use crate::TransactionError;

/// Produces the unlocking script for one input.
///
/// Implementations must be shareable across threads, since transactions are
/// verified in parallel.
pub trait UnlockingScriptTemplate: Send + Sync {
    /// Produce an unlocking script for the given input.
    ///
    /// # Arguments
    /// * `tx` - The transaction being signed.
    /// * `input_index` - The index of the input to sign.
    ///
    /// # Returns
    /// `Ok(UnlockingScript)`, or an error when the input's source output is
    /// unknown or signing fails.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<UnlockingScript, TransactionError>;

    /// Upper estimate of the unlocking script's byte length, used for fee
    /// calculation before signing.
    fn estimate_length(&self, tx: &Transaction, input_index: usize) -> u32;
}

/// A family of locking scripts together with the unlocker that satisfies
/// them.
pub trait ScriptTemplate {
    type LockArgs;
    type UnlockArgs;
    type Unlocker: UnlockingScriptTemplate;

    fn lock(&self, args: Self::LockArgs) -> Result<LockingScript, TransactionError>;

    fn unlock(&self, args: Self::UnlockArgs) -> Self::Unlocker;
}

/// Sign input `input_index` of `tx` and return the DER signature followed by
/// the sighash byte.
pub(crate) fn signature_for_input(
    tx: &Transaction,
    input_index: usize,
    sighash_flag: u32,
    sign: impl FnOnce(&[u8; 32]) -> Result<Signature, PrimitivesError>,
) -> Result<Vec<u8>, TransactionError> {
    let digest = tx.calc_input_signature_hash(input_index, sighash_flag)?;
    let signature = sign(&digest)?;
    let mut sig = signature.to_der();
    sig.push(sighash_flag as u8);
    Ok(sig)
}
