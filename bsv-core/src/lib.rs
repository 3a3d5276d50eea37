#![deny(missing_docs)]

//! BSV transaction core.
//!
//! Re-exports the workspace crates so applications can depend on one crate:
//! primitives (hashes, keys, `BigNumber`), script (chunks, assembly, the
//! `Spend` interpreter), spv (Merkle paths, `ChainTracker`) and transaction
//! (codec, sighash, templates, fees, `verify`).

pub use bsv_core_primitives as primitives;
pub use bsv_core_script as script;
pub use bsv_core_spv as spv;
pub use bsv_core_transaction as transaction;

pub use bsv_core_primitives::bignum::BigNumber;
pub use bsv_core_primitives::chainhash::Hash;
pub use bsv_core_primitives::ec::{PrivateKey, PublicKey, Signature};
pub use bsv_core_script::interpreter::{ScriptFlags, Spend, SpendError, SpendParams};
pub use bsv_core_script::{LockingScript, Script, ScriptChunk, UnlockingScript};
pub use bsv_core_spv::{ChainTracker, MerklePath};
pub use bsv_core_transaction::template::{PushDrop, RPuzzle, P2PKH};
pub use bsv_core_transaction::{
    FeeModel, LiveFeePolicy, SatoshisPerKilobyte, ScriptTemplate, Transaction, TransactionInput,
    TransactionOutput, UnlockingScriptTemplate, VerifyOptions,
};
