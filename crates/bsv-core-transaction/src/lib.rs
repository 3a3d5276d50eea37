//! Transactions for the BSV transaction core.
//!
//! Standard and extended wire formats, legacy and FORKID signature hashes,
//! script templates, fee models and SPV verification of a transaction
//! together with its unconfirmed ancestry.

pub mod context;
pub mod fee_model;
pub mod input;
pub mod output;
pub mod sighash;
pub mod template;
pub mod transaction;
pub mod verify;

mod error;
pub use context::TransactionContext;
pub use error::TransactionError;
pub use fee_model::{FeeModel, FeeRateCache, FeeRateSource, LiveFeePolicy, SatoshisPerKilobyte};
pub use input::{SourceOutput, TransactionInput};
pub use output::TransactionOutput;
pub use template::{ScriptTemplate, UnlockingScriptTemplate};
pub use transaction::Transaction;
pub use verify::VerifyOptions;
