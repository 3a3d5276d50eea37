use bsv_core_primitives::chainhash::Hash;
use bsv_core_script::interpreter::SpendError;

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction structure is invalid (e.g. missing inputs or outputs).
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    /// Binary or hex data does not describe a transaction.
    #[error("serialization error: {0}")]
    SerializationError(String),
    #[error("input index {index} out of range (tx has {count} inputs)")]
    InputIndexOutOfRange { index: usize, count: usize },
    /// Neither a source transaction nor an explicit source output is set.
    #[error("input {index} has no source output")]
    MissingSourceOutput { index: usize },
    /// The source transaction is not the one the outpoint names, or the
    /// explicit source output disagrees with it.
    #[error("input {index} source output does not match its outpoint")]
    SourceMismatch { index: usize },
    #[error("input {index} has neither an unlocking script nor a template")]
    MissingUnlockingScript { index: usize },
    /// A template could not produce an unlocking script.
    #[error("signing error: {0}")]
    SigningError(String),
    #[error("fee calculation error: {0}")]
    FeeError(String),
    #[error("fee rate source: {0}")]
    FeeRateSource(String),
    #[error("outputs total {outputs} satoshis but inputs only {inputs}")]
    OutputsExceedInputs { inputs: u64, outputs: u64 },
    #[error("fee of {paid} satoshis is below the required {required}")]
    InsufficientFee { paid: u64, required: u64 },
    /// An ancestor could not be traced back to a source transaction or a
    /// valid Merkle proof.
    #[error("input {index} of {txid} cannot be traced to a source transaction")]
    UnverifiableAncestry { txid: Hash, index: usize },
    /// A script evaluation failed.
    #[error(transparent)]
    Spend(#[from] SpendError),
    #[error("spv error: {0}")]
    Spv(#[from] bsv_core_spv::SpvError),
    /// An underlying script error (forwarded from `bsv-core-script`).
    #[error("script error: {0}")]
    Script(#[from] bsv_core_script::ScriptError),
    /// An underlying primitives error (forwarded from `bsv-core-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] bsv_core_primitives::PrimitivesError),
}
