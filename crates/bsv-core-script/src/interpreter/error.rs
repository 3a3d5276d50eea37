//! Interpreter error types.
//!
//! Opcode implementations fail with [`InterpreterError`]. The `Spend` driver
//! wraps that into a [`SpendError`] carrying a snapshot of the evaluation
//! state at the point of failure.

use std::fmt;

use bsv_core_primitives::chainhash::Hash;
use bsv_core_primitives::PrimitivesError;

/// Error codes for the script interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterErrorCode {
    Internal,
    InvalidParams,
    EarlyReturn,
    EmptyStack,
    EvalFalse,
    ScriptTooBig,
    ElementTooBig,
    TooManyOperations,
    StackOverflow,
    MemoryLimitExceeded,
    InvalidPubKeyCount,
    InvalidSignatureCount,
    NumberTooBig,
    NumberTooSmall,
    DivideByZero,
    Verify,
    EqualVerify,
    NumEqualVerify,
    CheckSigVerify,
    CheckMultiSigVerify,
    DisabledOpcode,
    ReservedOpcode,
    MalformedPush,
    InvalidStackOperation,
    UnbalancedConditional,
    InvalidInputLength,
    MinimalData,
    MinimalIf,
    InvalidSigHashType,
    SigTooShort,
    SigTooLong,
    SigInvalidSeqID,
    SigInvalidDataLen,
    SigMissingSTypeID,
    SigMissingSLen,
    SigInvalidSLen,
    SigInvalidRIntID,
    SigZeroRLen,
    SigNegativeR,
    SigTooMuchRPadding,
    SigInvalidSIntID,
    SigZeroSLen,
    SigNegativeS,
    SigTooMuchSPadding,
    SigHighS,
    NotPushOnly,
    SigNullDummy,
    PubKeyType,
    CleanStack,
    NullFail,
    DiscourageUpgradableNOPs,
    NegativeLockTime,
    UnsatisfiedLockTime,
    IllegalForkID,
}

impl fmt::Display for InterpreterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A failed opcode: an error code and a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {description}")]
pub struct InterpreterError {
    pub code: InterpreterErrorCode,
    pub description: String,
}

impl InterpreterError {
    pub fn new(code: InterpreterErrorCode, description: impl Into<String>) -> Self {
        InterpreterError {
            code,
            description: description.into(),
        }
    }
}

impl From<PrimitivesError> for InterpreterError {
    /// Script-number decoding failures map onto their interpreter codes.
    fn from(err: PrimitivesError) -> Self {
        let code = match err {
            PrimitivesError::ScriptNumTooLong { .. } => InterpreterErrorCode::NumberTooBig,
            PrimitivesError::ScriptNumNotMinimal => InterpreterErrorCode::MinimalData,
            _ => InterpreterErrorCode::Internal,
        };
        InterpreterError::new(code, err.to_string())
    }
}

/// Which of the two scripts was executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    UnlockingScript,
    LockingScript,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::UnlockingScript => f.write_str("unlocking script"),
            ExecutionContext::LockingScript => f.write_str("locking script"),
        }
    }
}

/// A failed spend, with the evaluation state captured when it failed.
///
/// The snapshot is for diagnostics. Evaluating the same inputs again yields
/// an identical value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "spend of {source_txid}:{source_output_index} failed in {context} at {program_counter}: {code}: {message}"
)]
pub struct SpendError {
    pub code: InterpreterErrorCode,
    pub message: String,
    pub source_txid: Hash,
    pub source_output_index: u32,
    pub context: ExecutionContext,
    pub program_counter: usize,
    /// Main stack, bottom first.
    pub stack: Vec<Vec<u8>>,
    pub alt_stack: Vec<Vec<u8>>,
    /// One entry per open conditional; `true` when that branch is taken.
    pub if_stack: Vec<bool>,
    pub stack_mem: usize,
    pub alt_stack_mem: usize,
}

impl SpendError {
    pub fn is_code(&self, code: InterpreterErrorCode) -> bool {
        self.code == code
    }
}
