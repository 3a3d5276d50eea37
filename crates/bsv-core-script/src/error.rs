/// Error types for script construction and decoding.
///
/// Execution failures are reported separately by the interpreter through
/// `SpendError`; this enum covers everything that happens before a script runs.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// An assembly token is neither a known mnemonic nor valid hex data.
    #[error("invalid asm token: {0}")]
    InvalidAsmToken(String),

    /// Attempted to append a push opcode through `append_opcodes`.
    #[error("use append_push_data for push opcodes: {0}")]
    InvalidOpcodeType(String),

    /// A push opcode announces more bytes than the script holds.
    #[error("truncated push at offset {offset}: wanted {wanted} bytes, {remaining} remaining")]
    TruncatedPush {
        offset: usize,
        wanted: usize,
        remaining: usize,
    },

    /// Push data exceeds the 4-byte length prefix.
    #[error("push data too big: {0} bytes")]
    DataTooBig(usize),

    /// Hex decoding error.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The script does not have the shape the caller asked for.
    #[error("unexpected script form: expected {0}")]
    UnexpectedForm(&'static str),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address version byte is not mainnet or testnet P2PKH.
    #[error("unsupported address version {0:#04x}")]
    UnsupportedAddress(u8),

    /// Error from the primitives crate.
    #[error(transparent)]
    Primitives(#[from] bsv_core_primitives::PrimitivesError),
}
