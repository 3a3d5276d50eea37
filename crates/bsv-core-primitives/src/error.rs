/// Error type shared by the hashing, encoding, number and key primitives.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("script number of {len} bytes exceeds the {max} byte limit")]
    ScriptNumTooLong { len: usize, max: usize },

    #[error("script number is not minimally encoded")]
    ScriptNumNotMinimal,

    #[error("unexpected end of data: wanted {wanted} bytes, {remaining} remaining")]
    UnexpectedEof { wanted: usize, remaining: usize },
}

impl From<hex::FromHexError> for PrimitivesError {
    fn from(e: hex::FromHexError) -> Self {
        PrimitivesError::InvalidHex(e.to_string())
    }
}

impl From<k256::ecdsa::Error> for PrimitivesError {
    fn from(e: k256::ecdsa::Error) -> Self {
        PrimitivesError::InvalidSignature(e.to_string())
    }
}
