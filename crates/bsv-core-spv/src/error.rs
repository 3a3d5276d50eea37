use bsv_core_primitives::chainhash::Hash;

/// Error types for Merkle path handling and chain tracking.
#[derive(Debug, thiserror::Error)]
pub enum SpvError {
    #[error("invalid merkle path: {0}")]
    InvalidMerklePath(String),
    #[error("txid {0} is not in the merkle path")]
    TxidNotInPath(Hash),
    #[error("merkle path has no hash for offset {offset} at height {height}")]
    MissingHash { height: usize, offset: u64 },
    #[error("chain tracker: {0}")]
    Tracker(String),
    #[error("primitives error: {0}")]
    Primitives(#[from] bsv_core_primitives::PrimitivesError),
    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}
