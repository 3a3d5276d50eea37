//! Block header oracle used to anchor Merkle roots.

use std::future::Future;

use bsv_core_primitives::chainhash::Hash;

use crate::error::SpvError;

/// Source of truth for block Merkle roots.
///
/// Implementations usually query a header service, so both calls are
/// asynchronous. Transport failures come back as `Err`; an unknown or
/// mismatched root is `Ok(false)`.
pub trait ChainTracker {
    /// Whether `root` is the Merkle root of the block at `height`.
    fn is_valid_root_for_height(
        &self,
        root: &Hash,
        height: u32,
    ) -> impl Future<Output = Result<bool, SpvError>> + Send;

    /// Height of the current chain tip.
    fn current_height(&self) -> impl Future<Output = Result<u32, SpvError>> + Send;
}
