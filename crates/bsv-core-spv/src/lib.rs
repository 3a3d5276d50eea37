//! Merkle inclusion proofs for the BSV transaction core.
//!
//! `MerklePath` implements the BRC-74 binary format and recomputes block
//! Merkle roots. Roots are checked against an injected `ChainTracker`.

pub mod chain_tracker;
pub mod error;
pub mod merkle_path;
pub mod merkle_tree_parent;

pub use chain_tracker::ChainTracker;
pub use error::SpvError;
pub use merkle_path::{MerklePath, PathElement};
pub use merkle_tree_parent::{merkle_tree_parent, merkle_tree_parent_str};
