//! Merkle tree node hashing.

use bsv_core_primitives::chainhash::Hash;
use bsv_core_primitives::hash::sha256d;

use crate::error::SpvError;

/// HASH256 of the two children concatenated in internal byte order.
pub fn merkle_tree_parent(left: &Hash, right: &Hash) -> Hash {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    Hash::new(sha256d(&buf))
}

/// [`merkle_tree_parent`] over display-order hex strings, as shown by block
/// explorers.
pub fn merkle_tree_parent_str(left: &str, right: &str) -> Result<String, SpvError> {
    let left = Hash::from_hex(left)?;
    let right = Hash::from_hex(right)?;
    Ok(merkle_tree_parent(&left, &right).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT: &str = "d6c79a6ef05572f0cb8e9a450c561fc40b0a8a7d48faad95e20d93ddeb08c231";
    const RIGHT: &str = "b1ed931b79056438b990d8981ba46fae97e5574b142445a74a44b978af284f98";
    const PARENT: &str = "b0d537b3ee52e472507f453df3d69561720346118a5a8c4d85ca0de73bc792be";

    #[test]
    fn test_parent_of_display_hex() {
        assert_eq!(merkle_tree_parent_str(LEFT, RIGHT).unwrap(), PARENT);
    }

    #[test]
    fn test_parent_of_hashes() {
        let left = Hash::from_hex(LEFT).unwrap();
        let right = Hash::from_hex(RIGHT).unwrap();
        assert_eq!(merkle_tree_parent(&left, &right), Hash::from_hex(PARENT).unwrap());
        assert_ne!(merkle_tree_parent(&right, &left), Hash::from_hex(PARENT).unwrap());
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(merkle_tree_parent_str("zz", RIGHT).is_err());
    }
}
