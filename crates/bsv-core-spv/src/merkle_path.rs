//! Merkle paths in the BRC-74 (BUMP) format.
//!
//! A path stores, per tree level, the nodes needed to climb from one or more
//! transactions to the block's Merkle root. Level 0 holds leaves (txids and
//! their siblings); higher levels hold only the siblings that cannot be
//! derived from the level below.

use std::collections::HashMap;

use bsv_core_primitives::chainhash::Hash;
use bsv_core_primitives::util::{BsvReader, BsvWriter, VarInt};
use serde::{Deserialize, Serialize};

use crate::chain_tracker::ChainTracker;
use crate::error::SpvError;
use crate::merkle_tree_parent::merkle_tree_parent;

const FLAG_DUPLICATE: u8 = 0x01;
const FLAG_TXID: u8 = 0x02;

/// Smallest valid encoding: height, tree height, one level with one leaf.
const MIN_ENCODED_LEN: usize = 37;

/// One node of a Merkle path level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    /// Position of the node within its level.
    pub offset: u64,
    /// Node hash; absent when `duplicate` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    /// Set on leaves that are transactions this path proves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<bool>,
    /// The node pairs with itself (last node of an odd-sized level).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl PathElement {
    pub fn leaf(offset: u64, hash: Hash) -> Self {
        PathElement { offset, hash: Some(hash), txid: None, duplicate: None }
    }

    fn is_duplicate(&self) -> bool {
        self.duplicate == Some(true)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_duplicate() {
            flags |= FLAG_DUPLICATE;
        }
        if self.txid == Some(true) {
            flags |= FLAG_TXID;
        }
        flags
    }
}

/// Inclusion proof tying one or more transactions to a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerklePath {
    pub block_height: u32,
    /// Levels from the leaves (index 0) up to just below the root.
    pub path: Vec<Vec<PathElement>>,
}

/// Per-level offset lookup that can derive missing nodes from their
/// children.
struct LevelIndex(Vec<HashMap<u64, PathElement>>);

impl LevelIndex {
    fn new(levels: &[Vec<PathElement>]) -> Self {
        LevelIndex(
            levels
                .iter()
                .map(|level| level.iter().map(|e| (e.offset, e.clone())).collect())
                .collect(),
        )
    }

    fn node(&self, height: usize, offset: u64) -> Option<PathElement> {
        if let Some(elem) = self.0.get(height)?.get(&offset) {
            return Some(elem.clone());
        }
        if height == 0 {
            return None;
        }
        let left_offset = offset.checked_mul(2)?;
        let left = self.node(height - 1, left_offset)?;
        let right = self.node(height - 1, left_offset.checked_add(1)?)?;
        let left_hash = left.hash?;
        let parent = if right.is_duplicate() {
            merkle_tree_parent(&left_hash, &left_hash)
        } else {
            merkle_tree_parent(&left_hash, &right.hash?)
        };
        Some(PathElement::leaf(offset, parent))
    }
}

impl MerklePath {
    pub fn new(block_height: u32, path: Vec<Vec<PathElement>>) -> Self {
        MerklePath { block_height, path }
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SpvError> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Parse the BRC-74 binary form.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        if data.len() < MIN_ENCODED_LEN {
            return Err(SpvError::InvalidMerklePath(format!(
                "{} bytes is too short for a merkle path",
                data.len()
            )));
        }
        let mut reader = BsvReader::new(data);
        let path = Self::from_reader(&mut reader)?;
        if !reader.is_empty() {
            return Err(SpvError::InvalidMerklePath(format!(
                "{} trailing bytes after merkle path",
                reader.remaining()
            )));
        }
        Ok(path)
    }

    /// Read one path from `reader`, leaving any following data unread.
    pub fn from_reader(reader: &mut BsvReader) -> Result<Self, SpvError> {
        let malformed = |what: &str, e: bsv_core_primitives::PrimitivesError| {
            SpvError::InvalidMerklePath(format!("reading {}: {}", what, e))
        };

        let block_height = reader.read_varint().map_err(|e| malformed("block height", e))?.value();
        let block_height = u32::try_from(block_height).map_err(|_| {
            SpvError::InvalidMerklePath(format!("block height {} out of range", block_height))
        })?;
        let tree_height = reader.read_u8().map_err(|e| malformed("tree height", e))?;

        let mut path = Vec::with_capacity(tree_height as usize);
        for _ in 0..tree_height {
            let count = reader.read_varint().map_err(|e| malformed("leaf count", e))?.value();
            let mut level = Vec::new();
            for _ in 0..count {
                let offset = reader.read_varint().map_err(|e| malformed("offset", e))?.value();
                let flags = reader.read_u8().map_err(|e| malformed("flags", e))?;
                let mut elem = PathElement { offset, hash: None, txid: None, duplicate: None };
                if flags & FLAG_DUPLICATE != 0 {
                    elem.duplicate = Some(true);
                } else {
                    let bytes = reader.read_bytes(32).map_err(|e| malformed("hash", e))?;
                    elem.hash = Some(Hash::from_bytes(bytes)?);
                }
                if flags & FLAG_TXID != 0 {
                    elem.txid = Some(true);
                }
                level.push(elem);
            }
            level.sort_by_key(|e| e.offset);
            path.push(level);
        }

        Ok(MerklePath { block_height, path })
    }

    /// Serialize to the BRC-74 binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        writer.write_varint(VarInt(self.block_height as u64));
        writer.write_u8(self.path.len() as u8);
        for level in &self.path {
            writer.write_varint(VarInt(level.len() as u64));
            for elem in level {
                writer.write_varint(VarInt(elem.offset));
                writer.write_u8(elem.flags());
                if !elem.is_duplicate() {
                    if let Some(hash) = &elem.hash {
                        writer.write_bytes(hash.as_bytes());
                    }
                }
            }
        }
        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Recompute the block Merkle root from the leaf `txid`, or from the
    /// first hashed leaf when `txid` is `None`.
    ///
    /// A path with a single leaf describes a one-transaction block whose root
    /// is that transaction's id.
    pub fn compute_root(&self, txid: Option<&Hash>) -> Result<Hash, SpvError> {
        let leaves = self
            .path
            .first()
            .ok_or_else(|| SpvError::InvalidMerklePath("path has no levels".to_string()))?;
        let txid = match txid {
            Some(t) => *t,
            None => leaves.iter().find_map(|l| l.hash).ok_or_else(|| {
                SpvError::InvalidMerklePath("no hash found at level 0".to_string())
            })?,
        };

        let leaf = leaves
            .iter()
            .find(|l| l.hash == Some(txid))
            .ok_or(SpvError::TxidNotInPath(txid))?;

        if self.path.len() == 1 && leaves.len() == 1 {
            return Ok(txid);
        }

        let index = LevelIndex::new(&self.path);
        let mut working = txid;
        for height in 0..self.path.len() {
            let offset = (leaf.offset >> height) ^ 1;
            let sibling = index
                .node(height, offset)
                .ok_or(SpvError::MissingHash { height, offset })?;
            working = if sibling.is_duplicate() {
                merkle_tree_parent(&working, &working)
            } else {
                let hash = sibling.hash.ok_or(SpvError::MissingHash { height, offset })?;
                if offset % 2 == 1 {
                    merkle_tree_parent(&working, &hash)
                } else {
                    merkle_tree_parent(&hash, &working)
                }
            };
        }
        Ok(working)
    }

    /// [`compute_root`](Self::compute_root) with display-order hex in and out.
    pub fn compute_root_hex(&self, txid: Option<&str>) -> Result<String, SpvError> {
        let txid = txid.map(Hash::from_hex).transpose()?;
        Ok(self.compute_root(txid.as_ref())?.to_string())
    }

    /// Check that `txid` is included in the block at `block_height`.
    ///
    /// A txid missing from the path, or a path too sparse to reach the root,
    /// is `Ok(false)`. Errors from the tracker propagate.
    pub async fn verify<T: ChainTracker>(&self, txid: &Hash, tracker: &T) -> Result<bool, SpvError> {
        let root = match self.compute_root(Some(txid)) {
            Ok(root) => root,
            Err(e) => {
                log::debug!("merkle path for {} does not compute: {}", txid, e);
                return Ok(false);
            }
        };
        let valid = tracker.is_valid_root_for_height(&root, self.block_height).await?;
        log::debug!(
            "merkle root {} for {} at height {}: {}",
            root,
            txid,
            self.block_height,
            if valid { "valid" } else { "rejected" }
        );
        Ok(valid)
    }

    /// Merge the nodes of `other` into this path. Both must prove inclusion
    /// in the same block.
    pub fn combine(&mut self, other: &MerklePath) -> Result<(), SpvError> {
        if self.block_height != other.block_height {
            return Err(SpvError::InvalidMerklePath(format!(
                "cannot combine paths at heights {} and {}",
                self.block_height, other.block_height
            )));
        }
        let root = self.compute_root(None)?;
        let other_root = other.compute_root(None)?;
        if root != other_root {
            return Err(SpvError::InvalidMerklePath(format!(
                "cannot combine paths with roots {} and {}",
                root, other_root
            )));
        }

        let height = self.path.len().max(other.path.len());
        let mut merged: Vec<HashMap<u64, PathElement>> = vec![HashMap::new(); height];
        for source in [&self.path, &other.path] {
            for (h, level) in source.iter().enumerate() {
                for elem in level {
                    merged[h].insert(elem.offset, elem.clone());
                }
            }
        }

        // nodes derivable from both children are dropped
        let mut path = Vec::with_capacity(height);
        for h in 0..height {
            let mut level = Vec::with_capacity(merged[h].len());
            for elem in merged[h].values() {
                if h > 0 {
                    let left = elem.offset.checked_mul(2).ok_or_else(|| {
                        SpvError::InvalidMerklePath(format!(
                            "offset {} at height {} has no children",
                            elem.offset, h
                        ))
                    })?;
                    if merged[h - 1].contains_key(&left) && merged[h - 1].contains_key(&(left + 1)) {
                        continue;
                    }
                }
                level.push(elem.clone());
            }
            level.sort_by_key(|e: &PathElement| e.offset);
            path.push(level);
        }
        self.path = path;
        Ok(())
    }

    pub fn find_leaf_by_offset(&self, level: usize, offset: u64) -> Option<&PathElement> {
        self.path.get(level)?.iter().find(|l| l.offset == offset)
    }

    /// Add a node at `level`, growing the path as needed.
    pub fn add_leaf(&mut self, level: usize, element: PathElement) {
        if self.path.len() <= level {
            self.path.resize_with(level + 1, Vec::new);
        }
        self.path[level].push(element);
    }

    /// Fill in every parent whose two children are known, level by level.
    pub fn compute_missing_hashes(&mut self) {
        for level in 1..self.path.len() {
            let (below, above) = self.path.split_at_mut(level);
            let children = &below[level - 1];
            let parents = &mut above[0];

            let mut derived = Vec::new();
            for left in children.iter().filter(|e| e.offset % 2 == 0) {
                let Some(left_hash) = left.hash else {
                    continue;
                };
                let parent_offset = left.offset / 2;
                if parents.iter().any(|p| p.offset == parent_offset) {
                    continue;
                }
                let Some(right) = children.iter().find(|e| e.offset == left.offset + 1) else {
                    continue;
                };
                let parent = if right.is_duplicate() {
                    merkle_tree_parent(&left_hash, &left_hash)
                } else if let Some(right_hash) = right.hash {
                    merkle_tree_parent(&left_hash, &right_hash)
                } else {
                    continue;
                };
                derived.push(PathElement::leaf(parent_offset, parent));
            }
            parents.extend(derived);
            parents.sort_by_key(|e| e.offset);
        }
    }
}
