//! The 32-byte digest type used for transaction ids and Merkle nodes.
//!
//! Bytes are held in internal order (as produced by the hash function).
//! Display and hex parsing use the reversed order that block explorers
//! show; comparisons always use the internal bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Size of a `Hash` in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte digest in internal byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Wrap raw bytes already in internal order.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Build from a slice in internal order; the slice must be 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Hash(arr))
    }

    /// Parse the display form: 64 hex characters, byte-reversed.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.len() != HASH_SIZE * 2 {
            return Err(PrimitivesError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                HASH_SIZE * 2,
                hex_str.len()
            )));
        }
        let mut bytes = hex::decode(hex_str)?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// HASH256 of `data`.
    pub fn hash256(data: &[u8]) -> Self {
        Hash(sha256d(data))
    }

    /// The internal bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// The bytes in display order.
    pub fn to_reversed_bytes(&self) -> [u8; HASH_SIZE] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_reversed_bytes()))
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_DISPLAY: &str =
        "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    #[test]
    fn test_display_reverses_internal_bytes() {
        let hash = Hash::from_hex(GENESIS_DISPLAY).unwrap();
        assert_eq!(hash.as_bytes()[0], 0x6f);
        assert_eq!(hash.as_bytes()[31], 0x00);
        assert_eq!(hash.to_string(), GENESIS_DISPLAY);
        assert_eq!(hex::encode(hash.to_reversed_bytes()), GENESIS_DISPLAY);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length_and_bad_chars() {
        assert!(Hash::from_hex("19d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f").is_err());
        assert!(Hash::from_hex("").is_err());
        let bad = format!("{}g", &GENESIS_DISPLAY[..63]);
        assert!(Hash::from_hex(&bad).is_err());
    }

    #[test]
    fn test_from_bytes_length() {
        assert!(Hash::from_bytes(&[0u8; 31]).is_err());
        assert!(Hash::from_bytes(&[0u8; 33]).is_err());
        assert_eq!(Hash::from_bytes(&[7u8; 32]).unwrap(), Hash::new([7u8; 32]));
    }

    #[test]
    fn test_hash256_of_empty_input() {
        let h = Hash::hash256(b"");
        assert_eq!(
            hex::encode(h.as_bytes()),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_json_uses_display_form() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            txid: Hash,
        }
        let w = Wrapper { txid: Hash::from_hex(GENESIS_DISPLAY).unwrap() };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, format!(r#"{{"txid":"{}"}}"#, GENESIS_DISPLAY));
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.txid, w.txid);
    }
}
