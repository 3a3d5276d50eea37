//! secp256k1 private keys.

use k256::ecdsa::SigningKey;
use k256::Scalar;
use rand::rngs::OsRng;

use crate::base58;
use crate::ec::public_key::PublicKey;
use crate::ec::signature::Signature;
use crate::PrimitivesError;

const KEY_LEN: usize = 32;

/// WIF version byte for mainnet keys.
pub const MAINNET_WIF_PREFIX: u8 = 0x80;
/// WIF version byte for testnet keys.
pub const TESTNET_WIF_PREFIX: u8 = 0xef;

const COMPRESSED_FLAG: u8 = 0x01;

/// A secp256k1 signing key.
///
/// The scalar is held by k256's `SigningKey`, which zeroes it on drop.
#[derive(Clone, Debug)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// A fresh key from the operating system's RNG.
    pub fn new() -> Self {
        PrivateKey { inner: SigningKey::random(&mut OsRng) }
    }

    /// Parse a 32-byte big-endian scalar in `1..n`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != KEY_LEN {
            return Err(PrimitivesError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let inner = SigningKey::from_slice(bytes)
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Parse Wallet Import Format. Both the compressed (34-byte payload) and
    /// legacy uncompressed (33-byte payload) forms are accepted for either
    /// network prefix.
    pub fn from_wif(wif: &str) -> Result<Self, PrimitivesError> {
        let payload = base58::check_decode(wif).map_err(|e| match e {
            PrimitivesError::ChecksumMismatch => e,
            other => PrimitivesError::InvalidWif(other.to_string()),
        })?;
        let key = match payload.len() {
            33 => &payload[1..],
            34 if payload[33] == COMPRESSED_FLAG => &payload[1..33],
            34 => {
                return Err(PrimitivesError::InvalidWif(format!(
                    "unknown compression flag {:#04x}",
                    payload[33]
                )))
            }
            n => return Err(PrimitivesError::InvalidWif(format!("payload of {} bytes", n))),
        };
        if payload[0] != MAINNET_WIF_PREFIX && payload[0] != TESTNET_WIF_PREFIX {
            return Err(PrimitivesError::InvalidWif(format!(
                "unknown version byte {:#04x}",
                payload[0]
            )));
        }
        Self::from_bytes(key)
    }

    /// Mainnet WIF, compressed form.
    pub fn to_wif(&self) -> String {
        self.to_wif_prefix(MAINNET_WIF_PREFIX)
    }

    /// WIF with an explicit version byte, compressed form.
    pub fn to_wif_prefix(&self, prefix: u8) -> String {
        let mut payload = Vec::with_capacity(KEY_LEN + 2);
        payload.push(prefix);
        payload.extend_from_slice(&self.to_bytes());
        payload.push(COMPRESSED_FLAG);
        base58::check_encode(&payload)
    }

    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.inner.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn pub_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key().clone())
    }

    /// Sign a 32-byte digest with an RFC 6979 nonce; the result is low-S.
    pub fn sign(&self, hash: &[u8; 32]) -> Result<Signature, PrimitivesError> {
        Signature::sign(hash, self)
    }

    /// Sign with a caller-chosen nonce. See [`Signature::sign_with_k`].
    pub fn sign_with_k(&self, hash: &[u8; 32], k: &[u8; 32]) -> Result<Signature, PrimitivesError> {
        Signature::sign_with_k(hash, self, k)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }

    pub(crate) fn to_scalar(&self) -> Scalar {
        *self.inner.as_nonzero_scalar().as_ref()
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PrivateKey {}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> PrivateKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        PrivateKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_wif_vectors_for_key_one() {
        let key = key_one();
        assert_eq!(key.to_wif(), "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn");
        assert_eq!(
            PrivateKey::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn").unwrap(),
            key
        );
        assert_eq!(
            PrivateKey::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf").unwrap(),
            key
        );
    }

    #[test]
    fn test_rejects_out_of_range_scalars() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
        assert!(PrivateKey::from_bytes(&[0xffu8; 32]).is_err());
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PrivateKey::from_hex("").is_err());
    }

    #[test]
    fn test_rejects_corrupted_wif() {
        assert!(PrivateKey::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWo").is_err());
        assert!(PrivateKey::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoW").is_err());
    }

    #[test]
    fn test_hex_and_bytes_round_trip() {
        let key = PrivateKey::new();
        assert_eq!(PrivateKey::from_hex(&key.to_hex()).unwrap(), key);
        assert_eq!(PrivateKey::from_bytes(&key.to_bytes()).unwrap(), key);
        assert_eq!(PrivateKey::from_wif(&key.to_wif_prefix(TESTNET_WIF_PREFIX)).unwrap(), key);
    }
}
