//! secp256k1 public keys in SEC1 form.

use std::fmt;

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::ec::signature::Signature;
use crate::hash::hash160;
use crate::PrimitivesError;

/// Compressed SEC1 length.
pub const COMPRESSED_LEN: usize = 33;
/// Uncompressed SEC1 length.
pub const UNCOMPRESSED_LEN: usize = 65;

/// A point on secp256k1 usable for signature verification.
#[derive(Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parse compressed (`02`/`03`) or uncompressed (`04`) SEC1 bytes.
    /// Hybrid encodings and points off the curve are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        match (bytes.first(), bytes.len()) {
            (Some(0x02 | 0x03), COMPRESSED_LEN) | (Some(0x04), UNCOMPRESSED_LEN) => {}
            _ => {
                return Err(PrimitivesError::InvalidPublicKey(format!(
                    "unsupported encoding of {} bytes",
                    bytes.len()
                )))
            }
        }
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    pub(crate) fn from_verifying_key(inner: VerifyingKey) -> Self {
        PublicKey { inner }
    }

    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(self.inner.to_encoded_point(true).as_bytes());
        out
    }

    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_LEN] {
        let mut out = [0u8; UNCOMPRESSED_LEN];
        out.copy_from_slice(self.inner.to_encoded_point(false).as_bytes());
        out
    }

    /// Hex of the compressed encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// HASH160 of the compressed encoding, as committed to by P2PKH.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_compressed())
    }

    pub fn verify(&self, hash: &[u8; 32], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
