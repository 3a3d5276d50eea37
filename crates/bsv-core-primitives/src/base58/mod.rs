//! Base58 and Base58Check with the Bitcoin alphabet.
//!
//! Base58Check appends the first four bytes of HASH256 over the payload; WIF
//! keys and P2PKH addresses use it.

use crate::hash::sha256d;
use crate::PrimitivesError;

const CHECKSUM_LEN: usize = 4;

pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).with_alphabet(bs58::Alphabet::BITCOIN).into_string()
}

pub fn decode(s: &str) -> Result<Vec<u8>, PrimitivesError> {
    bs58::decode(s)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| PrimitivesError::InvalidBase58(e.to_string()))
}

/// Encode `payload` followed by its checksum.
pub fn check_encode(payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&sha256d(payload)[..CHECKSUM_LEN]);
    encode(&buf)
}

/// Decode and strip the checksum, failing with `ChecksumMismatch` when it
/// does not cover the payload.
pub fn check_decode(s: &str) -> Result<Vec<u8>, PrimitivesError> {
    let mut decoded = decode(s)?;
    if decoded.len() < CHECKSUM_LEN {
        return Err(PrimitivesError::InvalidBase58(format!(
            "{} bytes is too short to carry a checksum",
            decoded.len()
        )));
    }
    let checksum = decoded.split_off(decoded.len() - CHECKSUM_LEN);
    if checksum[..] != sha256d(&decoded)[..CHECKSUM_LEN] {
        return Err(PrimitivesError::ChecksumMismatch);
    }
    Ok(decoded)
}
