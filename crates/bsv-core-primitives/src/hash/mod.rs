//! Hash functions used by scripts, transaction ids and Merkle proofs.
//!
//! Each function maps directly onto one script opcode: `OP_SHA1`,
//! `OP_SHA256`, `OP_RIPEMD160`, `OP_HASH160` and `OP_HASH256`.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

fn digest<D: Digest, const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&D::digest(data));
    out
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    digest::<Sha256, 32>(data)
}

/// SHA-1 of `data`. Only reachable from scripts through `OP_SHA1`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    digest::<Sha1, 20>(data)
}

/// RIPEMD-160 of `data`.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    digest::<Ripemd160, 20>(data)
}

/// HASH256: SHA-256 applied twice.
///
/// Transaction ids, sighash digests, block headers and Merkle nodes all use
/// this construction.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// HASH160: RIPEMD-160 of the SHA-256 digest, the public key hash in P2PKH.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_INPUT: &[u8] = b"this is the data I want to hash";

    fn hex_of(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    #[test]
    fn test_sha256_vectors() {
        assert_eq!(
            hex_of(&sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex_of(&sha256(LONG_INPUT)),
            "f88eec7ecabf88f9a64c4100cac1e0c0c4581100492137d1b656ea626cad63e3"
        );
    }

    #[test]
    fn test_sha1_vectors() {
        assert_eq!(hex_of(&sha1(b"")), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(hex_of(&sha1(b"abc")), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_ripemd160_vectors() {
        assert_eq!(hex_of(&ripemd160(b"")), "9c1185a5c5e9fc54612808977ee8f548b2258d31");
        assert_eq!(
            hex_of(&ripemd160(b"I am a test")),
            "09a23f506b4a37cabab8a9e49b541de582fca96b"
        );
    }

    #[test]
    fn test_double_sha256_vectors() {
        assert_eq!(
            hex_of(&sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
        assert_eq!(
            hex_of(&sha256d(LONG_INPUT)),
            "2209ddda5914a3fbad507ff2284c4b6e559c18a669f9fc3ad3b5826a2a999d58"
        );
    }

    #[test]
    fn test_hash160_vectors() {
        assert_eq!(hex_of(&hash160(b"")), "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb");
        assert_eq!(hex_of(&hash160(LONG_INPUT)), "e7fb13ef86fef4203f042fbfc2703fa628301e90");
    }

    #[test]
    fn test_hash160_is_ripemd_of_sha256() {
        let data = b"composition";
        assert_eq!(hash160(data), ripemd160(&sha256(data)));
    }
}
