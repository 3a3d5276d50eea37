//! ECDSA signatures over secp256k1.
//!
//! `r` and `s` are held as 32-byte big-endian values. DER parsing here is
//! structural only; the script interpreter applies the stricter BIP66
//! checks itself when its flags ask for them.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::Signature as EcdsaSignature;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::scalar::IsHigh;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, Scalar, U256};

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

const SEQUENCE_TAG: u8 = 0x30;
const INTEGER_TAG: u8 = 0x02;

/// An ECDSA signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Signature { r, s }
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Parse `30 len 02 rlen r 02 slen s`.
    ///
    /// Integers may carry leading zero padding; trailing bytes beyond the
    /// declared sequence length are ignored. `r` and `s` must be in `1..n`.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let malformed = |why: &str| PrimitivesError::InvalidSignature(format!("malformed DER: {}", why));

        if bytes.len() < 8 || bytes[0] != SEQUENCE_TAG {
            return Err(malformed("missing sequence header"));
        }
        let body_len = bytes[1] as usize;
        let body = bytes.get(2..2 + body_len).ok_or_else(|| malformed("sequence length"))?;

        let (r, rest) = read_der_integer(body).ok_or_else(|| malformed("R integer"))?;
        let (s, _) = read_der_integer(rest).ok_or_else(|| malformed("S integer"))?;

        let sig = Signature { r: left_pad(r)?, s: left_pad(s)? };
        sig.scalars()?;
        Ok(sig)
    }

    /// DER encoding with minimal integers.
    pub fn to_der(&self) -> Vec<u8> {
        let r = der_integer(&self.r);
        let s = der_integer(&self.s);
        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(SEQUENCE_TAG);
        out.push((4 + r.len() + s.len()) as u8);
        for int in [r, s] {
            out.push(INTEGER_TAG);
            out.push(int.len() as u8);
            out.extend_from_slice(&int);
        }
        out
    }

    /// Deterministic (RFC 6979) signature over a 32-byte digest, low-S.
    pub fn sign(hash: &[u8; 32], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        let sig: EcdsaSignature = priv_key.signing_key().sign_prehash(hash)?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(Self::from_ecdsa(&sig))
    }

    /// Sign with an explicit nonce `k`.
    ///
    /// `r` is the x coordinate of `k*G` reduced mod n, so every signature made
    /// with the same `k` shares the same `r`. R-puzzle scripts commit to that
    /// value. Reusing `k` across different digests reveals the private key.
    pub fn sign_with_k(
        hash: &[u8; 32],
        priv_key: &PrivateKey,
        k: &[u8; 32],
    ) -> Result<Self, PrimitivesError> {
        let k = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*k));
        if k == Scalar::ZERO {
            return Err(PrimitivesError::InvalidSignature("nonce is zero".into()));
        }
        let big_r = (ProjectivePoint::GENERATOR * k).to_affine();
        let r = <Scalar as Reduce<U256>>::reduce_bytes(&big_r.x());
        if r == Scalar::ZERO {
            return Err(PrimitivesError::InvalidSignature("nonce produced r = 0".into()));
        }
        let z = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*hash));
        let k_inv = Option::<Scalar>::from(k.invert())
            .ok_or_else(|| PrimitivesError::InvalidSignature("nonce has no inverse".into()))?;

        let mut s = k_inv * (z + r * priv_key.to_scalar());
        if s == Scalar::ZERO {
            return Err(PrimitivesError::InvalidSignature("nonce produced s = 0".into()));
        }
        if bool::from(s.is_high()) {
            s = -s;
        }
        Ok(Signature { r: r.to_bytes().into(), s: s.to_bytes().into() })
    }

    /// Verify against a 32-byte digest. High-S signatures verify too; only
    /// the script interpreter's `LOW_S` rule rejects them.
    pub fn verify(&self, hash: &[u8; 32], pub_key: &PublicKey) -> bool {
        let sig = match EcdsaSignature::from_scalars(
            FieldBytes::from(self.r),
            FieldBytes::from(self.s),
        ) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let sig = sig.normalize_s().unwrap_or(sig);
        pub_key.verifying_key().verify_prehash(hash, &sig).is_ok()
    }

    /// Whether `s <= n/2`.
    pub fn is_low_s(&self) -> bool {
        match Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(self.s))) {
            Some(s) => !bool::from(s.is_high()),
            None => false,
        }
    }

    fn from_ecdsa(sig: &EcdsaSignature) -> Self {
        let (r, s) = sig.split_bytes();
        Signature { r: r.into(), s: s.into() }
    }

    fn scalars(&self) -> Result<(Scalar, Scalar), PrimitivesError> {
        let to_scalar = |bytes: &[u8; 32], name: &str| {
            Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*bytes)))
                .filter(|v| *v != Scalar::ZERO)
                .ok_or_else(|| {
                    PrimitivesError::InvalidSignature(format!("{} is zero or not below the curve order", name))
                })
        };
        Ok((to_scalar(&self.r, "R")?, to_scalar(&self.s, "S")?))
    }
}

fn read_der_integer(data: &[u8]) -> Option<(&[u8], &[u8])> {
    if data.len() < 2 || data[0] != INTEGER_TAG {
        return None;
    }
    let len = data[1] as usize;
    if len == 0 {
        return None;
    }
    let value = data.get(2..2 + len)?;
    Some((value, &data[2 + len..]))
}

fn left_pad(int: &[u8]) -> Result<[u8; 32], PrimitivesError> {
    let first_nonzero = int.iter().position(|b| *b != 0).unwrap_or(int.len());
    let trimmed = &int[first_nonzero..];
    if trimmed.len() > 32 {
        return Err(PrimitivesError::InvalidSignature("integer wider than 32 bytes".into()));
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

fn der_integer(value: &[u8; 32]) -> Vec<u8> {
    let start = value.iter().position(|b| *b != 0).unwrap_or(31);
    let trimmed = &value[start..];
    let mut out = Vec::with_capacity(33);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    fn key(hex_str: &str) -> PrivateKey {
        PrivateKey::from_hex(hex_str).unwrap()
    }

    #[test]
    fn test_rfc6979_vectors() {
        let vectors = [
            (
                "cca9fbcc1b41e5a95d369eaa6ddcff73b61a4efaa279cfc6567e8daa39cbaf50",
                "sample",
                "3045022100af340daf02cc15c8d5d08d7735dfe6b98a474ed373bdb5fbecf7571be52b384202205009fb27f37034a9b24b707b7c6b79ca23ddef9e25f7282e8a797efe53a8f124",
            ),
            (
                "0000000000000000000000000000000000000000000000000000000000000001",
                "Satoshi Nakamoto",
                "3045022100934b1ea10a4b3c1757e2b0c017d0b6143ce3c9a7e6a4a49860d7a6ab210ee3d802202442ce9d2b916064108014783e923ec36b49743e2ffa1c4496f01a512aafd9e5",
            ),
            (
                "f8b8af8ce3c7cca5e300d33939540c10d45ce001b8f252bfbc57ba0342904181",
                "Alan Turing",
                "304402207063ae83e7f62bbb171798131b4a0564b956930092b33b07b395615d9ec7e15c022058dfcc1e00a35e1572f366ffe34ba0fc47db1e7189759b9fb233c5b05ab388ea",
            ),
        ];
        for (priv_hex, msg, der_hex) in vectors {
            let k = key(priv_hex);
            let hash = sha256(msg.as_bytes());
            let sig = k.sign(&hash).unwrap();
            assert_eq!(hex::encode(sig.to_der()), der_hex, "message {:?}", msg);
            assert!(k.pub_key().verify(&hash, &sig));
            assert_eq!(Signature::from_der(&hex::decode(der_hex).unwrap()).unwrap(), sig);
        }
    }

    #[test]
    fn test_sign_with_k_fixes_r() {
        let signer = key("f8b8af8ce3c7cca5e300d33939540c10d45ce001b8f252bfbc57ba0342904181");
        let mut k = [0u8; 32];
        k[31] = 7;
        let a = signer.sign_with_k(&sha256(b"first"), &k).unwrap();
        let b = signer.sign_with_k(&sha256(b"second"), &k).unwrap();
        assert_eq!(a.r(), b.r());
        assert_ne!(a.s(), b.s());
        assert!(a.is_low_s() && b.is_low_s());
        assert!(signer.pub_key().verify(&sha256(b"first"), &a));
        assert!(signer.pub_key().verify(&sha256(b"second"), &b));
        assert!(signer.sign_with_k(&sha256(b"x"), &[0u8; 32]).is_err());
    }

    #[test]
    fn test_high_s_still_verifies() {
        let signer = key("0000000000000000000000000000000000000000000000000000000000000001");
        let hash = sha256(b"Satoshi Nakamoto");
        let sig = signer.sign(&hash).unwrap();
        let s = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*sig.s()))).unwrap();
        let high = Signature::new(*sig.r(), (-s).to_bytes().into());
        assert!(!high.is_low_s());
        assert!(signer.pub_key().verify(&hash, &high));
    }

    #[test]
    fn test_der_rejects_garbage() {
        assert!(Signature::from_der(&[]).is_err());
        assert!(Signature::from_der(&[0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x01]).is_err());
        assert!(Signature::from_der(&[0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]).is_err());
        assert!(Signature::from_der(&[0x30, 0x09, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]).is_err());
        let minimal = Signature::from_der(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]).unwrap();
        assert_eq!(minimal.to_der(), vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let hash = sha256(b"message");
        let sig = key("0000000000000000000000000000000000000000000000000000000000000001")
            .sign(&hash)
            .unwrap();
        let other = key("0000000000000000000000000000000000000000000000000000000000000002");
        assert!(!other.pub_key().verify(&hash, &sig));
    }
}
