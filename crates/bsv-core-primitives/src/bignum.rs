//! Arbitrary-precision integers and the script-number codec.
//!
//! `BigNumber` does arithmetic with no fixed width. The script-number form
//! is a separate codec: magnitude little-endian in as few bytes as possible,
//! with the top bit of the last byte carrying the sign. Zero is the empty
//! byte string.
//!
//! Decoding accepts any encoding, minimal or not. Encoding always produces
//! the minimal form. Callers that must reject non-minimal input check
//! [`is_minimally_encoded`] first.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};

use crate::PrimitivesError;

/// An arbitrary-precision signed integer.
///
/// Division and remainder truncate toward zero, matching the script
/// opcodes `OP_DIV` and `OP_MOD`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigNumber(BigInt);

impl BigNumber {
    pub fn zero() -> Self {
        BigNumber(BigInt::zero())
    }

    pub fn one() -> Self {
        BigNumber(BigInt::from(1))
    }

    /// Decode a script number. Non-minimal encodings decode to their value.
    pub fn from_script_num(bytes: &[u8]) -> Self {
        let Some((&last, _)) = bytes.split_last() else {
            return Self::zero();
        };
        let mut magnitude = bytes.to_vec();
        let negative = last & 0x80 != 0;
        if let Some(top) = magnitude.last_mut() {
            *top &= 0x7f;
        }
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        BigNumber(BigInt::from_bytes_le(sign, &magnitude))
    }

    /// Decode a script number, rejecting encodings longer than `max_len`
    /// bytes and, when `require_minimal` is set, non-minimal encodings.
    pub fn from_script_num_checked(
        bytes: &[u8],
        max_len: usize,
        require_minimal: bool,
    ) -> Result<Self, PrimitivesError> {
        if bytes.len() > max_len {
            return Err(PrimitivesError::ScriptNumTooLong { len: bytes.len(), max: max_len });
        }
        if require_minimal && !is_minimally_encoded(bytes) {
            return Err(PrimitivesError::ScriptNumNotMinimal);
        }
        Ok(Self::from_script_num(bytes))
    }

    /// Minimal script-number encoding.
    pub fn to_script_num(&self) -> Vec<u8> {
        if self.0.is_zero() {
            return Vec::new();
        }
        let (sign, mut out) = self.0.to_bytes_le();
        let top = out.len() - 1;
        if out[top] & 0x80 != 0 {
            out.push(if sign == Sign::Minus { 0x80 } else { 0x00 });
        } else if sign == Sign::Minus {
            out[top] |= 0x80;
        }
        out
    }

    /// Parse a `0x`-less hex string of big-endian magnitude, with an
    /// optional leading `-`.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let (negative, digits) = match hex_str.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, hex_str),
        };
        let value = BigInt::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| PrimitivesError::InvalidNumber(format!("not hex: {:?}", hex_str)))?;
        Ok(BigNumber(if negative { -value } else { value }))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn abs(&self) -> Self {
        BigNumber(self.0.abs())
    }

    /// `None` when the value does not fit an `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// `None` when negative or too large for `usize`.
    pub fn to_usize(&self) -> Option<usize> {
        self.0.to_usize()
    }

    /// Number of bytes in the minimal script-number encoding.
    pub fn script_num_len(&self) -> usize {
        self.to_script_num().len()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn into_bigint(self) -> BigInt {
        self.0
    }
}

/// Whether `bytes` is the shortest script-number encoding of its value.
///
/// The last byte may only be `0x00` or `0x80` when the byte before it has
/// its high bit set (the extra byte then carries the sign).
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [.., last] if last & 0x7f != 0 => true,
        [_] => false,
        [.., prev, _] => prev & 0x80 != 0,
    }
}

/// Strip redundant trailing bytes while keeping the value, as `OP_BIN2NUM`
/// does. Negative zero becomes the empty string.
pub fn minimally_encode(bytes: &[u8]) -> Vec<u8> {
    let Some((&last, rest)) = bytes.split_last() else {
        return Vec::new();
    };
    if last & 0x7f != 0 {
        return bytes.to_vec();
    }
    let sign = last & 0x80;
    match rest.iter().rposition(|b| *b != 0) {
        None => Vec::new(),
        Some(i) => {
            let mut out = rest[..=i].to_vec();
            if out[i] & 0x80 != 0 {
                out.push(sign);
            } else {
                out[i] |= sign;
            }
            out
        }
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for BigNumber {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s)
            .map(BigNumber)
            .map_err(|e| PrimitivesError::InvalidNumber(e.to_string()))
    }
}

impl From<BigInt> for BigNumber {
    fn from(v: BigInt) -> Self {
        BigNumber(v)
    }
}

macro_rules! from_native {
    ($($t:ty),*) => {$(
        impl From<$t> for BigNumber {
            fn from(v: $t) -> Self {
                BigNumber(BigInt::from(v))
            }
        }

        impl PartialEq<$t> for BigNumber {
            fn eq(&self, other: &$t) -> bool {
                self.0 == BigInt::from(*other)
            }
        }

        impl PartialOrd<$t> for BigNumber {
            fn partial_cmp(&self, other: &$t) -> Option<Ordering> {
                Some(self.0.cmp(&BigInt::from(*other)))
            }
        }
    )*};
}

from_native!(i32, i64, u32, u64, usize);

macro_rules! binop {
    ($trait:ident, $method:ident) => {
        impl $trait<&BigNumber> for &BigNumber {
            type Output = BigNumber;

            fn $method(self, rhs: &BigNumber) -> BigNumber {
                BigNumber($trait::$method(&self.0, &rhs.0))
            }
        }

        impl $trait for BigNumber {
            type Output = BigNumber;

            fn $method(self, rhs: BigNumber) -> BigNumber {
                BigNumber($trait::$method(self.0, rhs.0))
            }
        }
    };
}

binop!(Add, add);
binop!(Sub, sub);
binop!(Mul, mul);
binop!(Div, div);
binop!(Rem, rem);

impl Neg for BigNumber {
    type Output = BigNumber;

    fn neg(self) -> BigNumber {
        BigNumber(-self.0)
    }
}

impl Neg for &BigNumber {
    type Output = BigNumber;

    fn neg(self) -> BigNumber {
        BigNumber(-&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: i64) -> BigNumber {
        BigNumber::from(v)
    }

    #[test]
    fn test_script_num_vectors() {
        let cases: &[(i64, &str)] = &[
            (0, ""),
            (1, "01"),
            (-1, "81"),
            (127, "7f"),
            (-127, "ff"),
            (128, "8000"),
            (-128, "8080"),
            (129, "8100"),
            (-129, "8180"),
            (255, "ff00"),
            (256, "0001"),
            (-256, "0081"),
            (32767, "ff7f"),
            (32768, "008000"),
            (-32768, "008080"),
            (2147483647, "ffffff7f"),
            (-2147483647, "ffffffff"),
            (2147483648, "0000008000"),
            (4294967296, "0000000001"),
            (9223372036854775807, "ffffffffffffff7f"),
            (-9223372036854775807, "ffffffffffffffff"),
        ];
        for (value, hex_str) in cases {
            assert_eq!(hex::encode(n(*value).to_script_num()), *hex_str, "encode {}", value);
            let decoded = BigNumber::from_script_num(&hex::decode(hex_str).unwrap());
            assert_eq!(decoded, n(*value), "decode {}", hex_str);
        }
    }

    #[test]
    fn test_round_trip_beyond_native_range() {
        let big = (BigNumber::from(1i64 << 60)) + n(5);
        assert_eq!(BigNumber::from_script_num(&big.to_script_num()), big);
        assert_eq!(hex::encode(big.to_script_num()), "0500000000000010");

        let huge: BigNumber = "-1267650600228229401496703205376".parse().unwrap();
        assert_eq!(huge.to_script_num().len(), 13);
        assert_eq!(BigNumber::from_script_num(&huge.to_script_num()), huge);
        assert_eq!(huge.to_i64(), None);
    }

    #[test]
    fn test_non_minimal_decodes_to_value() {
        assert_eq!(BigNumber::from_script_num(&[0x01, 0x00]), n(1));
        assert_eq!(BigNumber::from_script_num(&[0x00]), n(0));
        assert_eq!(BigNumber::from_script_num(&[0x80]), n(0));
        assert_eq!(BigNumber::from_script_num(&[0x01, 0x00, 0x80]), n(-1));
    }

    #[test]
    fn test_checked_decode() {
        assert!(matches!(
            BigNumber::from_script_num_checked(&[0x01, 0x00], 4, true),
            Err(PrimitivesError::ScriptNumNotMinimal)
        ));
        assert!(matches!(
            BigNumber::from_script_num_checked(&[1, 2, 3, 4, 5], 4, false),
            Err(PrimitivesError::ScriptNumTooLong { len: 5, max: 4 })
        ));
        assert_eq!(BigNumber::from_script_num_checked(&[0x01, 0x00], 4, false).unwrap(), n(1));
    }

    #[test]
    fn test_minimality() {
        assert!(is_minimally_encoded(&[]));
        assert!(is_minimally_encoded(&[0x01]));
        assert!(is_minimally_encoded(&[0x80, 0x00]));
        assert!(is_minimally_encoded(&[0xff, 0x80]));
        assert!(!is_minimally_encoded(&[0x00]));
        assert!(!is_minimally_encoded(&[0x80]));
        assert!(!is_minimally_encoded(&[0x01, 0x00]));
        assert!(!is_minimally_encoded(&[0x7f, 0x80]));
    }

    #[test]
    fn test_minimally_encode() {
        assert_eq!(minimally_encode(&[]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x00, 0x00]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x80]), Vec::<u8>::new());
        assert_eq!(minimally_encode(&[0x01, 0x00, 0x00]), vec![0x01]);
        assert_eq!(minimally_encode(&[0x01, 0x00, 0x80]), vec![0x81]);
        assert_eq!(minimally_encode(&[0x80, 0x00, 0x00]), vec![0x80, 0x00]);
        assert_eq!(minimally_encode(&[0xff, 0x00, 0x80]), vec![0xff, 0x80]);
        assert_eq!(minimally_encode(&[0x05]), vec![0x05]);
    }

    #[test]
    fn test_arithmetic_truncates_toward_zero() {
        assert_eq!(&n(-7) / &n(2), n(-3));
        assert_eq!(&n(-7) % &n(2), n(-1));
        assert_eq!(&n(7) % &n(-2), n(1));
        assert_eq!(-n(5), n(-5));
        assert!(n(3) > 2i64);
        assert!(n(-1) < 0i32);
        assert_eq!(n(12), 12usize);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(BigNumber::from_hex("ff").unwrap(), n(255));
        assert_eq!(BigNumber::from_hex("-10").unwrap(), n(-16));
        assert!(BigNumber::from_hex("zz").is_err());
    }
}
