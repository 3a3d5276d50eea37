//! Cryptographic and numeric building blocks for the BSV transaction core.
//!
//! - Hash functions (SHA-256, SHA-1, RIPEMD-160, HASH160, HASH256)
//! - `Hash`, the 32-byte identifier used for txids and Merkle nodes
//! - `BigNumber` with the script-number codec
//! - secp256k1 keys and ECDSA signatures
//! - Variable-length integers, binary reader/writer, Base58Check

pub mod base58;
pub mod bignum;
pub mod chainhash;
pub mod ec;
pub mod hash;
pub mod util;

mod error;
pub use error::PrimitivesError;
