/// P2PKH addresses.
///
/// An address is the Base58Check encoding of a network version byte followed
/// by a 20-byte public key hash. It converts directly to the P2PKH locking
/// script that pays it.
use std::fmt;
use std::str::FromStr;

use bsv_core_primitives::base58;
use bsv_core_primitives::ec::PublicKey;

use crate::opcodes::*;
use crate::script::LockingScript;
use crate::ScriptError;

const MAINNET_P2PKH: u8 = 0x00;
const TESTNET_P2PKH: u8 = 0x6f;

/// Network an address belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    /// Version byte 0x00, strings start with '1'.
    Mainnet,
    /// Version byte 0x6f, strings start with 'm' or 'n'.
    Testnet,
}

impl Network {
    fn version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH,
            Network::Testnet => TESTNET_P2PKH,
        }
    }
}

/// A P2PKH address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    public_key_hash: [u8; 20],
    network: Network,
}

impl Address {
    /// Parse a Base58Check address string.
    ///
    /// # Returns
    /// The address, or an error if the checksum fails, the payload is not 21
    /// bytes, or the version byte is not a P2PKH version.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        let payload = base58::check_decode(addr)?;
        if payload.len() != 21 {
            return Err(ScriptError::InvalidAddress(format!(
                "{} decodes to {} bytes",
                addr,
                payload.len()
            )));
        }
        let network = match payload[0] {
            MAINNET_P2PKH => Network::Mainnet,
            TESTNET_P2PKH => Network::Testnet,
            v => return Err(ScriptError::UnsupportedAddress(v)),
        };
        let mut public_key_hash = [0u8; 20];
        public_key_hash.copy_from_slice(&payload[1..]);
        Ok(Address { public_key_hash, network })
    }

    pub fn from_public_key_hash(public_key_hash: [u8; 20], network: Network) -> Self {
        Address { public_key_hash, network }
    }

    /// Address of the compressed encoding of `key`.
    pub fn from_public_key(key: &PublicKey, network: Network) -> Self {
        Address::from_public_key_hash(key.hash160(), network)
    }

    pub fn public_key_hash(&self) -> &[u8; 20] {
        &self.public_key_hash
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn locking_script(&self) -> LockingScript {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
        bytes.extend_from_slice(&self.public_key_hash);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        LockingScript::from(bytes)
    }
}

impl FromStr for Address {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.version());
        payload.extend_from_slice(&self.public_key_hash);
        f.write_str(&base58::check_encode(&payload))
    }
}
