//! Script types.
//!
//! `Script` wraps the raw script bytes exactly as they appear on the wire, so
//! scripts that do not parse (coinbase inputs, truncated pushes in data
//! outputs) still round-trip. The chunk view is parsed on demand.
//! `LockingScript` and `UnlockingScript` tag a script with its role.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use bsv_core_primitives::bignum::BigNumber;

use crate::chunk::{decode_script, ScriptChunk};
use crate::opcodes::*;
use crate::ScriptError;

/// A script, represented as its raw bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Create a script from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "76a914...88ac").
    ///
    /// # Returns
    /// The decoded script, or `ScriptError::InvalidHex`.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Build a script by serializing `chunks` in order.
    pub fn from_chunks(chunks: &[ScriptChunk]) -> Self {
        let mut bytes = Vec::new();
        for chunk in chunks {
            chunk.write_to(&mut bytes);
        }
        Script(bytes)
    }

    /// Parse space-separated assembly.
    ///
    /// Tokens are mnemonics (`OP_DUP`, `OP_TRUE`, `OP_UNKNOWN186`), the
    /// literals `0` and `-1`, or hex data which is pushed minimally.
    /// Explicit push opcodes such as `OP_PUSHDATA1` are rejected because
    /// their payload cannot be expressed as a separate token.
    ///
    /// # Arguments
    /// * `asm` - The assembly text.
    ///
    /// # Returns
    /// The script, or `ScriptError::InvalidAsmToken` naming the first token
    /// that could not be interpreted.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for token in asm.split_whitespace() {
            let chunk = match token {
                "0" => ScriptChunk::opcode(OP_0),
                "-1" => ScriptChunk::opcode(OP_1NEGATE),
                _ => match string_to_opcode(token) {
                    Some(op) if op > OP_0 && op <= OP_PUSHDATA4 => {
                        return Err(ScriptError::InvalidAsmToken(token.to_string()));
                    }
                    Some(op) => ScriptChunk::opcode(op),
                    None => {
                        let data = hex::decode(token)
                            .map_err(|_| ScriptError::InvalidAsmToken(token.to_string()))?;
                        ScriptChunk::push(&data)
                    }
                },
            };
            chunk.write_to(&mut script.0);
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Render the script as assembly. Scripts whose pushes run past the end
    /// render their parseable prefix followed by `[error]`.
    pub fn to_asm(&self) -> String {
        match decode_script(&self.0) {
            Ok(chunks) => chunks
                .iter()
                .map(ScriptChunk::to_asm_string)
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => {
                let mut parts = Vec::new();
                let mut rest: &[u8] = &self.0;
                // decode one chunk at a time to find the valid prefix
                while !rest.is_empty() {
                    let step = chunk_len(rest);
                    match step.and_then(|n| decode_script(&rest[..n]).ok().map(|c| (n, c))) {
                        Some((n, chunks)) => {
                            parts.extend(chunks.iter().map(ScriptChunk::to_asm_string));
                            rest = &rest[n..];
                        }
                        None => break,
                    }
                }
                parts.push("[error]".to_string());
                parts.join(" ")
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the script into chunks.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Append `data` using the minimal push for its length and value.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<&mut Self, ScriptError> {
        if u32::try_from(data.len()).is_err() {
            return Err(ScriptError::DataTooBig(data.len()));
        }
        ScriptChunk::push(data).write_to(&mut self.0);
        Ok(self)
    }

    pub fn append_push_data_hex(&mut self, hex_str: &str) -> Result<&mut Self, ScriptError> {
        let data = hex::decode(hex_str)?;
        self.append_push_data(&data)
    }

    /// Append `n` as a minimally encoded script number.
    pub fn append_number(&mut self, n: &BigNumber) -> &mut Self {
        ScriptChunk::push(&n.to_script_num()).write_to(&mut self.0);
        self
    }

    /// Append bare opcodes.
    ///
    /// # Returns
    /// `ScriptError::InvalidOpcodeType` if any opcode is a length-prefixed
    /// push, which would leave the script malformed.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<&mut Self, ScriptError> {
        if let Some(op) = opcodes
            .iter()
            .find(|op| **op > OP_0 && **op <= OP_PUSHDATA4)
        {
            return Err(ScriptError::InvalidOpcodeType(opcode_to_string(*op)));
        }
        self.0.extend_from_slice(opcodes);
        Ok(self)
    }

    pub fn append_chunk(&mut self, chunk: &ScriptChunk) -> &mut Self {
        chunk.write_to(&mut self.0);
        self
    }

    /// Append another script's bytes.
    pub fn append_script(&mut self, other: &Script) -> &mut Self {
        self.0.extend_from_slice(&other.0);
        self
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// True when the script parses and contains only push opcodes.
    pub fn is_push_only(&self) -> bool {
        match self.chunks() {
            Ok(chunks) => chunks.iter().all(ScriptChunk::is_push),
            Err(_) => false,
        }
    }

    /// Pattern: `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// `OP_RETURN` or `OP_FALSE OP_RETURN` data carrier.
    pub fn is_data(&self) -> bool {
        let b = &self.0;
        b.first() == Some(&OP_RETURN) || (b.len() > 1 && b[0] == OP_FALSE && b[1] == OP_RETURN)
    }

    /// The 20-byte hash of a P2PKH locking script.
    pub fn public_key_hash(&self) -> Result<[u8; 20], ScriptError> {
        if !self.is_p2pkh() {
            return Err(ScriptError::UnexpectedForm("P2PKH locking script"));
        }
        let mut pkh = [0u8; 20];
        pkh.copy_from_slice(&self.0[3..23]);
        Ok(pkh)
    }
}

/// Byte length of the first chunk in `bytes`, if it is complete.
fn chunk_len(bytes: &[u8]) -> Option<usize> {
    let op = *bytes.first()?;
    let (header, len) = match op {
        OP_DATA_1..=OP_DATA_75 => (1, op as usize),
        OP_PUSHDATA1 => (2, *bytes.get(1)? as usize),
        OP_PUSHDATA2 => (3, u16::from_le_bytes([*bytes.get(1)?, *bytes.get(2)?]) as usize),
        OP_PUSHDATA4 => {
            let b = bytes.get(1..5)?;
            (5, u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
        }
        _ => (1, 0),
    };
    (header + len <= bytes.len()).then_some(header + len)
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    /// Parses hex. Use [`Script::from_asm`] for assembly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Script::from_hex(s)
    }
}

impl fmt::Display for Script {
    /// Display the script as a lowercase hex string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Declares a role wrapper around `Script`. The wrapper derefs to the
/// underlying script and converts to and from it freely.
macro_rules! role_script {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(Script);

        impl $name {
            pub fn new() -> Self {
                $name(Script::new())
            }

            pub fn from_bytes(bytes: &[u8]) -> Self {
                $name(Script::from_bytes(bytes))
            }

            pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
                Script::from_hex(hex_str).map($name)
            }

            pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
                Script::from_asm(asm).map($name)
            }

            pub fn from_chunks(chunks: &[ScriptChunk]) -> Self {
                $name(Script::from_chunks(chunks))
            }

            pub fn as_script(&self) -> &Script {
                &self.0
            }

            pub fn into_script(self) -> Script {
                self.0
            }
        }

        impl Deref for $name {
            type Target = Script;

            fn deref(&self) -> &Script {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Script {
                &mut self.0
            }
        }

        impl From<Script> for $name {
            fn from(script: Script) -> Self {
                $name(script)
            }
        }

        impl From<$name> for Script {
            fn from(script: $name) -> Self {
                script.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                $name(Script(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.to_hex())
            }
        }
    };
}

role_script!(
    /// A script attached to an output, setting the conditions for spending it.
    LockingScript
);

role_script!(
    /// A script attached to an input, satisfying the locking script it spends.
    UnlockingScript
);

#[cfg(test)]
mod tests {
    use super::*;

    const P2PKH_HEX: &str = "76a914e2a623699e81b291c0327f408fea765d534baa2a88ac";

    #[test]
    fn test_from_hex_roundtrip() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        assert_eq!(script.to_hex(), P2PKH_HEX);
        assert_eq!(script.len(), 25);
        assert!(Script::from_hex("zz").is_err());
        assert!(Script::from_hex("").unwrap().is_empty());
    }

    #[test]
    fn test_to_asm_p2pkh() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        assert_eq!(
            script.to_asm(),
            "OP_DUP OP_HASH160 e2a623699e81b291c0327f408fea765d534baa2a OP_EQUALVERIFY OP_CHECKSIG"
        );
    }

    #[test]
    fn test_asm_roundtrip() {
        let asm = "OP_DUP OP_HASH160 e2a623699e81b291c0327f408fea765d534baa2a OP_EQUALVERIFY OP_CHECKSIG";
        let script = Script::from_asm(asm).unwrap();
        assert_eq!(script.to_hex(), P2PKH_HEX);
        assert_eq!(script.to_asm(), asm);
    }

    #[test]
    fn test_asm_literals_and_aliases() {
        let script = Script::from_asm("0 -1 OP_TRUE OP_FALSE 1f").unwrap();
        assert_eq!(script.as_bytes(), &[OP_0, OP_1NEGATE, OP_1, OP_0, 0x01, 0x1f]);
        assert_eq!(script.to_asm(), "0 -1 OP_1 0 1f");
    }

    #[test]
    fn test_asm_minimalizes_small_pushes() {
        let script = Script::from_asm("05 81").unwrap();
        assert_eq!(script.as_bytes(), &[OP_5, OP_1NEGATE]);
    }

    #[test]
    fn test_asm_rejects_bad_tokens() {
        assert!(matches!(
            Script::from_asm("OP_DUP OP_FOO"),
            Err(ScriptError::InvalidAsmToken(t)) if t == "OP_FOO"
        ));
        assert!(Script::from_asm("abc").is_err());
        assert!(Script::from_asm("OP_PUSHDATA1").is_err());
    }

    #[test]
    fn test_data_output_asm() {
        let script = Script::from_asm("OP_FALSE OP_RETURN 68656c6c6f").unwrap();
        assert_eq!(script.to_hex(), "006a0568656c6c6f");
        assert!(script.is_data());
        assert_eq!(script.to_asm(), "0 OP_RETURN 68656c6c6f");
    }

    #[test]
    fn test_truncated_script_asm() {
        let script = Script::from_hex("76a90501").unwrap();
        assert!(script.chunks().is_err());
        assert_eq!(script.to_asm(), "OP_DUP OP_HASH160 [error]");
    }

    #[test]
    fn test_classification() {
        let p2pkh = Script::from_hex(P2PKH_HEX).unwrap();
        assert!(p2pkh.is_p2pkh());
        assert!(!p2pkh.is_data());
        assert!(!p2pkh.is_push_only());
        assert_eq!(
            hex::encode(p2pkh.public_key_hash().unwrap()),
            "e2a623699e81b291c0327f408fea765d534baa2a"
        );
        let p2sh = Script::from_hex("a9149de5aeaff9c48431ba4dd6e8af73d51f38e451cb87").unwrap();
        assert!(!p2sh.is_p2pkh());
        assert!(p2sh.public_key_hash().is_err());
        assert!(Script::from_asm("0 01 ffff").unwrap().is_push_only());
    }

    #[test]
    fn test_append_push_data() {
        let mut script = Script::new();
        script.append_push_data(&[0xaa; 20]).unwrap();
        assert_eq!(script.as_bytes()[0], OP_DATA_20);
        script.append_push_data(&[0xbb; 100]).unwrap();
        assert_eq!(&script.as_bytes()[21..23], &[OP_PUSHDATA1, 100]);
        script.append_push_data(&[]).unwrap();
        assert_eq!(script.as_bytes().last(), Some(&OP_0));
        assert_eq!(script.len(), 21 + 102 + 1);
    }

    #[test]
    fn test_append_number() {
        let mut script = Script::new();
        script
            .append_number(&BigNumber::from(0))
            .append_number(&BigNumber::from(-1))
            .append_number(&BigNumber::from(16))
            .append_number(&BigNumber::from(17))
            .append_number(&BigNumber::from(-255));
        assert_eq!(script.to_hex(), "004f60011102ff80");
    }

    #[test]
    fn test_append_opcodes() {
        let mut script = Script::new();
        script.append_opcodes(&[OP_DUP, OP_HASH160]).unwrap();
        assert_eq!(script.as_bytes(), &[OP_DUP, OP_HASH160]);
        assert!(matches!(
            script.append_opcodes(&[OP_PUSHDATA1]),
            Err(ScriptError::InvalidOpcodeType(_))
        ));
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn test_from_chunks_preserves_encoding() {
        let bytes = [OP_PUSHDATA1, 0x01, 0x07, OP_DROP];
        let script = Script::from_bytes(&bytes);
        let rebuilt = Script::from_chunks(&script.chunks().unwrap());
        assert_eq!(rebuilt.as_bytes(), &bytes);
    }

    #[test]
    fn test_serde() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, format!("\"{}\"", P2PKH_HEX));
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
        let locking: LockingScript = serde_json::from_str(&json).unwrap();
        assert!(locking.is_p2pkh());
        assert!(serde_json::from_str::<Script>("\"xyz\"").is_err());
    }

    #[test]
    fn test_role_wrappers() {
        let locking = LockingScript::from_hex(P2PKH_HEX).unwrap();
        assert_eq!(locking.to_string(), P2PKH_HEX);
        assert_eq!(format!("{:?}", locking), format!("LockingScript({})", P2PKH_HEX));
        let mut unlocking = UnlockingScript::new();
        unlocking.append_push_data(&[1, 2, 3]).unwrap();
        let script: Script = unlocking.clone().into();
        assert_eq!(script.as_bytes(), &[3, 1, 2, 3]);
        assert_eq!(UnlockingScript::from(script), unlocking);
    }
}
