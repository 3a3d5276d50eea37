//! PushDrop template: data fields pushed and dropped around a single-key
//! `OP_CHECKSIG` lock.
//!
//! With the lock before the data the script reads
//! `<pubkey> OP_CHECKSIG <field>... OP_2DROP... [OP_DROP]`; with the lock
//! after, the fields and drops come first. Either way the spender supplies
//! only a signature.

use bsv_core_primitives::ec::{PrivateKey, PublicKey};
use bsv_core_script::opcodes::*;
use bsv_core_script::{LockingScript, ScriptChunk, UnlockingScript};

use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::{signature_for_input, ScriptTemplate, UnlockingScriptTemplate};
use crate::transaction::Transaction;
use crate::TransactionError;

/// Where the `OP_CHECKSIG` lock sits relative to the data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockPosition {
    #[default]
    Before,
    After,
}

/// What a PushDrop locking script carries.
#[derive(Clone, Debug)]
pub struct PushDropFields {
    pub locking_public_key: PublicKey,
    pub fields: Vec<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PushDrop {
    pub position: LockPosition,
}

impl PushDrop {
    pub fn new(position: LockPosition) -> Self {
        PushDrop { position }
    }

    /// Recover the key and fields from a PushDrop locking script in either
    /// layout.
    pub fn decode(script: &LockingScript) -> Result<PushDropFields, TransactionError> {
        let chunks = script.chunks()?;
        let malformed = || TransactionError::InvalidTransaction("not a push-drop script".to_string());

        let is_lock_first = chunks.get(1).map(|c| c.op) == Some(OP_CHECKSIG);
        let (key_chunk, data) = if is_lock_first {
            (chunks.first(), chunks.get(2..).unwrap_or_default())
        } else {
            let n = chunks.len();
            if n < 2 || chunks[n - 1].op != OP_CHECKSIG {
                return Err(malformed());
            }
            (chunks.get(n - 2), &chunks[..n - 2])
        };

        let key_bytes = key_chunk.and_then(|c| c.data.as_deref()).ok_or_else(malformed)?;
        let locking_public_key = PublicKey::from_bytes(key_bytes)?;

        let fields = data
            .iter()
            .take_while(|c| c.op != OP_DROP && c.op != OP_2DROP)
            .map(|c| c.push_value().ok_or_else(malformed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PushDropFields { locking_public_key, fields })
    }
}

impl ScriptTemplate for PushDrop {
    type LockArgs = (PublicKey, Vec<Vec<u8>>);
    type UnlockArgs = PrivateKey;
    type Unlocker = PushDropUnlocker;

    fn lock(&self, (public_key, fields): (PublicKey, Vec<Vec<u8>>)) -> Result<LockingScript, TransactionError> {
        let lock = [
            ScriptChunk::push(&public_key.to_compressed()),
            ScriptChunk::opcode(OP_CHECKSIG),
        ];

        let mut data: Vec<ScriptChunk> = fields.iter().map(|f| ScriptChunk::push(f)).collect();
        let mut remaining = fields.len();
        while remaining > 1 {
            data.push(ScriptChunk::opcode(OP_2DROP));
            remaining -= 2;
        }
        if remaining == 1 {
            data.push(ScriptChunk::opcode(OP_DROP));
        }

        let chunks: Vec<ScriptChunk> = match self.position {
            LockPosition::Before => lock.into_iter().chain(data).collect(),
            LockPosition::After => data.into_iter().chain(lock).collect(),
        };
        Ok(LockingScript::from_chunks(&chunks))
    }

    fn unlock(&self, private_key: PrivateKey) -> PushDropUnlocker {
        PushDropUnlocker { private_key, sighash_flag: SIGHASH_ALL_FORKID }
    }
}

#[derive(Clone, Debug)]
pub struct PushDropUnlocker {
    private_key: PrivateKey,
    sighash_flag: u32,
}

impl PushDropUnlocker {
    pub fn with_sighash_flag(mut self, sighash_flag: u32) -> Self {
        self.sighash_flag = sighash_flag;
        self
    }
}

impl UnlockingScriptTemplate for PushDropUnlocker {
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<UnlockingScript, TransactionError> {
        let sig = signature_for_input(tx, input_index, self.sighash_flag, |digest| {
            self.private_key.sign(digest)
        })?;
        let mut script = UnlockingScript::new();
        script.append_push_data(&sig)?;
        Ok(script)
    }

    /// A push of at most 73 signature bytes.
    fn estimate_length(&self, _tx: &Transaction, _input_index: usize) -> u32 {
        74
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PrivateKey {
        PrivateKey::from_bytes(&[0x11; 32]).unwrap()
    }

    fn fields() -> Vec<Vec<u8>> {
        vec![b"hello".to_vec(), vec![], vec![5], vec![0x81], vec![0xaa; 80]]
    }

    #[test]
    fn test_lock_before() {
        let pub_key = key().pub_key();
        let script = PushDrop::default().lock((pub_key.clone(), fields())).unwrap();
        let asm = script.to_asm();
        assert!(asm.starts_with(&format!("{} OP_CHECKSIG 68656c6c6f 0 OP_5 -1 ", pub_key.to_hex())));
        assert!(asm.ends_with("OP_2DROP OP_2DROP OP_DROP"));

        let decoded = PushDrop::decode(&script).unwrap();
        assert_eq!(decoded.fields, fields());
        assert_eq!(decoded.locking_public_key.to_compressed(), pub_key.to_compressed());
    }

    #[test]
    fn test_lock_after() {
        let pub_key = key().pub_key();
        let two = vec![b"a".to_vec(), b"b".to_vec()];
        let script = PushDrop::new(LockPosition::After).lock((pub_key.clone(), two.clone())).unwrap();
        assert_eq!(script.to_asm(), format!("61 62 OP_2DROP {} OP_CHECKSIG", pub_key.to_hex()));

        let decoded = PushDrop::decode(&script).unwrap();
        assert_eq!(decoded.fields, two);
    }

    #[test]
    fn test_decode_rejects_other_scripts() {
        let p2pkh = LockingScript::from_hex("76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac").unwrap();
        assert!(PushDrop::decode(&p2pkh).is_err());
        assert!(PushDrop::decode(&LockingScript::new()).is_err());
    }
}
