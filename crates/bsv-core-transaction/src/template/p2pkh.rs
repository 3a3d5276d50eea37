//! Pay-to-Public-Key-Hash (P2PKH) script template.
//!
//! Locking script: `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Unlocking script: `<sig> <pubkey>`.

use bsv_core_primitives::ec::PrivateKey;
use bsv_core_script::{Address, LockingScript, Network, UnlockingScript};

use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::{signature_for_input, ScriptTemplate, UnlockingScriptTemplate};
use crate::transaction::Transaction;
use crate::TransactionError;

/// Push of a 72-byte signature plus push of a 33-byte compressed key.
const UNLOCKING_SCRIPT_LEN: u32 = 1 + 73 + 1 + 33;

/// The P2PKH template. Locks to a 20-byte public key hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct P2PKH;

impl ScriptTemplate for P2PKH {
    type LockArgs = [u8; 20];
    type UnlockArgs = PrivateKey;
    type Unlocker = P2PKHUnlocker;

    fn lock(&self, public_key_hash: [u8; 20]) -> Result<LockingScript, TransactionError> {
        Ok(Address::from_public_key_hash(public_key_hash, Network::Mainnet).locking_script())
    }

    fn unlock(&self, private_key: PrivateKey) -> P2PKHUnlocker {
        P2PKHUnlocker { private_key, sighash_flag: SIGHASH_ALL_FORKID }
    }
}

/// Create a P2PKH locking script paying `address`.
pub fn lock(address: &Address) -> LockingScript {
    address.locking_script()
}

/// Create a P2PKH unlocker.
///
/// # Arguments
/// * `private_key` - The private key used to sign.
/// * `sighash_flag` - Optional sighash flag. Defaults to `SIGHASH_ALL_FORKID` (0x41).
pub fn unlock(private_key: PrivateKey, sighash_flag: Option<u32>) -> P2PKHUnlocker {
    P2PKHUnlocker { private_key, sighash_flag: sighash_flag.unwrap_or(SIGHASH_ALL_FORKID) }
}

/// Signs P2PKH inputs with one key.
#[derive(Clone, Debug)]
pub struct P2PKHUnlocker {
    private_key: PrivateKey,
    sighash_flag: u32,
}

impl P2PKHUnlocker {
    pub fn with_sighash_flag(mut self, sighash_flag: u32) -> Self {
        self.sighash_flag = sighash_flag;
        self
    }
}

impl UnlockingScriptTemplate for P2PKHUnlocker {
    /// Produces `<DER_sig || sighash_byte> <compressed_pubkey>` using an
    /// RFC 6979 nonce.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<UnlockingScript, TransactionError> {
        let sig = signature_for_input(tx, input_index, self.sighash_flag, |digest| {
            self.private_key.sign(digest)
        })?;
        let pub_key = self.private_key.pub_key().to_compressed();

        let mut script = UnlockingScript::new();
        script.append_push_data(&sig)?;
        script.append_push_data(&pub_key)?;
        Ok(script)
    }

    fn estimate_length(&self, _tx: &Transaction, _input_index: usize) -> u32 {
        UNLOCKING_SCRIPT_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TransactionOutput;
    use bsv_core_primitives::chainhash::Hash;
    use bsv_core_primitives::ec::{PublicKey, Signature};

    const WIF: &str = "cNGwGSc7KRrTmdLUZ54fiSXWbhLNDc2Eg5zNucgQxyQCzuQ5YRDq";

    #[test]
    fn test_lock() {
        let pkh = hex::decode("c0a3c167a28cabb9fbb495affa0761e6e74ac60d").unwrap();
        let script = P2PKH.lock(pkh.try_into().unwrap()).unwrap();
        assert_eq!(script.to_hex(), "76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac");
        assert_eq!(
            script.to_asm(),
            "OP_DUP OP_HASH160 c0a3c167a28cabb9fbb495affa0761e6e74ac60d OP_EQUALVERIFY OP_CHECKSIG"
        );
    }

    #[test]
    fn test_sign_exact_match() {
        let unsigned = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d25072326510000000000ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";
        let signed = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d2507232651000000006b483045022100c1d77036dc6cd1f3fa1214b0688391ab7f7a16cd31ea4e5a1f7a415ef167df820220751aced6d24649fa235132f1e6969e163b9400f80043a72879237dab4a1190ad412103b8b40a84123121d260f5c109bc5a46ec819c2e4002e5ba08638783bfb4e01435ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";

        let mut tx = Transaction::from_hex(unsigned).unwrap();
        tx.inputs[0].set_source_output(
            100_000_000,
            LockingScript::from_hex("76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac").unwrap(),
        );

        let key = PrivateKey::from_wif(WIF).unwrap();
        let script = P2PKH.unlock(key).sign(&tx, 0).unwrap();
        assert!(script.len() as u32 <= UNLOCKING_SCRIPT_LEN);
        tx.inputs[0].unlocking_script = Some(script);
        assert_eq!(tx.to_hex(), signed);
    }

    #[test]
    fn test_signature_verifies() {
        let key = PrivateKey::from_wif(WIF).unwrap();
        let mut tx = Transaction::new();
        tx.add_input_from(
            "45be95d2f2c64e99518ffbbce03fb15a7758f20ee5eecf0df07938d977add71d",
            0,
            "76a914c7c6987b6e2345a6b138e3384141520a0fbc18c588ac",
            15564838601,
        )
        .unwrap();
        tx.add_output(TransactionOutput::new(
            375041432,
            LockingScript::from_hex("76a91442f9682260509ac80722b1963aec8a896593d16688ac").unwrap(),
        ));

        let script = unlock(key, None).sign(&tx, 0).unwrap();
        let chunks = script.chunks().unwrap();
        let sig_bytes = chunks[0].data.as_ref().unwrap();
        let pub_key = PublicKey::from_bytes(chunks[1].data.as_ref().unwrap()).unwrap();
        let (flag, der) = sig_bytes.split_last().unwrap();
        assert_eq!(*flag as u32, SIGHASH_ALL_FORKID);

        let sig = Signature::from_der(der).unwrap();
        let digest = tx.calc_input_signature_hash(0, SIGHASH_ALL_FORKID).unwrap();
        assert!(sig.verify(&digest, &pub_key));
    }

    #[test]
    fn test_sign_without_source_output() {
        let key = PrivateKey::from_wif(WIF).unwrap();
        let mut tx = Transaction::new();
        tx.add_input(crate::TransactionInput::new(Hash::new([9u8; 32]), 0));
        assert!(matches!(
            P2PKH.unlock(key).sign(&tx, 0),
            Err(TransactionError::MissingSourceOutput { index: 0 })
        ));
    }
}
