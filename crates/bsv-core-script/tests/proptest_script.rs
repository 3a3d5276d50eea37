use proptest::prelude::*;

use bsv_core_primitives::bignum::BigNumber;
use bsv_core_script::interpreter::{ScriptFlags, Spend, SpendParams};
use bsv_core_script::opcodes::{OP_ADD, OP_EQUAL};
use bsv_core_script::{LockingScript, Script, UnlockingScript};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Decoding is lenient, so re-encoding parsed chunks reproduces the
    /// original bytes even for non-minimal pushes.
    #[test]
    fn chunks_preserve_encoding(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let script = Script::from_bytes(&data);
        if let Ok(chunks) = script.chunks() {
            let rebuilt = Script::from_chunks(&chunks);
            prop_assert_eq!(rebuilt.as_bytes(), &data[..]);
        }
    }

    #[test]
    fn script_addition_matches_bignumber(a in any::<i64>(), b in any::<i64>()) {
        let (a, b) = (BigNumber::from(a), BigNumber::from(b));
        let mut locking = LockingScript::new();
        locking.append_number(&a).append_number(&b);
        locking.append_opcodes(&[OP_ADD]).unwrap();
        locking.append_number(&(&a + &b));
        locking.append_opcodes(&[OP_EQUAL]).unwrap();

        let unlocking = UnlockingScript::new();
        let mut spend = Spend::new(SpendParams::new(&unlocking, &locking)).unwrap();
        prop_assert!(spend.validate().is_ok());
    }

    #[test]
    fn arbitrary_scripts_never_panic(
        unlock in prop::collection::vec(any::<u8>(), 0..64),
        lock in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let unlocking = UnlockingScript::from_bytes(&unlock);
        let locking = LockingScript::from_bytes(&lock);
        let mut params = SpendParams::new(&unlocking, &locking);
        params.flags = ScriptFlags::STANDARD.without(ScriptFlags::VERIFY_SIG_PUSH_ONLY);
        if let Ok(mut spend) = Spend::new(params) {
            let first = spend.validate();
            let again = Spend::new(params).and_then(|mut s| s.validate());
            prop_assert_eq!(first, again);
        }
    }
}
