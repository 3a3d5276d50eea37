use proptest::prelude::*;

use bsv_core_primitives::chainhash::Hash;
use bsv_core_script::{LockingScript, UnlockingScript};
use bsv_core_transaction::{Transaction, TransactionInput, TransactionOutput};

/// Strategy for a transaction whose inputs all know their source output.
fn arb_transaction() -> impl Strategy<Value = Transaction> {
    let arb_input = (
        prop::array::uniform32(any::<u8>()),       // source txid
        any::<u32>(),                              // source output index
        prop::collection::vec(any::<u8>(), 0..64), // unlocking script bytes
        any::<u32>(),                              // sequence
        any::<u64>(),                              // source satoshis
        prop::collection::vec(any::<u8>(), 0..64), // source locking script bytes
    )
        .prop_map(|(txid, vout, unlocking, sequence, satoshis, locking)| {
            let mut input = TransactionInput::new(Hash::new(txid), vout);
            input.unlocking_script = Some(UnlockingScript::from_bytes(&unlocking));
            input.sequence = sequence;
            input.set_source_output(satoshis, LockingScript::from_bytes(&locking));
            input
        });

    let arb_output = (any::<u64>(), prop::collection::vec(any::<u8>(), 0..64))
        .prop_map(|(satoshis, script)| TransactionOutput::new(satoshis, LockingScript::from_bytes(&script)));

    (
        any::<u32>(), // version
        prop::collection::vec(arb_input, 1..4),
        prop::collection::vec(arb_output, 1..4),
        any::<u32>(), // lock time
    )
        .prop_map(|(version, inputs, outputs, lock_time)| {
            let mut tx = Transaction::new();
            tx.version = version;
            tx.lock_time = lock_time;
            inputs.into_iter().for_each(|i| tx.add_input(i));
            outputs.into_iter().for_each(|o| tx.add_output(o));
            tx
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn standard_format_roundtrip(tx in arb_transaction()) {
        let bytes = tx.to_bytes();
        let parsed = Transaction::from_bytes(&bytes).unwrap();
        prop_assert_eq!(parsed.to_bytes(), bytes);
        prop_assert_eq!(parsed.tx_id(), tx.tx_id());
        prop_assert_eq!(Transaction::from_hex(&tx.to_hex()).unwrap().to_hex(), tx.to_hex());
    }

    #[test]
    fn extended_format_keeps_source_outputs(tx in arb_transaction()) {
        let ef = tx.to_bytes_ef().unwrap();
        let parsed = Transaction::from_bytes(&ef).unwrap();
        prop_assert_eq!(parsed.to_bytes_ef().unwrap(), ef);
        prop_assert_eq!(parsed.tx_id(), tx.tx_id());
        prop_assert_eq!(parsed.total_input_satoshis().ok(), tx.total_input_satoshis().ok());
    }
}
