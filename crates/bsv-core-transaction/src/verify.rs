//! SPV verification of a transaction and its unconfirmed ancestry.
//!
//! Starting from the transaction, ancestors are visited breadth-first through
//! each input's source transaction. An ancestor whose Merkle path the chain
//! tracker accepts ends that branch. Every other transaction must balance and
//! have all of its inputs' scripts evaluate successfully.

use std::collections::{HashSet, VecDeque};

use bsv_core_primitives::chainhash::Hash;
use bsv_core_script::interpreter::{ScriptFlags, Spend, SpendParams, DEFAULT_MEMORY_LIMIT};
use bsv_core_spv::ChainTracker;
use rayon::prelude::*;

use crate::context::TransactionContext;
use crate::fee_model::FeeModel;
use crate::transaction::Transaction;
use crate::TransactionError;

/// Tuning for [`Transaction::verify`].
#[derive(Clone, Copy, Debug)]
pub struct VerifyOptions {
    /// Script flags every input is evaluated under.
    pub flags: ScriptFlags,
    /// Stack memory bound per evaluation.
    pub memory_limit: usize,
    /// Evaluate the inputs of each transaction on the rayon thread pool.
    pub parallel: bool,
    /// Trust any ancestor carrying a Merkle path without asking the chain
    /// tracker.
    pub scripts_only: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            flags: ScriptFlags::STANDARD,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            parallel: false,
            scripts_only: false,
        }
    }
}

impl Transaction {
    /// Verify this transaction and its ancestry.
    ///
    /// # Arguments
    /// * `tracker` - Confirms the Merkle roots of anchored ancestors.
    /// * `options` - Flags, limits and evaluation mode.
    ///
    /// # Returns
    /// `Ok(())` if every unanchored transaction in the ancestry is valid.
    /// Script failures come back as `TransactionError::Spend` carrying the
    /// failing input's snapshot; chain tracker failures propagate.
    pub async fn verify<T: ChainTracker>(
        &self,
        tracker: &T,
        options: VerifyOptions,
    ) -> Result<(), TransactionError> {
        let mut verified: HashSet<Hash> = HashSet::new();
        let mut queue: VecDeque<&Transaction> = VecDeque::from([self]);

        while let Some(tx) = queue.pop_front() {
            let txid = tx.tx_id();
            if !verified.insert(txid) {
                continue;
            }

            if let Some(path) = &tx.merkle_path {
                if options.scripts_only {
                    log::debug!("{} carries a merkle path, trusted", txid);
                    continue;
                }
                if path.verify(&txid, tracker).await? {
                    log::debug!("{} anchored at height {}", txid, path.block_height);
                    continue;
                }
                log::debug!("merkle path of {} rejected, evaluating scripts", txid);
            }

            for (index, input) in tx.inputs.iter().enumerate() {
                match input.source_output(index) {
                    Ok(_) => {}
                    Err(TransactionError::MissingSourceOutput { .. }) => {
                        return Err(TransactionError::UnverifiableAncestry { txid, index })
                    }
                    Err(e) => return Err(e),
                }
                match &input.source_transaction {
                    Some(source) => queue.push_back(source.as_ref()),
                    None => {
                        log::debug!("input {} of {} has no source transaction, ancestry ends", index, txid);
                    }
                }
            }

            tx.get_fee()?;
            evaluate_inputs(tx, &options)?;
            log::debug!("{} verified ({} inputs)", txid, tx.inputs.len());
        }
        Ok(())
    }

    /// [`verify`](Self::verify), after checking that this transaction pays at
    /// least the fee `model` asks for.
    pub async fn verify_with_fee<T: ChainTracker, M: FeeModel>(
        &self,
        tracker: &T,
        model: &M,
        options: VerifyOptions,
    ) -> Result<(), TransactionError> {
        let paid = self.get_fee()?;
        let required = model.compute_fee(self).await?;
        if paid < required {
            return Err(TransactionError::InsufficientFee { paid, required });
        }
        self.verify(tracker, options).await
    }
}

/// Evaluate every input of `tx`, reporting the lowest failing index.
fn evaluate_inputs(tx: &Transaction, options: &VerifyOptions) -> Result<(), TransactionError> {
    let count = tx.inputs.len();
    if !options.parallel || count < 2 {
        return (0..count).try_for_each(|index| evaluate_input(tx, index, options));
    }

    let results: Vec<Result<(), TransactionError>> = (0..count)
        .into_par_iter()
        .map(|index| evaluate_input(tx, index, options))
        .collect();
    results.into_iter().collect()
}

fn evaluate_input(tx: &Transaction, index: usize, options: &VerifyOptions) -> Result<(), TransactionError> {
    let input = &tx.inputs[index];
    let source = input.source_output(index)?;
    let unlocking_script = input
        .unlocking_script
        .as_ref()
        .ok_or(TransactionError::MissingUnlockingScript { index })?;

    let context = TransactionContext::new(tx, options.flags.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID));
    let params = SpendParams {
        source_txid: input.source_txid,
        source_output_index: input.source_output_index,
        unlocking_script,
        locking_script: source.locking_script,
        tx_context: Some(&context),
        input_index: index,
        flags: options.flags,
        memory_limit: options.memory_limit,
    };

    log::trace!("evaluating input {} ({}:{})", index, input.source_txid, input.source_output_index);
    Spend::new(params)?.validate()?;
    Ok(())
}
