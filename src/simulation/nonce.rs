//! Nonce reconciliation.

use crate::{
    chain::ChainClient,
    error::SimulationError,
    types::{QueuedTransaction, SimulationState},
};
use alloy::{eips::BlockId, primitives::Address};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Outcome of [`fix_nonces`].
#[derive(Debug, Clone, PartialEq)]
pub enum NonceFix {
    /// No transaction needs a different nonce, no recompute is necessary.
    Unchanged,
    /// User transactions with corrected nonces, to be executed again.
    Fixed(Vec<QueuedTransaction>),
}

/// Rewrites the nonces of renumberable user transactions into a contiguous sequence per sender.
///
/// Does nothing unless a renumberable transaction failed with a nonce conflict. Otherwise walks
/// the queue once, keeping the last nonce seen per sender: a renumberable transaction gets the
/// previous nonce of its sender plus one, or the sender's on-chain nonce if it is the first one.
/// Raw transactions and the prepend queue keep their nonce, which becomes the last seen nonce of
/// their sender.
///
/// This does not execute anything, the caller must feed the result back into the queue.
#[instrument(skip_all, fields(transactions = state.simulated_transactions.len()))]
pub async fn fix_nonces(
    chain: &ChainClient,
    state: &SimulationState,
) -> Result<NonceFix, SimulationError> {
    let conflict = state.user_transactions().iter().any(|tx| {
        tx.original_request_parameters.is_renumberable() && tx.batch_call_result.is_nonce_conflict()
    });
    if !conflict {
        return Ok(NonceFix::Unchanged);
    }

    let prepend_len = state.prepend_transactions_queue.len();
    let mut last_nonce: HashMap<Address, u64> = HashMap::new();
    let mut fixed = Vec::with_capacity(state.user_transactions().len());
    let mut changed = false;

    for (index, tx) in state.simulated_transactions.iter().enumerate() {
        let mut queued = tx.to_queued();
        let from = queued.from();

        if index >= prepend_len && tx.original_request_parameters.is_renumberable() {
            let nonce = match last_nonce.get(&from) {
                Some(previous) => previous + 1,
                None => chain.get_transaction_count(from, BlockId::latest()).await?,
            };
            if nonce != queued.nonce() {
                debug!(%from, old = queued.nonce(), new = nonce, "Renumbering transaction");
                queued.transaction.body.set_nonce(nonce);
                changed = true;
            }
        }

        last_nonce.insert(from, queued.nonce());
        if index >= prepend_len {
            fixed.push(queued);
        }
    }

    Ok(if changed { NonceFix::Fixed(fixed) } else { NonceFix::Unchanged })
}

/// Removes the user transaction `index` and decrements the nonce of every later renumberable
/// transaction of the same sender.
pub fn remove_and_renumber(
    mut transactions: Vec<QueuedTransaction>,
    index: usize,
) -> Vec<QueuedTransaction> {
    let removed = transactions.remove(index);
    for tx in transactions.iter_mut().skip(index) {
        if tx.from() == removed.from() && tx.original_request_parameters.is_renumberable() {
            let nonce = tx.nonce().saturating_sub(1);
            tx.transaction.body.set_nonce(nonce);
        }
    }
    transactions
}
