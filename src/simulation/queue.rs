//! Transaction Queue Manager.
//!
//! Every operation takes a [`SimulationState`] and returns a new one, the previous state is never
//! touched. Failed recomputes therefore leave the last committed state intact.

use super::{
    BalanceTracker, BatchExecutor,
    fees::{next_block_base_fee, realized_gas_price},
    identity::stamp_provisional_identity,
    nonce::{NonceFix, fix_nonces, remove_and_renumber},
};
use crate::{
    chain::ChainClient,
    error::SimulationError,
    types::{
        MessageId, ParentBlock, ProvisionalTransaction, QueuedTransaction, SignedMessage,
        SimulatedTransaction, SimulationState, TransactionBody, TransactionId,
    },
};
use alloy::primitives::ChainId;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

/// Owns all transitions of [`SimulationState`].
#[derive(Debug, Clone)]
pub struct QueueManager {
    executor: BatchExecutor,
    balances: BalanceTracker,
}

impl QueueManager {
    /// Creates a new queue manager executing through `executor`.
    pub fn new(executor: BatchExecutor) -> Self {
        Self { balances: BalanceTracker::new(executor.clone()), executor }
    }

    /// The chain client states are built against.
    pub const fn chain(&self) -> &ChainClient {
        self.executor.chain()
    }

    /// The executor used for recomputes.
    pub const fn executor(&self) -> &BatchExecutor {
        &self.executor
    }

    /// Returns `state` if it was built for `chain_id`.
    fn reusable(state: Option<&SimulationState>, chain_id: ChainId) -> Option<&SimulationState> {
        match state {
            Some(state) if state.chain_id != chain_id => {
                warn!(state = state.chain_id, live = chain_id, "Discarding state of another chain");
                None
            }
            state => state,
        }
    }

    /// A state without transactions on top of the latest block.
    pub async fn empty_state(
        &self,
        prepend_transactions_queue: Vec<QueuedTransaction>,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        let parent = ParentBlock::from_block(&*self.chain().latest_block().await?)?;
        Ok(Self::empty_state_on(parent, chain_id, prepend_transactions_queue))
    }

    fn empty_state_on(
        parent: ParentBlock,
        chain_id: ChainId,
        prepend_transactions_queue: Vec<QueuedTransaction>,
    ) -> SimulationState {
        SimulationState {
            prepend_transactions_queue,
            simulated_transactions: Vec::new(),
            signed_messages: Vec::new(),
            block_number: parent.number,
            block_timestamp: parent.timestamp,
            block_hash: parent.hash,
            block_gas_used: parent.gas_used,
            block_gas_limit: parent.gas_limit,
            block_base_fee_per_gas: parent.base_fee_per_gas,
            chain_id,
            simulation_conducted_timestamp: Utc::now(),
        }
    }

    /// Executes the prepend queue followed by `transactions` on top of the latest block and
    /// derives the balances after every transaction.
    #[instrument(skip_all, fields(
        prepend = prepend_transactions_queue.len(),
        transactions = transactions.len(),
        messages = signed_messages.len()
    ))]
    async fn recompute(
        &self,
        prepend_transactions_queue: Vec<QueuedTransaction>,
        transactions: Vec<QueuedTransaction>,
        signed_messages: Vec<SignedMessage>,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        let parent = ParentBlock::from_block(&*self.chain().latest_block().await?)?;

        let queue =
            prepend_transactions_queue.iter().cloned().chain(transactions).collect::<Vec<_>>();
        let stamped = queue
            .iter()
            .map(|tx| stamp_provisional_identity(tx.transaction.clone()))
            .collect::<Vec<ProvisionalTransaction>>();

        let results = self.executor.execute(&parent, &stamped, &signed_messages, None).await?;
        let balances =
            self.balances.balances_after_each(&parent, &stamped, &results, &signed_messages).await?;

        let simulated_transactions = queue
            .into_iter()
            .zip(stamped)
            .zip(results.into_iter().zip(balances))
            .map(|((queued, signed_transaction), (batch_call_result, token_balances_after))| {
                SimulatedTransaction {
                    realized_gas_price: realized_gas_price(signed_transaction.body(), &parent),
                    signed_transaction,
                    batch_call_result,
                    token_balances_after,
                    website: queued.website,
                    created: queued.created,
                    original_request_parameters: queued.original_request_parameters,
                    transaction_identifier: queued.transaction_identifier,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            block = parent.number,
            failed = simulated_transactions
                .iter()
                .filter(|tx| !tx.batch_call_result.is_success())
                .count(),
            "Recomputed simulation"
        );

        Ok(SimulationState {
            simulated_transactions,
            signed_messages,
            ..Self::empty_state_on(parent, chain_id, prepend_transactions_queue)
        })
    }

    /// Appends `transaction` to the queue and executes the whole batch again.
    ///
    /// Balances after every transaction are recomputed, not only the new one.
    pub async fn append_transaction(
        &self,
        state: Option<&SimulationState>,
        transaction: QueuedTransaction,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        let state = Self::reusable(state, chain_id);

        let mut transactions =
            state.map(SimulationState::queued_user_transactions).unwrap_or_default();
        transactions.push(transaction);

        self.recompute(
            state.map(|state| state.prepend_transactions_queue.clone()).unwrap_or_default(),
            transactions,
            state.map(|state| state.signed_messages.clone()).unwrap_or_default(),
        )
        .await
    }

    /// Replaces the user transactions and signed messages.
    ///
    /// Without any prepend transaction, user transaction or message the result is an empty state
    /// on the latest block, and nothing is executed.
    pub async fn set_simulation_transactions_and_signed_messages(
        &self,
        state: Option<&SimulationState>,
        transactions: Vec<QueuedTransaction>,
        signed_messages: Vec<SignedMessage>,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        let prepend = Self::reusable(state, chain_id)
            .map(|state| state.prepend_transactions_queue.clone())
            .unwrap_or_default();

        if prepend.is_empty() && transactions.is_empty() && signed_messages.is_empty() {
            debug!("Nothing to simulate");
            return self.empty_state(prepend).await;
        }

        self.recompute(prepend, transactions, signed_messages).await
    }

    /// Removes the user transaction `id` and decrements the nonce of later transactions of the same
    /// sender.
    ///
    /// Returns `state` unchanged if no user transaction has this id. Prepend transactions cannot be
    /// removed.
    pub async fn remove_transaction_and_update_transaction_nonces(
        &self,
        state: &SimulationState,
        id: TransactionId,
    ) -> Result<SimulationState, SimulationError> {
        let transactions = state.queued_user_transactions();
        let Some(index) = transactions.iter().position(|tx| tx.transaction_identifier == id) else {
            debug!(?id, "Transaction not found");
            return Ok(state.clone());
        };

        let transactions = remove_and_renumber(transactions, index);
        self.set_simulation_transactions_and_signed_messages(
            Some(state),
            transactions,
            state.signed_messages.clone(),
        )
        .await
    }

    /// Removes the signed message `id`.
    ///
    /// Returns `state` unchanged if no message has this id.
    pub async fn remove_signed_message_from_simulation(
        &self,
        state: &SimulationState,
        id: MessageId,
    ) -> Result<SimulationState, SimulationError> {
        if !state.signed_messages.iter().any(|message| message.message_identifier == id) {
            debug!(?id, "Signed message not found");
            return Ok(state.clone());
        }

        let signed_messages = state
            .signed_messages
            .iter()
            .filter(|message| message.message_identifier != id)
            .cloned()
            .collect();
        self.set_simulation_transactions_and_signed_messages(
            Some(state),
            state.queued_user_transactions(),
            signed_messages,
        )
        .await
    }

    /// Brings `state` onto the latest block.
    ///
    /// Returns `state` unchanged if the live chain differs from the chain of the state, and only
    /// bumps the timestamp if no new block was produced. Otherwise reconciles nonces, raises max
    /// fees that fell below twice the new base fee, and executes the batch again.
    #[instrument(skip_all, fields(block = state.block_number))]
    pub async fn refresh_simulation_state(
        &self,
        state: &SimulationState,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        if chain_id != state.chain_id {
            warn!(state = state.chain_id, live = chain_id, "Not refreshing state of another chain");
            return Ok(state.clone());
        }

        let block = self.chain().refresh_latest_block().await?;
        if block.header.number == state.block_number {
            return Ok(SimulationState {
                simulation_conducted_timestamp: Utc::now(),
                ..state.clone()
            });
        }
        let parent = ParentBlock::from_block(&block)?;
        info!(from = state.block_number, to = parent.number, "Refreshing simulation");

        let transactions = match fix_nonces(self.chain(), state).await? {
            NonceFix::Fixed(transactions) => transactions,
            NonceFix::Unchanged => state.queued_user_transactions(),
        };
        let transactions = raise_max_fees(transactions, next_block_base_fee(&parent));

        self.set_simulation_transactions_and_signed_messages(
            Some(state),
            transactions,
            state.signed_messages.clone(),
        )
        .await
    }

    /// Replaces the prepend queue, keeping user transactions and signed messages.
    pub async fn set_prepend_transactions_queue(
        &self,
        state: Option<&SimulationState>,
        prepend_transactions_queue: Vec<QueuedTransaction>,
    ) -> Result<SimulationState, SimulationError> {
        let chain_id = self.chain().chain_id().await?;
        let state = Self::reusable(state, chain_id);

        let mut fresh = self.empty_state(prepend_transactions_queue).await?;
        if let Some(state) = state {
            fresh.signed_messages = state.signed_messages.clone();
        }
        let transactions = state.map(SimulationState::queued_user_transactions).unwrap_or_default();
        let signed_messages = fresh.signed_messages.clone();

        self.set_simulation_transactions_and_signed_messages(
            Some(&fresh),
            transactions,
            signed_messages,
        )
        .await
    }

    /// Runs the nonce reconciler on `state`.
    pub async fn fix_nonces(&self, state: &SimulationState) -> Result<NonceFix, SimulationError> {
        fix_nonces(self.chain(), state).await
    }
}

/// Raises the max fee of renumberable EIP-1559 transactions without an explicit max fee to
/// `2 * base_fee + max_priority_fee_per_gas` if it is below `2 * base_fee`.
pub fn raise_max_fees(
    mut transactions: Vec<QueuedTransaction>,
    base_fee: u128,
) -> Vec<QueuedTransaction> {
    let floor = base_fee.saturating_mul(2);
    for tx in &mut transactions {
        let request = &tx.original_request_parameters;
        if !request.is_renumberable() || request.has_explicit_max_fee() {
            continue;
        }
        if let TransactionBody::Eip1559(body) = &mut tx.transaction.body
            && body.max_fee_per_gas < floor
        {
            body.max_fee_per_gas = floor.saturating_add(body.max_priority_fee_per_gas);
        }
    }
    transactions
}
