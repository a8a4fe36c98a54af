//! Batch Executor.

use super::{fees::next_block_base_fee, signatures::extend_with_signature_overrides};
use crate::{
    chain::ChainClient,
    constants::AUXILIARY_CALLER,
    error::{IntegrityError, SimulationError},
    types::{BatchCallResult, ParentBlock, ProvisionalTransaction, SignedMessage},
};
use alloy::{
    eips::BlockId,
    network::TransactionBuilder,
    primitives::U256,
    rpc::types::{
        TransactionRequest,
        simulate::{SimBlock, SimulatePayload},
        state::StateOverride,
    },
};
use tracing::{instrument, trace};

/// Executes ordered batches of transactions on top of a parent block via `eth_simulateV1`.
///
/// Signed messages are co-executed through ecrecover overrides. Execution failures of single
/// calls are returned as [`BatchCallResult::Failure`], never as errors.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    chain: ChainClient,
    validation: bool,
}

impl BatchExecutor {
    /// Creates a new executor.
    ///
    /// With `validation` enabled the node checks nonces, fees and balances of every call.
    pub const fn new(chain: ChainClient, validation: bool) -> Self {
        Self { chain, validation }
    }

    /// The chain client used for execution.
    pub const fn chain(&self) -> &ChainClient {
        &self.chain
    }

    /// Executes `transactions` in order on top of `parent`.
    ///
    /// Returns exactly one result per transaction.
    #[instrument(skip_all, fields(
        parent = parent.number,
        transactions = transactions.len(),
        messages = signed_messages.len()
    ))]
    pub async fn execute(
        &self,
        parent: &ParentBlock,
        transactions: &[ProvisionalTransaction],
        signed_messages: &[SignedMessage],
        overrides: Option<StateOverride>,
    ) -> Result<Vec<BatchCallResult>, SimulationError> {
        let calls = transactions.iter().map(|tx| tx.body().to_request(tx.from())).collect();
        self.run(parent, calls, signed_messages, overrides.unwrap_or_default()).await
    }

    /// Executes `transactions` followed by the auxiliary `call`, and returns the result of `call`.
    ///
    /// `call` is sent from [`AUXILIARY_CALLER`] unless it sets a sender. Without a gas limit it
    /// gets the gas left in the simulated block.
    #[instrument(skip_all, fields(parent = parent.number, transactions = transactions.len()))]
    pub async fn execute_with_call(
        &self,
        parent: &ParentBlock,
        transactions: &[ProvisionalTransaction],
        signed_messages: &[SignedMessage],
        call: TransactionRequest,
        overrides: Option<StateOverride>,
    ) -> Result<BatchCallResult, SimulationError> {
        let mut overrides = overrides.unwrap_or_default();
        let call = self.auxiliary_request(parent, call, &mut overrides);

        let mut calls: Vec<_> =
            transactions.iter().map(|tx| tx.body().to_request(tx.from())).collect();
        calls.push(call);

        let mut results = self.run(parent, calls, signed_messages, overrides).await?;
        results.pop().ok_or_else(|| IntegrityError::EmptySimulation.into())
    }

    /// Fills the sender, gas and fees of an auxiliary call.
    ///
    /// With validation enabled the call pays the base fee of the simulated block, so its sender
    /// is funded through `overrides` unless the caller overrode it already.
    fn auxiliary_request(
        &self,
        parent: &ParentBlock,
        mut call: TransactionRequest,
        overrides: &mut StateOverride,
    ) -> TransactionRequest {
        let from = *call.from.get_or_insert(AUXILIARY_CALLER);
        let gas = call.gas.unwrap_or(parent.gas_limit);
        call.nonce = None;

        if self.validation && call.gas_price.is_none() && call.max_fee_per_gas.is_none() {
            let base_fee = next_block_base_fee(parent);
            call.set_max_fee_per_gas(base_fee);
            call.set_max_priority_fee_per_gas(0);

            let funds = U256::from(base_fee) * U256::from(gas)
                + call.value.unwrap_or_default();
            overrides.entry(from).or_default().balance.get_or_insert(funds);
        }
        call
    }

    async fn run(
        &self,
        parent: &ParentBlock,
        calls: Vec<TransactionRequest>,
        signed_messages: &[SignedMessage],
        mut overrides: StateOverride,
    ) -> Result<Vec<BatchCallResult>, SimulationError> {
        extend_with_signature_overrides(&mut overrides, signed_messages)?;

        let expected = calls.len();
        let payload = SimulatePayload {
            block_state_calls: vec![SimBlock {
                block_overrides: None,
                state_overrides: (!overrides.is_empty()).then_some(overrides),
                calls,
            }],
            trace_transfers: true,
            validation: self.validation,
            return_full_transactions: false,
        };

        let block = self
            .chain
            .simulate(&payload, BlockId::number(parent.number))
            .await?
            .pop()
            .ok_or(IntegrityError::EmptySimulation)?;

        if block.calls.len() != expected {
            return Err(IntegrityError::BatchLengthMismatch {
                expected,
                actual: block.calls.len(),
            }
            .into());
        }

        trace!(gas_used = block.inner.header.gas_used, "Executed batch");
        Ok(block.calls.into_iter().map(BatchCallResult::from).collect())
    }
}
