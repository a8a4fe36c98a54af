//! Query Router.
//!
//! Answers node queries either from the real chain or from the synthetic block of the committed
//! simulation. Queries are simulated only if a non-empty simulation exists and they target
//! `latest`, `pending` or a block after the simulation's parent.

use super::{
    SimulationServiceHandle,
    block::{
        simulated_block, simulated_block_hash, simulated_logs, simulated_receipt,
        simulated_transaction, simulated_transaction_index, transactions_from,
    },
    signatures::code_reader_override,
};
use crate::{
    constants::CODE_READER_ADDRESS,
    error::{IntegrityError, SimulationError},
    types::{BalanceKey, BatchCallResult, ParentBlock, ProvisionalTransaction, SimulationState},
};
use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    network::TransactionBuilder,
    primitives::{Address, Bytes, ChainId, TxHash, U256},
    rpc::types::{
        Block, Filter, FilterBlockOption, Log, Transaction, TransactionReceipt,
        TransactionRequest,
    },
};
use std::sync::Arc;
use tracing::{instrument, trace};

/// Whether `block` refers to the synthetic block following the parent of `state`.
pub fn targets_simulation(state: &SimulationState, block: BlockId) -> bool {
    match block {
        BlockId::Number(BlockNumberOrTag::Latest | BlockNumberOrTag::Pending) => true,
        BlockId::Number(BlockNumberOrTag::Number(number)) => number > state.block_number,
        BlockId::Number(_) => false,
        BlockId::Hash(hash) => hash.block_hash == simulated_block_hash(state),
    }
}

/// Whether `log` matches the address and topic criteria of `filter`.
pub fn log_matches(filter: &Filter, log: &alloy::primitives::Log) -> bool {
    if !filter.address.matches(&log.address) {
        return false;
    }
    let topics = log.topics();
    filter.topics.iter().enumerate().all(|(index, topic)| {
        topic.is_empty() || topics.get(index).is_some_and(|value| topic.matches(value))
    })
}

/// Turns the result of an auxiliary call into its return data.
fn into_output(result: BatchCallResult) -> Result<(u64, Bytes), SimulationError> {
    match result {
        BatchCallResult::Success { gas_used, return_data, .. } => Ok((gas_used, return_data)),
        BatchCallResult::Failure { error, return_data, .. } => Err(SimulationError::Reverted {
            reason: error.decoded_message.or(Some(error.message)),
            data: return_data,
        }),
    }
}

/// Routes node queries between the chain and the simulation.
#[derive(Debug, Clone)]
pub struct QueryRouter {
    service: SimulationServiceHandle,
    gas_estimate_margin: u64,
}

impl QueryRouter {
    /// Creates a new router reading the state committed by `service`.
    ///
    /// Gas estimates on top of the simulation get `gas_estimate_margin` percent added.
    pub const fn new(service: SimulationServiceHandle, gas_estimate_margin: u64) -> Self {
        Self { service, gas_estimate_margin }
    }

    /// The committed simulation, if it is not empty.
    fn active_simulation(&self) -> Option<Arc<SimulationState>> {
        self.service.current_state().filter(|state| !state.is_empty())
    }

    /// The committed simulation, if `block` should be answered from it.
    fn simulation_for(&self, block: BlockId) -> Option<Arc<SimulationState>> {
        self.active_simulation().filter(|state| targets_simulation(state, block))
    }

    fn provisional_transactions(state: &SimulationState) -> Vec<ProvisionalTransaction> {
        state.simulated_transactions.iter().map(|tx| tx.signed_transaction.clone()).collect()
    }

    /// Executes `call` after the queue, or alone on top of `block` without a simulation.
    async fn auxiliary_call(
        &self,
        call: TransactionRequest,
        block: BlockId,
        overrides: Option<alloy::rpc::types::state::StateOverride>,
    ) -> Result<(BatchCallResult, u64), SimulationError> {
        let executor = self.service.manager().executor().clone();
        if let Some(state) = self.simulation_for(block) {
            let result = executor
                .execute_with_call(
                    &state.parent(),
                    &Self::provisional_transactions(&state),
                    &state.signed_messages,
                    call,
                    overrides,
                )
                .await?;
            return Ok((result, state.block_gas_limit));
        }

        let parent = executor
            .chain()
            .get_block(block, false)
            .await?
            .ok_or(IntegrityError::MissingBlock(block))?;
        let parent = ParentBlock::from_block(&parent)?;
        let result = executor.execute_with_call(&parent, &[], &[], call, overrides).await?;
        Ok((result, parent.gas_limit))
    }

    /// Native balance of `address`.
    ///
    /// On the simulation this is the balance after the last queued transaction that touched
    /// `address`. It is the balance at the parent block if no transaction touched it, or if the
    /// last read failed.
    #[instrument(skip(self))]
    pub async fn get_balance(
        &self,
        address: Address,
        block: BlockId,
    ) -> Result<U256, SimulationError> {
        let Some(state) = self.simulation_for(block) else {
            return Ok(self.service.chain().get_balance(address, block).await?);
        };

        let key = BalanceKey::native(address);
        let tracked = state.simulated_transactions.iter().rev().find_map(|tx| {
            tx.token_balances_after.iter().rev().find(|balance| balance.key() == key)
        });
        if let Some(balance) = tracked.and_then(|tracked| tracked.balance) {
            trace!(%address, %balance, "Serving simulated balance");
            return Ok(balance);
        }

        Ok(self.service.chain().get_balance(address, BlockId::number(state.block_number)).await?)
    }

    /// Code of `address`, read after the queue through the code reader helper.
    #[instrument(skip(self))]
    pub async fn get_code(
        &self,
        address: Address,
        block: BlockId,
    ) -> Result<Bytes, SimulationError> {
        if self.simulation_for(block).is_none() {
            return Ok(self.service.chain().get_code(address, block).await?);
        }

        let call = TransactionRequest::default()
            .with_to(CODE_READER_ADDRESS)
            .with_input(address.into_word().to_vec());
        let (result, _) = self.auxiliary_call(call, block, Some(code_reader_override())).await?;
        into_output(result).map(|(_, code)| code)
    }

    /// Nonce of `address`.
    ///
    /// On the simulation this is the nonce at the parent block plus the number of queued
    /// transactions sent by `address`.
    #[instrument(skip(self))]
    pub async fn get_transaction_count(
        &self,
        address: Address,
        block: BlockId,
    ) -> Result<u64, SimulationError> {
        let Some(state) = self.simulation_for(block) else {
            return Ok(self.service.chain().get_transaction_count(address, block).await?);
        };

        let on_chain = self
            .service
            .chain()
            .get_transaction_count(address, BlockId::number(state.block_number))
            .await?;
        Ok(on_chain + transactions_from(&state, address).count() as u64)
    }

    /// Logs matching `filter`, including logs of the synthetic block if the range covers it.
    #[instrument(skip_all)]
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, SimulationError> {
        let chain = self.service.chain();
        let Some(state) = self.active_simulation() else {
            return Ok(chain.get_logs(filter).await?);
        };
        let simulated = || -> Vec<Log> {
            simulated_logs(&state)
                .into_iter()
                .filter(|log| log_matches(filter, &log.inner))
                .collect()
        };

        let (from, to) = match &filter.block_option {
            FilterBlockOption::AtBlockHash(hash) => {
                if *hash == simulated_block_hash(&state) {
                    return Ok(simulated());
                }
                return Ok(chain.get_logs(filter).await?);
            }
            FilterBlockOption::Range { from_block, to_block } => (
                from_block.unwrap_or_default(),
                to_block.unwrap_or_default(),
            ),
        };
        if !targets_simulation(&state, to.into()) {
            return Ok(chain.get_logs(filter).await?);
        }

        let from_number = match from {
            BlockNumberOrTag::Latest | BlockNumberOrTag::Pending => state.simulated_block_number(),
            BlockNumberOrTag::Number(number) => number,
            BlockNumberOrTag::Earliest => 0,
            BlockNumberOrTag::Safe | BlockNumberOrTag::Finalized => state.block_number,
        };
        let mut logs = if from_number <= state.block_number {
            let real = filter.clone().to_block(state.block_number);
            chain.get_logs(&real).await?
        } else {
            Vec::new()
        };
        logs.extend(simulated());
        Ok(logs)
    }

    /// A block, the synthetic one if `block` targets the simulation.
    ///
    /// Numbers after the synthetic block do not exist yet.
    #[instrument(skip(self))]
    pub async fn get_block(
        &self,
        block: BlockId,
        full: bool,
    ) -> Result<Option<Block>, SimulationError> {
        if let Some(state) = self.simulation_for(block) {
            if let BlockId::Number(BlockNumberOrTag::Number(number)) = block
                && number != state.simulated_block_number()
            {
                return Ok(None);
            }
            return Ok(Some(simulated_block(&state, full)));
        }
        Ok(self.service.chain().get_block(block, full).await?)
    }

    /// Chain id of the connected chain.
    pub async fn chain_id(&self) -> Result<ChainId, SimulationError> {
        Ok(self.service.chain().chain_id().await?)
    }

    /// Number of the latest block, the synthetic one while a simulation is active.
    pub async fn get_block_number(&self) -> Result<u64, SimulationError> {
        if let Some(state) = self.active_simulation() {
            return Ok(state.simulated_block_number());
        }
        Ok(self.service.chain().get_block_number().await?)
    }

    /// Receipt of a simulated or mined transaction.
    #[instrument(skip(self))]
    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, SimulationError> {
        if let Some(state) = self.active_simulation()
            && let Some(index) = simulated_transaction_index(&state, hash)
        {
            return Ok(simulated_receipt(&state, index));
        }
        Ok(self.service.chain().get_transaction_receipt(hash).await?)
    }

    /// A simulated or mined transaction.
    #[instrument(skip(self))]
    pub async fn get_transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> Result<Option<Transaction>, SimulationError> {
        if let Some(state) = self.active_simulation()
            && let Some(index) = simulated_transaction_index(&state, hash)
        {
            return Ok(simulated_transaction(&state, index));
        }
        Ok(self.service.chain().get_transaction_by_hash(hash).await?)
    }

    /// Executes `call` and returns its output. Reverts are returned as
    /// [`SimulationError::Reverted`].
    #[instrument(skip_all)]
    pub async fn call(
        &self,
        call: TransactionRequest,
        block: BlockId,
    ) -> Result<Bytes, SimulationError> {
        let (result, _) = self.auxiliary_call(call, block, None).await?;
        into_output(result).map(|(_, output)| output)
    }

    /// Estimates the gas of `call`.
    ///
    /// Returns the gas used with the configured margin added, capped at the block gas limit.
    #[instrument(skip_all)]
    pub async fn estimate_gas(
        &self,
        call: TransactionRequest,
        block: BlockId,
    ) -> Result<u64, SimulationError> {
        let (result, gas_limit) = self.auxiliary_call(call, block, None).await?;
        let (gas_used, _) = into_output(result)?;
        Ok(gas_with_margin(gas_used, self.gas_estimate_margin).min(gas_limit))
    }
}

/// `gas_used` plus `margin` percent.
pub fn gas_with_margin(gas_used: u64, margin: u64) -> u64 {
    (gas_used as u128 * (100 + margin as u128) / 100).min(u64::MAX as u128) as u64
}
