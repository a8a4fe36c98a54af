//! The simulation state snapshot.

use super::{
    BatchCallResult, OriginalRequest, ProvisionalTransaction, QueuedTransaction, SignedMessage,
    TokenBalance, TransactionId, Website,
};
use crate::error::IntegrityError;
use alloy::{
    primitives::{B256, ChainId, TxHash},
    rpc::types::Block,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queued transaction after it was executed as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTransaction {
    /// The executed transaction.
    pub signed_transaction: ProvisionalTransaction,
    /// Outcome of the execution.
    pub batch_call_result: BatchCallResult,
    /// Gas price the transaction would pay in the simulated block.
    pub realized_gas_price: u128,
    /// Balances right after this transaction, in queue order.
    pub token_balances_after: Vec<TokenBalance>,
    /// Origin of the request.
    pub website: Website,
    /// When the request was received.
    pub created: DateTime<Utc>,
    /// Request as received.
    pub original_request_parameters: OriginalRequest,
    /// Caller supplied identifier.
    pub transaction_identifier: TransactionId,
}

impl SimulatedTransaction {
    /// Provisional hash of the transaction.
    pub const fn hash(&self) -> TxHash {
        self.signed_transaction.hash()
    }

    /// Turns the transaction back into a queue entry so it can be executed again.
    pub fn to_queued(&self) -> QueuedTransaction {
        QueuedTransaction {
            transaction: self.signed_transaction.clone().into_unsigned(),
            website: self.website.clone(),
            created: self.created,
            original_request_parameters: self.original_request_parameters.clone(),
            transaction_identifier: self.transaction_identifier,
        }
    }
}

/// The real block a simulation is executed on top of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentBlock {
    /// Block number.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Block hash.
    pub hash: B256,
    /// Gas used by the block.
    pub gas_used: u64,
    /// Gas limit of the block.
    pub gas_limit: u64,
    /// Base fee of the block.
    pub base_fee_per_gas: u128,
}

impl ParentBlock {
    /// Reads the parent fields of `block`.
    ///
    /// Fails for blocks without a base fee, simulations are only supported on EIP-1559 chains.
    pub fn from_block(block: &Block) -> Result<Self, IntegrityError> {
        let header = &block.header;
        let base_fee_per_gas =
            header.base_fee_per_gas.ok_or(IntegrityError::MissingBaseFee(header.number))?;
        Ok(Self {
            number: header.number,
            timestamp: header.timestamp,
            hash: header.hash,
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
            base_fee_per_gas: base_fee_per_gas as u128,
        })
    }
}

/// Immutable snapshot of a simulation layered on top of a real parent block.
///
/// Every mutation produces a new value. `simulated_transactions` always starts with the executed
/// form of `prepend_transactions_queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Transactions that always execute first.
    pub prepend_transactions_queue: Vec<QueuedTransaction>,
    /// Executed transactions, prepend queue first.
    pub simulated_transactions: Vec<SimulatedTransaction>,
    /// Messages treated as signed during execution.
    pub signed_messages: Vec<SignedMessage>,
    /// Number of the parent block.
    pub block_number: u64,
    /// Timestamp of the parent block.
    pub block_timestamp: u64,
    /// Hash of the parent block.
    pub block_hash: B256,
    /// Gas used by the parent block.
    pub block_gas_used: u64,
    /// Gas limit of the parent block.
    pub block_gas_limit: u64,
    /// Base fee of the parent block.
    pub block_base_fee_per_gas: u128,
    /// Chain the state was built against.
    pub chain_id: ChainId,
    /// When the batch was last executed.
    pub simulation_conducted_timestamp: DateTime<Utc>,
}

impl SimulationState {
    /// Whether no transaction is simulated.
    pub fn is_empty(&self) -> bool {
        self.simulated_transactions.is_empty()
    }

    /// Transactions appended by users, i.e. everything after the prepend queue.
    pub fn user_transactions(&self) -> &[SimulatedTransaction] {
        let start = self.prepend_transactions_queue.len().min(self.simulated_transactions.len());
        &self.simulated_transactions[start..]
    }

    /// User transactions turned back into queue entries.
    pub fn queued_user_transactions(&self) -> Vec<QueuedTransaction> {
        self.user_transactions().iter().map(SimulatedTransaction::to_queued).collect()
    }

    /// Finds a simulated transaction and its position by hash.
    pub fn transaction_by_hash(&self, hash: TxHash) -> Option<(usize, &SimulatedTransaction)> {
        self.simulated_transactions.iter().enumerate().find(|(_, tx)| tx.hash() == hash)
    }

    /// The parent block the state was executed on.
    pub const fn parent(&self) -> ParentBlock {
        ParentBlock {
            number: self.block_number,
            timestamp: self.block_timestamp,
            hash: self.block_hash,
            gas_used: self.block_gas_used,
            gas_limit: self.block_gas_limit,
            base_fee_per_gas: self.block_base_fee_per_gas,
        }
    }

    /// Number of the synthetic block that follows the parent.
    pub const fn simulated_block_number(&self) -> u64 {
        self.block_number + 1
    }
}
