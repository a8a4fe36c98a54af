//! Synthetic Block Builder.
//!
//! Node-shaped views of the block that would follow the parent if the queue was included in it.
//! Several fields are approximations: the hash is derived from the time the simulation ran, the
//! timestamp assumes a fixed block time and there is no state root.

use super::{fees::next_block_base_fee, identity::provisional_signature};
use crate::{
    constants::SIMULATED_BLOCK_TIME,
    types::{SimulatedTransaction, SimulationState, TransactionBody},
};
use alloy::{
    consensus::{
        Eip658Value, Header as ConsensusHeader, Receipt, ReceiptEnvelope, ReceiptWithBloom,
        Signed, TxEnvelope, transaction::Recovered,
    },
    primitives::{Address, B256, Bloom, U256},
    rpc::types::{Block, BlockTransactions, Header, Log, Transaction, TransactionReceipt},
};

/// Hash of the synthetic block.
///
/// The time the simulation ran, in milliseconds, as a 256 bit integer. Two simulations run at
/// different times never share a hash while a state served again keeps its hash. Clock skew can
/// make hashes collide.
pub fn simulated_block_hash(state: &SimulationState) -> B256 {
    let millis = state.simulation_conducted_timestamp.timestamp_millis().max(0) as u64;
    B256::from(U256::from(millis))
}

/// Timestamp of the synthetic block.
pub const fn simulated_block_timestamp(state: &SimulationState) -> u64 {
    state.block_timestamp + SIMULATED_BLOCK_TIME
}

/// Gas used by all simulated transactions.
pub fn simulated_gas_used(state: &SimulationState) -> u64 {
    state.simulated_transactions.iter().map(|tx| tx.batch_call_result.gas_used()).sum()
}

/// Logs of the synthetic block, in execution order.
pub fn simulated_logs(state: &SimulationState) -> Vec<Log> {
    let block_hash = simulated_block_hash(state);
    let mut log_index = 0;
    let mut logs = Vec::new();
    for (index, tx) in state.simulated_transactions.iter().enumerate() {
        for inner in tx.batch_call_result.logs() {
            logs.push(Log {
                inner: inner.clone(),
                block_hash: Some(block_hash),
                block_number: Some(state.simulated_block_number()),
                block_timestamp: Some(simulated_block_timestamp(state)),
                transaction_hash: Some(tx.hash()),
                transaction_index: Some(index as u64),
                log_index: Some(log_index),
                removed: false,
            });
            log_index += 1;
        }
    }
    logs
}

/// The synthetic block, with full transactions if `full` is set.
pub fn simulated_block(state: &SimulationState, full: bool) -> Block {
    let mut logs_bloom = Bloom::default();
    for tx in &state.simulated_transactions {
        for log in tx.batch_call_result.logs() {
            logs_bloom.accrue_log(log);
        }
    }

    let hash = simulated_block_hash(state);
    let header = Header {
        hash,
        inner: ConsensusHeader {
            parent_hash: state.block_hash,
            number: state.simulated_block_number(),
            timestamp: simulated_block_timestamp(state),
            gas_limit: state.block_gas_limit,
            gas_used: simulated_gas_used(state),
            base_fee_per_gas: Some(next_block_base_fee(&state.parent()) as u64),
            logs_bloom,
            ..Default::default()
        },
        total_difficulty: None,
        size: None,
    };

    let transactions = if full {
        BlockTransactions::Full(
            (0..state.simulated_transactions.len())
                .filter_map(|index| simulated_transaction(state, index))
                .collect(),
        )
    } else {
        BlockTransactions::Hashes(state.simulated_transactions.iter().map(|tx| tx.hash()).collect())
    };

    Block { header, uncles: Vec::new(), transactions, withdrawals: None }
}

/// The transaction at `index` as included in the synthetic block.
///
/// It carries the provisional signature its identity was stamped with.
pub fn simulated_transaction(state: &SimulationState, index: usize) -> Option<Transaction> {
    let tx = state.simulated_transactions.get(index)?;
    let signed = &tx.signed_transaction;
    let hash = signed.hash();
    let signature = provisional_signature(signed.from());
    let envelope = match signed.body().clone() {
        TransactionBody::Legacy(body) => {
            TxEnvelope::Legacy(Signed::new_unchecked(body, signature, hash))
        }
        TransactionBody::Eip2930(body) => {
            TxEnvelope::Eip2930(Signed::new_unchecked(body, signature, hash))
        }
        TransactionBody::Eip1559(body) => {
            TxEnvelope::Eip1559(Signed::new_unchecked(body, signature, hash))
        }
    };

    Some(Transaction {
        inner: Recovered::new_unchecked(envelope, signed.from()),
        block_hash: Some(simulated_block_hash(state)),
        block_number: Some(state.simulated_block_number()),
        transaction_index: Some(index as u64),
        effective_gas_price: Some(tx.realized_gas_price),
    })
}

/// Receipt of the transaction at `index` in the synthetic block.
pub fn simulated_receipt(state: &SimulationState, index: usize) -> Option<TransactionReceipt> {
    let tx = state.simulated_transactions.get(index)?;
    let cumulative_gas_used = state.simulated_transactions[..=index]
        .iter()
        .map(|tx| tx.batch_call_result.gas_used())
        .sum();

    let first_log_index = state.simulated_transactions[..index]
        .iter()
        .map(|tx| tx.batch_call_result.logs().len())
        .sum::<usize>();
    let logs = simulated_logs(state)
        .into_iter()
        .skip(first_log_index)
        .take(tx.batch_call_result.logs().len())
        .collect::<Vec<_>>();

    let mut logs_bloom = Bloom::default();
    for log in tx.batch_call_result.logs() {
        logs_bloom.accrue_log(log);
    }

    let receipt = ReceiptWithBloom {
        receipt: Receipt {
            status: Eip658Value::Eip658(tx.batch_call_result.is_success()),
            cumulative_gas_used,
            logs,
        },
        logs_bloom,
    };
    let body = tx.signed_transaction.body();
    let inner = match body {
        TransactionBody::Legacy(_) => ReceiptEnvelope::Legacy(receipt),
        TransactionBody::Eip2930(_) => ReceiptEnvelope::Eip2930(receipt),
        TransactionBody::Eip1559(_) => ReceiptEnvelope::Eip1559(receipt),
    };

    Some(TransactionReceipt {
        inner,
        transaction_hash: tx.hash(),
        transaction_index: Some(index as u64),
        block_hash: Some(simulated_block_hash(state)),
        block_number: Some(state.simulated_block_number()),
        gas_used: tx.batch_call_result.gas_used(),
        effective_gas_price: tx.realized_gas_price,
        blob_gas_used: None,
        blob_gas_price: None,
        from: tx.signed_transaction.from(),
        to: body.to(),
        contract_address: body
            .kind()
            .is_create()
            .then(|| tx.signed_transaction.from().create(body.nonce())),
    })
}

/// Index of the simulated transaction with `hash`.
pub fn simulated_transaction_index(state: &SimulationState, hash: B256) -> Option<usize> {
    state.transaction_by_hash(hash).map(|(index, _)| index)
}

/// Simulated transactions sent by `sender`.
pub fn transactions_from(
    state: &SimulationState,
    sender: Address,
) -> impl Iterator<Item = &SimulatedTransaction> {
    state.simulated_transactions.iter().filter(move |tx| tx.signed_transaction.from() == sender)
}
