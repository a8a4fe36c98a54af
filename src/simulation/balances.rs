//! Balance-After Tracker.
//!
//! Finds every balance a transaction may have changed from the logs it emitted, and reads those
//! balances right after the transaction with a single `aggregate3` call appended to the queue
//! prefix ending at the transaction.

use super::BatchExecutor;
use crate::{
    constants::{ETH_ADDRESS, MULTICALL3_ADDRESS},
    error::SimulationError,
    types::{
        BalanceKey, BatchCallResult, IERC20, IERC1155, IMulticall3, IWETH, ParentBlock,
        ProvisionalTransaction, SignedMessage, TokenBalance,
    },
};
use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Log, U256},
    rpc::types::TransactionRequest,
    sol_types::{SolCall, SolEvent},
};
use futures_util::future::try_join_all;
use tracing::{instrument, warn};

/// Balances that may have changed because of a transaction sent by `sender` that emitted `logs`.
///
/// The sender's native balance always comes first since gas payment changes it without a log.
/// Candidates are not deduplicated.
pub fn balance_candidates(sender: Address, logs: &[Log]) -> Vec<BalanceKey> {
    let mut keys = vec![BalanceKey::native(sender)];
    for log in logs {
        let token = log.address;
        if let Ok(transfer) = IERC20::Transfer::decode_log(log) {
            if token == ETH_ADDRESS {
                keys.push(BalanceKey::native(transfer.from));
                keys.push(BalanceKey::native(transfer.to));
            } else {
                keys.push(BalanceKey::erc20(token, transfer.from));
                keys.push(BalanceKey::erc20(token, transfer.to));
            }
        } else if let Ok(approval) = IERC20::Approval::decode_log(log) {
            keys.push(BalanceKey::erc20(token, approval.owner));
        } else if let Ok(deposit) = IWETH::Deposit::decode_log(log) {
            keys.push(BalanceKey::erc20(token, deposit.dst));
        } else if let Ok(withdrawal) = IWETH::Withdrawal::decode_log(log) {
            keys.push(BalanceKey::erc20(token, withdrawal.src));
        } else if let Ok(transfer) = IERC1155::TransferSingle::decode_log(log) {
            keys.push(BalanceKey::erc1155(token, transfer.from, transfer.id));
            keys.push(BalanceKey::erc1155(token, transfer.to, transfer.id));
        } else if let Ok(transfer) = IERC1155::TransferBatch::decode_log(log) {
            for id in &transfer.ids {
                keys.push(BalanceKey::erc1155(token, transfer.from, *id));
                keys.push(BalanceKey::erc1155(token, transfer.to, *id));
            }
        }
    }
    keys
}

/// Call reading the balance of `key`.
fn balance_call(key: &BalanceKey) -> IMulticall3::Call3 {
    let (target, call_data) = if key.is_native() {
        (MULTICALL3_ADDRESS, IMulticall3::getEthBalanceCall { addr: key.owner }.abi_encode())
    } else if let Some(id) = key.token_id {
        (key.token, IERC1155::balanceOfCall { account: key.owner, id }.abi_encode())
    } else {
        (key.token, IERC20::balanceOfCall { owner: key.owner }.abi_encode())
    };
    IMulticall3::Call3 { target, allowFailure: true, callData: call_data.into() }
}

/// Decodes the balance returned for `key`, `None` if its sub-call failed.
fn decode_balance(key: &BalanceKey, result: &IMulticall3::Result) -> Option<U256> {
    if !result.success {
        return None;
    }
    if key.is_native() {
        IMulticall3::getEthBalanceCall::abi_decode_returns(&result.returnData).ok()
    } else if key.token_id.is_some() {
        IERC1155::balanceOfCall::abi_decode_returns(&result.returnData).ok()
    } else {
        IERC20::balanceOfCall::abi_decode_returns(&result.returnData).ok()
    }
}

/// Reads balances after prefixes of a simulation queue.
#[derive(Debug, Clone)]
pub struct BalanceTracker {
    executor: BatchExecutor,
}

impl BalanceTracker {
    /// Creates a new tracker executing through `executor`.
    pub const fn new(executor: BatchExecutor) -> Self {
        Self { executor }
    }

    /// Balances of `keys` right after executing `prefix` on top of `parent`.
    ///
    /// A key whose sub-call failed gets a `None` balance. If the aggregated call fails as a whole
    /// every balance is `None`.
    #[instrument(skip_all, fields(prefix = prefix.len(), keys = keys.len()))]
    pub async fn balances_after(
        &self,
        parent: &ParentBlock,
        prefix: &[ProvisionalTransaction],
        signed_messages: &[SignedMessage],
        keys: Vec<BalanceKey>,
    ) -> Result<Vec<TokenBalance>, SimulationError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let calls = keys.iter().map(balance_call).collect();
        let request = TransactionRequest::default()
            .with_to(MULTICALL3_ADDRESS)
            .with_input(IMulticall3::aggregate3Call { calls }.abi_encode());

        let result =
            self.executor.execute_with_call(parent, prefix, signed_messages, request, None).await?;

        let results = match &result {
            BatchCallResult::Success { return_data, .. } => {
                IMulticall3::aggregate3Call::abi_decode_returns(return_data)
                    .inspect_err(|err| warn!(%err, "Failed to decode balances"))
                    .ok()
            }
            BatchCallResult::Failure { error, .. } => {
                warn!(message = %error.message, "Balance aggregation failed");
                None
            }
        };

        Ok(match results {
            Some(results) if results.len() == keys.len() => keys
                .into_iter()
                .zip(&results)
                .map(|(key, result)| TokenBalance::new(key, decode_balance(&key, result)))
                .collect(),
            _ => keys.into_iter().map(|key| TokenBalance::new(key, None)).collect(),
        })
    }

    /// Balances after every transaction of `transactions`, given their execution `results`.
    ///
    /// Each transaction's balances are read after the prefix of the queue ending at it, so this
    /// runs one aggregated execution per transaction and re-executes the prefix every time,
    /// quadratic in the queue length. Reading all balances once after the whole queue would be
    /// cheaper but wrong for every transaction except the last.
    #[instrument(skip_all, fields(transactions = transactions.len()))]
    pub async fn balances_after_each(
        &self,
        parent: &ParentBlock,
        transactions: &[ProvisionalTransaction],
        results: &[BatchCallResult],
        signed_messages: &[SignedMessage],
    ) -> Result<Vec<Vec<TokenBalance>>, SimulationError> {
        try_join_all(transactions.iter().zip(results).enumerate().map(|(index, (tx, result))| {
            let keys = balance_candidates(tx.from(), result.logs());
            self.balances_after(parent, &transactions[..=index], signed_messages, keys)
        }))
        .await
    }
}
