//! Shared fixtures for the simulation integration tests.
#![allow(dead_code)]

mod chain;
pub use chain::*;

use alloy::{
    consensus::TxEip1559,
    network::TransactionBuilder,
    primitives::{Address, Bytes, ChainId, TxKind, U256, address},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use chrono::Utc;
use simstate::{
    chain::ChainClient,
    simulation::{
        BatchExecutor, QueryRouter, QueueManager, SimulationService, SimulationServiceHandle,
    },
    types::{
        BalanceKey, IERC20, OriginalRequest, QueuedTransaction, SimulatedTransaction,
        TransactionBody, TransactionId, UnsignedTransaction, Website,
    },
};
use std::sync::Arc;

pub const CHAIN_ID: ChainId = 31337;
pub const ALICE: Address = address!("1111111111111111111111111111111111111111");
pub const BOB: Address = address!("2222222222222222222222222222222222222222");
pub const CAROL: Address = address!("3333333333333333333333333333333333333333");
pub const TOKEN: Address = address!("4444444444444444444444444444444444444444");

pub const GWEI: u128 = 1_000_000_000;
pub const ETHER: u64 = 1_000_000_000_000_000_000;

pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(ETHER)
}

/// A mock chain together with a queue manager on top of it.
pub struct Setup {
    pub chain: Arc<MockChain>,
    pub manager: QueueManager,
}

impl Setup {
    pub fn new() -> Self {
        let chain = Arc::new(MockChain::new(CHAIN_ID));
        let client = ChainClient::new(chain.clone());
        let manager = QueueManager::new(BatchExecutor::new(client, false));
        Self { chain, manager }
    }

    /// Spawns the simulation service for this setup.
    pub fn spawn(&self) -> SimulationServiceHandle {
        SimulationService::spawn(self.manager.clone())
    }

    /// Spawns the simulation service and a router on top of it.
    pub fn spawn_router(&self) -> (SimulationServiceHandle, QueryRouter) {
        let service = self.spawn();
        (service.clone(), QueryRouter::new(service, 25))
    }
}

fn queued(id: u64, from: Address, body: TxEip1559, request: OriginalRequest) -> QueuedTransaction {
    QueuedTransaction {
        transaction: UnsignedTransaction { from, body: TransactionBody::Eip1559(body) },
        website: Website {
            website_origin: "https://app.example".to_string(),
            ..Default::default()
        },
        created: Utc::now(),
        original_request_parameters: request,
        transaction_identifier: TransactionId(id),
    }
}

fn body(nonce: u64, to: Address, value: U256, input: Bytes) -> TxEip1559 {
    TxEip1559 {
        chain_id: CHAIN_ID,
        nonce,
        gas_limit: 100_000,
        max_fee_per_gas: 100 * GWEI,
        max_priority_fee_per_gas: GWEI,
        to: TxKind::Call(to),
        value,
        input,
        ..Default::default()
    }
}

fn send_request(from: Address, to: Address, value: U256, input: &Bytes) -> OriginalRequest {
    OriginalRequest::Send(
        TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(input.clone()),
    )
}

/// A renumberable native transfer.
pub fn native_transfer(
    id: u64,
    from: Address,
    nonce: u64,
    to: Address,
    value: U256,
) -> QueuedTransaction {
    let input = Bytes::new();
    queued(id, from, body(nonce, to, value, input.clone()), send_request(from, to, value, &input))
}

/// A renumberable ERC-20 transfer of [`TOKEN`].
pub fn token_transfer(
    id: u64,
    from: Address,
    nonce: u64,
    to: Address,
    amount: u64,
) -> QueuedTransaction {
    let input: Bytes = IERC20::transferCall { to, amount: U256::from(amount) }.abi_encode().into();
    queued(
        id,
        from,
        body(nonce, TOKEN, U256::ZERO, input.clone()),
        send_request(from, TOKEN, U256::ZERO, &input),
    )
}

/// A native transfer that was signed by the user and may not be renumbered.
pub fn raw_transfer(
    id: u64,
    from: Address,
    nonce: u64,
    to: Address,
    value: U256,
) -> QueuedTransaction {
    let raw = OriginalRequest::Raw(Bytes::from_static(&[0x02]));
    queued(id, from, body(nonce, to, value, Bytes::new()), raw)
}

/// Balance of `key` tracked right after `tx`.
pub fn balance_after(tx: &SimulatedTransaction, key: BalanceKey) -> Option<U256> {
    tx.token_balances_after.iter().rev().find(|balance| balance.key() == key)?.balance
}
