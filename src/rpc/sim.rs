//! The `sim_` namespace.
//!
//! Mutations of the simulation queue, serialized by the
//! [`SimulationService`](crate::simulation::SimulationService).

use crate::{
    error::ToRpcResult,
    simulation::{SharedState, SimulationServiceHandle},
    types::{MessageId, QueuedTransaction, SignedMessage, SimulationState, TransactionId},
};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};

/// `sim_` RPC namespace.
#[rpc(server, namespace = "sim")]
pub trait SimApi {
    /// Returns the version of the service.
    #[method(name = "health", aliases = ["health"])]
    async fn health(&self) -> RpcResult<String>;

    /// Returns the current simulation, if any.
    #[method(name = "getState")]
    async fn get_state(&self) -> RpcResult<Option<SimulationState>>;

    /// Appends a transaction to the queue.
    #[method(name = "appendTransaction")]
    async fn append_transaction(
        &self,
        transaction: QueuedTransaction,
    ) -> RpcResult<Option<SimulationState>>;

    /// Replaces the user transactions and signed messages.
    #[method(name = "setTransactionsAndSignedMessages")]
    async fn set_transactions_and_signed_messages(
        &self,
        transactions: Vec<QueuedTransaction>,
        signed_messages: Vec<SignedMessage>,
    ) -> RpcResult<Option<SimulationState>>;

    /// Adds a signed message.
    #[method(name = "addSignedMessage")]
    async fn add_signed_message(
        &self,
        message: SignedMessage,
    ) -> RpcResult<Option<SimulationState>>;

    /// Removes a user transaction and renumbers later transactions of its sender.
    #[method(name = "removeTransaction")]
    async fn remove_transaction(&self, id: TransactionId) -> RpcResult<Option<SimulationState>>;

    /// Removes a signed message.
    #[method(name = "removeSignedMessage")]
    async fn remove_signed_message(&self, id: MessageId) -> RpcResult<Option<SimulationState>>;

    /// Moves the simulation onto the latest block.
    #[method(name = "refresh")]
    async fn refresh(&self) -> RpcResult<Option<SimulationState>>;

    /// Replaces the prepend queue.
    #[method(name = "setPrependTransactionsQueue")]
    async fn set_prepend_transactions_queue(
        &self,
        prepend: Vec<QueuedTransaction>,
    ) -> RpcResult<Option<SimulationState>>;

    /// Drops the current simulation.
    #[method(name = "reset")]
    async fn reset(&self) -> RpcResult<()>;
}

/// Implementation of the `sim_` namespace.
#[derive(Debug, Clone)]
pub struct SimRpc {
    service: SimulationServiceHandle,
}

impl SimRpc {
    /// Creates a new `sim_` namespace for `service`.
    pub const fn new(service: SimulationServiceHandle) -> Self {
        Self { service }
    }
}

fn snapshot(state: SharedState) -> Option<SimulationState> {
    state.as_deref().cloned()
}

#[async_trait]
impl SimApiServer for SimRpc {
    async fn health(&self) -> RpcResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    async fn get_state(&self) -> RpcResult<Option<SimulationState>> {
        Ok(snapshot(self.service.current_state()))
    }

    async fn append_transaction(
        &self,
        transaction: QueuedTransaction,
    ) -> RpcResult<Option<SimulationState>> {
        self.service.append_transaction(transaction).await.map(snapshot).to_rpc_result()
    }

    async fn set_transactions_and_signed_messages(
        &self,
        transactions: Vec<QueuedTransaction>,
        signed_messages: Vec<SignedMessage>,
    ) -> RpcResult<Option<SimulationState>> {
        self.service
            .set_simulation_transactions_and_signed_messages(transactions, signed_messages)
            .await
            .map(snapshot)
            .to_rpc_result()
    }

    async fn add_signed_message(
        &self,
        message: SignedMessage,
    ) -> RpcResult<Option<SimulationState>> {
        self.service.add_signed_message(message).await.map(snapshot).to_rpc_result()
    }

    async fn remove_transaction(&self, id: TransactionId) -> RpcResult<Option<SimulationState>> {
        self.service.remove_transaction(id).await.map(snapshot).to_rpc_result()
    }

    async fn remove_signed_message(&self, id: MessageId) -> RpcResult<Option<SimulationState>> {
        self.service.remove_signed_message(id).await.map(snapshot).to_rpc_result()
    }

    async fn refresh(&self) -> RpcResult<Option<SimulationState>> {
        self.service.refresh().await.map(snapshot).to_rpc_result()
    }

    async fn set_prepend_transactions_queue(
        &self,
        prepend: Vec<QueuedTransaction>,
    ) -> RpcResult<Option<SimulationState>> {
        self.service.set_prepend_transactions_queue(prepend).await.map(snapshot).to_rpc_result()
    }

    async fn reset(&self) -> RpcResult<()> {
        self.service.reset().await.to_rpc_result()
    }
}
