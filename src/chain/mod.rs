//! Chain Read Client.
//!
//! [`ChainReader`] is the seam between the simulation and the real chain. [`RpcChainReader`]
//! forwards every method to a JSON-RPC node, and [`ChainClient`] layers the cached latest block
//! and its poller on top of any reader.

use alloy::{
    eips::BlockId,
    primitives::{Address, Bytes, ChainId, TxHash, U256},
    providers::{DynProvider, Provider},
    rpc::types::{
        Block, Filter, Log, Transaction, TransactionReceipt,
        simulate::{SimulatePayload, SimulatedBlock},
    },
    transports::TransportResult,
};
use async_trait::async_trait;

mod client;
pub use client::ChainClient;

mod metrics;
pub use metrics::ChainClientMetrics;

/// Read access to the real chain, including the batch execution primitive.
#[async_trait]
pub trait ChainReader: std::fmt::Debug + Send + Sync {
    /// Chain id of the connected chain.
    async fn get_chain_id(&self) -> TransportResult<ChainId>;

    /// Current block number.
    async fn get_block_number(&self) -> TransportResult<u64>;

    /// Fetches a block, with full transactions if `full` is set.
    async fn get_block(&self, block: BlockId, full: bool) -> TransportResult<Option<Block>>;

    /// Native balance of `address` at `block`.
    async fn get_balance(&self, address: Address, block: BlockId) -> TransportResult<U256>;

    /// Code of `address` at `block`.
    async fn get_code(&self, address: Address, block: BlockId) -> TransportResult<Bytes>;

    /// Nonce of `address` at `block`.
    async fn get_transaction_count(&self, address: Address, block: BlockId)
    -> TransportResult<u64>;

    /// Logs matching `filter`.
    async fn get_logs(&self, filter: &Filter) -> TransportResult<Vec<Log>>;

    /// Receipt of a mined transaction.
    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> TransportResult<Option<TransactionReceipt>>;

    /// A mined transaction by hash.
    async fn get_transaction_by_hash(&self, hash: TxHash) -> TransportResult<Option<Transaction>>;

    /// Executes `payload` on top of `block` via `eth_simulateV1`.
    async fn simulate(
        &self,
        payload: &SimulatePayload,
        block: BlockId,
    ) -> TransportResult<Vec<SimulatedBlock<Block>>>;
}

/// [`ChainReader`] backed by a JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    /// Creates a new reader for `provider`.
    pub const fn new(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn get_chain_id(&self) -> TransportResult<ChainId> {
        self.provider.get_chain_id().await
    }

    async fn get_block_number(&self) -> TransportResult<u64> {
        self.provider.get_block_number().await
    }

    async fn get_block(&self, block: BlockId, full: bool) -> TransportResult<Option<Block>> {
        let request = self.provider.get_block(block);
        if full { request.full().await } else { request.hashes().await }
    }

    async fn get_balance(&self, address: Address, block: BlockId) -> TransportResult<U256> {
        self.provider.get_balance(address).block_id(block).await
    }

    async fn get_code(&self, address: Address, block: BlockId) -> TransportResult<Bytes> {
        self.provider.get_code_at(address).block_id(block).await
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        block: BlockId,
    ) -> TransportResult<u64> {
        self.provider.get_transaction_count(address).block_id(block).await
    }

    async fn get_logs(&self, filter: &Filter) -> TransportResult<Vec<Log>> {
        self.provider.get_logs(filter).await
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> TransportResult<Option<TransactionReceipt>> {
        self.provider.get_transaction_receipt(hash).await
    }

    async fn get_transaction_by_hash(&self, hash: TxHash) -> TransportResult<Option<Transaction>> {
        self.provider.get_transaction_by_hash(hash).await
    }

    async fn simulate(
        &self,
        payload: &SimulatePayload,
        block: BlockId,
    ) -> TransportResult<Vec<SimulatedBlock<Block>>> {
        self.provider.simulate(payload).block_id(block).await
    }
}
