//! The `eth_` namespace.
//!
//! Node queries answered through the [`QueryRouter`], either by the real chain or by the synthetic
//! block of the current simulation.

use crate::{error::ToRpcResult, simulation::QueryRouter};
use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, B256, Bytes, TxHash, U64, U256},
    rpc::types::{Block, Filter, Log, Transaction, TransactionReceipt, TransactionRequest},
};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};

/// `eth_` RPC namespace served on top of the simulation.
#[rpc(server, namespace = "eth")]
pub trait EthApi {
    /// Returns the chain id.
    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<U64>;

    /// Returns the number of the latest block, the synthetic one while simulating.
    #[method(name = "blockNumber")]
    async fn block_number(&self) -> RpcResult<U64>;

    /// Returns the native balance of an address.
    #[method(name = "getBalance")]
    async fn get_balance(&self, address: Address, block: Option<BlockId>) -> RpcResult<U256>;

    /// Returns the code of an address.
    #[method(name = "getCode")]
    async fn get_code(&self, address: Address, block: Option<BlockId>) -> RpcResult<Bytes>;

    /// Returns the nonce of an address.
    #[method(name = "getTransactionCount")]
    async fn get_transaction_count(
        &self,
        address: Address,
        block: Option<BlockId>,
    ) -> RpcResult<U64>;

    /// Returns logs matching a filter.
    #[method(name = "getLogs")]
    async fn get_logs(&self, filter: Filter) -> RpcResult<Vec<Log>>;

    /// Returns a block by number.
    #[method(name = "getBlockByNumber")]
    async fn get_block_by_number(
        &self,
        number: BlockNumberOrTag,
        full: bool,
    ) -> RpcResult<Option<Block>>;

    /// Returns a block by hash.
    #[method(name = "getBlockByHash")]
    async fn get_block_by_hash(&self, hash: B256, full: bool) -> RpcResult<Option<Block>>;

    /// Returns a transaction receipt.
    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, hash: TxHash)
    -> RpcResult<Option<TransactionReceipt>>;

    /// Returns a transaction.
    #[method(name = "getTransactionByHash")]
    async fn get_transaction_by_hash(&self, hash: TxHash) -> RpcResult<Option<Transaction>>;

    /// Executes a call without creating a transaction.
    #[method(name = "call")]
    async fn call(&self, request: TransactionRequest, block: Option<BlockId>) -> RpcResult<Bytes>;

    /// Estimates the gas a transaction needs.
    #[method(name = "estimateGas")]
    async fn estimate_gas(
        &self,
        request: TransactionRequest,
        block: Option<BlockId>,
    ) -> RpcResult<U64>;
}

/// Implementation of the `eth_` namespace.
#[derive(Debug, Clone)]
pub struct EthRpc {
    router: QueryRouter,
}

impl EthRpc {
    /// Creates a new `eth_` namespace on top of `router`.
    pub const fn new(router: QueryRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EthApiServer for EthRpc {
    async fn chain_id(&self) -> RpcResult<U64> {
        self.router.chain_id().await.map(U64::from).to_rpc_result()
    }

    async fn block_number(&self) -> RpcResult<U64> {
        self.router.get_block_number().await.map(U64::from).to_rpc_result()
    }

    async fn get_balance(&self, address: Address, block: Option<BlockId>) -> RpcResult<U256> {
        self.router.get_balance(address, block.unwrap_or_default()).await.to_rpc_result()
    }

    async fn get_code(&self, address: Address, block: Option<BlockId>) -> RpcResult<Bytes> {
        self.router.get_code(address, block.unwrap_or_default()).await.to_rpc_result()
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        block: Option<BlockId>,
    ) -> RpcResult<U64> {
        self.router
            .get_transaction_count(address, block.unwrap_or_default())
            .await
            .map(U64::from)
            .to_rpc_result()
    }

    async fn get_logs(&self, filter: Filter) -> RpcResult<Vec<Log>> {
        self.router.get_logs(&filter).await.to_rpc_result()
    }

    async fn get_block_by_number(
        &self,
        number: BlockNumberOrTag,
        full: bool,
    ) -> RpcResult<Option<Block>> {
        self.router.get_block(number.into(), full).await.to_rpc_result()
    }

    async fn get_block_by_hash(&self, hash: B256, full: bool) -> RpcResult<Option<Block>> {
        self.router.get_block(hash.into(), full).await.to_rpc_result()
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> RpcResult<Option<TransactionReceipt>> {
        self.router.get_transaction_receipt(hash).await.to_rpc_result()
    }

    async fn get_transaction_by_hash(&self, hash: TxHash) -> RpcResult<Option<Transaction>> {
        self.router.get_transaction_by_hash(hash).await.to_rpc_result()
    }

    async fn call(&self, request: TransactionRequest, block: Option<BlockId>) -> RpcResult<Bytes> {
        self.router.call(request, block.unwrap_or_default()).await.to_rpc_result()
    }

    async fn estimate_gas(
        &self,
        request: TransactionRequest,
        block: Option<BlockId>,
    ) -> RpcResult<U64> {
        self.router
            .estimate_gas(request, block.unwrap_or_default())
            .await
            .map(U64::from)
            .to_rpc_result()
    }
}
