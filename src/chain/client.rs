use super::{ChainClientMetrics, ChainReader};
use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{Address, Bytes, ChainId, TxHash, U256},
    rpc::types::{
        Block, Filter, Log, Transaction, TransactionReceipt,
        simulate::{SimulatePayload, SimulatedBlock},
    },
    transports::{TransportErrorKind, TransportResult},
};
use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, instrument, trace, warn};

/// Cached accessor for the real chain.
///
/// Holds the latest observed block behind a [`watch`] channel so readers see either the previous
/// or the refreshed block, and caches the chain id for the lifetime of the client.
#[derive(Clone)]
pub struct ChainClient {
    inner: Arc<ChainClientInner>,
}

struct ChainClientInner {
    reader: Arc<dyn ChainReader>,
    chain_id: OnceLock<ChainId>,
    latest: watch::Sender<Option<Arc<Block>>>,
    metrics: ChainClientMetrics,
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient")
            .field("reader", &self.inner.reader)
            .field("chain_id", &self.inner.chain_id.get())
            .field("latest", &self.inner.latest.borrow().as_ref().map(|block| block.header.number))
            .finish()
    }
}

impl ChainClient {
    /// Creates a new client on top of `reader`.
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(ChainClientInner {
                reader,
                chain_id: OnceLock::new(),
                latest,
                metrics: ChainClientMetrics::default(),
            }),
        }
    }

    /// Chain id, fetched once and cached afterwards.
    #[instrument(skip(self))]
    pub async fn chain_id(&self) -> TransportResult<ChainId> {
        if let Some(chain_id) = self.inner.chain_id.get() {
            trace!(%chain_id, "Chain ID cache HIT");
            return Ok(*chain_id);
        }

        let chain_id = self.inner.reader.get_chain_id().await?;
        Ok(*self.inner.chain_id.get_or_init(|| chain_id))
    }

    /// Subscribes to the latest observed block.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Block>>> {
        self.inner.latest.subscribe()
    }

    /// Latest block, served from the cache if one was observed already.
    pub async fn latest_block(&self) -> TransportResult<Arc<Block>> {
        if let Some(block) = self.inner.latest.borrow().clone() {
            return Ok(block);
        }
        self.refresh_latest_block().await
    }

    /// Fetches the latest block and publishes it if it is newer than the cached one.
    #[instrument(skip_all)]
    pub async fn refresh_latest_block(&self) -> TransportResult<Arc<Block>> {
        self.inner.metrics.polls.increment(1);
        let block = match self.inner.reader.get_block(BlockNumberOrTag::Latest.into(), false).await
        {
            Ok(Some(block)) => Arc::new(block),
            Ok(None) => {
                self.inner.metrics.failed_polls.increment(1);
                return Err(TransportErrorKind::custom_str("latest block not found"));
            }
            Err(err) => {
                self.inner.metrics.failed_polls.increment(1);
                return Err(err);
            }
        };

        let number = block.header.number;
        let updated = self.inner.latest.send_if_modified(|latest| {
            if latest.as_ref().is_some_and(|latest| latest.header.number >= number) {
                return false;
            }
            *latest = Some(block.clone());
            true
        });
        if updated {
            debug!(number, hash = %block.header.hash, "Observed new block");
            self.inner.metrics.latest_block.set(number as f64);
        }

        Ok(self.inner.latest.borrow().clone().unwrap_or(block))
    }

    /// Spawns a task refreshing the latest block every `interval`.
    pub fn spawn_poller(&self, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = this.refresh_latest_block().await {
                    warn!(%err, "Failed to poll latest block");
                }
            }
        })
    }

    /// Current block number.
    pub async fn get_block_number(&self) -> TransportResult<u64> {
        self.inner.reader.get_block_number().await
    }

    /// Fetches a block.
    pub async fn get_block(&self, block: BlockId, full: bool) -> TransportResult<Option<Block>> {
        self.inner.reader.get_block(block, full).await
    }

    /// Native balance of `address` at `block`.
    pub async fn get_balance(&self, address: Address, block: BlockId) -> TransportResult<U256> {
        self.inner.reader.get_balance(address, block).await
    }

    /// Code of `address` at `block`.
    pub async fn get_code(&self, address: Address, block: BlockId) -> TransportResult<Bytes> {
        self.inner.reader.get_code(address, block).await
    }

    /// Nonce of `address` at `block`.
    pub async fn get_transaction_count(
        &self,
        address: Address,
        block: BlockId,
    ) -> TransportResult<u64> {
        self.inner.reader.get_transaction_count(address, block).await
    }

    /// Logs matching `filter`.
    pub async fn get_logs(&self, filter: &Filter) -> TransportResult<Vec<Log>> {
        self.inner.reader.get_logs(filter).await
    }

    /// Receipt of a mined transaction.
    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> TransportResult<Option<TransactionReceipt>> {
        self.inner.reader.get_transaction_receipt(hash).await
    }

    /// A mined transaction by hash.
    pub async fn get_transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> TransportResult<Option<Transaction>> {
        self.inner.reader.get_transaction_by_hash(hash).await
    }

    /// Executes `payload` on top of `block`.
    pub async fn simulate(
        &self,
        payload: &SimulatePayload,
        block: BlockId,
    ) -> TransportResult<Vec<SimulatedBlock<Block>>> {
        self.inner.reader.simulate(payload, block).await
    }
}
