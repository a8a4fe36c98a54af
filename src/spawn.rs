//! Simulation service spawn utilities.
use crate::{
    chain::{ChainClient, RpcChainReader},
    cli::Args,
    config::{ServerConfig, SimConfig},
    metrics::{self, RpcMetricsService},
    rpc::{EthApiServer, EthRpc, SimApiServer, SimRpc},
    simulation::{
        BatchExecutor, QueryRouter, QueueManager, SimulationService, SimulationServiceHandle,
        spawn_block_watcher,
    },
};
use alloy::{
    providers::{Provider, ProviderBuilder},
    rpc::client::ClientBuilder,
    transports::layers::RetryBackoffLayer,
};
use alloy_chains::Chain;
use http::header;
use jsonrpsee::{
    Methods,
    server::{RpcServiceBuilder, Server, ServerHandle, middleware::http::ProxyGetRequestLayer},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// [`RetryBackoffLayer`] used for the chain provider.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Context returned once the simulation service is launched.
#[derive(Debug)]
pub struct SimHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// Handle to the simulation service.
    pub simulation: SimulationServiceHandle,
    /// Task following the chain head.
    pub block_watcher: JoinHandle<()>,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl SimHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn the simulation service using CLI arguments and a configuration file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<SimHandle> {
    let config = if !config_path.as_ref().exists() {
        let config = args.merge_config(SimConfig::default());
        config.save_to_file(&config_path)?;
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_config(SimConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Spawns the simulation service using the provided [`SimConfig`].
pub async fn try_spawn(config: SimConfig) -> eyre::Result<SimHandle> {
    let metrics = metrics::setup_exporter((config.server.address, config.server.metrics_port))?;

    // construct chain client
    let client = ClientBuilder::default()
        .layer(RETRY_LAYER.clone())
        .connect(config.chain.endpoint.as_str())
        .await?;
    let provider = ProviderBuilder::new().connect_client(client).erased();
    let chain = ChainClient::new(Arc::new(RpcChainReader::new(provider)));

    let chain_id = chain.chain_id().await?;
    let connected = Chain::from_id(chain_id);
    if let Some(expected) = config.chain.expected
        && expected.id() != chain_id
    {
        eyre::bail!("endpoint serves chain {connected}, expected {expected}");
    }
    if !config.chain.validation {
        warn!("Simulating without validation, fees and nonces are not checked.");
    }

    // construct simulation service
    let manager = QueueManager::new(BatchExecutor::new(chain, config.chain.validation));
    let simulation = SimulationService::spawn(manager);
    let block_watcher = spawn_block_watcher(
        simulation.clone(),
        config.chain.poll_interval,
        config.simulation.refresh_on_new_block,
    );

    // construct rpc module
    let router = QueryRouter::new(simulation.clone(), config.simulation.gas_estimate_margin);
    let mut rpc = EthRpc::new(router).into_rpc();
    rpc.merge(SimRpc::new(simulation.clone()).into_rpc())?;

    let (addr, server) = serve(rpc, &config.server).await?;
    info!(%addr, chain = %connected, "Started simulation service");

    Ok(SimHandle { local_addr: addr, server, simulation, block_watcher, metrics })
}

/// Starts the HTTP RPC server for `methods`.
///
/// Any origin may call the server. `GET /health` is answered by the `health` method.
pub async fn serve(
    methods: impl Into<Methods>,
    config: &ServerConfig,
) -> eyre::Result<(SocketAddr, ServerHandle)> {
    // http layers
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);

    let server = Server::builder()
        .http_only()
        .max_connections(config.max_connections)
        .set_http_middleware(
            ServiceBuilder::new()
                .layer(cors)
                .layer(ProxyGetRequestLayer::new("/health", "health")?),
        )
        .set_rpc_middleware(RpcServiceBuilder::new().layer_fn(RpcMetricsService::new))
        .build((config.address, config.port))
        .await?;
    let addr = server.local_addr()?;

    Ok((addr, server.start(methods)))
}
