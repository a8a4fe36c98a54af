//! Simulation service configuration.
use crate::constants::{
    DEFAULT_BLOCK_POLL_INTERVAL, DEFAULT_GAS_ESTIMATE_MARGIN, DEFAULT_RPC_MAX_CONNECTIONS,
};
use alloy_chains::Chain;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Simulation service configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chain configuration.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Simulation configuration.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl SimConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the port to serve the metrics on.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.server.metrics_port = port;
        self
    }

    /// Sets the maximum number of concurrent connections the service can handle.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.server.max_connections = max_connections;
        self
    }

    /// Sets the RPC endpoint of the chain, if provided.
    pub fn with_endpoint(mut self, endpoint: Option<Url>) -> Self {
        if let Some(endpoint) = endpoint {
            self.chain.endpoint = endpoint;
        }
        self
    }

    /// Sets the chain the endpoint is expected to serve, if provided.
    pub fn with_expected_chain(mut self, chain: Option<Chain>) -> Self {
        self.chain.expected = chain.or(self.chain.expected);
        self
    }

    /// Sets the interval at which the latest block is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.chain.poll_interval = interval;
        self
    }

    /// Sets whether the batch primitive validates fees, balances and nonces.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.chain.validation = validation;
        self
    }

    /// Sets whether the simulation is refreshed on every new block.
    pub fn with_refresh_on_new_block(mut self, refresh: bool) -> Self {
        self.simulation.refresh_on_new_block = refresh;
        self
    }

    /// Sets the margin, in percent, added to gas estimates.
    pub fn with_gas_estimate_margin(mut self, margin: u64) -> Self {
        self.simulation.gas_estimate_margin = margin;
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .wrap_err_with(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve the metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the service can handle.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8545,
            metrics_port: 9000,
            max_connections: DEFAULT_RPC_MAX_CONNECTIONS,
        }
    }
}

/// Chain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// RPC endpoint of the chain the simulation runs on top of.
    pub endpoint: Url,
    /// Chain the endpoint must serve. Startup fails on a mismatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Chain>,
    /// Interval at which the latest block is polled.
    #[serde(with = "crate::serde::duration_millis")]
    pub poll_interval: Duration,
    /// Whether `eth_simulateV1` validates fees, balances and nonces.
    pub validation: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("http://localhost:8545").expect("valid url"),
            expected: None,
            poll_interval: DEFAULT_BLOCK_POLL_INTERVAL,
            validation: true,
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Whether the simulation is moved onto every new block.
    pub refresh_on_new_block: bool,
    /// Margin, in percent, added to gas estimates on top of the simulation.
    pub gas_estimate_margin: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { refresh_on_new_block: true, gas_estimate_margin: DEFAULT_GAS_ESTIMATE_MARGIN }
    }
}
