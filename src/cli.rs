//! # Simulation service CLI
use crate::{
    config::SimConfig,
    constants::{DEFAULT_GAS_ESTIMATE_MARGIN, DEFAULT_RPC_MAX_CONNECTIONS},
    spawn::try_spawn_with_args,
};
use alloy_chains::Chain;
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};
use url::Url;

/// Keeps a queue of not yet mined transactions simulated on top of the latest block and answers
/// node queries as if they were mined.
#[derive(Debug, Parser)]
#[command(author, about = "Simulation state engine", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `simstate.yaml`.
    #[arg(long, value_name = "CONFIG", env = "SIMSTATE_CONFIG", default_value = "simstate.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(
        long = "http.addr",
        value_name = "ADDR",
        default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST)
    )]
    pub address: IpAddr,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT", default_value_t = 8545)]
    pub port: u16,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT", default_value_t = 9000)]
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the service can handle.
    #[arg(
        long = "max-connections",
        value_name = "NUM",
        default_value_t = DEFAULT_RPC_MAX_CONNECTIONS
    )]
    pub max_connections: u32,
    /// The RPC endpoint of the chain to simulate on top of.
    ///
    /// Must be a valid HTTP or HTTPS URL pointing to an Ethereum JSON-RPC endpoint that supports
    /// `eth_simulateV1`.
    #[arg(long, value_name = "RPC_ENDPOINT", env = "SIMSTATE_ENDPOINT")]
    pub endpoint: Option<Url>,
    /// The chain the endpoint is expected to serve, by name or id.
    #[arg(long, value_name = "CHAIN")]
    pub chain: Option<Chain>,
    /// Interval at which the latest block is polled.
    #[arg(long, value_name = "MILLIS", value_parser = parse_duration_millis, default_value = "4000")]
    pub poll_interval: Duration,
    /// Disables fee, balance and nonce validation of the batch primitive.
    #[arg(long, default_value_t = false)]
    pub no_validation: bool,
    /// Keeps the simulation on its parent block instead of refreshing on every new block.
    #[arg(long, default_value_t = false)]
    pub no_refresh: bool,
    /// Margin, in percent, added to gas estimates on top of the simulation.
    #[arg(long, value_name = "PERCENT", default_value_t = DEFAULT_GAS_ESTIMATE_MARGIN)]
    pub gas_estimate_margin: u64,
}

impl Args {
    /// Run the simulation service.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Merges [`Args`] values into an existing [`SimConfig`] instance.
    pub fn merge_config(self, config: SimConfig) -> SimConfig {
        config
            .with_address(self.address)
            .with_port(self.port)
            .with_metrics_port(self.metrics_port)
            .with_max_connections(self.max_connections)
            .with_endpoint(self.endpoint)
            .with_expected_chain(self.chain)
            .with_poll_interval(self.poll_interval)
            .with_validation(!self.no_validation)
            .with_refresh_on_new_block(!self.no_refresh)
            .with_gas_estimate_margin(self.gas_estimate_margin)
    }
}

/// Parses a string representing milliseconds to a [`Duration`].
fn parse_duration_millis(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let millis = arg.parse()?;
    Ok(Duration::from_millis(millis))
}
