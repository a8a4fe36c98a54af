use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// Metrics for a [`ChainClient`](crate::chain::ChainClient).
#[derive(Metrics)]
#[metrics(scope = "chain")]
pub struct ChainClientMetrics {
    /// Number of latest block polls.
    pub polls: Counter,
    /// Number of failed latest block polls.
    pub failed_polls: Counter,
    /// Number of the latest observed block.
    pub latest_block: Gauge,
}
