use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for a [`SimulationService`](crate::simulation::SimulationService).
#[derive(Metrics)]
#[metrics(scope = "simulation")]
pub struct SimulationMetrics {
    /// Number of started recomputes.
    pub recomputes: Counter,
    /// Number of failed recomputes.
    pub failed_recomputes: Counter,
    /// Number of recompute results discarded because a newer simulation was started.
    pub superseded: Counter,
    /// Number of nonce reconciliations that changed the queue.
    pub nonce_fixes: Counter,
    /// Number of simulated transactions in the committed state.
    pub queue_length: Gauge,
    /// Time it takes to run a queue operation, in seconds.
    pub recompute_duration: Histogram,
}
