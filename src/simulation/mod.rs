//! The Simulation State Engine.
//!
//! Layers a queue of unsent transactions and signed messages on top of the latest block, executes
//! them as one ordered batch and derives the synthetic block that would follow.

pub mod balances;
pub use balances::BalanceTracker;

pub mod block;

pub mod executor;
pub use executor::BatchExecutor;

pub mod fees;

mod identity;
pub use identity::{provisional_signature, stamp_provisional_identity};

mod metrics;
pub use metrics::SimulationMetrics;

pub mod nonce;
pub use nonce::NonceFix;

pub mod queue;
pub use queue::QueueManager;

pub mod router;
pub use router::QueryRouter;

mod service;
pub use service::{
    Mutation, SharedState, SimulationService, SimulationServiceHandle, SimulationServiceMessage,
    spawn_block_watcher,
};

pub mod signatures;
