//! # Simulation state engine
//!
//! Keeps an ordered queue of not yet mined transactions and signed messages simulated on top of
//! the latest block of a live EVM chain, and answers node queries as if the queue had been mined
//! into the next block.
//!
//! The [`simulation::QueueManager`] recomputes a [`types::SimulationState`] on every mutation,
//! the [`simulation::SimulationService`] serializes those mutations, and the
//! [`simulation::QueryRouter`] answers reads from either the chain or the synthetic block.

pub mod chain;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod rpc;
pub mod serde;
pub mod simulation;
pub mod spawn;
pub mod types;
