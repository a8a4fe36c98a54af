//! RPC modules.

mod eth;
mod sim;

pub use eth::*;
pub use sim::*;
