//! Simulation constants.

use alloy::primitives::{Address, address};
use std::time::Duration;

/// Pseudo-token address under which `eth_simulateV1` reports native value transfers when
/// `traceTransfers` is enabled.
pub const ETH_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Multicall3 deployment address (same across all supported chains).
///
/// See <https://github.com/mds1/multicall#multicall3-contract-addresses>
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Address of the ecrecover precompile.
pub const ECRECOVER_ADDRESS: Address = address!("0000000000000000000000000000000000000001");

/// Address the original ecrecover precompile is moved to while signed messages are simulated.
pub const MOVED_ECRECOVER_ADDRESS: Address = address!("00000000000000000000000000000000000ecec0");

/// Address the code reader helper contract is injected at.
pub const CODE_READER_ADDRESS: Address = address!("00000000000000000000000000000000000c0de0");

/// Caller used for auxiliary read-only calls appended to a batch.
pub const AUXILIARY_CALLER: Address = Address::ZERO;

/// Seconds between the parent block and the synthetic follow-on block.
pub const SIMULATED_BLOCK_TIME: u64 = 12;

/// EIP-1559 elasticity multiplier.
pub const ELASTICITY_MULTIPLIER: u64 = 2;

/// EIP-1559 base fee max change denominator.
pub const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;

/// Default interval at which the latest block is polled.
pub const DEFAULT_BLOCK_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Default margin, in percent, added on top of simulated gas usage for `eth_estimateGas`.
pub const DEFAULT_GAS_ESTIMATE_MARGIN: u64 = 25;

/// Default maximum number of concurrent RPC connections.
pub const DEFAULT_RPC_MAX_CONNECTIONS: u32 = 500;
