use alloy::eips::BlockId;

/// Violations of simulation invariants.
///
/// These indicate a programming or environment error and are propagated immediately, they are
/// never coerced into a successful result.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The batch primitive returned a different number of outcomes than calls submitted.
    #[error("batch returned {actual} results for {expected} calls")]
    BatchLengthMismatch {
        /// Number of calls submitted.
        expected: usize,
        /// Number of outcomes returned.
        actual: usize,
    },
    /// The batch primitive returned no simulated block.
    #[error("simulation returned no block")]
    EmptySimulation,
    /// The parent block predates EIP-1559.
    #[error("parent block {0} has no base fee")]
    MissingBaseFee(u64),
    /// The chain did not return a requested block.
    #[error("block {0} not found")]
    MissingBlock(BlockId),
}
