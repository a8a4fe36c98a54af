//! EIP-1559 fee arithmetic for the synthetic block.
//!
//! Integer only, results must match execution clients exactly.

use crate::{
    constants::{BASE_FEE_MAX_CHANGE_DENOMINATOR, ELASTICITY_MULTIPLIER},
    types::{ParentBlock, TransactionBody},
};
use alloy::primitives::U256;

/// Base fee of the block following a parent with the given gas usage, gas limit and base fee.
///
/// A parent with a gas target of zero leaves the base fee unchanged.
pub fn next_base_fee(parent_gas_used: u64, parent_gas_limit: u64, parent_base_fee: u128) -> u128 {
    let target = parent_gas_limit / ELASTICITY_MULTIPLIER;
    if target == 0 || parent_gas_used == target {
        return parent_base_fee;
    }

    let base_fee = U256::from(parent_base_fee);
    let scale = |gas_delta: u64| {
        base_fee * U256::from(gas_delta)
            / U256::from(target)
            / U256::from(BASE_FEE_MAX_CHANGE_DENOMINATOR)
    };

    if parent_gas_used > target {
        let delta = scale(parent_gas_used - target).max(U256::from(1));
        base_fee.saturating_add(delta).saturating_to()
    } else {
        base_fee.saturating_sub(scale(target - parent_gas_used)).saturating_to()
    }
}

/// Base fee of the synthetic block following `parent`.
pub fn next_block_base_fee(parent: &ParentBlock) -> u128 {
    next_base_fee(parent.gas_used, parent.gas_limit, parent.base_fee_per_gas)
}

/// Gas price `transaction` pays when included in the block following `parent`.
///
/// Legacy and EIP-2930 transactions pay their flat gas price, EIP-1559 transactions pay
/// `min(base_fee + max_priority_fee_per_gas, max_fee_per_gas)`.
pub fn realized_gas_price(transaction: &TransactionBody, parent: &ParentBlock) -> u128 {
    match transaction {
        TransactionBody::Legacy(tx) => tx.gas_price,
        TransactionBody::Eip2930(tx) => tx.gas_price,
        TransactionBody::Eip1559(tx) => (next_block_base_fee(parent)
            .saturating_add(tx.max_priority_fee_per_gas))
        .min(tx.max_fee_per_gas),
    }
}
