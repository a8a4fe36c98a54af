use crate::constants::ETH_ADDRESS;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Identifies a balance that may have changed during a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceKey {
    /// Token contract, or [`ETH_ADDRESS`] for the native currency.
    pub token: Address,
    /// Owner of the balance.
    pub owner: Address,
    /// Token id for ERC-1155 balances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<U256>,
}

impl BalanceKey {
    /// Native currency balance of `owner`.
    pub const fn native(owner: Address) -> Self {
        Self { token: ETH_ADDRESS, owner, token_id: None }
    }

    /// ERC-20 balance of `owner`.
    pub const fn erc20(token: Address, owner: Address) -> Self {
        Self { token, owner, token_id: None }
    }

    /// ERC-1155 balance of `owner` for `token_id`.
    pub const fn erc1155(token: Address, owner: Address, token_id: U256) -> Self {
        Self { token, owner, token_id: Some(token_id) }
    }

    /// Whether this is a native currency balance.
    pub fn is_native(&self) -> bool {
        self.token == ETH_ADDRESS
    }
}

/// Balance of a [`BalanceKey`] right after a prefix of the simulation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Token contract, or [`ETH_ADDRESS`] for the native currency.
    pub token: Address,
    /// Owner of the balance.
    pub owner: Address,
    /// Token id for ERC-1155 balances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<U256>,
    /// Balance, `None` if it could not be queried.
    pub balance: Option<U256>,
}

impl TokenBalance {
    /// Creates a new [`TokenBalance`] for `key`.
    pub const fn new(key: BalanceKey, balance: Option<U256>) -> Self {
        Self { token: key.token, owner: key.owner, token_id: key.token_id, balance }
    }

    /// The key this balance is for.
    pub const fn key(&self) -> BalanceKey {
        BalanceKey { token: self.token, owner: self.owner, token_id: self.token_id }
    }
}
