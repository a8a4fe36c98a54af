//! Transaction shapes flowing through the simulation queue.

use alloy::{
    consensus::{TxEip1559, TxEip2930, TxLegacy},
    network::TransactionBuilder,
    primitives::{Address, B256, Bytes, ChainId, TxHash, TxKind, U256},
    rpc::types::TransactionRequest,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller supplied identifier of a queued transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

/// Origin metadata of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    /// Origin the request came from.
    pub website_origin: String,
    /// Page title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Page icon, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Body of a transaction, one variant per supported transaction type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "transaction", rename_all = "camelCase")]
pub enum TransactionBody {
    /// Pre-EIP-2718 transaction.
    Legacy(TxLegacy),
    /// EIP-2930 access list transaction.
    Eip2930(TxEip2930),
    /// EIP-1559 dynamic fee transaction.
    Eip1559(TxEip1559),
}

impl TransactionBody {
    /// Returns the nonce.
    pub fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.nonce,
            Self::Eip2930(tx) => tx.nonce,
            Self::Eip1559(tx) => tx.nonce,
        }
    }

    /// Sets the nonce.
    pub fn set_nonce(&mut self, nonce: u64) {
        match self {
            Self::Legacy(tx) => tx.nonce = nonce,
            Self::Eip2930(tx) => tx.nonce = nonce,
            Self::Eip1559(tx) => tx.nonce = nonce,
        }
    }

    /// Returns the chain id, if any.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            Self::Legacy(tx) => tx.chain_id,
            Self::Eip2930(tx) => Some(tx.chain_id),
            Self::Eip1559(tx) => Some(tx.chain_id),
        }
    }

    /// Returns the gas limit.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.gas_limit,
            Self::Eip2930(tx) => tx.gas_limit,
            Self::Eip1559(tx) => tx.gas_limit,
        }
    }

    /// Returns the destination.
    pub fn kind(&self) -> TxKind {
        match self {
            Self::Legacy(tx) => tx.to,
            Self::Eip2930(tx) => tx.to,
            Self::Eip1559(tx) => tx.to,
        }
    }

    /// Returns the recipient, `None` for contract creations.
    pub fn to(&self) -> Option<Address> {
        self.kind().to().copied()
    }

    /// Returns the transferred value.
    pub fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.value,
            Self::Eip2930(tx) => tx.value,
            Self::Eip1559(tx) => tx.value,
        }
    }

    /// Returns the calldata.
    pub fn input(&self) -> &Bytes {
        match self {
            Self::Legacy(tx) => &tx.input,
            Self::Eip2930(tx) => &tx.input,
            Self::Eip1559(tx) => &tx.input,
        }
    }

    /// Returns the max fee per gas. For legacy and EIP-2930 transactions this is the gas price.
    pub fn max_fee_per_gas(&self) -> u128 {
        match self {
            Self::Legacy(tx) => tx.gas_price,
            Self::Eip2930(tx) => tx.gas_price,
            Self::Eip1559(tx) => tx.max_fee_per_gas,
        }
    }

    /// Builds the request submitted to the batch primitive for this transaction.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(from)
            .with_kind(self.kind())
            .with_value(self.value())
            .with_input(self.input().clone())
            .with_nonce(self.nonce())
            .with_gas_limit(self.gas_limit());
        if let Some(chain_id) = self.chain_id() {
            request.set_chain_id(chain_id);
        }

        match self {
            Self::Legacy(tx) => request.set_gas_price(tx.gas_price),
            Self::Eip2930(tx) => {
                request.set_gas_price(tx.gas_price);
                request.set_access_list(tx.access_list.clone());
            }
            Self::Eip1559(tx) => {
                request.set_max_fee_per_gas(tx.max_fee_per_gas);
                request.set_max_priority_fee_per_gas(tx.max_priority_fee_per_gas);
                request.set_access_list(tx.access_list.clone());
            }
        }
        request
    }
}

/// A transaction with a known sender that has not been signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// Claimed sender.
    pub from: Address,
    /// Transaction body.
    pub body: TransactionBody,
}

/// A transaction stamped with a provisional identity.
///
/// It carries the hash the transaction would have when signed with the provisional signature of
/// its sender. It is
/// *not* validly signed and must never be broadcast. The only way to obtain one is
/// [`stamp_provisional_identity`](crate::simulation::stamp_provisional_identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalTransaction {
    from: Address,
    body: TransactionBody,
    hash: TxHash,
}

impl ProvisionalTransaction {
    pub(crate) const fn new_unchecked(from: Address, body: TransactionBody, hash: TxHash) -> Self {
        Self { from, body, hash }
    }

    /// Claimed sender.
    pub const fn from(&self) -> Address {
        self.from
    }

    /// Transaction body.
    pub const fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// Provisional transaction hash.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Drops the provisional identity.
    pub fn into_unsigned(self) -> UnsignedTransaction {
        UnsignedTransaction { from: self.from, body: self.body }
    }
}

/// How a transaction originally reached the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum OriginalRequest {
    /// `eth_sendTransaction`: the simulation owns nonce and fee fields.
    #[serde(rename = "eth_sendTransaction")]
    Send(TransactionRequest),
    /// `eth_sendRawTransaction`: already signed by the user, fields cannot be changed.
    #[serde(rename = "eth_sendRawTransaction")]
    Raw(Bytes),
}

impl OriginalRequest {
    /// Whether nonce and fee fields of the transaction may be rewritten.
    pub const fn is_renumberable(&self) -> bool {
        matches!(self, Self::Send(_))
    }

    /// Whether the request explicitly fixed the max fee per gas.
    pub fn has_explicit_max_fee(&self) -> bool {
        match self {
            Self::Send(request) => request.max_fee_per_gas.is_some(),
            Self::Raw(_) => true,
        }
    }
}

/// A transaction waiting to be (re-)executed as part of a simulation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTransaction {
    /// Transaction to execute.
    pub transaction: UnsignedTransaction,
    /// Origin of the request.
    pub website: Website,
    /// When the request was received.
    pub created: DateTime<Utc>,
    /// Request as received.
    pub original_request_parameters: OriginalRequest,
    /// Caller supplied identifier.
    pub transaction_identifier: TransactionId,
}

impl QueuedTransaction {
    /// Sender of the transaction.
    pub const fn from(&self) -> Address {
        self.transaction.from
    }

    /// Nonce of the transaction.
    pub fn nonce(&self) -> u64 {
        self.transaction.body.nonce()
    }
}
