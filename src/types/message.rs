//! Off-chain messages co-executed with the simulation queue.

use super::Website;
use alloy::{dyn_abi::TypedData, primitives::Address, primitives::Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller supplied identifier of a signed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// The signing request a message originated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum SignedMessageRequest {
    /// `personal_sign`.
    #[serde(rename = "personal_sign")]
    PersonalSign {
        /// Raw message bytes.
        message: Bytes,
    },
    /// `eth_signTypedData_v3`.
    #[serde(rename = "eth_signTypedData_v3", rename_all = "camelCase")]
    TypedDataV3 {
        /// EIP-712 payload.
        typed_data: TypedData,
    },
    /// `eth_signTypedData_v4`.
    #[serde(rename = "eth_signTypedData_v4", rename_all = "camelCase")]
    TypedDataV4 {
        /// EIP-712 payload.
        typed_data: TypedData,
    },
    /// `eth_signTypedData` (v1), an array of typed values without a domain.
    #[serde(rename = "eth_signTypedData", rename_all = "camelCase")]
    TypedDataV1 {
        /// Raw payload.
        typed_data: serde_json::Value,
    },
    /// `eth_sign` over an arbitrary 32 byte digest.
    #[serde(rename = "eth_sign")]
    EthSign {
        /// Data to sign.
        data: Bytes,
    },
}

impl SignedMessageRequest {
    /// Name of the signing method.
    pub const fn method(&self) -> &'static str {
        match self {
            Self::PersonalSign { .. } => "personal_sign",
            Self::TypedDataV3 { .. } => "eth_signTypedData_v3",
            Self::TypedDataV4 { .. } => "eth_signTypedData_v4",
            Self::TypedDataV1 { .. } => "eth_signTypedData",
            Self::EthSign { .. } => "eth_sign",
        }
    }
}

/// A message treated as signed by [`SignedMessage::signer`] for the duration of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    /// Caller supplied identifier.
    pub message_identifier: MessageId,
    /// Address the message is considered signed by.
    pub signer: Address,
    /// The signing request.
    pub request: SignedMessageRequest,
    /// Origin of the request.
    pub website: Website,
    /// When the request was received.
    pub created: DateTime<Utc>,
}
