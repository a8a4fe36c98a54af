//! Outcomes of the batch execution primitive.

use alloy::{
    primitives::{Bytes, Log},
    rpc::types::simulate::SimCallResult,
    sol_types::decode_revert_reason,
};
use serde::{Deserialize, Serialize};

/// Error message nodes report for a transaction whose nonce does not match the sender's.
pub const WRONG_NONCE_MESSAGE: &str = "wrong transaction nonce";

/// `eth_simulateV1` error code for a nonce lower than the sender's.
pub const NONCE_TOO_LOW_CODE: i64 = -38010;

/// `eth_simulateV1` error code for a nonce higher than the sender's.
pub const NONCE_TOO_HIGH_CODE: i64 = -38011;

/// Error reported for a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallError {
    /// Error code reported by the node.
    pub code: i64,
    /// Error message reported by the node.
    pub message: String,
    /// Revert reason decoded from the return data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_message: Option<String>,
}

impl CallError {
    /// Whether the call failed because its nonce did not match the sender's.
    pub fn is_nonce_conflict(&self) -> bool {
        self.message == WRONG_NONCE_MESSAGE
            || self.code == NONCE_TOO_LOW_CODE
            || self.code == NONCE_TOO_HIGH_CODE
    }
}

/// Outcome of a single call of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BatchCallResult {
    /// The call executed successfully.
    #[serde(rename_all = "camelCase")]
    Success {
        /// Gas used by the call.
        gas_used: u64,
        /// Data returned by the call.
        return_data: Bytes,
        /// Logs emitted by the call.
        logs: Vec<Log>,
    },
    /// The call failed.
    #[serde(rename_all = "camelCase")]
    Failure {
        /// Gas used by the call.
        gas_used: u64,
        /// Reported error.
        error: CallError,
        /// Data returned by the call.
        return_data: Bytes,
    },
}

impl BatchCallResult {
    /// Whether the call executed successfully.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Gas used by the call.
    pub const fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. } | Self::Failure { gas_used, .. } => *gas_used,
        }
    }

    /// Data returned by the call.
    pub const fn return_data(&self) -> &Bytes {
        match self {
            Self::Success { return_data, .. } | Self::Failure { return_data, .. } => return_data,
        }
    }

    /// Logs emitted by the call. Failed calls emit none.
    pub fn logs(&self) -> &[Log] {
        match self {
            Self::Success { logs, .. } => logs,
            Self::Failure { .. } => &[],
        }
    }

    /// Error of a failed call.
    pub const fn error(&self) -> Option<&CallError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Whether the call failed because of a nonce conflict.
    pub fn is_nonce_conflict(&self) -> bool {
        self.error().is_some_and(CallError::is_nonce_conflict)
    }
}

impl From<SimCallResult> for BatchCallResult {
    fn from(result: SimCallResult) -> Self {
        if result.status {
            return Self::Success {
                gas_used: result.gas_used,
                return_data: result.return_data,
                logs: result.logs.into_iter().map(|log| log.inner).collect(),
            };
        }

        let (code, message) = result
            .error
            .map(|error| (error.code as i64, error.message))
            .unwrap_or_else(|| (0, "execution failed".to_string()));
        Self::Failure {
            gas_used: result.gas_used,
            error: CallError {
                code,
                message,
                decoded_message: decode_revert_reason(&result.return_data),
            },
            return_data: result.return_data,
        }
    }
}
