//! Simulation error types.
use alloy::{
    primitives::Bytes,
    transports::{RpcError, TransportErrorKind},
};
use core::fmt;
use jsonrpsee::core::RpcResult;
use thiserror::Error;

mod integrity;
pub use integrity::IntegrityError;

/// JSON-RPC error code used by nodes for reverted calls.
const EXECUTION_REVERTED_CODE: i32 = 3;

/// The overarching error type returned by simulation operations.
///
/// Reverts, out-of-gas and nonce conflicts of queued transactions are *not* errors: they are
/// recorded as [`BatchCallResult::Failure`](crate::types::BatchCallResult::Failure) entries.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An invariant of the simulation was violated. Never recoverable.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// The requested operation variant is not supported.
    #[error("{0} is not implemented")]
    NotImplemented(String),
    /// A signed message could not be hashed.
    #[error("invalid signed message: {0}")]
    InvalidMessage(String),
    /// An auxiliary call (`eth_call`, `eth_estimateGas`) reverted on top of the simulation.
    #[error("execution reverted{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted {
        /// Decoded revert reason, if any.
        reason: Option<String>,
        /// Raw revert data.
        data: Bytes,
    },
    /// The recompute finished after a newer simulation was started and its result was discarded.
    #[error("simulation was superseded by a newer one")]
    Superseded,
    /// The simulation service is no longer running.
    #[error("simulation service is unavailable")]
    ServiceUnavailable,
    /// An error occurred talking to the chain.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
}

impl SimulationError {
    /// Whether the operation failed because the chain could not be reached and may be retried.
    ///
    /// A transient failure never touches the last committed simulation state.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::ServiceUnavailable)
    }
}

impl From<SimulationError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::NotImplemented(_) | SimulationError::InvalidMessage(_) => {
                invalid_params(err.to_string())
            }
            SimulationError::Reverted { ref data, .. } => {
                let data = data.clone();
                rpc_err(EXECUTION_REVERTED_CODE, err.to_string(), Some(data))
            }
            SimulationError::Integrity(_)
            | SimulationError::Superseded
            | SimulationError::ServiceUnavailable
            | SimulationError::Rpc(_) => internal_rpc(err.to_string()),
        }
    }
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee::types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

impl<Ok> ToRpcResult<Ok, SimulationError> for Result<Ok, SimulationError> {
    fn to_rpc_result(self) -> RpcResult<Ok> {
        self.map_err(Into::into)
    }
}

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg, None)
}

/// Constructs an internal JSON‑RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg, None)
}

/// Constructs a JSON‑RPC error with `code`, `message` and optional `data`.
fn rpc_err(
    code: i32,
    msg: impl Into<String>,
    data: Option<Bytes>,
) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), data)
}
