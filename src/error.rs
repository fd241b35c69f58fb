use std::fmt::Display;

use alloy::{
    primitives::{Bytes, U256},
    providers::PendingTransactionError,
    transports,
};

use crate::types::Fields;

/// Transport capability a [`crate::instance::BoundInstance`] may lack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Logs,
}

/// Revert reason decoded from the raw revert payload, either
/// by the standard error encodings or by the errors registered
/// in the schema.
#[derive(Clone, Debug, PartialEq)]
pub enum RevertReason {
    /// Custom error registered in the schema.
    Known { name: String, args: Fields },
    /// Standard `Error(string)` payload.
    Generic(String),
    /// Standard `Panic(uint256)` payload.
    Panic(U256),
    /// Empty or undecodable payload, kept verbatim.
    Unknown(Bytes),
}

/// Error produced by the binding layer.
///
/// None of the variants is fatal to the process, the core never retries
/// and surfaces every error to the caller.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("invalid schema: {0}")]
    SchemaInvalid(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("{name}: expected {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("value out of range: {0}")]
    CodecRange(String),

    #[error("malformed data: {0}")]
    CodecMalformed(String),

    #[error("execution reverted, data: {data}")]
    ContractReverted { data: Bytes },

    #[error("transport error: {cause}")]
    TransportFailure { cause: String },

    #[error("signing rejected: {0}")]
    SigRejected(String),

    #[error("cancelled")]
    Cancelled,

    #[error("subscription lost: {cause}")]
    SubscriptionLost { cause: String },

    #[error("instance has no {0:?} transport")]
    CapabilityMissing(Capability),
}

impl BindingError {
    pub(crate) fn transport(cause: impl Display) -> Self {
        Self::TransportFailure {
            cause: cause.to_string(),
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::CodecMalformed(msg.into())
    }

    /// Revert payload, if the error is [`BindingError::ContractReverted`].
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::ContractReverted { data } => Some(data),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(value: serde_json::Error) -> Self {
        Self::SchemaInvalid(value.to_string())
    }
}

impl<E: Display> From<transports::RpcError<E>> for BindingError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                // Nodes disagree on the code used for reverts: geth-style nodes
                // answer with 3, others with -32000/-32603 and a message.
                let msg = resp.message.to_ascii_lowercase();
                if resp.code == 3 || msg.contains("revert") {
                    Self::ContractReverted {
                        data: resp.as_revert_data().unwrap_or_default(),
                    }
                } else {
                    Self::transport(value)
                }
            }
            transports::RpcError::LocalUsageError(ref err) => {
                let msg = err.to_string().to_ascii_lowercase();
                if msg.contains("sign") {
                    Self::SigRejected(err.to_string())
                } else {
                    Self::transport(value)
                }
            }
            _ => Self::transport(value),
        }
    }
}

impl From<PendingTransactionError> for BindingError {
    fn from(value: PendingTransactionError) -> Self {
        match value {
            PendingTransactionError::TransportError(rpc_err) => Self::from(rpc_err),
            _ => Self::transport(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::bytes,
        rpc::json_rpc::ErrorPayload,
        transports::{RpcError, TransportErrorKind},
    };

    use super::*;

    fn error_resp(code: i64, message: &str, data: Option<&str>) -> RpcError<TransportErrorKind> {
        RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.to_string().into(),
            data: data.map(|d| serde_json::value::to_raw_value(d).unwrap()),
        })
    }

    #[test]
    fn test_revert_with_data() {
        let err = BindingError::from(error_resp(3, "execution reverted", Some("0x08c379a0")));
        assert_eq!(
            err,
            BindingError::ContractReverted {
                data: bytes!("08c379a0")
            }
        );
    }

    #[test]
    fn test_revert_by_message() {
        let err = BindingError::from(error_resp(-32000, "execution reverted", None));
        assert_eq!(err, BindingError::ContractReverted { data: Bytes::new() });
    }

    #[test]
    fn test_other_rpc_errors() {
        let err = BindingError::from(error_resp(-32601, "method not found", None));
        assert!(matches!(err, BindingError::TransportFailure { .. }));

        let err = BindingError::from(RpcError::<TransportErrorKind>::NullResp);
        assert!(matches!(err, BindingError::TransportFailure { .. }));
    }
}
