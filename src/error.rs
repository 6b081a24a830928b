//! Bridge errors
//!
//! Every rejection a host can observe is a [`BridgeError`]. Native errors pass
//! through transparently so the host sees the native message verbatim.

use std::sync::Arc;

use thiserror::Error;

use crate::abi::{AdaptError, MarshalError};
use crate::quorum::NativeError;
use crate::runtime::LifecycleError;

#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("operation not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Adapt(#[from] AdaptError),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The native task ended without producing an outcome (it panicked).
    #[error("operation '{operation}' aborted: {reason}")]
    Aborted { operation: String, reason: String },
}

impl BridgeError {
    /// Short, stable tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::NotFound(_) => "not_found",
            BridgeError::Adapt(AdaptError::Arity { .. }) => "arity",
            BridgeError::Adapt(_) => "type",
            BridgeError::Native(_) => "native",
            BridgeError::Marshal(_) => "marshal",
            BridgeError::Lifecycle(_) => "lifecycle",
            BridgeError::Aborted { .. } => "aborted",
        }
    }
}

/// A rejection, with the operation it came from.
///
/// Passed to the [`ErrorHandler`] of a runtime whenever a call rejects, for
/// logging or metrics.
#[derive(Debug, Clone)]
pub struct HostFunctionError {
    /// The operation name (e.g., "GetTrx")
    pub function: String,
    /// Call id of the rejected invocation, if one was issued
    pub call_id: Option<u64>,
    pub error: BridgeError,
}

impl std::fmt::Display for HostFunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.call_id {
            Some(id) => write!(f, "{} (call {}): {}", self.function, id, self.error),
            None => write!(f, "{}: {}", self.function, self.error),
        }
    }
}

impl std::error::Error for HostFunctionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Handler called for every rejection.
pub type ErrorHandler = Arc<dyn Fn(&HostFunctionError) + Send + Sync>;

/// Default error handler: log at warn level.
pub(crate) fn default_error_handler(err: &HostFunctionError) {
    tracing::warn!(
        function = %err.function,
        call_id = ?err.call_id,
        kind = err.error.kind(),
        "{}",
        err.error
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_message_is_verbatim() {
        let err = BridgeError::from(NativeError::GroupNotFound("g9".into()));
        assert_eq!(err.to_string(), NativeError::GroupNotFound("g9".into()).to_string());
        assert_eq!(err.kind(), "native");
    }

    #[test]
    fn test_kind_distinguishes_arity() {
        let arity = BridgeError::from(AdaptError::Arity {
            expected: 2,
            got: 1,
        });
        assert_eq!(arity.kind(), "arity");
    }

    #[test]
    fn test_host_function_error_display() {
        let err = HostFunctionError {
            function: "GetTrx".into(),
            call_id: Some(7),
            error: BridgeError::NotFound("GetTrx".into()),
        };
        assert_eq!(err.to_string(), "GetTrx (call 7): operation not found: GetTrx");
    }
}
