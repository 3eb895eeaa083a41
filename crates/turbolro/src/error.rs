//! Error types for the LRO poller
//!
//! Errors raised on the background polling thread are captured and handed
//! back to callers from [`LroPoller::wait`](crate::LroPoller::wait) and
//! [`LroPoller::result`](crate::LroPoller::result). Because the same captured
//! error can be observed by several waiters, [`PollingError`] is `Clone`.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use turbolro_core::token::CodecError;

/// Result type alias for poller and strategy operations.
pub type Result<T> = std::result::Result<T, PollingError>;

/// Main error type for long-running-operation polling.
#[derive(Debug, Clone, Error)]
pub enum PollingError {
    /// The strategy refused the initial response.
    ///
    /// Returned synchronously from the poller constructor, never retried.
    #[error("Polling initialization failed: {message}")]
    Initialization {
        /// Why the initial response was refused
        message: String,
    },

    /// The service reported that the operation failed or was canceled.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Any other error raised while polling, stored as-is.
    #[error("Unexpected polling failure: {0}")]
    Unexpected(Arc<dyn std::error::Error + Send + Sync>),

    /// The polling thread panicked.
    #[error("Polling thread panicked: {0}")]
    Panicked(String),

    /// The strategy does not implement the requested capability.
    #[error("Polling method '{strategy}' doesn't support {operation}")]
    Unsupported {
        /// Strategy kind
        strategy: &'static str,
        /// Capability that was requested
        operation: &'static str,
    },

    /// Resuming from a token needs context that tokens cannot carry.
    #[error("Need '{0}' to be recreated from continuation token")]
    MissingContext(&'static str),

    /// The poller is in a state that does not allow the call.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The continuation token could not be decoded.
    #[error("Invalid continuation token: {0}")]
    InvalidToken(String),

    /// The deserialization callback failed on a response.
    #[error("Failed to deserialize operation result: {0}")]
    Deserialization(String),

    /// The operation did not finish within the requested time.
    #[error("Operation did not complete within {0:?}")]
    Timeout(Duration),

    /// A strategy method was called before `initialize`.
    #[error("Polling method used before initialize()")]
    NotInitialized,

    /// The background polling unit could not be started.
    #[error("Failed to start background polling: {0}")]
    Spawn(String),
}

turbolro_core::error_boundary!(CodecError => PollingError, |e| {
    PollingError::InvalidToken(e.to_string())
});

impl PollingError {
    /// Wrap an arbitrary error raised while polling.
    pub fn unexpected<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PollingError::Unexpected(Arc::new(error))
    }

    /// Build a deserialization error from anything displayable.
    pub fn deserialization(error: impl std::fmt::Display) -> Self {
        PollingError::Deserialization(error.to_string())
    }

    /// Whether the service reported the operation as failed.
    #[must_use]
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, PollingError::Operation(_))
    }

    /// Whether this is an error the poller did not recognize.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            PollingError::Unexpected(_) | PollingError::Panicked(_)
        )
    }

    /// Whether the caller gave up waiting before the operation finished.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollingError::Timeout(_))
    }

    /// The continuation token attached to an operation failure, if any.
    ///
    /// Callers can use it to resume polling after fixing whatever caused
    /// the failure to surface (e.g. a transient network error in the probe).
    pub fn continuation_token(&self) -> Option<&str> {
        match self {
            PollingError::Operation(e) => e.continuation_token.as_deref(),
            _ => None,
        }
    }
}

/// A failure reported by the service for a long-running operation.
///
/// The poller attaches a continuation token before storing this error, when
/// the strategy can produce one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OperationError {
    /// Error message
    pub message: String,
    /// Terminal status reported by the service, if known
    pub status: Option<String>,
    /// Token to resume polling this operation
    pub continuation_token: Option<String>,
}

impl OperationError {
    /// Create an operation error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            continuation_token: None,
        }
    }

    /// Set the terminal status reported by the service.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Attach a continuation token.
    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbolro_core::token::TokenPayload;

    #[test]
    fn test_operation_error_display() {
        let err: PollingError = OperationError::new("Operation failed or canceled")
            .with_status("Failed")
            .into();

        assert_eq!(err.to_string(), "Operation failed or canceled");
        assert!(err.is_operation_failure());
        assert!(err.continuation_token().is_none());
    }

    #[test]
    fn test_continuation_token_accessor() {
        let err: PollingError = OperationError::new("boom")
            .with_continuation_token("abc")
            .into();
        assert_eq!(err.continuation_token(), Some("abc"));

        let other = PollingError::InvalidState("Process is complete.".to_string());
        assert_eq!(other.continuation_token(), None);
    }

    #[test]
    fn test_unexpected_is_shared_on_clone() {
        let err = PollingError::unexpected(std::io::Error::other("socket closed"));
        let copy = err.clone();

        assert!(copy.is_unexpected());
        assert!(copy.to_string().contains("socket closed"));
        match (&err, &copy) {
            (PollingError::Unexpected(a), PollingError::Unexpected(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("Expected Unexpected variants"),
        }
    }

    #[test]
    fn test_codec_errors_cross_boundary() {
        fn decode(token: &str) -> Result<String> {
            Ok(String::from_token("no-polling", token)?)
        }

        let err = decode("not a token").unwrap_err();
        assert!(matches!(err, PollingError::InvalidToken(_)));
        assert!(err.to_string().starts_with("Invalid continuation token"));
    }

    #[test]
    fn test_missing_context_message() {
        let err = PollingError::MissingContext("deserialization_callback");
        assert_eq!(
            err.to_string(),
            "Need 'deserialization_callback' to be recreated from continuation token"
        );
    }
}
