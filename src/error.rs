//! Error types for the AMI client

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for AMI operations
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors produced by the AMI client.
///
/// `Clone` so that one connection outcome can be handed to every caller
/// waiting on the same `connect`; I/O errors are therefore held in an `Arc`.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// Socket-level failure (connection refused, reset, ...).
    #[error("{0}")]
    Io(Arc<io::Error>),

    /// Operation did not complete in time.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Peer closed the TCP connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// No live connection to send on.
    #[error("not connected")]
    NotConnected,

    /// Asterisk rejected the login.
    #[error("AMI message: {reason}")]
    AuthFailed { reason: String },

    /// Stream violated the AMI framing rules.
    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    /// A header line or header value could not be used.
    #[error("invalid header: {header}")]
    InvalidHeader { header: String },

    /// An action was answered with `Response: Error`.
    #[error("action failed: {message}")]
    ActionFailed { message: String },

    /// One or more events were dropped because the consumer fell behind.
    #[error("event queue full, events dropped")]
    QueueFull,

    /// Bounded reconnection ran out of attempts.
    #[error("Reconnection error after max count attempts.")]
    ReconnectExhausted { attempts: u32 },

    /// A pending `connect` was superseded by `disconnect()`.
    #[error("connection attempt cancelled by disconnect")]
    ConnectAborted,

    /// Configuration or arguments rejected before any I/O.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON conversion failed.
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl From<io::Error> for AmiError {
    fn from(err: io::Error) -> Self {
        AmiError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for AmiError {
    fn from(err: serde_json::Error) -> Self {
        AmiError::Json {
            message: err.to_string(),
        }
    }
}

impl AmiError {
    pub(crate) fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    pub(crate) fn auth_failed(reason: impl Into<String>) -> Self {
        AmiError::AuthFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        AmiError::InvalidConfig {
            message: message.into(),
        }
    }

    /// `true` for credential rejections.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AmiError::AuthFailed { .. })
    }

    /// `true` for transport-level failures worth another attempt.
    ///
    /// Authentication failures are not included here; whether they are retried
    /// is a client configuration choice.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AmiError::Io(_) | AmiError::Timeout { .. } | AmiError::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_message_matches_asterisk_wording() {
        let err = AmiError::auth_failed("Authentication failed");
        assert_eq!(
            err.to_string()
                .to_lowercase(),
            "ami message: authentication failed"
        );
        assert!(err.is_auth_failure());
        assert!(!err.is_transport());
    }

    #[test]
    fn exhausted_message() {
        let err = AmiError::ReconnectExhausted { attempts: 3 };
        assert_eq!(
            err.to_string()
                .to_lowercase(),
            "reconnection error after max count attempts."
        );
    }

    #[test]
    fn io_error_keeps_os_message_verbatim() {
        let err: AmiError = io::Error::new(io::ErrorKind::ConnectionRefused, "connect refused").into();
        assert_eq!(err.to_string(), "connect refused");
        assert!(err.is_transport());
        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }

    #[test]
    fn protocol_errors_are_not_transport() {
        assert!(!AmiError::protocol_error("bad greeting").is_transport());
        assert!(!AmiError::invalid_config("x").is_transport());
    }
}
