//! Retry decision for failed connection attempts.
//!
//! Fixed-interval backoff: every retry waits the same `attempts_delay`.

use std::time::Duration;

use crate::{config::ClientConfig, error::AmiError};

/// What to do after a failed attempt.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// Wait `delay`, then attempt again.
    Retry { delay: Duration },
    /// Stop and report this error to the caller.
    GiveUp(AmiError),
}

/// Retry rules derived from [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    reconnect: bool,
    max_attempts: Option<u32>,
    delay: Duration,
    retry_on_auth_failure: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            reconnect: config.reconnect,
            max_attempts: config.max_attempts_count,
            delay: config.attempts_delay,
            retry_on_auth_failure: config.retry_on_auth_failure,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn is_retryable(&self, error: &AmiError) -> bool {
        error.is_transport() || (error.is_auth_failure() && self.retry_on_auth_failure)
    }

    /// Decide after a failure. `attempts_made` already counts this failure.
    pub fn decide(&self, attempts_made: u32, error: AmiError) -> RetryDecision {
        if !self.reconnect || !self.is_retryable(&error) {
            return RetryDecision::GiveUp(error);
        }
        match self.max_attempts {
            Some(max) if attempts_made >= max => {
                RetryDecision::GiveUp(AmiError::ReconnectExhausted {
                    attempts: attempts_made,
                })
            }
            _ => RetryDecision::Retry { delay: self.delay },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn refused() -> AmiError {
        io::Error::new(io::ErrorKind::ConnectionRefused, "connect ECONNREFUSED 127.0.0.1:5038").into()
    }

    fn policy(config: ClientConfig) -> RetryPolicy {
        RetryPolicy::from_config(&config)
    }

    #[test]
    fn no_reconnect_gives_up_with_connector_error() {
        let p = policy(ClientConfig::default());
        match p.decide(1, refused()) {
            RetryDecision::GiveUp(AmiError::Io(e)) => {
                assert_eq!(e.to_string(), "connect ECONNREFUSED 127.0.0.1:5038")
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn bounded_attempts_exhaust_on_nth_failure() {
        let p = policy(
            ClientConfig::default()
                .with_reconnect(true)
                .with_max_attempts(3)
                .with_attempts_delay(Duration::from_millis(250)),
        );
        for attempt in 1..3 {
            assert!(matches!(
                p.decide(attempt, refused()),
                RetryDecision::Retry { delay } if delay == Duration::from_millis(250)
            ));
        }
        assert!(matches!(
            p.decide(3, refused()),
            RetryDecision::GiveUp(AmiError::ReconnectExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn single_attempt_limit() {
        let p = policy(
            ClientConfig::default()
                .with_reconnect(true)
                .with_max_attempts(1),
        );
        assert!(matches!(
            p.decide(1, refused()),
            RetryDecision::GiveUp(AmiError::ReconnectExhausted { attempts: 1 })
        ));
    }

    #[test]
    fn unbounded_always_retries_transport_errors() {
        let p = policy(ClientConfig::default().with_reconnect(true));
        for attempt in [1, 10, 10_000, u32::MAX] {
            assert!(matches!(
                p.decide(attempt, AmiError::Timeout { timeout_ms: 2000 }),
                RetryDecision::Retry { .. }
            ));
        }
    }

    #[test]
    fn auth_failure_terminal_by_default() {
        let p = policy(ClientConfig::default().with_reconnect(true));
        assert!(matches!(
            p.decide(1, AmiError::auth_failed("Authentication failed")),
            RetryDecision::GiveUp(AmiError::AuthFailed { .. })
        ));
    }

    #[test]
    fn auth_failure_retried_when_enabled() {
        let p = policy(
            ClientConfig::default()
                .with_reconnect(true)
                .with_retry_on_auth_failure(true)
                .with_max_attempts(2),
        );
        assert!(matches!(
            p.decide(1, AmiError::auth_failed("Authentication failed")),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            p.decide(2, AmiError::auth_failed("Authentication failed")),
            RetryDecision::GiveUp(AmiError::ReconnectExhausted { attempts: 2 })
        ));
    }

    #[test]
    fn protocol_errors_never_retried() {
        let p = policy(ClientConfig::default().with_reconnect(true));
        assert!(matches!(
            p.decide(1, AmiError::protocol_error("Unexpected greeting")),
            RetryDecision::GiveUp(AmiError::ProtocolError { .. })
        ));
    }
}
