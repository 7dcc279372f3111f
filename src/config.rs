//! Client configuration, credentials and socket options

use std::fmt;
use std::time::Duration;

use crate::{
    constants::{
        DEFAULT_AMI_PORT, DEFAULT_ATTEMPTS_DELAY_MS, DEFAULT_TIMEOUT_MS, MAX_EVENT_QUEUE_SIZE,
    },
    error::{AmiError, AmiResult},
};

/// Lifecycle configuration for [`AmiClient`](crate::AmiClient).
///
/// Fixed for the lifetime of a client. Use [`Default::default()`] and the
/// `with_*` builders:
///
/// ```
/// use asterisk_ami_tokio::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_reconnect(true)
///     .with_max_attempts(5)
///     .with_attempts_delay(Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Retry failed attempts and re-establish dropped connections. Default: false.
    pub reconnect: bool,
    /// Upper bound on consecutive failed attempts; `None` retries forever.
    pub max_attempts_count: Option<u32>,
    /// Fixed delay between attempts. Default: 2000 ms.
    pub attempts_delay: Duration,
    /// Treat `Authentication failed` like a transport error when reconnecting.
    /// Default: false, the rejection is returned immediately.
    pub retry_on_auth_failure: bool,
    /// Send `Action: Ping` at this interval while connected.
    pub keep_alive: Option<Duration>,
    /// Event names (case-insensitive) that are dropped instead of dispatched.
    pub event_filter: Vec<String>,
    /// Capacity of the per-connection event queue. Default: 1000.
    pub event_queue_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: false,
            max_attempts_count: None,
            attempts_delay: Duration::from_millis(DEFAULT_ATTEMPTS_DELAY_MS),
            retry_on_auth_failure: false,
            keep_alive: None,
            event_filter: Vec::new(),
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Limit reconnection to `attempts` failed attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_count = Some(attempts);
        self
    }

    /// Retry forever (the default).
    pub fn with_unbounded_attempts(mut self) -> Self {
        self.max_attempts_count = None;
        self
    }

    pub fn with_attempts_delay(mut self, delay: Duration) -> Self {
        self.attempts_delay = delay;
        self
    }

    pub fn with_retry_on_auth_failure(mut self, retry: bool) -> Self {
        self.retry_on_auth_failure = retry;
        self
    }

    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    pub fn with_event_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_filter = names
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    /// Reject values that cannot describe a working client.
    pub fn validate(&self) -> AmiResult<()> {
        if self.max_attempts_count == Some(0) {
            return Err(AmiError::invalid_config(
                "max_attempts_count must be a positive integer",
            ));
        }
        if self.event_queue_size == 0 {
            return Err(AmiError::invalid_config("event_queue_size must be positive"));
        }
        if self.keep_alive == Some(Duration::ZERO) {
            return Err(AmiError::invalid_config("keep_alive interval must be positive"));
        }
        Ok(())
    }

    pub(crate) fn is_filtered(&self, event_name: Option<&str>) -> bool {
        let Some(name) = event_name else {
            return false;
        };
        self.event_filter
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name))
    }
}

/// Login credentials, reused for every reconnection of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Where to connect. Passed through to the [`Connector`](crate::Connector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    pub host: String,
    pub port: u16,
    /// TCP connect and greeting/login timeout. Default: 2000 ms.
    pub connect_timeout: Duration,
}

impl SocketOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_AMI_PORT)
    }
}
