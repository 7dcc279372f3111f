//! Connection lifecycle: connect, retry, reconnect, disconnect.
//!
//! [`AmiClient`] drives a [`Connector`] through the states of
//! [`LifecycleState`]. One driver task per `connect` session performs every
//! transition in order; it only suspends on a connection attempt, on the retry
//! delay and, while connected, on the connection's events. All state sits
//! behind a single mutex, and every transition checks the session generation so
//! that a cancelled session can never touch the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    action::{AmiAction, AmiResponse},
    config::{ClientConfig, Credentials, SocketOptions},
    connection::{AmiConnectOptions, AmiEventStream, DisconnectReason},
    connector::{Connection, Connector, TcpConnector},
    error::{AmiError, AmiResult},
    event::AmiEvent,
    retry::{RetryDecision, RetryPolicy},
};

/// Lifecycle states of an [`AmiClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing running. Initial state, and after `disconnect()`.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// Authenticated session is live.
    Connected,
    /// Waiting out the retry delay before the next attempt.
    ReconnectWaiting,
    /// Gave up; a new `connect()` starts over.
    Failed,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ClientEvent {
    /// An attempt succeeded (first connection or any reconnection).
    Connect,
    /// A live connection was lost or closed.
    Disconnect(DisconnectReason),
    /// Event received from Asterisk.
    Event(AmiEvent),
    /// Error reported by a live connection, or the terminal error of a
    /// reconnection cycle that no `connect()` call is waiting on.
    Error(AmiError),
}

/// Handle returned by [`AmiClient::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// First outcome of the current session; `None` while still trying.
type Outcome<C> = Option<AmiResult<C>>;

struct Lifecycle<C> {
    state: LifecycleState,
    attempts_made: u32,
    /// Bumped by every new session and every `disconnect()`.
    generation: u64,
    connection: Option<C>,
    driver: Option<JoinHandle<()>>,
    outcome: Option<watch::Sender<Outcome<C>>>,
}

impl<C: Clone> Lifecycle<C> {
    fn settle(&self, result: AmiResult<C>) {
        if let Some(tx) = &self.outcome {
            tx.send_replace(Some(result));
        }
    }

    fn reopen(&self) {
        if let Some(tx) = &self.outcome {
            tx.send_replace(None);
        }
    }
}

struct Shared<K: Connector> {
    connector: K,
    config: ClientConfig,
    policy: RetryPolicy,
    lifecycle: Mutex<Lifecycle<K::Connection>>,
    observers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_subscription: AtomicU64,
}

impl<K: Connector> Shared<K> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<K::Connection>> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invoke every subscriber in registration order, outside the state lock.
    fn emit(&self, event: &ClientEvent) {
        let handlers: Vec<Handler> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}

/// AMI client with automatic reconnection.
///
/// ```rust,no_run
/// use asterisk_ami_tokio::{AmiAction, AmiClient, ClientConfig, ClientEvent, SocketOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), asterisk_ami_tokio::AmiError> {
///     let client = AmiClient::new(ClientConfig::default().with_reconnect(true))?;
///     client.subscribe(|event| {
///         if let ClientEvent::Event(e) = event {
///             println!("{:?}", e.name());
///         }
///     });
///
///     client
///         .connect("admin", "secret", SocketOptions::new("127.0.0.1", 5038))
///         .await?;
///     let pong = client.send_action(AmiAction::ping()).await?;
///     println!("{:?}", pong.header("Ping"));
///
///     client.disconnect();
///     Ok(())
/// }
/// ```
pub struct AmiClient<K: Connector = TcpConnector> {
    shared: Arc<Shared<K>>,
}

impl<K: Connector> std::fmt::Debug for AmiClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self
            .shared
            .lifecycle();
        f.debug_struct("AmiClient")
            .field("state", &lifecycle.state)
            .field("attempts_made", &lifecycle.attempts_made)
            .finish()
    }
}

impl AmiClient<TcpConnector> {
    /// Client over TCP.
    pub fn new(config: ClientConfig) -> AmiResult<Self> {
        let options = AmiConnectOptions {
            event_queue_size: config.event_queue_size,
            keep_alive: config.keep_alive,
            ..AmiConnectOptions::default()
        };
        Self::with_connector(config, TcpConnector::new(options))
    }
}

impl<K: Connector> AmiClient<K> {
    /// Client over a custom [`Connector`].
    pub fn with_connector(config: ClientConfig, connector: K) -> AmiResult<Self> {
        config.validate()?;
        let policy = RetryPolicy::from_config(&config);
        Ok(Self {
            shared: Arc::new(Shared {
                connector,
                config,
                policy,
                lifecycle: Mutex::new(Lifecycle {
                    state: LifecycleState::Idle,
                    attempts_made: 0,
                    generation: 0,
                    connection: None,
                    driver: None,
                    outcome: None,
                }),
                observers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        })
    }

    /// Connect and log in, retrying according to the configuration.
    ///
    /// Resolves with the first connection of this session. While a session is
    /// already connecting or connected, no new attempt is started: the call
    /// waits for (or returns) that session's connection instead. Reconnections
    /// after the first success are reported through [`ClientEvent::Connect`]
    /// only.
    pub async fn connect(
        &self,
        username: &str,
        secret: &str,
        socket: SocketOptions,
    ) -> AmiResult<K::Connection> {
        if username.is_empty() {
            return Err(AmiError::invalid_config("username is required"));
        }
        if socket
            .host
            .is_empty()
        {
            return Err(AmiError::invalid_config("host is required"));
        }

        let mut outcome_rx = {
            let mut lifecycle = self
                .shared
                .lifecycle();
            match lifecycle.state {
                LifecycleState::Connected => {
                    if let Some(connection) = &lifecycle.connection {
                        debug!("connect() while connected, returning live connection");
                        return Ok(connection.clone());
                    }
                    self.start_session(&mut lifecycle, username, secret, socket)
                }
                LifecycleState::Connecting | LifecycleState::ReconnectWaiting => {
                    let current = lifecycle
                        .outcome
                        .as_ref()
                        .map(watch::Sender::subscribe);
                    match current {
                        Some(rx) => {
                            debug!("connect() while connecting, joining current session");
                            rx
                        }
                        None => self.start_session(&mut lifecycle, username, secret, socket),
                    }
                }
                LifecycleState::Idle | LifecycleState::Failed => {
                    self.start_session(&mut lifecycle, username, secret, socket)
                }
            }
        };

        loop {
            if let Some(result) = outcome_rx
                .borrow_and_update()
                .clone()
            {
                return result;
            }
            if outcome_rx
                .changed()
                .await
                .is_err()
            {
                return outcome_rx
                    .borrow()
                    .clone()
                    .unwrap_or(Err(AmiError::ConnectAborted));
            }
        }
    }

    fn start_session(
        &self,
        lifecycle: &mut Lifecycle<K::Connection>,
        username: &str,
        secret: &str,
        socket: SocketOptions,
    ) -> watch::Receiver<Outcome<K::Connection>> {
        lifecycle.generation += 1;
        lifecycle.state = LifecycleState::Connecting;
        lifecycle.attempts_made = 0;
        if let Some(stale) = lifecycle
            .driver
            .take()
        {
            stale.abort();
        }

        let (tx, rx) = watch::channel(None);
        lifecycle.outcome = Some(tx);

        info!(
            "[CONNECT] Starting session to {}:{} as {}",
            socket.host, socket.port, username
        );
        lifecycle.driver = Some(tokio::spawn(run_session(
            self.shared
                .clone(),
            lifecycle.generation,
            Credentials::new(username, secret),
            socket,
        )));
        rx
    }

    /// Stop everything: cancel a pending retry or attempt, close the live
    /// connection and return to `Idle`. Never fails.
    ///
    /// Emits [`ClientEvent::Disconnect`] when a connection was live. A
    /// `connect()` still waiting is settled with [`AmiError::ConnectAborted`].
    pub fn disconnect(&self) {
        let connection = {
            let mut lifecycle = self
                .shared
                .lifecycle();
            lifecycle.generation += 1;
            if let Some(driver) = lifecycle
                .driver
                .take()
            {
                driver.abort();
            }
            if let Some(tx) = lifecycle
                .outcome
                .take()
            {
                tx.send_if_modified(|outcome| {
                    if outcome.is_none() {
                        *outcome = Some(Err(AmiError::ConnectAborted));
                        true
                    } else {
                        false
                    }
                });
            }
            lifecycle.state = LifecycleState::Idle;
            lifecycle.attempts_made = 0;
            lifecycle
                .connection
                .take()
        };

        if let Some(connection) = connection {
            info!("[DISCONNECT] Closing connection on request");
            connection.close();
            self.shared
                .emit(&ClientEvent::Disconnect(DisconnectReason::ClientRequested));
        } else {
            debug!("[DISCONNECT] No live connection");
        }
    }

    /// Register a handler for lifecycle and protocol events.
    ///
    /// Handlers run synchronously, in registration order, on the task that
    /// produced the event. They must not block.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(
            self.shared
                .next_subscription
                .fetch_add(1, Ordering::Relaxed),
        );
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Send an action on the live connection.
    pub async fn send_action(&self, action: AmiAction) -> AmiResult<AmiResponse> {
        let connection = self
            .connection()
            .ok_or(AmiError::NotConnected)?;
        connection
            .send_action(action)
            .await
    }

    /// Current lifecycle state snapshot.
    pub fn state(&self) -> LifecycleState {
        self.shared
            .lifecycle()
            .state
    }

    /// Failed attempts since the last successful connection.
    pub fn attempts_made(&self) -> u32 {
        self.shared
            .lifecycle()
            .attempts_made
    }

    /// Whether the lifecycle is in `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state() == LifecycleState::Connected
    }

    /// Handle to the live connection, if any.
    pub fn connection(&self) -> Option<K::Connection> {
        self.shared
            .lifecycle()
            .connection
            .clone()
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// The connector used for every attempt.
    pub fn connector(&self) -> &K {
        &self.shared.connector
    }
}

impl<K: Connector> Drop for AmiClient<K> {
    fn drop(&mut self) {
        let mut lifecycle = self
            .shared
            .lifecycle();
        lifecycle.generation += 1;
        if let Some(driver) = lifecycle
            .driver
            .take()
        {
            driver.abort();
        }
        lifecycle.outcome = None;
        if let Some(connection) = lifecycle
            .connection
            .take()
        {
            connection.close();
        }
    }
}

/// Body of the driver task for one session.
async fn run_session<K: Connector>(
    shared: Arc<Shared<K>>,
    generation: u64,
    credentials: Credentials,
    socket: SocketOptions,
) {
    let mut ever_connected = false;

    loop {
        debug!("[CONNECT] Attempting connection");
        match shared
            .connector
            .attempt(&credentials, &socket)
            .await
        {
            Ok((connection, events)) => {
                {
                    let mut lifecycle = shared.lifecycle();
                    if lifecycle.generation != generation {
                        debug!("[CONNECT] Session superseded, dropping late connection");
                        connection.close();
                        return;
                    }
                    lifecycle.state = LifecycleState::Connected;
                    lifecycle.attempts_made = 0;
                    lifecycle.connection = Some(connection.clone());
                }
                info!("[CONNECT] Connected to {}:{}", socket.host, socket.port);
                shared.emit(&ClientEvent::Connect);
                {
                    let lifecycle = shared.lifecycle();
                    if lifecycle.generation != generation {
                        return;
                    }
                    lifecycle.settle(Ok(connection.clone()));
                }
                ever_connected = true;

                let reason = pump_events(&shared, &connection, events).await;

                {
                    let mut lifecycle = shared.lifecycle();
                    if lifecycle.generation != generation
                        || lifecycle
                            .connection
                            .take()
                            .is_none()
                    {
                        return;
                    }
                    if shared
                        .config
                        .reconnect
                    {
                        lifecycle.state = LifecycleState::ReconnectWaiting;
                        lifecycle.reopen();
                    } else {
                        lifecycle.state = LifecycleState::Idle;
                        lifecycle.driver = None;
                    }
                }
                connection.close();
                warn!("[DISCONNECT] Connection lost: {}", reason);
                shared.emit(&ClientEvent::Disconnect(reason));

                if !shared
                    .config
                    .reconnect
                {
                    return;
                }
                info!(
                    "[RETRY] Reconnecting in {}ms",
                    shared
                        .policy
                        .delay()
                        .as_millis()
                );
                tokio::time::sleep(
                    shared
                        .policy
                        .delay(),
                )
                .await;
            }
            Err(error) => {
                let decision = {
                    let mut lifecycle = shared.lifecycle();
                    if lifecycle.generation != generation {
                        return;
                    }
                    lifecycle.attempts_made = lifecycle
                        .attempts_made
                        .saturating_add(1);
                    let attempts_made = lifecycle.attempts_made;
                    let decision = shared
                        .policy
                        .decide(attempts_made, error.clone());
                    match &decision {
                        RetryDecision::Retry { .. } => {
                            lifecycle.state = LifecycleState::ReconnectWaiting;
                        }
                        RetryDecision::GiveUp(terminal) => {
                            lifecycle.state = LifecycleState::Failed;
                            lifecycle.driver = None;
                            lifecycle.settle(Err(terminal.clone()));
                        }
                    }
                    decision
                };

                match decision {
                    RetryDecision::Retry { delay } => {
                        warn!(
                            "[RETRY] Attempt failed: {}; retrying in {}ms",
                            error,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::GiveUp(terminal) => {
                        warn!("[RETRY] Giving up: {} (last error: {})", terminal, error);
                        if ever_connected {
                            shared.emit(&ClientEvent::Error(terminal));
                        }
                        return;
                    }
                }
            }
        }

        let mut lifecycle = shared.lifecycle();
        if lifecycle.generation != generation {
            return;
        }
        lifecycle.state = LifecycleState::Connecting;
    }
}

/// Forward events until the connection ends. Queued events are delivered
/// before the disconnect is reported.
async fn pump_events<K: Connector>(
    shared: &Shared<K>,
    connection: &K::Connection,
    mut events: AmiEventStream,
) -> DisconnectReason {
    let closed = connection.closed();
    tokio::pin!(closed);
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;
            item = events.recv(), if events_open => match item {
                Some(Ok(event)) => {
                    if shared
                        .config
                        .is_filtered(event.name())
                    {
                        continue;
                    }
                    shared.emit(&ClientEvent::Event(event));
                }
                Some(Err(error)) => shared.emit(&ClientEvent::Error(error)),
                None => events_open = false,
            },
            reason = &mut closed => return reason,
        }
    }
}
