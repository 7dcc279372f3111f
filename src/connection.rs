//! Connection management for AMI

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::{
    action::{AmiAction, AmiResponse},
    config::{Credentials, SocketOptions},
    constants::{DEFAULT_COMMAND_TIMEOUT_MS, MAX_EVENT_QUEUE_SIZE, SOCKET_BUF_SIZE},
    error::{AmiError, AmiResult},
    event::AmiEvent,
    protocol::{AmiMessage, AmiParser, MessageType},
};

/// Connection status for an AMI session
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionStatus {
    /// AMI session is active.
    Connected,
    /// AMI session ended.
    Disconnected(DisconnectReason),
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Liveness timeout exceeded without any inbound traffic
    HeartbeatExpired,
    /// Keep-alive `Ping` failed
    KeepAliveFailed(String),
    /// TCP I/O error (io::Error is not Clone, so we store the message)
    IoError(String),
    /// Unparseable data from the server
    ProtocolError(String),
    /// Clean EOF on the TCP connection
    ConnectionClosed,
    /// Client called close() or disconnect()
    ClientRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::HeartbeatExpired => write!(f, "liveness timeout expired"),
            DisconnectReason::KeepAliveFailed(msg) => write!(f, "keep-alive failed: {}", msg),
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
        }
    }
}

/// Options fixed at connection time.
///
/// Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    /// Capacity of the mpsc channel delivering events. Default: 1000.
    pub event_queue_size: usize,
    /// Interval for `Action: Ping` keep-alives. Default: disabled.
    pub keep_alive: Option<Duration>,
    /// Drop the session after this long without inbound traffic. Default: disabled.
    pub liveness_timeout: Option<Duration>,
    /// Response timeout for actions. Default: 5 seconds.
    pub command_timeout: Duration,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
            keep_alive: None,
            liveness_timeout: None,
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        }
    }
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(socket: &SocketOptions) -> AmiResult<TcpStream> {
    let timeout_ms = socket
        .connect_timeout
        .as_millis() as u64;
    let tcp_result = timeout(
        socket.connect_timeout,
        TcpStream::connect((socket.host.as_str(), socket.port)),
    )
    .await;

    match tcp_result {
        Ok(Ok(s)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(s)
        }
        Ok(Err(e)) => {
            warn!("[CONNECT] TCP connect failed: {}", e);
            Err(AmiError::from(e))
        }
        Err(_) => {
            warn!("[CONNECT] TCP connect timed out after {}ms", timeout_ms);
            Err(AmiError::Timeout { timeout_ms })
        }
    }
}

/// Shared state between AmiConnection handles and the reader task
struct SharedState {
    /// Waiters keyed by ActionID
    pending: Mutex<HashMap<String, oneshot::Sender<AmiMessage>>>,
    /// Liveness timeout in milliseconds (0 = disabled)
    liveness_timeout_ms: AtomicU64,
    /// Command response timeout in milliseconds
    command_timeout_ms: AtomicU64,
    /// Set when events have been dropped due to a full queue
    event_overflow: AtomicBool,
    /// Total count of dropped events
    dropped_event_count: AtomicU64,
    next_action_id: AtomicU64,
    action_id_prefix: String,
}

impl SharedState {
    fn next_action_id(&self) -> String {
        let n = self
            .next_action_id
            .fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.action_id_prefix, n)
    }
}

/// Live AMI session handle (Clone + Send)
///
/// Actions may be sent concurrently from any task; the reader task routes each
/// response to its caller by `ActionID`.
#[derive(Clone)]
pub struct AmiConnection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    shared: Arc<SharedState>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    version: Arc<str>,
}

impl std::fmt::Debug for AmiConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiConnection")
            .field("version", &self.version)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Event stream receiver (!Clone)
///
/// Events are delivered as `Result<AmiEvent, AmiError>`. An
/// `Err(AmiError::QueueFull)` indicates that one or more events were dropped
/// because the application fell behind. The stream ends when the session does.
pub struct AmiEventStream {
    rx: mpsc::Receiver<AmiResult<AmiEvent>>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .finish_non_exhaustive()
    }
}

impl AmiEventStream {
    /// Wrap a receiver fed by a [`Connector`](crate::Connector) implementation.
    pub fn new(rx: mpsc::Receiver<AmiResult<AmiEvent>>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or None once the session has ended.
    pub async fn recv(&mut self) -> Option<AmiResult<AmiEvent>> {
        self.rx
            .recv()
            .await
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = AmiResult<AmiEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}

/// Move the status to `Disconnected` exactly once. Returns whether this call did it.
fn mark_disconnected(status_tx: &watch::Sender<ConnectionStatus>, reason: DisconnectReason) -> bool {
    status_tx.send_if_modified(|status| {
        if *status == ConnectionStatus::Connected {
            *status = ConnectionStatus::Disconnected(reason);
            true
        } else {
            false
        }
    })
}

/// Read a single AMI record from the socket into the parser.
///
/// Only used during the handshake on the unsplit stream.
async fn recv_message(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
    timeout_ms: u64,
) -> AmiResult<AmiMessage> {
    loop {
        if let Some(message) = parser.parse_message()? {
            trace!(
                "[RECV] Parsed message from buffer: {:?}",
                message.message_type
            );
            return Ok(message);
        }
        read_some(stream, parser, read_buffer, timeout_ms).await?;
    }
}

async fn read_some(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
    timeout_ms: u64,
) -> AmiResult<()> {
    trace!("[RECV] Buffer needs more data, reading from socket");
    let bytes_read = match timeout(Duration::from_millis(timeout_ms), stream.read(read_buffer)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(AmiError::from(e)),
        Err(_) => return Err(AmiError::Timeout { timeout_ms }),
    };

    trace!("[RECV] Read {} bytes from socket", bytes_read);
    if bytes_read == 0 {
        return Err(AmiError::ConnectionClosed);
    }

    parser.add_data(&read_buffer[..bytes_read])
}

/// Wait for the banner, then log in.
async fn authenticate(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
    credentials: &Credentials,
    timeout_ms: u64,
) -> AmiResult<String> {
    debug!("[AUTH] Waiting for greeting from Asterisk");
    let version = loop {
        if let Some(version) = parser.parse_greeting()? {
            break version;
        }
        read_some(stream, parser, read_buffer, timeout_ms).await?;
    };
    debug!("[AUTH] Asterisk Call Manager version {}", version);

    let mut login = AmiAction::login(&credentials.username, &credentials.secret)?;
    let login_id = login.ensure_action_id(|| "login".to_string());
    let wire = login.to_wire_format()?;
    debug!("Sending action: Login {} [REDACTED]", credentials.username);
    stream
        .write_all(wire.as_bytes())
        .await
        .map_err(AmiError::from)?;

    let response = loop {
        let message = recv_message(stream, parser, read_buffer, timeout_ms).await?;
        match message.message_type {
            MessageType::Response
                if message
                    .action_id()
                    .map_or(true, |id| id == login_id) =>
            {
                break message.into_response();
            }
            _ => debug!("[AUTH] Ignoring message before login response"),
        }
    };

    if !response.is_success() {
        return Err(AmiError::auth_failed(
            response
                .message()
                .unwrap_or("Authentication failed"),
        ));
    }

    debug!("Authentication successful");
    Ok(version)
}

/// Try to send an event (or error) to the application via try_send.
///
/// If the channel is full, drop the item, set the overflow flag, and
/// increment the dropped counter. Before each dispatch, check the overflow
/// flag and attempt to deliver a QueueFull error notification first.
fn dispatch_event(
    event_tx: &mpsc::Sender<AmiResult<AmiEvent>>,
    shared: &SharedState,
    item: AmiResult<AmiEvent>,
) -> bool {
    if shared
        .event_overflow
        .load(Ordering::Relaxed)
    {
        match event_tx.try_send(Err(AmiError::QueueFull)) {
            Ok(()) => {
                shared
                    .event_overflow
                    .store(false, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
            Err(mpsc::error::TrySendError::Full(_)) => {}
        }
    }

    match event_tx.try_send(item) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
        Err(mpsc::error::TrySendError::Full(_)) => {
            shared
                .event_overflow
                .store(true, Ordering::Relaxed);
            shared
                .dropped_event_count
                .fetch_add(1, Ordering::Relaxed);
            warn!("Event queue full, dropping event");
            true
        }
    }
}

/// Background reader loop
async fn reader_loop(
    reader: OwnedReadHalf,
    parser: AmiParser,
    shared: Arc<SharedState>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    event_tx: mpsc::Sender<AmiResult<AmiEvent>>,
) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(
        reader,
        parser,
        shared.clone(),
        status_tx.clone(),
        event_tx,
    ));
    if futures_util::FutureExt::catch_unwind(result)
        .await
        .is_err()
    {
        tracing::error!("reader task panicked");
        mark_disconnected(
            &status_tx,
            DisconnectReason::IoError("reader task panicked".to_string()),
        );
    }

    // Dropping the senders wakes every waiter with ConnectionClosed.
    shared
        .pending
        .lock()
        .await
        .clear();
}

async fn reader_loop_inner(
    mut reader: OwnedReadHalf,
    mut parser: AmiParser,
    shared: Arc<SharedState>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    event_tx: mpsc::Sender<AmiResult<AmiEvent>>,
) {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];
    let mut last_recv = Instant::now();
    let mut status_rx = status_tx.subscribe();

    loop {
        // Drain complete records before reading more
        match parser.parse_message() {
            Ok(Some(message)) => {
                match message.message_type {
                    MessageType::Event => {
                        if !dispatch_event(&event_tx, &shared, Ok(message.into_event())) {
                            debug!("Event channel closed, reader exiting");
                            mark_disconnected(&status_tx, DisconnectReason::ClientRequested);
                            return;
                        }
                    }
                    MessageType::Response => {
                        let waiter = match message.action_id() {
                            Some(id) => shared
                                .pending
                                .lock()
                                .await
                                .remove(id),
                            None => None,
                        };
                        match waiter {
                            Some(tx) => {
                                let _ = tx.send(message);
                            }
                            None => debug!(
                                "Received response with no pending action: {:?}",
                                message.action_id()
                            ),
                        }
                    }
                    MessageType::Unknown => {
                        debug!("Ignoring record without Response/Event key");
                    }
                }
                continue;
            }
            Ok(None) => {
                // Need more data from socket
            }
            Err(e) => {
                warn!("Parser error: {}", e);
                let _ = dispatch_event(&event_tx, &shared, Err(e.clone()));
                mark_disconnected(&status_tx, DisconnectReason::ProtocolError(e.to_string()));
                return;
            }
        }

        // Read from socket with 2s timeout (for liveness checking)
        let read_result = tokio::select! {
            result = timeout(Duration::from_secs(2), reader.read(&mut read_buffer)) => result,
            _ = status_rx.changed() => {
                debug!("Connection closed locally, reader exiting");
                return;
            }
        };

        match read_result {
            Ok(Ok(0)) => {
                info!("Connection closed (EOF)");
                mark_disconnected(&status_tx, DisconnectReason::ConnectionClosed);
                return;
            }
            Ok(Ok(n)) => {
                last_recv = Instant::now();
                if let Err(e) = parser.add_data(&read_buffer[..n]) {
                    warn!("Buffer error: {}", e);
                    mark_disconnected(&status_tx, DisconnectReason::ProtocolError(e.to_string()));
                    return;
                }
            }
            Ok(Err(e)) => {
                warn!("Read error: {}", e);
                mark_disconnected(&status_tx, DisconnectReason::IoError(e.to_string()));
                return;
            }
            Err(_) => {
                // timeout: check liveness
                let threshold_ms = shared
                    .liveness_timeout_ms
                    .load(Ordering::Relaxed);
                if threshold_ms > 0 {
                    let elapsed = last_recv.elapsed();
                    if elapsed > Duration::from_millis(threshold_ms) {
                        warn!(
                            "Liveness timeout: {}ms without traffic (threshold {}ms)",
                            elapsed.as_millis(),
                            threshold_ms
                        );
                        mark_disconnected(&status_tx, DisconnectReason::HeartbeatExpired);
                        return;
                    }
                }
            }
        }
    }
}

/// Periodic `Ping` while the session is up.
async fn keep_alive_loop(connection: AmiConnection, interval: Duration) {
    let mut status_rx = connection
        .status_rx
        .clone();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = status_rx.changed() => break,
        }
        if !connection.is_connected() {
            break;
        }

        match connection
            .send_action(AmiAction::ping())
            .await
        {
            Ok(response) if response.is_success() => trace!("Keep-alive ping answered"),
            Ok(response) => {
                let reason = response
                    .message()
                    .unwrap_or("ping rejected")
                    .to_string();
                warn!("Keep-alive ping rejected: {}", reason);
                connection.shutdown_with(DisconnectReason::KeepAliveFailed(reason));
                break;
            }
            Err(e) => {
                warn!("Keep-alive ping failed: {}", e);
                connection.shutdown_with(DisconnectReason::KeepAliveFailed(e.to_string()));
                break;
            }
        }
    }
    trace!("Keep-alive task finished");
}

impl AmiConnection {
    /// Connect to Asterisk and log in with default options.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<(Self, AmiEventStream)> {
        Self::connect_with_options(
            &Credentials::new(username, secret),
            &SocketOptions::new(host, port),
            AmiConnectOptions::default(),
        )
        .await
    }

    /// Connect to Asterisk and log in with custom options.
    pub async fn connect_with_options(
        credentials: &Credentials,
        socket: &SocketOptions,
        options: AmiConnectOptions,
    ) -> AmiResult<(Self, AmiEventStream)> {
        info!("Connecting to Asterisk at {}:{}", socket.host, socket.port);

        let mut stream = tcp_connect_with_timeout(socket).await?;
        let mut parser = AmiParser::new();
        let mut read_buffer = [0u8; SOCKET_BUF_SIZE];
        let timeout_ms = socket
            .connect_timeout
            .as_millis() as u64;

        let version = authenticate(
            &mut stream,
            &mut parser,
            &mut read_buffer,
            credentials,
            timeout_ms,
        )
        .await?;

        info!("Successfully connected and authenticated to Asterisk");
        Ok(Self::split_and_spawn(stream, parser, version, options))
    }

    fn split_and_spawn(
        stream: TcpStream,
        parser: AmiParser,
        version: String,
        options: AmiConnectOptions,
    ) -> (Self, AmiEventStream) {
        let queue_size = options
            .event_queue_size
            .max(1);

        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(SharedState {
            pending: Mutex::new(HashMap::new()),
            liveness_timeout_ms: AtomicU64::new(
                options
                    .liveness_timeout
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0),
            ),
            command_timeout_ms: AtomicU64::new(
                options
                    .command_timeout
                    .as_millis() as u64,
            ),
            event_overflow: AtomicBool::new(false),
            dropped_event_count: AtomicU64::new(0),
            next_action_id: AtomicU64::new(1),
            action_id_prefix: format!("ami-{}", std::process::id()),
        });

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let status_tx = Arc::new(status_tx);
        let (event_tx, event_rx) = mpsc::channel(queue_size);

        tokio::spawn(reader_loop(
            read_half,
            parser,
            shared.clone(),
            status_tx.clone(),
            event_tx,
        ));

        let connection = AmiConnection {
            writer: Arc::new(Mutex::new(write_half)),
            shared,
            status_tx,
            status_rx,
            version: version.into(),
        };

        if let Some(interval) = options.keep_alive {
            tokio::spawn(keep_alive_loop(connection.clone(), interval));
        }

        (connection, AmiEventStream::new(event_rx))
    }

    /// Send an action and wait for the response carrying the same `ActionID`.
    ///
    /// An `ActionID` is generated when the action has none. A `Response: Error`
    /// is returned as `Ok`; use [`AmiResponse::into_result`] to turn it into an
    /// error.
    pub async fn send_action(&self, action: AmiAction) -> AmiResult<AmiResponse> {
        if !self.is_connected() {
            return Err(AmiError::NotConnected);
        }

        let mut action = action;
        let action_id = action.ensure_action_id(|| {
            self.shared
                .next_action_id()
        });
        let wire = action.to_wire_format()?;
        debug!("Sending action: {} ({})", action.name(), action_id);

        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .await
            .insert(action_id.clone(), tx);

        let write_result = {
            let mut writer = self
                .writer
                .lock()
                .await;
            writer
                .write_all(wire.as_bytes())
                .await
        };
        if let Err(e) = write_result {
            self.forget_pending(&action_id)
                .await;
            return Err(AmiError::from(e));
        }

        let timeout_ms = self
            .shared
            .command_timeout_ms
            .load(Ordering::Relaxed);
        let message = match timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => return Err(AmiError::ConnectionClosed),
            Err(_) => {
                self.forget_pending(&action_id)
                    .await;
                return Err(AmiError::Timeout { timeout_ms });
            }
        };

        let response = message.into_response();
        debug!("Received response: success={}", response.is_success());
        Ok(response)
    }

    async fn forget_pending(&self, action_id: &str) {
        self.shared
            .pending
            .lock()
            .await
            .remove(action_id);
    }

    /// `Action: Ping`, failing unless answered with success.
    pub async fn ping(&self) -> AmiResult<AmiResponse> {
        self.send_action(AmiAction::ping())
            .await?
            .into_result()
    }

    /// Send `Action: Logoff`, then close the socket.
    pub async fn logoff(&self) -> AmiResult<()> {
        let result = self
            .send_action(AmiAction::logoff())
            .await;
        self.close();
        result.map(|_| ())
    }

    /// Number of events dropped due to a full event queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared
            .dropped_event_count
            .load(Ordering::Relaxed)
    }

    /// Set liveness timeout. Any inbound TCP traffic resets the timer.
    /// Set to zero to disable (default).
    pub fn set_liveness_timeout(&self, duration: Duration) {
        self.shared
            .liveness_timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set action response timeout (default: 5 seconds).
    pub fn set_command_timeout(&self, duration: Duration) {
        self.shared
            .command_timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Version from the `Asterisk Call Manager/<version>` banner.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the session is alive (not yet disconnected).
    pub fn is_connected(&self) -> bool {
        matches!(
            *self
                .status_rx
                .borrow(),
            ConnectionStatus::Connected
        )
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx
            .borrow()
            .clone()
    }

    /// Wait until the session ends.
    pub async fn closed(&self) -> DisconnectReason {
        let mut status_rx = self
            .status_rx
            .clone();
        loop {
            let status = status_rx
                .borrow_and_update()
                .clone();
            if let ConnectionStatus::Disconnected(reason) = status {
                return reason;
            }
            if status_rx
                .changed()
                .await
                .is_err()
            {
                return DisconnectReason::ConnectionClosed;
            }
        }
    }

    /// Close the session without sending anything.
    ///
    /// Does not wait: the reader stops and the write half is shut down in the
    /// background.
    pub fn close(&self) {
        info!("Client requested disconnect");
        self.shutdown_with(DisconnectReason::ClientRequested);
    }

    fn shutdown_with(&self, reason: DisconnectReason) {
        if !mark_disconnected(&self.status_tx, reason) {
            return;
        }
        let writer = self
            .writer
            .clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = writer
                        .lock()
                        .await
                        .shutdown()
                        .await;
                });
            }
            Err(_) => debug!("No runtime to shut down writer; socket closes on drop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_eq() {
        assert_eq!(ConnectionStatus::Connected, ConnectionStatus::Connected);
        assert_eq!(
            ConnectionStatus::Disconnected(DisconnectReason::HeartbeatExpired),
            ConnectionStatus::Disconnected(DisconnectReason::HeartbeatExpired)
        );
        assert_ne!(
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected(DisconnectReason::ConnectionClosed)
        );
    }

    #[test]
    fn test_mark_disconnected_only_once() {
        let (tx, rx) = watch::channel(ConnectionStatus::Connected);
        assert!(mark_disconnected(&tx, DisconnectReason::ConnectionClosed));
        assert!(!mark_disconnected(&tx, DisconnectReason::ClientRequested));
        assert_eq!(
            *rx.borrow(),
            ConnectionStatus::Disconnected(DisconnectReason::ConnectionClosed)
        );
    }

    #[test]
    fn test_default_options() {
        let options = AmiConnectOptions::default();
        assert_eq!(options.event_queue_size, 1000);
        assert_eq!(options.command_timeout, Duration::from_secs(5));
        assert!(options
            .keep_alive
            .is_none());
    }

    #[tokio::test]
    async fn test_dispatch_event_reports_overflow() {
        let shared = SharedState {
            pending: Mutex::new(HashMap::new()),
            liveness_timeout_ms: AtomicU64::new(0),
            command_timeout_ms: AtomicU64::new(0),
            event_overflow: AtomicBool::new(false),
            dropped_event_count: AtomicU64::new(0),
            next_action_id: AtomicU64::new(1),
            action_id_prefix: "t".to_string(),
        };
        let (tx, mut rx) = mpsc::channel(1);

        assert!(dispatch_event(&tx, &shared, Ok(AmiEvent::with_name("A"))));
        assert!(dispatch_event(&tx, &shared, Ok(AmiEvent::with_name("B"))));
        assert_eq!(
            shared
                .dropped_event_count
                .load(Ordering::Relaxed),
            1
        );

        let first = rx
            .recv()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name(), Some("A"));

        assert!(dispatch_event(&tx, &shared, Ok(AmiEvent::with_name("C"))));
        assert!(matches!(rx.recv().await, Some(Err(AmiError::QueueFull))));
    }

    #[test]
    fn test_action_ids_are_unique() {
        let shared = SharedState {
            pending: Mutex::new(HashMap::new()),
            liveness_timeout_ms: AtomicU64::new(0),
            command_timeout_ms: AtomicU64::new(0),
            event_overflow: AtomicBool::new(false),
            dropped_event_count: AtomicU64::new(0),
            next_action_id: AtomicU64::new(1),
            action_id_prefix: "ami-1".to_string(),
        };
        assert_eq!(shared.next_action_id(), "ami-1-1");
        assert_eq!(shared.next_action_id(), "ami-1-2");
    }
}
