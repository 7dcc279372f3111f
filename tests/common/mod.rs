//! In-process AMI server for integration tests.
//!
//! Speaks just enough of the protocol: banner, `Login`, `Ping`, `Logoff`, and
//! a generic success reply echoing the action name for everything else.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

pub const USERNAME: &str = "admin";
pub const SECRET: &str = "amp111";
pub const VERSION: &str = "6.0.0";

#[derive(Debug, Clone)]
enum Control {
    Push(String),
    DropAll,
}

struct ServerState {
    username: String,
    secret: String,
    logins: AtomicUsize,
    pings: AtomicUsize,
    accepted: AtomicUsize,
}

pub struct FakeAmi {
    addr: SocketAddr,
    state: Arc<ServerState>,
    control: broadcast::Sender<Control>,
    accept_task: JoinHandle<()>,
}

impl FakeAmi {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_on(addr: SocketAddr) -> Self {
        init_tracing();
        let listener = TcpListener::bind(addr)
            .await
            .expect("bind fake AMI server");
        let addr = listener
            .local_addr()
            .unwrap();
        let state = Arc::new(ServerState {
            username: USERNAME.to_string(),
            secret: SECRET.to_string(),
            logins: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
        });
        let (control, _) = broadcast::channel(64);

        let accept_task = {
            let state = state.clone();
            let control = control.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener
                    .accept()
                    .await
                {
                    state
                        .accepted
                        .fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, state.clone(), control.subscribe()));
                }
            })
        };

        Self {
            addr,
            state,
            control,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr
            .port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send a raw record (must end with a blank line) to every session.
    pub fn push(&self, record: &str) {
        let _ = self
            .control
            .send(Control::Push(record.to_string()));
    }

    pub fn push_event(&self, name: &str) {
        self.push(&format!("Event: {}\r\nPrivilege: system,all\r\n\r\n", name));
    }

    /// Close every live session; keep accepting new ones.
    pub fn drop_connections(&self) {
        let _ = self
            .control
            .send(Control::DropAll);
    }

    /// Stop listening and close every session.
    pub fn shutdown(self) {
        self.accept_task
            .abort();
        self.drop_connections();
    }

    pub fn logins(&self) -> usize {
        self.state
            .logins
            .load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.state
            .pings
            .load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.state
            .accepted
            .load(Ordering::SeqCst)
    }
}

/// Route library logs to the test harness; `RUST_LOG=asterisk_ami_tokio=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An address nothing is listening on (at the moment of the call).
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    listener
        .local_addr()
        .unwrap()
}

pub async fn wait_for<F: Fn() -> bool>(condition: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn serve(
    stream: TcpStream,
    state: Arc<ServerState>,
    mut control: broadcast::Receiver<Control>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let banner = format!("Asterisk Call Manager/{}\r\n", VERSION);
    if write_half
        .write_all(banner.as_bytes())
        .await
        .is_err()
    {
        return;
    }

    let mut record: Vec<(String, String)> = Vec::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    _ => return,
                };
                let line = line.trim_end_matches('\r');
                if line.is_empty() {
                    if record.is_empty() {
                        continue;
                    }
                    let (reply, close) = state.reply(&record);
                    record.clear();
                    if write_half.write_all(reply.as_bytes()).await.is_err() || close {
                        return;
                    }
                } else if let Some((key, value)) = line.split_once(':') {
                    record.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
            control = control.recv() => match control {
                Ok(Control::Push(text)) => {
                    if write_half.write_all(text.as_bytes()).await.is_err() {
                        return;
                    }
                }
                Ok(Control::DropAll) | Err(_) => return,
            }
        }
    }
}

impl ServerState {
    fn reply(&self, record: &[(String, String)]) -> (String, bool) {
        let get = |name: &str| {
            record
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        let action = get("Action").unwrap_or("");
        let id_line = get("ActionID")
            .map(|id| format!("ActionID: {}\r\n", id))
            .unwrap_or_default();

        match action.to_ascii_lowercase().as_str() {
            "login" => {
                let ok = get("Username") == Some(self.username.as_str())
                    && get("Secret") == Some(self.secret.as_str());
                if ok {
                    self.logins
                        .fetch_add(1, Ordering::SeqCst);
                    (
                        format!(
                            "Response: Success\r\n{}Message: Authentication accepted\r\n\r\n\
                             Event: FullyBooted\r\nPrivilege: system,all\r\nStatus: Fully Booted\r\n\r\n",
                            id_line
                        ),
                        false,
                    )
                } else {
                    (
                        format!(
                            "Response: Error\r\n{}Message: Authentication failed\r\n\r\n",
                            id_line
                        ),
                        false,
                    )
                }
            }
            "ping" => {
                self.pings
                    .fetch_add(1, Ordering::SeqCst);
                (
                    format!(
                        "Response: Success\r\n{}Ping: Pong\r\nTimestamp: 1700000000.000000\r\n\r\n",
                        id_line
                    ),
                    false,
                )
            }
            // legacy (Asterisk 13) Command reply: raw body, no Output keys
            "command" => (
                format!(
                    "Response: Follows\r\nPrivilege: Command\r\n{}\
                     Asterisk 13.1.0 built by root @ build on x86_64\r\n\
                     --END COMMAND--\r\n\r\n",
                    id_line
                ),
                false,
            ),
            "logoff" => (
                format!(
                    "Response: Goodbye\r\n{}Message: Thanks for all the fish.\r\n\r\n",
                    id_line
                ),
                true,
            ),
            other => (
                format!(
                    "Response: Success\r\n{}Message: {} accepted\r\n\r\n",
                    id_line, other
                ),
                false,
            ),
        }
    }
}
