//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for Asterisk's Manager Interface,
//! with a connection lifecycle that retries failed logins and re-establishes
//! dropped sessions on its own.
//!
//! # Architecture
//!
//! Two layers:
//! - [`AmiConnection`] (Clone + Send): one authenticated TCP session. Actions
//!   can be sent from any task; responses are matched by `ActionID`. Events
//!   arrive on an [`AmiEventStream`] fed by a background reader task.
//! - [`AmiClient`]: the lifecycle controller. It owns the retry policy, the
//!   reconnect timer and the current connection, and reports everything that
//!   happens to subscribers as [`ClientEvent`]s.
//!
//! The controller reaches the network only through the [`Connector`] trait,
//! so the lifecycle can be driven by any transport. [`TcpConnector`] is the
//! default.
//!
//! # Examples
//!
//! ## Single session
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiAction, AmiConnection, AmiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let (connection, mut events) =
//!         AmiConnection::connect("localhost", 5038, "admin", "secret").await?;
//!
//!     let response = connection
//!         .send_action(AmiAction::new("CoreStatus"))
//!         .await?
//!         .into_result()?;
//!     println!("Startup: {:?}", response.header("CoreStartupTime"));
//!
//!     while let Some(Ok(event)) = events.recv().await {
//!         println!("{:?}", event.name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Reconnecting client
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError, ClientConfig, ClientEvent, SocketOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let config = ClientConfig::default()
//!         .with_reconnect(true)
//!         .with_max_attempts(10)
//!         .with_attempts_delay(Duration::from_secs(1))
//!         .with_keep_alive(Duration::from_secs(30));
//!     let client = AmiClient::new(config)?;
//!
//!     client.subscribe(|event| match event {
//!         ClientEvent::Connect => println!("connected"),
//!         ClientEvent::Disconnect(reason) => println!("disconnected: {}", reason),
//!         ClientEvent::Event(e) => println!("event {:?}", e.name()),
//!         ClientEvent::Error(e) => eprintln!("error: {}", e),
//!         _ => {}
//!     });
//!
//!     client
//!         .connect("admin", "secret", SocketOptions::new("localhost", 5038))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Building actions
//!
//! ```rust
//! use asterisk_ami_tokio::AmiAction;
//!
//! let action = AmiAction::new("Originate")
//!     .header("Channel", "PJSIP/1000")?
//!     .header("Exten", "2000")?
//!     .header("Context", "default")?
//!     .header("Priority", "1")?
//!     .variable("CALLERID(name)", "Test")?;
//! assert_eq!(action.name(), "Originate");
//! # Ok::<(), asterisk_ami_tokio::AmiError>(())
//! ```

pub mod action;
pub mod client;
pub mod config;
pub mod connection;
pub mod connector;
pub mod constants;
pub mod error;
pub mod event;
pub mod headers;
pub mod retry;

pub(crate) mod buffer;
pub(crate) mod protocol;

pub use action::{AmiAction, AmiResponse, ResponseStatus};
pub use client::{AmiClient, ClientEvent, LifecycleState, SubscriptionId};
pub use config::{ClientConfig, Credentials, SocketOptions};
pub use connection::{
    AmiConnectOptions, AmiConnection, AmiEventStream, ConnectionStatus, DisconnectReason,
};
pub use connector::{Connection, Connector, TcpConnector};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult};
pub use event::AmiEvent;
pub use headers::AmiHeaders;
pub use retry::{RetryDecision, RetryPolicy};
