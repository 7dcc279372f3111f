//! Seams between the lifecycle controller and the transport.
//!
//! [`AmiClient`](crate::AmiClient) only ever talks to a [`Connector`]: one call
//! is one connection + login attempt. [`TcpConnector`] is the real
//! implementation; anything else (test doubles, TLS tunnels) plugs in here.

use async_trait::async_trait;

use crate::{
    action::{AmiAction, AmiResponse},
    config::{Credentials, SocketOptions},
    connection::{AmiConnectOptions, AmiConnection, AmiEventStream, DisconnectReason},
    error::AmiResult,
};

/// A live, authenticated AMI session.
///
/// Handles are cheap to clone; all clones refer to the same session.
#[async_trait]
pub trait Connection: Clone + Send + Sync + 'static {
    /// Send an action and wait for its response.
    async fn send_action(&self, action: AmiAction) -> AmiResult<AmiResponse>;

    /// Resolves once the session has ended, with the reason.
    ///
    /// A session ends at most once; later calls return the same reason
    /// immediately.
    async fn closed(&self) -> DisconnectReason;

    /// Close the session. Idempotent.
    fn close(&self);
}

/// Performs a single connection + authentication attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    /// One attempt. No retries happen at this level.
    async fn attempt(
        &self,
        credentials: &Credentials,
        socket: &SocketOptions,
    ) -> AmiResult<(Self::Connection, AmiEventStream)>;
}

/// Connector over plain TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    options: AmiConnectOptions,
}

impl TcpConnector {
    pub fn new(options: AmiConnectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AmiConnectOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Connection = AmiConnection;

    async fn attempt(
        &self,
        credentials: &Credentials,
        socket: &SocketOptions,
    ) -> AmiResult<(AmiConnection, AmiEventStream)> {
        AmiConnection::connect_with_options(credentials, socket, self.options.clone()).await
    }
}

#[async_trait]
impl Connection for AmiConnection {
    async fn send_action(&self, action: AmiAction) -> AmiResult<AmiResponse> {
        AmiConnection::send_action(self, action).await
    }

    async fn closed(&self) -> DisconnectReason {
        AmiConnection::closed(self).await
    }

    fn close(&self) {
        AmiConnection::close(self)
    }
}
