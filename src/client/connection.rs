use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::config::GtmConfig;
use crate::protocol::{ClientCodec, GtmResult, Request, ResultPayload};
use crate::tx::NodeType;

/// Liveness status of a connection.
///
/// A connection goes `Bad` on the first transport failure and stays that
/// way; the session's pre-flight check replaces bad connections before the
/// next operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Ok,
    Bad,
}

/// Errors raised while establishing a connection.
///
/// These never escape the session boundary; [`crate::client::GtmSession`]
/// converts them into "not connected" state with a logged warning.
#[derive(Debug)]
pub enum ConnectError {
    Config(crate::config::ConfigError),
    Io(std::io::Error),
    Timeout,
    Rejected(i32),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Config(e) => write!(f, "invalid connection string: {}", e),
            ConnectError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectError::Timeout => write!(f, "connection timed out"),
            ConnectError::Rejected(status) => {
                write!(f, "startup rejected by GTM (status {})", status)
            }
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<std::io::Error> for ConnectError {
    fn from(e: std::io::Error) -> Self {
        ConnectError::Io(e)
    }
}

/// One physical connection to the GTM: a framed TCP stream plus its
/// liveness status.
pub struct GtmConnection {
    framed: Framed<TcpStream, ClientCodec>,
    status: ConnStatus,
    response_timeout: Duration,
}

impl GtmConnection {
    /// Open a connection described by a connection string of the form
    /// `host=<host> port=<port> coordinator_id=<id>`, performing the
    /// startup exchange before returning.
    pub async fn open(conn_str: &str) -> Result<Self, ConnectError> {
        let config = GtmConfig::parse(conn_str).map_err(ConnectError::Config)?;
        Self::open_with(&config).await
    }

    /// Open a connection using an already-parsed configuration.
    pub async fn open_with(config: &GtmConfig) -> Result<Self, ConnectError> {
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.address()),
        )
        .await
        .map_err(|_| ConnectError::Timeout)??;

        let mut conn = Self {
            framed: Framed::new(stream, ClientCodec::new()),
            status: ConnStatus::Ok,
            response_timeout: config.response_timeout,
        };

        // Identify ourselves before any request is accepted.
        let startup = Request::Startup {
            node_type: NodeType::Coordinator,
            node_id: config.coordinator_id,
        };
        let Some(result) = conn.round_trip(startup).await else {
            return Err(ConnectError::Timeout);
        };
        if result.status != 0 {
            return Err(ConnectError::Rejected(result.status));
        }
        debug!(coordinator_id = config.coordinator_id, "connected to GTM");
        Ok(conn)
    }

    /// Whether the connection's liveness status is still OK.
    ///
    /// This reflects the last observed transport state, not a probe; the
    /// session re-checks it before every operation.
    pub fn is_ok(&self) -> bool {
        self.status == ConnStatus::Ok
    }

    /// Send one request and block for its reply.
    ///
    /// Any transport failure (send error, timeout, EOF, decode error)
    /// marks the connection `Bad` and yields `None`; the caller converts
    /// that into its operation's sentinel.
    pub async fn round_trip(&mut self, request: Request) -> Option<GtmResult> {
        if self.framed.send(request).await.is_err() {
            self.status = ConnStatus::Bad;
            return None;
        }
        match tokio::time::timeout(self.response_timeout, self.framed.next()).await {
            Ok(Some(Ok(result))) => Some(result),
            _ => {
                self.status = ConnStatus::Bad;
                None
            }
        }
    }

    /// Send one request and extract an expected payload from the reply.
    ///
    /// A reply whose kind does not match is a protocol violation and is
    /// treated like a transport failure.
    pub async fn request<T>(
        &mut self,
        request: Request,
        extract: impl FnOnce(GtmResult) -> Option<T>,
    ) -> Option<T> {
        let result = self.round_trip(request).await?;
        match extract(result) {
            Some(value) => Some(value),
            None => {
                self.status = ConnStatus::Bad;
                None
            }
        }
    }

    /// Best-effort orderly shutdown notice; errors are ignored because the
    /// connection is being dropped either way.
    pub async fn terminate(&mut self) {
        let _ = self.framed.send(Request::Terminate).await;
    }
}

/// Extract a plain status-bearing acknowledgement.
pub(crate) fn extract_status(result: GtmResult) -> Option<i32> {
    match result.payload {
        ResultPayload::Gxid(_)
        | ResultPayload::SequenceKey(_)
        | ResultPayload::Node { .. } => Some(result.status),
        _ => None,
    }
}
