//! Shared helpers for integration tests: a real GTM server on an
//! ephemeral port, and a flaky server that fails scripted operations by
//! dropping the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use gtm::config::GtmConfig;
use gtm::protocol::{GtmResult, Request, ResultPayload, ServerCodec};
use gtm::server::{ConnectionRegistry, GtmState, Server};
use gtm::tx::GlobalXid;

/// Start a real GTM server on an ephemeral port.
pub async fn start_server() -> (SocketAddr, Arc<GtmState>, Arc<ConnectionRegistry>) {
    let state = Arc::new(GtmState::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(listener, Arc::clone(&state));
    let registry = Arc::clone(server.registry());
    tokio::spawn(server.serve());
    (addr, state, registry)
}

/// Session configuration pointing at a test server, with short timeouts.
pub fn config_for(addr: SocketAddr) -> GtmConfig {
    GtmConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        coordinator_id: 1,
        connect_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_secs(2),
    }
}

/// Poll until `predicate` holds or a deadline passes.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

/// Attempt counters observed by a [`FlakyGtm`].
#[derive(Default)]
pub struct FlakyCounters {
    pub startups: AtomicUsize,
    pub begin_attempts: AtomicUsize,
    pub commit_attempts: AtomicUsize,
    pub snapshot_attempts: AtomicUsize,
}

/// A scripted GTM stand-in that acknowledges startups, then fails begin or
/// commit requests by dropping the connection without replying.
pub struct FlakyGtm {
    pub addr: SocketAddr,
    pub counters: Arc<FlakyCounters>,
}

impl FlakyGtm {
    /// `fail_begins`: how many begin requests to fail before serving them
    /// (use `usize::MAX` for "always"). `fail_commits`: drop the
    /// connection on every commit.
    pub async fn start(fail_begins: usize, fail_commits: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let counters = Arc::new(FlakyCounters::default());

        let task_counters = Arc::clone(&counters);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let counters = Arc::clone(&task_counters);
                tokio::spawn(async move {
                    let mut framed = Framed::new(socket, ServerCodec::new());
                    while let Some(Ok(request)) = framed.next().await {
                        match request {
                            Request::Startup { node_type, node_id } => {
                                counters.startups.fetch_add(1, Ordering::SeqCst);
                                let reply =
                                    GtmResult::ok(ResultPayload::Node { node_type, node_id });
                                if framed.send(reply).await.is_err() {
                                    return;
                                }
                            }
                            Request::TxnBeginGetGxid { .. } => {
                                let attempt =
                                    counters.begin_attempts.fetch_add(1, Ordering::SeqCst);
                                if attempt < fail_begins {
                                    // Drop the connection without replying.
                                    return;
                                }
                                let reply = GtmResult::ok(ResultPayload::GxidTimestamp {
                                    gxid: GlobalXid::new(100 + attempt as u64),
                                    timestamp: 1,
                                });
                                if framed.send(reply).await.is_err() {
                                    return;
                                }
                            }
                            Request::TxnCommit { gxid } => {
                                counters.commit_attempts.fetch_add(1, Ordering::SeqCst);
                                if fail_commits {
                                    return;
                                }
                                let reply = GtmResult::ok(ResultPayload::Gxid(gxid));
                                if framed.send(reply).await.is_err() {
                                    return;
                                }
                            }
                            Request::SnapshotGet { .. } => {
                                counters.snapshot_attempts.fetch_add(1, Ordering::SeqCst);
                                // Snapshots always fail on this server.
                                return;
                            }
                            _ => return,
                        }
                    }
                });
            }
        });

        Self { addr, counters }
    }

    pub fn begin_attempts(&self) -> usize {
        self.counters.begin_attempts.load(Ordering::SeqCst)
    }

    pub fn commit_attempts(&self) -> usize {
        self.counters.commit_attempts.load(Ordering::SeqCst)
    }

    pub fn snapshot_attempts(&self) -> usize {
        self.counters.snapshot_attempts.load(Ordering::SeqCst)
    }

    pub fn startups(&self) -> usize {
        self.counters.startups.load(Ordering::SeqCst)
    }
}
