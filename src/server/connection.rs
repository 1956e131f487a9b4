use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::protocol::{GtmResult, ProtocolError, Request, ResultPayload, ServerCodec};
use crate::server::registry::{ConnectionRegistry, WorkerContext};
use crate::server::state::{GtmState, status};
use crate::tx::GlobalXid;

/// Connection error types.
#[derive(Debug)]
pub enum ConnectionError {
    Io(std::io::Error),
    Protocol(ProtocolError),
    /// The peer sent a request before completing the startup exchange.
    NotAuthenticated,
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectionError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ConnectionError::NotAuthenticated => {
                write!(f, "request received before startup exchange")
            }
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        ConnectionError::Protocol(e)
    }
}

/// A single client connection: the request loop between the framed codec
/// and the shared [`GtmState`].
pub struct Connection {
    framed: Framed<TcpStream, ServerCodec>,
    worker: Arc<WorkerContext>,
    registry: Arc<ConnectionRegistry>,
    state: Arc<GtmState>,
}

impl Connection {
    pub fn new(
        socket: TcpStream,
        worker: Arc<WorkerContext>,
        registry: Arc<ConnectionRegistry>,
        state: Arc<GtmState>,
    ) -> Self {
        Self {
            framed: Framed::new(socket, ServerCodec::new()),
            worker,
            registry,
            state,
        }
    }

    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        let cancel = self.worker.cancel.clone();
        let conn_id = self.worker.conn_id;
        loop {
            tokio::select! {
                res = self.handle_message() => {
                    if res? {
                        return Ok(());
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(conn_id, "connection cancelled");
                    return Ok(());
                }
            }
        }
    }

    /// Handle a single request from the client.
    /// Returns true if the connection should terminate.
    async fn handle_message(&mut self) -> Result<bool, ConnectionError> {
        let request = match self.framed.next().await {
            Some(Ok(request)) => request,
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(true), // EOF - client disconnected
        };

        match request {
            Request::Startup { node_type, node_id } => {
                debug!(
                    conn_id = self.worker.conn_id,
                    %node_type,
                    node_id,
                    "startup"
                );
                self.registry.mark_authenticated(self.worker.conn_id);
                self.send(GtmResult::ok(ResultPayload::Node { node_type, node_id }))
                    .await?;
            }
            Request::Terminate => return Ok(true),
            request => {
                // Every other request requires a completed startup exchange.
                if !self.registry.is_authenticated(self.worker.conn_id) {
                    self.send(
                        GtmResult::ok(ResultPayload::Gxid(GlobalXid::INVALID))
                            .with_status(status::NOT_AUTHENTICATED),
                    )
                    .await?;
                    return Err(ConnectionError::NotAuthenticated);
                }
                let result = self.dispatch(request);
                self.send(result).await?;
            }
        }
        Ok(false)
    }

    /// Map one authenticated request onto the shared state, producing the
    /// result envelope for it.
    fn dispatch(&self, request: Request) -> GtmResult {
        let state = &self.state;
        match request {
            Request::TxnBegin { .. } => {
                GtmResult::ok(ResultPayload::TxnHandle(state.begin_handle()))
            }
            Request::TxnBeginGetGxid { .. } => {
                let (gxid, timestamp) = state.begin(false);
                GtmResult::ok(ResultPayload::GxidTimestamp { gxid, timestamp })
            }
            Request::TxnBeginAutovacuum { .. } => {
                let (gxid, _) = state.begin(true);
                GtmResult::ok(ResultPayload::Gxid(gxid))
            }
            Request::TxnBeginGetGxidMulti { count, .. } => {
                let xids = state.begin_multi(count as usize);
                GtmResult::ok(ResultPayload::TxnBeginMulti { xids })
            }
            Request::TxnCommit { gxid } => {
                let status = state.commit(gxid);
                GtmResult::ok(ResultPayload::Gxid(gxid)).with_status(status)
            }
            Request::TxnRollback { gxid } => {
                let status = state.rollback(gxid);
                GtmResult::ok(ResultPayload::Gxid(gxid)).with_status(status)
            }
            Request::TxnCommitMulti { gxids } => {
                let statuses = state.commit_multi(&gxids);
                GtmResult::ok(ResultPayload::TxnStatusMulti { statuses })
            }
            Request::TxnPrepare { gxid } => {
                let status = state.prepare(gxid);
                GtmResult::ok(ResultPayload::Gxid(gxid)).with_status(status)
            }
            Request::TxnStartPrepared {
                gxid,
                gid,
                datanodes,
                coordinators,
            } => {
                let status = state.start_prepared(gxid, &gid, datanodes, coordinators);
                GtmResult::ok(ResultPayload::Gxid(gxid)).with_status(status)
            }
            Request::TxnCommitPrepared {
                gxid,
                prepared_gxid,
            } => {
                let status = state.commit_prepared(gxid, prepared_gxid);
                GtmResult::ok(ResultPayload::Gxid(gxid)).with_status(status)
            }
            Request::TxnGetGidData { gid, .. } => match state.gid_data(&gid) {
                Ok(data) => GtmResult::ok(ResultPayload::GidData {
                    gxid: data.gxid,
                    prepared_gxid: data.prepared_gxid,
                    datanodes: data.datanodes,
                    coordinators: data.coordinators,
                }),
                Err(status) => GtmResult::ok(ResultPayload::GidData {
                    gxid: GlobalXid::INVALID,
                    prepared_gxid: GlobalXid::INVALID,
                    datanodes: Vec::new(),
                    coordinators: Vec::new(),
                })
                .with_status(status),
            },
            Request::TxnGetGxid { handle } => match state.gxid_for_handle(handle) {
                Some(gxid) => GtmResult::ok(ResultPayload::TxnGxid { handle, gxid }),
                None => GtmResult::ok(ResultPayload::TxnGxid {
                    handle,
                    gxid: GlobalXid::INVALID,
                })
                .with_status(status::TXN_NOT_FOUND),
            },
            Request::SnapshotGet { gxid, .. } => {
                // The grouping hint is accepted; coalescing of concurrent
                // snapshot requests happens in the proxy tier, not here.
                let snapshot = state.snapshot(gxid);
                GtmResult::ok(ResultPayload::SnapshotStatus {
                    gxid,
                    statuses: Vec::new(),
                })
                .with_snapshot(snapshot)
            }
            Request::SnapshotGetMulti { gxids } => {
                let subject = gxids.first().copied().unwrap_or(GlobalXid::INVALID);
                let (snapshot, statuses) = state.snapshot_multi(subject, &gxids);
                GtmResult::ok(ResultPayload::SnapshotStatus {
                    gxid: subject,
                    statuses,
                })
                .with_snapshot(snapshot)
            }
            Request::SequenceInit {
                key,
                increment,
                minval,
                maxval,
                startval,
                cycle,
            } => {
                let status =
                    state.create_sequence(key.clone(), increment, minval, maxval, startval, cycle);
                GtmResult::ok(ResultPayload::SequenceKey(key)).with_status(status)
            }
            Request::SequenceAlter {
                key,
                increment,
                minval,
                maxval,
                startval,
                lastval,
                cycle,
                is_restart,
            } => {
                let status = state.alter_sequence(
                    &key, increment, minval, maxval, startval, lastval, cycle, is_restart,
                );
                GtmResult::ok(ResultPayload::SequenceKey(key)).with_status(status)
            }
            Request::SequenceGetNext { key } => match state.sequence_next(&key) {
                Ok(value) => GtmResult::ok(ResultPayload::SequenceValue { key, value }),
                Err(status) => {
                    GtmResult::ok(ResultPayload::SequenceValue { key, value: -1 })
                        .with_status(status)
                }
            },
            Request::SequenceGetCurrent { key } => match state.sequence_current(&key) {
                Ok(value) => GtmResult::ok(ResultPayload::SequenceValue { key, value }),
                Err(status) => {
                    GtmResult::ok(ResultPayload::SequenceValue { key, value: -1 })
                        .with_status(status)
                }
            },
            Request::SequenceSetVal {
                key,
                nextval,
                iscalled,
            } => {
                let status = state.sequence_set(&key, nextval, iscalled);
                GtmResult::ok(ResultPayload::SequenceKey(key)).with_status(status)
            }
            Request::SequenceReset { key } => {
                let status = state.sequence_reset(&key);
                GtmResult::ok(ResultPayload::SequenceKey(key)).with_status(status)
            }
            Request::SequenceClose { key } => {
                let status = state.drop_sequence(&key);
                GtmResult::ok(ResultPayload::SequenceKey(key)).with_status(status)
            }
            Request::SequenceRename { key, newkey } => {
                let status = state.rename_sequence(&key, newkey.clone());
                GtmResult::ok(ResultPayload::SequenceKey(newkey)).with_status(status)
            }
            Request::NodeRegister {
                node_type,
                node_id,
                port,
                data_dir,
            } => {
                let status = state.register_node(node_type, node_id, port, data_dir);
                GtmResult::ok(ResultPayload::Node { node_type, node_id }).with_status(status)
            }
            Request::NodeUnregister { node_type, node_id } => {
                let status = state.unregister_node(node_type, node_id);
                GtmResult::ok(ResultPayload::Node { node_type, node_id }).with_status(status)
            }
            // Handled by the caller before dispatch.
            Request::Startup { .. } | Request::Terminate => {
                GtmResult::ok(ResultPayload::Gxid(GlobalXid::INVALID))
            }
        }
    }

    async fn send(&mut self, result: GtmResult) -> Result<(), ConnectionError> {
        self.framed.send(result).await?;
        Ok(())
    }
}
