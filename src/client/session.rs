//! The GTM client session: one owned connection, every cluster operation.
//!
//! The session sits between a node's local transaction machinery and the
//! wire protocol. All failures are converted to sentinel values at this
//! boundary (invalid GXID, `None` snapshot, negative value or status);
//! no transport error ever crosses it.

use tracing::warn;

use crate::client::connection::{GtmConnection, extract_status};
use crate::config::GtmConfig;
use crate::protocol::{Request, ResultPayload};
use crate::sequence::{SequenceKey, SequenceValue};
use crate::tx::{GlobalXid, GtmSnapshot, GtmTimestamp, IsolationLevel, NodeId, NodeType};

/// Prepared-transaction metadata looked up by gid.
#[derive(Debug, Clone, PartialEq)]
pub struct GidData {
    pub gxid: GlobalXid,
    pub prepared_gxid: GlobalXid,
    pub datanodes: Vec<NodeId>,
    pub coordinators: Vec<NodeId>,
}

/// A session owning exactly one logical connection to the GTM.
///
/// Not thread-safe by design: one session per worker. Multiple sessions in
/// the same process are independent and share no state.
///
/// The connection is created on the first operation (or an explicit
/// [`connect`](Self::connect)), destroyed by [`disconnect`](Self::disconnect)
/// or session teardown, and freely reconnected any number of times in
/// between. Every operation runs a pre-flight liveness check and may incur
/// a fresh connect.
pub struct GtmSession {
    config: GtmConfig,
    conn: Option<GtmConnection>,
}

impl GtmSession {
    /// Create a disconnected session.
    pub fn new(config: GtmConfig) -> Self {
        Self { config, conn: None }
    }

    /// The configuration this session connects with.
    pub fn config(&self) -> &GtmConfig {
        &self.config
    }

    /// Whether a connection object exists.
    ///
    /// This does not probe health; liveness is re-checked before every
    /// operation.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Establish the connection.
    ///
    /// On failure, logs a warning and leaves the session disconnected;
    /// never fails past the call boundary.
    pub async fn connect(&mut self) {
        match GtmConnection::open_with(&self.config).await {
            Ok(conn) => self.conn = Some(conn),
            Err(e) => {
                warn!(
                    conn = %self.config.connection_string(),
                    error = %e,
                    "can not connect to GTM"
                );
                self.conn = None;
            }
        }
    }

    /// Release the underlying connection unconditionally.
    ///
    /// Idempotent: safe to call when already disconnected, and performs no
    /// I/O in that case.
    pub fn disconnect(&mut self) {
        self.conn = None;
    }

    /// Pre-flight check applied before every operation: reconnect unless a
    /// healthy connection exists.
    async fn check_connection(&mut self) {
        if !self.conn.as_ref().is_some_and(GtmConnection::is_ok) {
            self.connect().await;
        }
    }

    // --- Transaction management ---

    /// Begin a transaction, returning its GXID and begin timestamp.
    ///
    /// On a transport failure (or an invalid GXID from a timed-out server)
    /// the connection is reset and the begin is retried exactly once:
    /// nothing can have observed the transaction yet, so the resend is
    /// safe. A second failure yields [`GlobalXid::INVALID`].
    pub async fn begin_transaction(&mut self) -> (GlobalXid, GtmTimestamp) {
        self.check_connection().await;
        let mut begun = self.try_begin_getgxid().await;

        // If something went wrong (timeout), reset the GTM connection and
        // retry. This is safe at the beginning of a transaction.
        if begun.is_none() {
            self.disconnect();
            self.connect().await;
            begun = self.try_begin_getgxid().await;
        }
        begun.unwrap_or((GlobalXid::INVALID, 0))
    }

    async fn try_begin_getgxid(&mut self) -> Option<(GlobalXid, GtmTimestamp)> {
        let conn = self.conn.as_mut()?;
        conn.request(
            Request::TxnBeginGetGxid {
                isolation: IsolationLevel::ReadCommitted,
            },
            |r| match r.payload {
                ResultPayload::GxidTimestamp { gxid, timestamp } if gxid.is_valid() => {
                    Some((gxid, timestamp))
                }
                _ => None,
            },
        )
        .await
    }

    /// Begin an autovacuum transaction. Same retry shape as
    /// [`begin_transaction`](Self::begin_transaction), distinct request
    /// kind: the server exempts autovacuum transactions from snapshot
    /// in-progress sets.
    pub async fn begin_transaction_autovacuum(&mut self) -> GlobalXid {
        self.check_connection().await;
        let mut begun = self.try_begin_autovacuum().await;

        if begun.is_none() {
            self.disconnect();
            self.connect().await;
            begun = self.try_begin_autovacuum().await;
        }
        begun.unwrap_or(GlobalXid::INVALID)
    }

    async fn try_begin_autovacuum(&mut self) -> Option<GlobalXid> {
        let conn = self.conn.as_mut()?;
        conn.request(
            Request::TxnBeginAutovacuum {
                isolation: IsolationLevel::ReadCommitted,
            },
            |r| match r.payload {
                ResultPayload::Gxid(gxid) if gxid.is_valid() => Some(gxid),
                _ => None,
            },
        )
        .await
    }

    /// Commit a transaction on the GTM.
    ///
    /// An invalid GXID is a no-op success (nothing to commit). A transport
    /// failure is never retried and does not change the returned status:
    /// the local transaction is closed regardless, and resetting the
    /// connection forces the GTM to time out and discard the abandoned
    /// transaction state on its side.
    pub async fn commit_transaction(&mut self, gxid: GlobalXid) -> i32 {
        if gxid.is_invalid() {
            return 0;
        }
        self.check_connection().await;
        let ret = self.status_request(Request::TxnCommit { gxid }).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Roll back a transaction on the GTM. Same failure shape as
    /// [`commit_transaction`](Self::commit_transaction).
    pub async fn rollback_transaction(&mut self, gxid: GlobalXid) -> i32 {
        if gxid.is_invalid() {
            return 0;
        }
        self.check_connection().await;
        let ret = self.status_request(Request::TxnRollback { gxid }).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Mark a transaction prepared for two-phase commit.
    pub async fn prepare_transaction(&mut self, gxid: GlobalXid) -> i32 {
        self.check_connection().await;
        let ret = self.status_request(Request::TxnPrepare { gxid }).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Record a prepared transaction under `gid` with its participants.
    pub async fn start_prepared_transaction(
        &mut self,
        gxid: GlobalXid,
        gid: &str,
        datanodes: Vec<NodeId>,
        coordinators: Vec<NodeId>,
    ) -> i32 {
        self.check_connection().await;
        let request = Request::TxnStartPrepared {
            gxid,
            gid: gid.to_string(),
            datanodes,
            coordinators,
        };
        let ret = self.status_request(request).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Commit a prepared transaction (original and prepared GXIDs).
    pub async fn commit_prepared_transaction(
        &mut self,
        gxid: GlobalXid,
        prepared_gxid: GlobalXid,
    ) -> i32 {
        if gxid.is_invalid() {
            return 0;
        }
        self.check_connection().await;
        let request = Request::TxnCommitPrepared {
            gxid,
            prepared_gxid,
        };
        let ret = self.status_request(request).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Look up prepared-transaction metadata by gid.
    ///
    /// A logical rejection (unknown gid) yields `None` without touching
    /// the connection; only transport failures force a reconnect.
    pub async fn get_gid_data(&mut self, gid: &str) -> Option<GidData> {
        self.check_connection().await;
        let request = Request::TxnGetGidData {
            isolation: IsolationLevel::ReadCommitted,
            gid: gid.to_string(),
        };
        let reply = match self.conn.as_mut() {
            Some(conn) => conn.round_trip(request).await,
            None => None,
        };
        match reply {
            Some(result) if result.status != 0 => None,
            Some(result) => match result.payload {
                ResultPayload::GidData {
                    gxid,
                    prepared_gxid,
                    datanodes,
                    coordinators,
                } => Some(GidData {
                    gxid,
                    prepared_gxid,
                    datanodes,
                    coordinators,
                }),
                _ => {
                    self.disconnect();
                    self.connect().await;
                    None
                }
            },
            None => {
                self.disconnect();
                self.connect().await;
                None
            }
        }
    }

    // --- Snapshot management ---

    /// Fetch a visibility snapshot for `gxid`.
    ///
    /// `canbe_grouped` tells the server this request may be coalesced with
    /// other pending snapshot requests from the same coordinator. On
    /// failure the connection is reset but the fetch is not retried; the
    /// caller re-requests if it still needs one.
    pub async fn get_snapshot(
        &mut self,
        gxid: GlobalXid,
        canbe_grouped: bool,
    ) -> Option<GtmSnapshot> {
        self.check_connection().await;
        let snapshot = match self.conn.as_mut() {
            Some(conn) => {
                conn.request(
                    Request::SnapshotGet {
                        gxid,
                        canbe_grouped,
                    },
                    |r| {
                        if matches!(r.payload, ResultPayload::SnapshotStatus { .. })
                            && r.status == 0
                        {
                            Some(r.snapshot)
                        } else {
                            None
                        }
                    },
                )
                .await
            }
            None => None,
        };
        if snapshot.is_none() {
            self.disconnect();
            self.connect().await;
        }
        snapshot
    }

    // --- Sequence management ---

    /// Create a sequence on the GTM.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_sequence(
        &mut self,
        name: &str,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        cycle: bool,
    ) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceInit {
            key: SequenceKey::from(name),
            increment,
            minval,
            maxval,
            startval,
            cycle,
        };
        match self.conn.as_mut() {
            Some(conn) => conn.request(request, extract_status).await.unwrap_or(-1),
            None => 0,
        }
    }

    /// Alter a sequence on the GTM. `is_restart` distinguishes "reset the
    /// value to `lastval`" from "adjust bounds only".
    #[allow(clippy::too_many_arguments)]
    pub async fn alter_sequence(
        &mut self,
        name: &str,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        lastval: SequenceValue,
        cycle: bool,
        is_restart: bool,
    ) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceAlter {
            key: SequenceKey::from(name),
            increment,
            minval,
            maxval,
            startval,
            lastval,
            cycle,
            is_restart,
        };
        match self.conn.as_mut() {
            Some(conn) => conn.request(request, extract_status).await.unwrap_or(-1),
            None => 0,
        }
    }

    /// Get the current sequence value without advancing it.
    ///
    /// A negative return is never a legitimate value; it signals a
    /// transport-level failure, so the connection is reset (the read is
    /// not retried).
    pub async fn get_current_value(&mut self, name: &str) -> SequenceValue {
        self.check_connection().await;
        let request = Request::SequenceGetCurrent {
            key: SequenceKey::from(name),
        };
        let ret = self.value_request(request).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Advance the sequence and get the new value. Same failure shape as
    /// [`get_current_value`](Self::get_current_value).
    pub async fn get_next_value(&mut self, name: &str) -> SequenceValue {
        self.check_connection().await;
        let request = Request::SequenceGetNext {
            key: SequenceKey::from(name),
        };
        let ret = self.value_request(request).await;
        if ret < 0 {
            self.disconnect();
            self.connect().await;
        }
        ret
    }

    /// Set the sequence value directly.
    pub async fn set_sequence_value(
        &mut self,
        name: &str,
        nextval: SequenceValue,
        iscalled: bool,
    ) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceSetVal {
            key: SequenceKey::from(name),
            nextval,
            iscalled,
        };
        self.status_request(request).await
    }

    /// Reset the sequence back to its start value.
    pub async fn reset_sequence(&mut self, name: &str) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceReset {
            key: SequenceKey::from(name),
        };
        self.status_request(request).await
    }

    /// Drop the sequence.
    pub async fn drop_sequence(&mut self, name: &str) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceClose {
            key: SequenceKey::from(name),
        };
        self.status_request(request).await
    }

    /// Rename a sequence, preserving its state.
    pub async fn rename_sequence(&mut self, name: &str, newname: &str) -> i32 {
        self.check_connection().await;
        let request = Request::SequenceRename {
            key: SequenceKey::from(name),
            newkey: SequenceKey::from(newname),
        };
        self.status_request(request).await
    }

    // --- Node registration ---

    /// Register a physical node with the GTM (once per node at startup,
    /// outside the hot path).
    pub async fn register_node(
        &mut self,
        node_type: NodeType,
        node_id: NodeId,
        port: u16,
        data_dir: &str,
    ) -> i32 {
        self.check_connection().await;
        let request = Request::NodeRegister {
            node_type,
            node_id,
            port,
            data_dir: data_dir.to_string(),
        };
        self.status_request(request).await
    }

    /// Unregister a node.
    pub async fn unregister_node(&mut self, node_type: NodeType, node_id: NodeId) -> i32 {
        self.check_connection().await;
        let request = Request::NodeUnregister { node_type, node_id };
        self.status_request(request).await
    }

    // --- Request helpers ---

    /// Run a status-returning request; `-1` when disconnected or on
    /// transport failure.
    async fn status_request(&mut self, request: Request) -> i32 {
        match self.conn.as_mut() {
            Some(conn) => conn.request(request, extract_status).await.unwrap_or(-1),
            None => -1,
        }
    }

    /// Run a sequence-value request; `-1` when disconnected or on
    /// transport failure.
    async fn value_request(&mut self, request: Request) -> SequenceValue {
        match self.conn.as_mut() {
            Some(conn) => conn
                .request(request, |r| match r.payload {
                    ResultPayload::SequenceValue { value, .. } => Some(value),
                    _ => None,
                })
                .await
                .unwrap_or(-1),
            None => -1,
        }
    }
}
