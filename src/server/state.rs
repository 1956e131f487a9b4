//! Authoritative cluster-wide state: GXID allocation, open-transaction
//! tracking, snapshots, sequences, prepared transactions, node registry.
//!
//! Everything here is in memory; durability of the GTM's own state is a
//! separate concern layered underneath, not part of this core.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::sequence::{SequenceKey, SequenceValue};
use crate::tx::{GlobalXid, GtmSnapshot, GtmTimestamp, NodeId, NodeType, TxnHandle};

/// Status codes reported in result envelopes. 0 is success; positive codes
/// are logical rejections (the GTM refused the operation); negative values
/// never originate from the server, they are client-side transport
/// sentinels.
pub mod status {
    pub const OK: i32 = 0;
    pub const TXN_NOT_FOUND: i32 = 1;
    pub const SEQUENCE_NOT_FOUND: i32 = 2;
    pub const SEQUENCE_EXISTS: i32 = 3;
    pub const SEQUENCE_EXHAUSTED: i32 = 4;
    pub const SEQUENCE_INVALID_DEFINITION: i32 = 5;
    pub const GID_NOT_FOUND: i32 = 6;
    pub const GID_EXISTS: i32 = 7;
    pub const NODE_NOT_REGISTERED: i32 = 8;
    pub const NOT_AUTHENTICATED: i32 = 9;
    pub const BATCH_TOO_LARGE: i32 = 10;
}

/// One open (in-progress) global transaction.
#[derive(Debug, Clone)]
struct OpenTxn {
    handle: TxnHandle,
    gxid: GlobalXid,
    /// Autovacuum transactions are exempt from the in-progress sets handed
    /// to other transactions.
    vacuum: bool,
    prepared: bool,
}

/// Internal state protected by a single mutex to ensure atomicity between
/// GXID allocation and open-transaction tracking.
struct TxnTable {
    /// Next GXID to issue.
    next_gxid: u64,
    /// Next session-visible transaction handle.
    next_handle: i32,
    /// Open transactions, in begin order.
    open: Vec<OpenTxn>,
}

/// A prepared transaction recorded under a gid.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTxn {
    pub gxid: GlobalXid,
    pub prepared_gxid: GlobalXid,
    pub datanodes: Vec<NodeId>,
    pub coordinators: Vec<NodeId>,
}

/// A physical node registered with the GTM.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredNode {
    pub port: u16,
    pub data_dir: String,
}

/// Per-sequence persistent state. Lives only in the GTM; clients reference
/// it by key.
#[derive(Debug, Clone)]
struct SequenceState {
    increment: SequenceValue,
    minval: SequenceValue,
    maxval: SequenceValue,
    startval: SequenceValue,
    current: SequenceValue,
    /// Whether a value has been dispensed since creation/reset.
    called: bool,
    cycle: bool,
}

impl SequenceState {
    fn create(
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        cycle: bool,
    ) -> Result<Self, i32> {
        // Bounds are constrained non-negative so a negative value remains
        // a pure transport-failure sentinel at the client boundary.
        if increment == 0 || minval < 0 || minval > maxval || startval < minval
            || startval > maxval
        {
            return Err(status::SEQUENCE_INVALID_DEFINITION);
        }
        Ok(Self {
            increment,
            minval,
            maxval,
            startval,
            current: startval,
            called: false,
            cycle,
        })
    }

    /// Advance and return the new value.
    fn next(&mut self) -> Result<SequenceValue, i32> {
        if !self.called {
            self.called = true;
            return Ok(self.current);
        }
        let advanced = self.current.checked_add(self.increment);
        let next = match advanced {
            Some(v) if self.increment > 0 && v > self.maxval => None,
            Some(v) if self.increment < 0 && v < self.minval => None,
            Some(v) => Some(v),
            None => None,
        };
        let next = match next {
            Some(v) => v,
            None if self.cycle => {
                if self.increment > 0 {
                    self.minval
                } else {
                    self.maxval
                }
            }
            None => return Err(status::SEQUENCE_EXHAUSTED),
        };
        self.current = next;
        Ok(next)
    }

    /// The last dispensed value (the start value before any call).
    fn current(&self) -> SequenceValue {
        self.current
    }

    fn set(&mut self, value: SequenceValue, iscalled: bool) -> Result<(), i32> {
        if value < self.minval || value > self.maxval {
            return Err(status::SEQUENCE_INVALID_DEFINITION);
        }
        self.current = value;
        self.called = iscalled;
        Ok(())
    }

    fn reset(&mut self) {
        self.current = self.startval;
        self.called = false;
    }
}

/// The GTM's authoritative in-memory state.
///
/// Shared by every connection task; each sub-table is guarded by its own
/// mutex so transaction traffic never contends with sequence traffic.
pub struct GtmState {
    txns: Mutex<TxnTable>,
    sequences: Mutex<HashMap<SequenceKey, SequenceState>>,
    prepared: Mutex<HashMap<String, PreparedTxn>>,
    nodes: Mutex<HashMap<(NodeType, NodeId), RegisteredNode>>,
}

impl Default for GtmState {
    fn default() -> Self {
        Self::new()
    }
}

impl GtmState {
    pub fn new() -> Self {
        Self {
            txns: Mutex::new(TxnTable {
                next_gxid: 1, // 0 is INVALID
                next_handle: 0,
                open: Vec::new(),
            }),
            sequences: Mutex::new(HashMap::new()),
            prepared: Mutex::new(HashMap::new()),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    // --- Transactions ---

    /// Begin a transaction, issuing a fresh GXID and begin timestamp.
    pub fn begin(&self, vacuum: bool) -> (GlobalXid, GtmTimestamp) {
        let mut txns = self.txns.lock();
        let (_, gxid) = Self::begin_locked(&mut txns, vacuum);
        (gxid, now_micros())
    }

    /// Begin a transaction returning only its session-local handle.
    pub fn begin_handle(&self) -> TxnHandle {
        let mut txns = self.txns.lock();
        let (handle, _) = Self::begin_locked(&mut txns, false);
        handle
    }

    /// Begin `count` transactions at once. The caller enforces the batch
    /// bound before getting here.
    pub fn begin_multi(&self, count: usize) -> Vec<(GlobalXid, GtmTimestamp)> {
        let timestamp = now_micros();
        let mut txns = self.txns.lock();
        (0..count)
            .map(|_| {
                let (_, gxid) = Self::begin_locked(&mut txns, false);
                (gxid, timestamp)
            })
            .collect()
    }

    fn begin_locked(txns: &mut TxnTable, vacuum: bool) -> (TxnHandle, GlobalXid) {
        let gxid = GlobalXid::new(txns.next_gxid);
        txns.next_gxid += 1;
        let handle = TxnHandle::new(txns.next_handle);
        txns.next_handle += 1;
        txns.open.push(OpenTxn {
            handle,
            gxid,
            vacuum,
            prepared: false,
        });
        (handle, gxid)
    }

    /// Resolve a handle to its GXID.
    pub fn gxid_for_handle(&self, handle: TxnHandle) -> Option<GlobalXid> {
        self.txns
            .lock()
            .open
            .iter()
            .find(|t| t.handle == handle)
            .map(|t| t.gxid)
    }

    /// Commit a transaction.
    ///
    /// Committing a GXID the GTM no longer knows about is a non-fatal
    /// success: the server, not the client, decides reuse validity, and an
    /// abandoned transaction may already have been discarded by timeout.
    pub fn commit(&self, gxid: GlobalXid) -> i32 {
        self.close(gxid)
    }

    /// Roll back a transaction. Same shape as [`commit`](Self::commit).
    pub fn rollback(&self, gxid: GlobalXid) -> i32 {
        self.close(gxid)
    }

    fn close(&self, gxid: GlobalXid) -> i32 {
        self.txns.lock().open.retain(|t| t.gxid != gxid);
        status::OK
    }

    /// Commit a batch, producing one status per transaction.
    pub fn commit_multi(&self, gxids: &[GlobalXid]) -> Vec<i32> {
        gxids.iter().map(|&gxid| self.commit(gxid)).collect()
    }

    /// Mark an open transaction as prepared.
    pub fn prepare(&self, gxid: GlobalXid) -> i32 {
        let mut txns = self.txns.lock();
        match txns.open.iter_mut().find(|t| t.gxid == gxid) {
            Some(txn) => {
                txn.prepared = true;
                status::OK
            }
            None => status::TXN_NOT_FOUND,
        }
    }

    /// Record a prepared transaction under `gid`.
    pub fn start_prepared(
        &self,
        gxid: GlobalXid,
        gid: &str,
        datanodes: Vec<NodeId>,
        coordinators: Vec<NodeId>,
    ) -> i32 {
        let mut prepared = self.prepared.lock();
        if prepared.contains_key(gid) {
            return status::GID_EXISTS;
        }
        prepared.insert(
            gid.to_string(),
            PreparedTxn {
                gxid,
                prepared_gxid: GlobalXid::INVALID,
                datanodes,
                coordinators,
            },
        );
        status::OK
    }

    /// Commit a prepared transaction: closes both GXIDs and drops the gid
    /// record referring to them.
    pub fn commit_prepared(&self, gxid: GlobalXid, prepared_gxid: GlobalXid) -> i32 {
        self.close(gxid);
        if prepared_gxid.is_valid() {
            self.close(prepared_gxid);
        }
        self.prepared
            .lock()
            .retain(|_, txn| txn.gxid != gxid && txn.gxid != prepared_gxid);
        status::OK
    }

    /// Look up prepared-transaction metadata by gid. The committing
    /// coordinator also gets a fresh GXID to run the commit under.
    pub fn gid_data(&self, gid: &str) -> Result<PreparedTxn, i32> {
        let record = match self.prepared.lock().get(gid) {
            Some(txn) => txn.clone(),
            None => return Err(status::GID_NOT_FOUND),
        };
        let (prepared_gxid, _) = self.begin(false);
        Ok(PreparedTxn {
            prepared_gxid,
            ..record
        })
    }

    // --- Snapshots ---

    /// Compute a visibility snapshot.
    ///
    /// Captures the set of open transactions at this moment. Autovacuum
    /// transactions are excluded from the in-progress array. The xip list
    /// is delivered sorted so clients can binary-search it.
    pub fn snapshot(&self, _gxid: GlobalXid) -> GtmSnapshot {
        let txns = self.txns.lock();
        let mut xip: Vec<GlobalXid> = txns
            .open
            .iter()
            .filter(|t| !t.vacuum)
            .map(|t| t.gxid)
            .collect();
        xip.sort_unstable();

        let xmax = GlobalXid::new(txns.next_gxid);
        let xmin = xip.first().copied().unwrap_or(xmax);
        GtmSnapshot { xmin, xmax, xip }
    }

    /// Compute one snapshot while reporting, for each of `gxids`, whether
    /// the GTM still considers it in progress.
    pub fn snapshot_multi(&self, gxid: GlobalXid, gxids: &[GlobalXid]) -> (GtmSnapshot, Vec<i32>) {
        let snapshot = self.snapshot(gxid);
        let statuses = gxids
            .iter()
            .map(|g| {
                if snapshot.xip.contains(g) {
                    status::OK
                } else {
                    status::TXN_NOT_FOUND
                }
            })
            .collect();
        (snapshot, statuses)
    }

    // --- Sequences ---

    pub fn create_sequence(
        &self,
        key: SequenceKey,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        cycle: bool,
    ) -> i32 {
        let mut sequences = self.sequences.lock();
        if sequences.contains_key(&key) {
            return status::SEQUENCE_EXISTS;
        }
        match SequenceState::create(increment, minval, maxval, startval, cycle) {
            Ok(state) => {
                sequences.insert(key, state);
                status::OK
            }
            Err(code) => code,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn alter_sequence(
        &self,
        key: &SequenceKey,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        lastval: SequenceValue,
        cycle: bool,
        is_restart: bool,
    ) -> i32 {
        let mut sequences = self.sequences.lock();
        let Some(seq) = sequences.get_mut(key) else {
            return status::SEQUENCE_NOT_FOUND;
        };
        let altered = match SequenceState::create(increment, minval, maxval, startval, cycle) {
            Ok(state) => state,
            Err(code) => return code,
        };
        let (current, called) = if is_restart {
            (lastval, false)
        } else {
            (seq.current, seq.called)
        };
        *seq = SequenceState {
            current,
            called,
            ..altered
        };
        status::OK
    }

    pub fn sequence_next(&self, key: &SequenceKey) -> Result<SequenceValue, i32> {
        match self.sequences.lock().get_mut(key) {
            Some(seq) => seq.next(),
            None => Err(status::SEQUENCE_NOT_FOUND),
        }
    }

    pub fn sequence_current(&self, key: &SequenceKey) -> Result<SequenceValue, i32> {
        match self.sequences.lock().get(key) {
            Some(seq) => Ok(seq.current()),
            None => Err(status::SEQUENCE_NOT_FOUND),
        }
    }

    pub fn sequence_set(&self, key: &SequenceKey, value: SequenceValue, iscalled: bool) -> i32 {
        match self.sequences.lock().get_mut(key) {
            Some(seq) => match seq.set(value, iscalled) {
                Ok(()) => status::OK,
                Err(code) => code,
            },
            None => status::SEQUENCE_NOT_FOUND,
        }
    }

    pub fn sequence_reset(&self, key: &SequenceKey) -> i32 {
        match self.sequences.lock().get_mut(key) {
            Some(seq) => {
                seq.reset();
                status::OK
            }
            None => status::SEQUENCE_NOT_FOUND,
        }
    }

    pub fn drop_sequence(&self, key: &SequenceKey) -> i32 {
        match self.sequences.lock().remove(key) {
            Some(_) => status::OK,
            None => status::SEQUENCE_NOT_FOUND,
        }
    }

    /// Rename a sequence, carrying its state to the new key.
    pub fn rename_sequence(&self, key: &SequenceKey, newkey: SequenceKey) -> i32 {
        let mut sequences = self.sequences.lock();
        if sequences.contains_key(&newkey) {
            return status::SEQUENCE_EXISTS;
        }
        match sequences.remove(key) {
            Some(state) => {
                sequences.insert(newkey, state);
                status::OK
            }
            None => status::SEQUENCE_NOT_FOUND,
        }
    }

    // --- Node registry ---

    pub fn register_node(
        &self,
        node_type: NodeType,
        node_id: NodeId,
        port: u16,
        data_dir: String,
    ) -> i32 {
        self.nodes
            .lock()
            .insert((node_type, node_id), RegisteredNode { port, data_dir });
        status::OK
    }

    pub fn unregister_node(&self, node_type: NodeType, node_id: NodeId) -> i32 {
        match self.nodes.lock().remove(&(node_type, node_id)) {
            Some(_) => status::OK,
            None => status::NODE_NOT_REGISTERED,
        }
    }

    /// Look up a registered node, for diagnostics.
    pub fn node(&self, node_type: NodeType, node_id: NodeId) -> Option<RegisteredNode> {
        self.nodes.lock().get(&(node_type, node_id)).cloned()
    }
}

fn now_micros() -> GtmTimestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as GtmTimestamp)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_allocates_sequential_gxids() {
        let state = GtmState::new();

        let (g1, _) = state.begin(false);
        let (g2, _) = state.begin(false);
        let (g3, _) = state.begin(false);

        // Starts from 1 (0 is INVALID)
        assert_eq!(g1, GlobalXid::new(1));
        assert_eq!(g2, GlobalXid::new(2));
        assert_eq!(g3, GlobalXid::new(3));
    }

    #[test]
    fn test_begin_assigns_timestamp() {
        let state = GtmState::new();
        let (_, timestamp) = state.begin(false);
        assert!(timestamp > 0);
    }

    #[test]
    fn test_snapshot_captures_open() {
        let state = GtmState::new();

        let (g1, _) = state.begin(false);
        let (g2, _) = state.begin(false);
        state.commit(g1);
        let (g3, _) = state.begin(false);

        let snapshot = state.snapshot(g3);
        assert!(!snapshot.xip.contains(&g1));
        assert!(snapshot.xip.contains(&g2));
        assert!(snapshot.xip.contains(&g3));
        assert_eq!(snapshot.xmin, g2);
        assert_eq!(snapshot.xmax, GlobalXid::new(4));
    }

    #[test]
    fn test_snapshot_excludes_vacuum_transactions() {
        let state = GtmState::new();

        let (vacuum_gxid, _) = state.begin(true);
        let (g2, _) = state.begin(false);

        let snapshot = state.snapshot(g2);
        assert!(!snapshot.xip.contains(&vacuum_gxid));
        assert!(snapshot.xip.contains(&g2));
        // xmin skips the vacuum transaction too
        assert_eq!(snapshot.xmin, g2);
    }

    #[test]
    fn test_snapshot_with_no_open_transactions() {
        let state = GtmState::new();
        let (g1, _) = state.begin(false);
        state.commit(g1);

        let snapshot = state.snapshot(GlobalXid::INVALID);
        assert!(snapshot.xip.is_empty());
        assert_eq!(snapshot.xmin, snapshot.xmax);
    }

    #[test]
    fn test_commit_unknown_gxid_is_non_fatal() {
        let state = GtmState::new();
        assert_eq!(state.commit(GlobalXid::new(999)), status::OK);

        // Double commit: the server decides reuse validity, and an
        // already-closed transaction is still a non-fatal answer.
        let (g1, _) = state.begin(false);
        assert_eq!(state.commit(g1), status::OK);
        assert_eq!(state.commit(g1), status::OK);
    }

    #[test]
    fn test_begin_multi_shares_timestamp() {
        let state = GtmState::new();
        let xids = state.begin_multi(3);
        assert_eq!(xids.len(), 3);
        let timestamp = xids[0].1;
        assert!(xids.iter().all(|&(_, t)| t == timestamp));
        // All three are open
        let snapshot = state.snapshot(GlobalXid::INVALID);
        assert_eq!(snapshot.xip.len(), 3);
    }

    #[test]
    fn test_handle_resolution() {
        let state = GtmState::new();
        let handle = state.begin_handle();
        let gxid = state.gxid_for_handle(handle).unwrap();
        assert!(gxid.is_valid());
        assert!(state.gxid_for_handle(TxnHandle::new(999)).is_none());
    }

    #[test]
    fn test_prepared_transaction_round_trip() {
        let state = GtmState::new();
        let (gxid, _) = state.begin(false);

        assert_eq!(state.prepare(gxid), status::OK);
        assert_eq!(
            state.start_prepared(gxid, "gid-1", vec![1, 2], vec![1]),
            status::OK
        );
        assert_eq!(
            state.start_prepared(gxid, "gid-1", vec![], vec![]),
            status::GID_EXISTS
        );

        let data = state.gid_data("gid-1").unwrap();
        assert_eq!(data.gxid, gxid);
        assert!(data.prepared_gxid.is_valid());
        assert_eq!(data.datanodes, vec![1, 2]);
        assert_eq!(data.coordinators, vec![1]);

        assert_eq!(state.commit_prepared(gxid, data.prepared_gxid), status::OK);
        assert_eq!(state.gid_data("gid-1"), Err(status::GID_NOT_FOUND));
    }

    #[test]
    fn test_prepare_unknown_gxid_rejected() {
        let state = GtmState::new();
        assert_eq!(state.prepare(GlobalXid::new(42)), status::TXN_NOT_FOUND);
    }

    fn seq_key(name: &str) -> SequenceKey {
        SequenceKey::from(name)
    }

    #[test]
    fn test_sequence_create_and_next() {
        let state = GtmState::new();
        let key = seq_key("s");
        assert_eq!(state.create_sequence(key.clone(), 1, 0, 100, 5, false), status::OK);

        // First call dispenses the start value, then it advances.
        assert_eq!(state.sequence_next(&key), Ok(5));
        assert_eq!(state.sequence_next(&key), Ok(6));
        assert_eq!(state.sequence_current(&key), Ok(6));
    }

    #[test]
    fn test_sequence_duplicate_create_rejected() {
        let state = GtmState::new();
        let key = seq_key("s");
        assert_eq!(state.create_sequence(key.clone(), 1, 0, 100, 0, false), status::OK);
        assert_eq!(
            state.create_sequence(key, 1, 0, 100, 0, false),
            status::SEQUENCE_EXISTS
        );
    }

    #[test]
    fn test_sequence_invalid_definition_rejected() {
        let state = GtmState::new();
        // Negative bounds are refused so negative stays a transport sentinel.
        assert_eq!(
            state.create_sequence(seq_key("a"), 1, -5, 100, 0, false),
            status::SEQUENCE_INVALID_DEFINITION
        );
        assert_eq!(
            state.create_sequence(seq_key("b"), 0, 0, 100, 0, false),
            status::SEQUENCE_INVALID_DEFINITION
        );
        assert_eq!(
            state.create_sequence(seq_key("c"), 1, 10, 5, 10, false),
            status::SEQUENCE_INVALID_DEFINITION
        );
    }

    #[test]
    fn test_sequence_exhaustion_and_cycle() {
        let state = GtmState::new();
        let bounded = seq_key("bounded");
        state.create_sequence(bounded.clone(), 1, 0, 1, 0, false);
        assert_eq!(state.sequence_next(&bounded), Ok(0));
        assert_eq!(state.sequence_next(&bounded), Ok(1));
        assert_eq!(state.sequence_next(&bounded), Err(status::SEQUENCE_EXHAUSTED));

        let cycling = seq_key("cycling");
        state.create_sequence(cycling.clone(), 1, 0, 1, 0, true);
        assert_eq!(state.sequence_next(&cycling), Ok(0));
        assert_eq!(state.sequence_next(&cycling), Ok(1));
        assert_eq!(state.sequence_next(&cycling), Ok(0));
    }

    #[test]
    fn test_sequence_set_and_reset() {
        let state = GtmState::new();
        let key = seq_key("s");
        state.create_sequence(key.clone(), 1, 0, 100, 10, false);

        assert_eq!(state.sequence_set(&key, 50, true), status::OK);
        assert_eq!(state.sequence_next(&key), Ok(51));

        assert_eq!(state.sequence_set(&key, 200, true), status::SEQUENCE_INVALID_DEFINITION);

        assert_eq!(state.sequence_reset(&key), status::OK);
        assert_eq!(state.sequence_next(&key), Ok(10));
    }

    #[test]
    fn test_sequence_alter_restart() {
        let state = GtmState::new();
        let key = seq_key("s");
        state.create_sequence(key.clone(), 1, 0, 100, 0, false);
        assert_eq!(state.sequence_next(&key), Ok(0));

        // Bounds-only alter keeps the current value.
        assert_eq!(
            state.alter_sequence(&key, 2, 0, 200, 0, 0, false, false),
            status::OK
        );
        assert_eq!(state.sequence_current(&key), Ok(0));
        assert_eq!(state.sequence_next(&key), Ok(2));

        // Restart moves the value to lastval.
        assert_eq!(
            state.alter_sequence(&key, 2, 0, 200, 0, 40, false, true),
            status::OK
        );
        assert_eq!(state.sequence_next(&key), Ok(40));
    }

    #[test]
    fn test_sequence_rename_preserves_state() {
        let state = GtmState::new();
        let key = seq_key("old");
        let newkey = seq_key("new");
        state.create_sequence(key.clone(), 1, 0, 100, 7, false);
        assert_eq!(state.sequence_next(&key), Ok(7));

        assert_eq!(state.rename_sequence(&key, newkey.clone()), status::OK);
        assert_eq!(state.sequence_next(&key), Err(status::SEQUENCE_NOT_FOUND));
        assert_eq!(state.sequence_next(&newkey), Ok(8));
    }

    #[test]
    fn test_sequence_drop() {
        let state = GtmState::new();
        let key = seq_key("s");
        state.create_sequence(key.clone(), 1, 0, 100, 0, false);
        assert_eq!(state.drop_sequence(&key), status::OK);
        assert_eq!(state.drop_sequence(&key), status::SEQUENCE_NOT_FOUND);
    }

    #[test]
    fn test_node_registry() {
        let state = GtmState::new();
        assert_eq!(
            state.register_node(NodeType::Datanode, 3, 5433, "/data/dn3".to_string()),
            status::OK
        );
        let node = state.node(NodeType::Datanode, 3).unwrap();
        assert_eq!(node.port, 5433);
        assert_eq!(node.data_dir, "/data/dn3");

        assert_eq!(state.unregister_node(NodeType::Datanode, 3), status::OK);
        assert_eq!(
            state.unregister_node(NodeType::Datanode, 3),
            status::NODE_NOT_REGISTERED
        );
    }

    #[test]
    fn test_snapshot_multi_statuses() {
        let state = GtmState::new();
        let (g1, _) = state.begin(false);
        let (g2, _) = state.begin(false);
        state.commit(g2);

        let (snapshot, statuses) = state.snapshot_multi(g1, &[g1, g2]);
        assert_eq!(statuses, vec![status::OK, status::TXN_NOT_FOUND]);
        assert!(snapshot.xip.contains(&g1));
    }
}
