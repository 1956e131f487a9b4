use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Initial capacity of the connection table.
const INITIAL_CAPACITY: usize = 32;

/// Per-connection worker context.
///
/// Owned by the connection task; the registry only holds a non-owning
/// back-reference, so a worker that exits without unregistering (a bug,
/// but a survivable one) never keeps its context alive through the table.
#[derive(Debug)]
pub struct WorkerContext {
    /// Server-assigned connection id.
    pub conn_id: i32,
    /// Peer address of the accepted socket.
    pub peer: SocketAddr,
    /// Cancellation token wired into the connection task's select loop.
    pub cancel: CancellationToken,
}

impl WorkerContext {
    pub fn new(conn_id: i32, peer: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            conn_id,
            peer,
            cancel: CancellationToken::new(),
        })
    }
}

/// One row of the connection table.
#[derive(Debug)]
struct ConnectionEntry {
    conn_id: i32,
    /// Set once after a successful startup exchange; cleared only by
    /// unregistering the connection.
    authenticated: bool,
    worker: Weak<WorkerContext>,
}

/// A registry of active client connections.
///
/// Shared by every worker task in the server and guarded by a single
/// reader/writer lock: registration, removal, and authentication updates
/// take the write lock; enumeration and counting take the read lock, so
/// any number of readers proceed concurrently with each other but never
/// with a writer.
///
/// Invariants: `count() <= capacity()` always; growth happens under the
/// write lock, so no reader ever observes a half-grown table; removal
/// compacts the entries (no tombstones), so iteration never sees gaps.
pub struct ConnectionRegistry {
    entries: RwLock<Vec<ConnectionEntry>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::with_capacity(INITIAL_CAPACITY)),
        }
    }

    /// Registers a connection, initially unauthenticated.
    ///
    /// The table grows geometrically when full; the reallocation happens
    /// entirely under the write lock.
    pub fn register(&self, worker: &Arc<WorkerContext>) {
        let mut entries = self.entries.write();
        entries.push(ConnectionEntry {
            conn_id: worker.conn_id,
            authenticated: false,
            worker: Arc::downgrade(worker),
        });
    }

    /// Marks a connection as authenticated after a successful startup
    /// exchange. Never cleared by this path.
    ///
    /// Returns false if the connection is not registered.
    pub fn mark_authenticated(&self, conn_id: i32) -> bool {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.conn_id == conn_id) {
            Some(entry) => {
                entry.authenticated = true;
                true
            }
            None => false,
        }
    }

    /// Whether a connection has completed the startup exchange.
    pub fn is_authenticated(&self, conn_id: i32) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.conn_id == conn_id && e.authenticated)
    }

    /// Unregisters a connection, compacting the table.
    pub fn unregister(&self, conn_id: i32) {
        let mut entries = self.entries.write();
        if let Some(index) = entries.iter().position(|e| e.conn_id == conn_id) {
            entries.remove(index);
        }
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Allocated capacity of the table.
    pub fn capacity(&self) -> usize {
        self.entries.read().capacity()
    }

    /// Runs `f` for each live connection under the read lock.
    ///
    /// The count observed by `f` is always consistent with the entries
    /// present at that instant.
    pub fn for_each(&self, mut f: impl FnMut(i32, bool, &Weak<WorkerContext>)) {
        for entry in self.entries.read().iter() {
            f(entry.conn_id, entry.authenticated, &entry.worker);
        }
    }

    /// Snapshot of the live connection ids, for diagnostics.
    pub fn connection_ids(&self) -> Vec<i32> {
        self.entries.read().iter().map(|e| e.conn_id).collect()
    }

    /// Cancels every live worker, for coordinated shutdown.
    pub fn cancel_all(&self) {
        for entry in self.entries.read().iter() {
            if let Some(worker) = entry.worker.upgrade() {
                worker.cancel.cancel();
            }
        }
    }
}
