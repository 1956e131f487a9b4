use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::server::connection::Connection;
use crate::server::registry::{ConnectionRegistry, WorkerContext};
use crate::server::state::GtmState;

/// TCP server accepting GTM client connections.
pub struct Server {
    listener: TcpListener,
    next_conn_id: Arc<AtomicI32>,
    registry: Arc<ConnectionRegistry>,
    state: Arc<GtmState>,
}

impl Server {
    /// Creates a new server with a given listener and state.
    pub fn new(listener: TcpListener, state: Arc<GtmState>) -> Self {
        Self {
            listener,
            next_conn_id: Arc::new(AtomicI32::new(1)),
            registry: Arc::new(ConnectionRegistry::new()),
            state,
        }
    }

    /// The connection registry, shared with every worker task.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Starts accepting connections and serving clients.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        loop {
            let (socket, peer_addr) = self.listener.accept().await?;
            let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
            let registry = self.registry.clone();
            let state = self.state.clone();

            info!(conn_id, %peer_addr, "accepted connection");

            tokio::spawn(async move {
                let worker = WorkerContext::new(conn_id, peer_addr);

                // Register before any request is processed; the entry
                // stays unauthenticated until the startup exchange.
                registry.register(&worker);

                let mut connection =
                    Connection::new(socket, worker, registry.clone(), state);
                if let Err(e) = connection.run().await {
                    error!(conn_id, error = %e, "connection error");
                }

                registry.unregister(conn_id);
                info!(conn_id, "connection closed");
            });
        }
    }
}
