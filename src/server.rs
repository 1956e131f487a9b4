//! TCP server for GTM connections.
//!
//! This module provides the network layer that accepts cluster-node
//! connections and the authoritative in-memory state they coordinate on.
//!
//! ## Architecture
//!
//! ```text
//! +--------+
//! | Server |  <- Accepts TCP connections
//! +--------+
//!      |
//!      v
//! +------------+     +----------+
//! | Connection | --> | GtmState |  <- GXIDs, snapshots, sequences, nodes
//! +------------+     +----------+
//!      |
//!      v
//! +----------+
//! | Registry |  <- Tracks active connections and their auth state
//! +----------+
//! ```
//!
//! ## Terminology
//!
//! - **Server**: TCP listener that spawns one task per connection
//! - **Connection**: Per-client request loop over the framed codec
//! - **Registry**: Reader/writer-locked table of live connections
//! - **GtmState**: The cluster-wide transaction/sequence/node state

pub mod connection;
pub mod listener;
pub mod registry;
pub mod state;

pub use listener::Server;
pub use registry::{ConnectionRegistry, WorkerContext};
pub use state::GtmState;
