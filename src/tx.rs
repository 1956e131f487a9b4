//! Cluster-wide transaction identity and visibility types.
//!
//! Every node in the cluster agrees on a single notion of transaction
//! identity (the GXID, issued only by the GTM server) and visibility
//! (the snapshot: which transactions were in progress at a point in time).
//!
//! This module holds the value types shared by the client and server
//! halves of the GTM; allocation and bookkeeping live in
//! [`crate::server::state`].

pub mod snapshot;
pub mod types;

pub use snapshot::GtmSnapshot;
pub use types::{GlobalXid, GtmTimestamp, IsolationLevel, NodeId, NodeType, TxnHandle};
