//! GTM wire protocol implementation.
//!
//! Cluster nodes (coordinators, datanodes, proxies) speak a framed,
//! kind-tagged request/response protocol with the GTM.
//!
//! ## Architecture
//!
//! ```text
//! +-------------+                      +------------+
//! | Coordinator |  ---  Request  --->  |    GTM     |
//! |  /Datanode  |  <--- GtmResult ---  |   server   |
//! +-------------+                      +------------+
//!               ^                  ^
//!               |  Client/Server  |
//!               |      Codec      |
//!               +-----------------+
//! ```
//!
//! ## Terminology
//!
//! - **Request**: Messages from a cluster node to the GTM (begin, commit,
//!   snapshot, sequence and node operations)
//! - **GtmResult**: The tagged result envelope sent back by the GTM; one
//!   payload variant per message kind, with the snapshot in-progress array
//!   and proxy data buffer carried outside the variant
//! - **Codec**: Framing and serialization for both directions

pub mod codec;
pub mod error;
pub mod request;
pub mod result;

pub use codec::{ClientCodec, ServerCodec};
pub use error::ProtocolError;
pub use request::Request;
pub use result::{GtmResult, MAX_TRANSACTION_BATCH, ProxyHeader, ResultPayload};
