//! GTM client: the resilient protocol wrapper every cluster node uses.
//!
//! A [`GtmSession`] owns exactly one logical connection to the GTM and
//! presents every cluster-coordination operation as a single blocking call
//! that is transparently fault-tolerant to one transient connectivity
//! failure. Sessions are not thread-safe by design: one session per
//! worker, mirroring one coordinator-to-GTM link.
//!
//! Failure semantics per operation class:
//!
//! | Operation class        | Retries triggering op? | Forces reconnect?          |
//! |------------------------|------------------------|----------------------------|
//! | Begin (incl. vacuum)   | once                   | yes                        |
//! | Commit / Rollback      | no (status unaffected) | yes                        |
//! | Snapshot fetch         | no                     | yes                        |
//! | Sequence read/write    | no                     | current/next only, on      |
//! |                        |                        | negative result            |

pub mod connection;
pub mod session;

pub use connection::{ConnStatus, GtmConnection};
pub use session::{GidData, GtmSession};
