//! Core identity types: GlobalXid, TxnHandle, timestamps, node identity.

use std::fmt;

/// Global transaction ID (64-bit), issued exclusively by the GTM server.
///
/// GXIDs are allocated sequentially starting from 1. GXID 0 is reserved as
/// INVALID and means "no transaction". A client never fabricates a GXID;
/// it only ever references one it received from a begin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalXid(u64);

impl GlobalXid {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Create a new transaction ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is an invalid transaction ID.
    pub const fn is_invalid(&self) -> bool {
        self.0 == 0
    }

    /// Check if this is a valid (non-zero) transaction ID.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for GlobalXid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-local transaction handle (32-bit).
///
/// Binds a client-side request to a transaction before its GXID is known
/// (batched begins, begin-and-fetch-GXID round trips). Only meaningful
/// within the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnHandle(i32);

impl TxnHandle {
    /// Invalid handle (-1).
    pub const INVALID: Self = Self(-1);

    /// Create a new transaction handle.
    pub const fn new(handle: i32) -> Self {
        Self(handle)
    }

    /// Get the raw i32 value.
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GTM timestamp: microseconds since the Unix epoch, assigned by the
/// server when a transaction begins.
pub type GtmTimestamp = i64;

/// Transaction isolation level, as understood by the GTM.
///
/// Coordinators currently always request READ COMMITTED; the variant set
/// is closed so the wire encoding stays a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IsolationLevel {
    ReadCommitted = 1,
    Serializable = 2,
}

impl IsolationLevel {
    /// Decode from a wire byte.
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(IsolationLevel::ReadCommitted),
            2 => Some(IsolationLevel::Serializable),
            _ => None,
        }
    }

    /// Encode to a wire byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Role of a cluster node talking to the GTM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Coordinator = 1,
    Datanode = 2,
    Proxy = 3,
}

impl NodeType {
    /// Decode from a wire byte.
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(NodeType::Coordinator),
            2 => Some(NodeType::Datanode),
            3 => Some(NodeType::Proxy),
            _ => None,
        }
    }

    /// Encode to a wire byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Coordinator => write!(f, "coordinator"),
            NodeType::Datanode => write!(f, "datanode"),
            NodeType::Proxy => write!(f, "proxy"),
        }
    }
}

/// Numeric identity of a cluster node (unique per node type).
pub type NodeId = u32;
