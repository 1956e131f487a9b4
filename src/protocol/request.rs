use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::codec::{
    ensure_remaining, get_bool, get_bytes, get_node_list, get_string, put_bool, put_bytes,
    put_node_list, put_string,
};
use crate::protocol::error::ProtocolError;
use crate::protocol::result::MAX_TRANSACTION_BATCH;
use crate::sequence::{SequenceKey, SequenceValue};
use crate::tx::{GlobalXid, IsolationLevel, NodeId, NodeType, TxnHandle};

/// Request kind tags. The kind is written first on the wire and determines
/// which fields follow; the set is closed.
pub mod kind {
    pub const STARTUP: u8 = 1;

    pub const TXN_BEGIN: u8 = 10;
    pub const TXN_BEGIN_GETGXID: u8 = 11;
    pub const TXN_BEGIN_AUTOVACUUM: u8 = 12;
    pub const TXN_BEGIN_GETGXID_MULTI: u8 = 13;
    pub const TXN_COMMIT: u8 = 14;
    pub const TXN_COMMIT_PREPARED: u8 = 15;
    pub const TXN_ROLLBACK: u8 = 16;
    pub const TXN_COMMIT_MULTI: u8 = 17;
    pub const TXN_PREPARE: u8 = 18;
    pub const TXN_START_PREPARED: u8 = 19;
    pub const TXN_GET_GID_DATA: u8 = 20;
    pub const TXN_GET_GXID: u8 = 21;

    pub const SNAPSHOT_GET: u8 = 30;
    pub const SNAPSHOT_GET_MULTI: u8 = 31;

    pub const SEQUENCE_INIT: u8 = 40;
    pub const SEQUENCE_ALTER: u8 = 41;
    pub const SEQUENCE_GET_NEXT: u8 = 42;
    pub const SEQUENCE_GET_CURRENT: u8 = 43;
    pub const SEQUENCE_SET_VAL: u8 = 44;
    pub const SEQUENCE_RESET: u8 = 45;
    pub const SEQUENCE_CLOSE: u8 = 46;
    pub const SEQUENCE_RENAME: u8 = 47;

    pub const NODE_REGISTER: u8 = 50;
    pub const NODE_UNREGISTER: u8 = 51;

    pub const TERMINATE: u8 = 60;
}

/// Messages sent by a cluster node to the GTM.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// First message on every connection: identifies the node.
    Startup { node_type: NodeType, node_id: NodeId },

    /// Begin a transaction, returning only a session-local handle.
    TxnBegin { isolation: IsolationLevel },
    /// Begin a transaction and fetch its GXID in the same round trip.
    TxnBeginGetGxid { isolation: IsolationLevel },
    /// Begin an autovacuum transaction (exempt from snapshot in-progress sets).
    TxnBeginAutovacuum { isolation: IsolationLevel },
    /// Begin `count` transactions at once.
    TxnBeginGetGxidMulti { isolation: IsolationLevel, count: i32 },
    /// Commit one transaction.
    TxnCommit { gxid: GlobalXid },
    /// Commit a prepared transaction (both the original and prepared GXIDs).
    TxnCommitPrepared {
        gxid: GlobalXid,
        prepared_gxid: GlobalXid,
    },
    /// Roll back one transaction.
    TxnRollback { gxid: GlobalXid },
    /// Commit a batch of transactions, returning per-transaction statuses.
    TxnCommitMulti { gxids: Vec<GlobalXid> },
    /// Mark a transaction as prepared for two-phase commit.
    TxnPrepare { gxid: GlobalXid },
    /// Record a prepared transaction under `gid` with its participant nodes.
    TxnStartPrepared {
        gxid: GlobalXid,
        gid: String,
        datanodes: Vec<NodeId>,
        coordinators: Vec<NodeId>,
    },
    /// Look up a prepared transaction's metadata by `gid`.
    TxnGetGidData {
        isolation: IsolationLevel,
        gid: String,
    },
    /// Resolve a session-local handle to the GXID it was assigned.
    TxnGetGxid { handle: TxnHandle },

    /// Compute a visibility snapshot for `gxid`. `canbe_grouped` hints that
    /// the server may coalesce this with concurrently pending requests
    /// from the same coordinator.
    SnapshotGet { gxid: GlobalXid, canbe_grouped: bool },
    /// Compute a snapshot while reporting status for a batch of transactions.
    SnapshotGetMulti { gxids: Vec<GlobalXid> },

    /// Create a sequence.
    SequenceInit {
        key: SequenceKey,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        cycle: bool,
    },
    /// Alter a sequence. `is_restart` distinguishes "reset the value to
    /// lastval" from "adjust bounds only".
    SequenceAlter {
        key: SequenceKey,
        increment: SequenceValue,
        minval: SequenceValue,
        maxval: SequenceValue,
        startval: SequenceValue,
        lastval: SequenceValue,
        cycle: bool,
        is_restart: bool,
    },
    /// Advance and fetch the sequence value.
    SequenceGetNext { key: SequenceKey },
    /// Fetch the current sequence value without advancing.
    SequenceGetCurrent { key: SequenceKey },
    /// Set the sequence value directly.
    SequenceSetVal {
        key: SequenceKey,
        nextval: SequenceValue,
        iscalled: bool,
    },
    /// Reset the sequence back to its start value.
    SequenceReset { key: SequenceKey },
    /// Drop the sequence.
    SequenceClose { key: SequenceKey },
    /// Rename a sequence, preserving its state.
    SequenceRename { key: SequenceKey, newkey: SequenceKey },

    /// Register a physical node with the GTM (once per node at startup).
    NodeRegister {
        node_type: NodeType,
        node_id: NodeId,
        port: u16,
        data_dir: String,
    },
    /// Unregister a node.
    NodeUnregister { node_type: NodeType, node_id: NodeId },

    /// Orderly connection shutdown.
    Terminate,
}

impl Request {
    /// The wire kind tag for this request.
    pub fn kind(&self) -> u8 {
        match self {
            Request::Startup { .. } => kind::STARTUP,
            Request::TxnBegin { .. } => kind::TXN_BEGIN,
            Request::TxnBeginGetGxid { .. } => kind::TXN_BEGIN_GETGXID,
            Request::TxnBeginAutovacuum { .. } => kind::TXN_BEGIN_AUTOVACUUM,
            Request::TxnBeginGetGxidMulti { .. } => kind::TXN_BEGIN_GETGXID_MULTI,
            Request::TxnCommit { .. } => kind::TXN_COMMIT,
            Request::TxnCommitPrepared { .. } => kind::TXN_COMMIT_PREPARED,
            Request::TxnRollback { .. } => kind::TXN_ROLLBACK,
            Request::TxnCommitMulti { .. } => kind::TXN_COMMIT_MULTI,
            Request::TxnPrepare { .. } => kind::TXN_PREPARE,
            Request::TxnStartPrepared { .. } => kind::TXN_START_PREPARED,
            Request::TxnGetGidData { .. } => kind::TXN_GET_GID_DATA,
            Request::TxnGetGxid { .. } => kind::TXN_GET_GXID,
            Request::SnapshotGet { .. } => kind::SNAPSHOT_GET,
            Request::SnapshotGetMulti { .. } => kind::SNAPSHOT_GET_MULTI,
            Request::SequenceInit { .. } => kind::SEQUENCE_INIT,
            Request::SequenceAlter { .. } => kind::SEQUENCE_ALTER,
            Request::SequenceGetNext { .. } => kind::SEQUENCE_GET_NEXT,
            Request::SequenceGetCurrent { .. } => kind::SEQUENCE_GET_CURRENT,
            Request::SequenceSetVal { .. } => kind::SEQUENCE_SET_VAL,
            Request::SequenceReset { .. } => kind::SEQUENCE_RESET,
            Request::SequenceClose { .. } => kind::SEQUENCE_CLOSE,
            Request::SequenceRename { .. } => kind::SEQUENCE_RENAME,
            Request::NodeRegister { .. } => kind::NODE_REGISTER,
            Request::NodeUnregister { .. } => kind::NODE_UNREGISTER,
            Request::Terminate => kind::TERMINATE,
        }
    }

    /// Producers must never emit a batch larger than [`MAX_TRANSACTION_BATCH`].
    pub(crate) fn check_batch_bounds(&self) -> Result<(), ProtocolError> {
        let count = match self {
            Request::TxnBeginGetGxidMulti { count, .. } => *count as usize,
            Request::TxnCommitMulti { gxids } | Request::SnapshotGetMulti { gxids } => gxids.len(),
            _ => return Ok(()),
        };
        if count > MAX_TRANSACTION_BATCH {
            return Err(ProtocolError::BatchTooLarge(count as i32));
        }
        Ok(())
    }

    /// Encode the body (everything after the kind tag and length field).
    pub(crate) fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Request::Startup { node_type, node_id } => {
                dst.put_u8(node_type.as_byte());
                dst.put_u32(*node_id);
            }
            Request::TxnBegin { isolation }
            | Request::TxnBeginGetGxid { isolation }
            | Request::TxnBeginAutovacuum { isolation } => {
                dst.put_u8(isolation.as_byte());
            }
            Request::TxnBeginGetGxidMulti { isolation, count } => {
                dst.put_u8(isolation.as_byte());
                dst.put_i32(*count);
            }
            Request::TxnCommit { gxid }
            | Request::TxnRollback { gxid }
            | Request::TxnPrepare { gxid } => {
                dst.put_u64(gxid.as_u64());
            }
            Request::TxnCommitPrepared {
                gxid,
                prepared_gxid,
            } => {
                dst.put_u64(gxid.as_u64());
                dst.put_u64(prepared_gxid.as_u64());
            }
            Request::TxnCommitMulti { gxids } | Request::SnapshotGetMulti { gxids } => {
                dst.put_i32(gxids.len() as i32);
                for gxid in gxids {
                    dst.put_u64(gxid.as_u64());
                }
            }
            Request::TxnStartPrepared {
                gxid,
                gid,
                datanodes,
                coordinators,
            } => {
                dst.put_u64(gxid.as_u64());
                put_string(dst, gid);
                put_node_list(dst, datanodes);
                put_node_list(dst, coordinators);
            }
            Request::TxnGetGidData { isolation, gid } => {
                dst.put_u8(isolation.as_byte());
                put_string(dst, gid);
            }
            Request::TxnGetGxid { handle } => {
                dst.put_i32(handle.as_i32());
            }
            Request::SnapshotGet {
                gxid,
                canbe_grouped,
            } => {
                dst.put_u64(gxid.as_u64());
                put_bool(dst, *canbe_grouped);
            }
            Request::SequenceInit {
                key,
                increment,
                minval,
                maxval,
                startval,
                cycle,
            } => {
                put_bytes(dst, key.name());
                dst.put_i64(*increment);
                dst.put_i64(*minval);
                dst.put_i64(*maxval);
                dst.put_i64(*startval);
                put_bool(dst, *cycle);
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
                put_bytes(dst, key.name());
                dst.put_i64(*increment);
                dst.put_i64(*minval);
                dst.put_i64(*maxval);
                dst.put_i64(*startval);
                dst.put_i64(*lastval);
                put_bool(dst, *cycle);
                put_bool(dst, *is_restart);
            }
            Request::SequenceGetNext { key }
            | Request::SequenceGetCurrent { key }
            | Request::SequenceReset { key }
            | Request::SequenceClose { key } => {
                put_bytes(dst, key.name());
            }
            Request::SequenceSetVal {
                key,
                nextval,
                iscalled,
            } => {
                put_bytes(dst, key.name());
                dst.put_i64(*nextval);
                put_bool(dst, *iscalled);
            }
            Request::SequenceRename { key, newkey } => {
                put_bytes(dst, key.name());
                put_bytes(dst, newkey.name());
            }
            Request::NodeRegister {
                node_type,
                node_id,
                port,
                data_dir,
            } => {
                dst.put_u8(node_type.as_byte());
                dst.put_u32(*node_id);
                dst.put_u32(*port as u32);
                put_string(dst, data_dir);
            }
            Request::NodeUnregister { node_type, node_id } => {
                dst.put_u8(node_type.as_byte());
                dst.put_u32(*node_id);
            }
            Request::Terminate => {}
        }
    }

    /// Decode the body for a given kind tag.
    pub(crate) fn decode_body(tag: u8, src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let request = match tag {
            kind::STARTUP => {
                ensure_remaining!(src, 5);
                let node_type = get_node_type(src)?;
                let node_id = src.get_u32();
                Request::Startup { node_type, node_id }
            }
            kind::TXN_BEGIN => Request::TxnBegin {
                isolation: get_isolation(src)?,
            },
            kind::TXN_BEGIN_GETGXID => Request::TxnBeginGetGxid {
                isolation: get_isolation(src)?,
            },
            kind::TXN_BEGIN_AUTOVACUUM => Request::TxnBeginAutovacuum {
                isolation: get_isolation(src)?,
            },
            kind::TXN_BEGIN_GETGXID_MULTI => {
                let isolation = get_isolation(src)?;
                ensure_remaining!(src, 4);
                let count = src.get_i32();
                if count < 0 {
                    return Err(ProtocolError::InvalidMessage);
                }
                if count as usize > MAX_TRANSACTION_BATCH {
                    return Err(ProtocolError::BatchTooLarge(count));
                }
                Request::TxnBeginGetGxidMulti { isolation, count }
            }
            kind::TXN_COMMIT => Request::TxnCommit {
                gxid: get_gxid(src)?,
            },
            kind::TXN_COMMIT_PREPARED => {
                let gxid = get_gxid(src)?;
                let prepared_gxid = get_gxid(src)?;
                Request::TxnCommitPrepared {
                    gxid,
                    prepared_gxid,
                }
            }
            kind::TXN_ROLLBACK => Request::TxnRollback {
                gxid: get_gxid(src)?,
            },
            kind::TXN_COMMIT_MULTI => Request::TxnCommitMulti {
                gxids: get_gxid_batch(src)?,
            },
            kind::TXN_PREPARE => Request::TxnPrepare {
                gxid: get_gxid(src)?,
            },
            kind::TXN_START_PREPARED => {
                let gxid = get_gxid(src)?;
                let gid = get_string(src)?;
                let datanodes = get_node_list(src)?;
                let coordinators = get_node_list(src)?;
                Request::TxnStartPrepared {
                    gxid,
                    gid,
                    datanodes,
                    coordinators,
                }
            }
            kind::TXN_GET_GID_DATA => {
                let isolation = get_isolation(src)?;
                let gid = get_string(src)?;
                Request::TxnGetGidData { isolation, gid }
            }
            kind::TXN_GET_GXID => {
                ensure_remaining!(src, 4);
                Request::TxnGetGxid {
                    handle: TxnHandle::new(src.get_i32()),
                }
            }
            kind::SNAPSHOT_GET => {
                let gxid = get_gxid(src)?;
                let canbe_grouped = get_bool(src)?;
                Request::SnapshotGet {
                    gxid,
                    canbe_grouped,
                }
            }
            kind::SNAPSHOT_GET_MULTI => Request::SnapshotGetMulti {
                gxids: get_gxid_batch(src)?,
            },
            kind::SEQUENCE_INIT => {
                let key = get_sequence_key(src)?;
                ensure_remaining!(src, 32);
                let increment = src.get_i64();
                let minval = src.get_i64();
                let maxval = src.get_i64();
                let startval = src.get_i64();
                let cycle = get_bool(src)?;
                Request::SequenceInit {
                    key,
                    increment,
                    minval,
                    maxval,
                    startval,
                    cycle,
                }
            }
            kind::SEQUENCE_ALTER => {
                let key = get_sequence_key(src)?;
                ensure_remaining!(src, 40);
                let increment = src.get_i64();
                let minval = src.get_i64();
                let maxval = src.get_i64();
                let startval = src.get_i64();
                let lastval = src.get_i64();
                let cycle = get_bool(src)?;
                let is_restart = get_bool(src)?;
                Request::SequenceAlter {
                    key,
                    increment,
                    minval,
                    maxval,
                    startval,
                    lastval,
                    cycle,
                    is_restart,
                }
            }
            kind::SEQUENCE_GET_NEXT => Request::SequenceGetNext {
                key: get_sequence_key(src)?,
            },
            kind::SEQUENCE_GET_CURRENT => Request::SequenceGetCurrent {
                key: get_sequence_key(src)?,
            },
            kind::SEQUENCE_SET_VAL => {
                let key = get_sequence_key(src)?;
                ensure_remaining!(src, 8);
                let nextval = src.get_i64();
                let iscalled = get_bool(src)?;
                Request::SequenceSetVal {
                    key,
                    nextval,
                    iscalled,
                }
            }
            kind::SEQUENCE_RESET => Request::SequenceReset {
                key: get_sequence_key(src)?,
            },
            kind::SEQUENCE_CLOSE => Request::SequenceClose {
                key: get_sequence_key(src)?,
            },
            kind::SEQUENCE_RENAME => {
                let key = get_sequence_key(src)?;
                let newkey = get_sequence_key(src)?;
                Request::SequenceRename { key, newkey }
            }
            kind::NODE_REGISTER => {
                ensure_remaining!(src, 9);
                let node_type = get_node_type(src)?;
                let node_id = src.get_u32();
                let port = src.get_u32() as u16;
                let data_dir = get_string(src)?;
                Request::NodeRegister {
                    node_type,
                    node_id,
                    port,
                    data_dir,
                }
            }
            kind::NODE_UNREGISTER => {
                ensure_remaining!(src, 5);
                let node_type = get_node_type(src)?;
                let node_id = src.get_u32();
                Request::NodeUnregister { node_type, node_id }
            }
            kind::TERMINATE => Request::Terminate,
            other => return Err(ProtocolError::UnknownMessageKind(other)),
        };
        Ok(request)
    }
}

fn get_gxid(src: &mut BytesMut) -> Result<GlobalXid, ProtocolError> {
    ensure_remaining!(src, 8);
    Ok(GlobalXid::new(src.get_u64()))
}

fn get_gxid_batch(src: &mut BytesMut) -> Result<Vec<GlobalXid>, ProtocolError> {
    ensure_remaining!(src, 4);
    let count = src.get_i32();
    if count < 0 {
        return Err(ProtocolError::InvalidMessage);
    }
    if count as usize > MAX_TRANSACTION_BATCH {
        return Err(ProtocolError::BatchTooLarge(count));
    }
    let count = count as usize;
    ensure_remaining!(src, count * 8);
    Ok((0..count).map(|_| GlobalXid::new(src.get_u64())).collect())
}

fn get_isolation(src: &mut BytesMut) -> Result<IsolationLevel, ProtocolError> {
    ensure_remaining!(src, 1);
    IsolationLevel::from_byte(src.get_u8()).ok_or(ProtocolError::InvalidMessage)
}

fn get_node_type(src: &mut BytesMut) -> Result<NodeType, ProtocolError> {
    ensure_remaining!(src, 1);
    NodeType::from_byte(src.get_u8()).ok_or(ProtocolError::InvalidMessage)
}

fn get_sequence_key(src: &mut BytesMut) -> Result<SequenceKey, ProtocolError> {
    Ok(SequenceKey::new(get_bytes(src)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    use crate::protocol::codec::{ClientCodec, ServerCodec};

    /// Encode with the client codec, decode with the server codec.
    fn round_trip(request: Request) -> Request {
        let mut buf = BytesMut::new();
        ClientCodec::new().encode(request, &mut buf).unwrap();
        ServerCodec::new().decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn test_round_trip_startup() {
        let request = Request::Startup {
            node_type: NodeType::Coordinator,
            node_id: 1,
        };
        assert_eq!(round_trip(request.clone()), request);
    }

    #[test]
    fn test_round_trip_begin_getgxid() {
        let request = Request::TxnBeginGetGxid {
            isolation: IsolationLevel::ReadCommitted,
        };
        assert_eq!(round_trip(request.clone()), request);
    }

    #[test]
    fn test_round_trip_snapshot_get() {
        let request = Request::SnapshotGet {
            gxid: GlobalXid::new(101),
            canbe_grouped: false,
        };
        assert_eq!(round_trip(request.clone()), request);
    }

    #[test]
    fn test_round_trip_sequence_alter() {
        let request = Request::SequenceAlter {
            key: SequenceKey::from("orders_id_seq"),
            increment: 2,
            minval: 0,
            maxval: 1000,
            startval: 10,
            lastval: 500,
            cycle: true,
            is_restart: false,
        };
        assert_eq!(round_trip(request.clone()), request);
    }

    #[test]
    fn test_round_trip_start_prepared() {
        let request = Request::TxnStartPrepared {
            gxid: GlobalXid::new(17),
            gid: "gid-17".to_string(),
            datanodes: vec![1, 2, 3],
            coordinators: vec![1],
        };
        assert_eq!(round_trip(request.clone()), request);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xEE);
        buf.put_i32(4);
        let result = ServerCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownMessageKind(0xEE))));
    }

    #[test]
    fn test_commit_multi_count_bound_rejected_at_decode() {
        let mut buf = BytesMut::new();
        buf.put_u8(kind::TXN_COMMIT_MULTI);
        buf.put_i32(4 + 4); // length: itself + count field
        buf.put_i32((MAX_TRANSACTION_BATCH + 1) as i32);
        let result = ServerCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::BatchTooLarge(_))));
    }

    #[test]
    fn test_commit_multi_bound_enforced_at_encode() {
        let request = Request::TxnCommitMulti {
            gxids: vec![GlobalXid::new(1); MAX_TRANSACTION_BATCH + 1],
        };
        let mut buf = BytesMut::new();
        let result = ClientCodec::new().encode(request, &mut buf);
        assert!(matches!(result, Err(ProtocolError::BatchTooLarge(_))));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(kind::TXN_COMMIT);
        buf.put_i32(4 + 4); // claims 4 body bytes; a commit needs 8
        buf.put_i32(0);
        let result = ServerCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage)));
    }
}
