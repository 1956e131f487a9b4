use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::codec::{ensure_remaining, get_bytes, get_node_list, put_bytes, put_node_list};
use crate::protocol::error::ProtocolError;
use crate::sequence::{SequenceKey, SequenceValue};
use crate::tx::{GlobalXid, GtmSnapshot, GtmTimestamp, NodeId, NodeType, TxnHandle};

/// Fixed maximum number of transactions in one batched request/response.
///
/// Producers must never emit a count above this; decoders reject (never
/// silently truncate) a count that exceeds it.
pub const MAX_TRANSACTION_BATCH: usize = 4096;

/// Result kind tags. Exactly one payload variant corresponds to each kind;
/// the set is closed.
pub mod kind {
    pub const TXN_HANDLE: u8 = 110;
    pub const GXID_TIMESTAMP: u8 = 111;
    pub const GXID: u8 = 112;
    pub const TXN_GXID: u8 = 113;
    pub const SEQUENCE_KEY: u8 = 114;
    pub const SEQUENCE_VALUE: u8 = 115;
    pub const TXN_BEGIN_MULTI: u8 = 116;
    pub const TXN_STATUS_MULTI: u8 = 117;
    pub const SNAPSHOT_STATUS: u8 = 118;
    pub const GID_DATA: u8 = 119;
    pub const NODE: u8 = 120;
}

/// Header present when a response was relayed through an intermediate
/// proxy tier rather than sent directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyHeader {
    /// Connection id assigned by the proxy that relayed the message.
    pub conn_id: i32,
}

/// The payload of a [`GtmResult`], selected by the response kind.
///
/// This is a closed, exhaustive set: decoding never reads a field belonging
/// to a kind other than the one actually returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// Session-local handle for a transaction whose GXID is not yet known.
    TxnHandle(TxnHandle),
    /// A freshly issued GXID and its begin timestamp.
    GxidTimestamp {
        gxid: GlobalXid,
        timestamp: GtmTimestamp,
    },
    /// A bare GXID (commit/rollback/prepare acknowledgements).
    Gxid(GlobalXid),
    /// Handle plus the GXID it resolved to.
    TxnGxid { handle: TxnHandle, gxid: GlobalXid },
    /// Sequence DDL acknowledgement.
    SequenceKey(SequenceKey),
    /// A sequence read result.
    SequenceValue {
        key: SequenceKey,
        value: SequenceValue,
    },
    /// Batched begin: up to [`MAX_TRANSACTION_BATCH`] (GXID, timestamp) pairs.
    TxnBeginMulti {
        xids: Vec<(GlobalXid, GtmTimestamp)>,
    },
    /// Batched commit: up to [`MAX_TRANSACTION_BATCH`] per-transaction statuses.
    TxnStatusMulti { statuses: Vec<i32> },
    /// Snapshot response; the snapshot itself rides the envelope's side
    /// record, this variant carries the subject GXID and optional batched
    /// per-transaction statuses.
    SnapshotStatus { gxid: GlobalXid, statuses: Vec<i32> },
    /// Prepared-transaction metadata looked up by gid.
    GidData {
        gxid: GlobalXid,
        prepared_gxid: GlobalXid,
        datanodes: Vec<NodeId>,
        coordinators: Vec<NodeId>,
    },
    /// Node registration descriptor.
    Node { node_type: NodeType, node_id: NodeId },
}

impl ResultPayload {
    /// The wire kind tag for this payload.
    pub fn kind(&self) -> u8 {
        match self {
            ResultPayload::TxnHandle(_) => kind::TXN_HANDLE,
            ResultPayload::GxidTimestamp { .. } => kind::GXID_TIMESTAMP,
            ResultPayload::Gxid(_) => kind::GXID,
            ResultPayload::TxnGxid { .. } => kind::TXN_GXID,
            ResultPayload::SequenceKey(_) => kind::SEQUENCE_KEY,
            ResultPayload::SequenceValue { .. } => kind::SEQUENCE_VALUE,
            ResultPayload::TxnBeginMulti { .. } => kind::TXN_BEGIN_MULTI,
            ResultPayload::TxnStatusMulti { .. } => kind::TXN_STATUS_MULTI,
            ResultPayload::SnapshotStatus { .. } => kind::SNAPSHOT_STATUS,
            ResultPayload::GidData { .. } => kind::GID_DATA,
            ResultPayload::Node { .. } => kind::NODE,
        }
    }
}

/// The result envelope sent by the GTM for every request.
///
/// The in-progress id array (`snapshot`) and the proxy data buffer
/// (`proxy_data`) are ordinary fields outside the tagged payload, each with
/// its own explicit length on the wire, so overwriting one payload variant
/// with another can never clobber them.
#[derive(Debug, Clone, PartialEq)]
pub struct GtmResult {
    /// Status code: 0 for success, nonzero for logical rejection.
    pub status: i32,
    /// Present when the response was relayed through a proxy tier.
    pub proxy_header: Option<ProxyHeader>,
    /// Exactly one payload, chosen by the response kind.
    pub payload: ResultPayload,
    /// Always-present side record: the snapshot's in-progress array and
    /// watermarks. Empty for kinds that carry no snapshot.
    pub snapshot: GtmSnapshot,
    /// Always-present side record: buffer for data relayed by a proxy.
    pub proxy_data: Vec<u8>,
}

impl GtmResult {
    /// A successful result with the given payload and empty side records.
    pub fn ok(payload: ResultPayload) -> Self {
        Self {
            status: 0,
            proxy_header: None,
            payload,
            snapshot: GtmSnapshot::empty(),
            proxy_data: Vec::new(),
        }
    }

    /// Replace the status code.
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    /// Attach a snapshot side record.
    pub fn with_snapshot(mut self, snapshot: GtmSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// The wire kind tag (delegates to the payload).
    pub fn kind(&self) -> u8 {
        self.payload.kind()
    }

    /// Producers must never emit a batch larger than [`MAX_TRANSACTION_BATCH`].
    pub(crate) fn check_batch_bounds(&self) -> Result<(), ProtocolError> {
        let count = match &self.payload {
            ResultPayload::TxnBeginMulti { xids } => xids.len(),
            ResultPayload::TxnStatusMulti { statuses }
            | ResultPayload::SnapshotStatus { statuses, .. } => statuses.len(),
            _ => return Ok(()),
        };
        if count > MAX_TRANSACTION_BATCH {
            return Err(ProtocolError::BatchTooLarge(count as i32));
        }
        Ok(())
    }

    /// Encode the body (everything after the kind tag and length field):
    /// status, proxy header, payload fields, then the two side records.
    pub(crate) fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_i32(self.status);

        match self.proxy_header {
            Some(header) => {
                dst.put_u8(1);
                dst.put_i32(header.conn_id);
            }
            None => dst.put_u8(0),
        }

        match &self.payload {
            ResultPayload::TxnHandle(handle) => {
                dst.put_i32(handle.as_i32());
            }
            ResultPayload::GxidTimestamp { gxid, timestamp } => {
                dst.put_u64(gxid.as_u64());
                dst.put_i64(*timestamp);
            }
            ResultPayload::Gxid(gxid) => {
                dst.put_u64(gxid.as_u64());
            }
            ResultPayload::TxnGxid { handle, gxid } => {
                dst.put_i32(handle.as_i32());
                dst.put_u64(gxid.as_u64());
            }
            ResultPayload::SequenceKey(key) => {
                put_bytes(dst, key.name());
            }
            ResultPayload::SequenceValue { key, value } => {
                put_bytes(dst, key.name());
                dst.put_i64(*value);
            }
            ResultPayload::TxnBeginMulti { xids } => {
                dst.put_i32(xids.len() as i32);
                for (gxid, timestamp) in xids {
                    dst.put_u64(gxid.as_u64());
                    dst.put_i64(*timestamp);
                }
            }
            ResultPayload::TxnStatusMulti { statuses } => {
                put_status_batch(dst, statuses);
            }
            ResultPayload::SnapshotStatus { gxid, statuses } => {
                dst.put_u64(gxid.as_u64());
                put_status_batch(dst, statuses);
            }
            ResultPayload::GidData {
                gxid,
                prepared_gxid,
                datanodes,
                coordinators,
            } => {
                dst.put_u64(gxid.as_u64());
                dst.put_u64(prepared_gxid.as_u64());
                put_node_list(dst, datanodes);
                put_node_list(dst, coordinators);
            }
            ResultPayload::Node { node_type, node_id } => {
                dst.put_u8(node_type.as_byte());
                dst.put_u32(*node_id);
            }
        }

        // Side records, outside the tagged payload, always present.
        dst.put_u64(self.snapshot.xmin.as_u64());
        dst.put_u64(self.snapshot.xmax.as_u64());
        dst.put_i32(self.snapshot.xip.len() as i32);
        for gxid in &self.snapshot.xip {
            dst.put_u64(gxid.as_u64());
        }
        put_bytes(dst, &self.proxy_data);
    }

    /// Decode the body for a given kind tag.
    pub(crate) fn decode_body(tag: u8, src: &mut BytesMut) -> Result<Self, ProtocolError> {
        ensure_remaining!(src, 5);
        let status = src.get_i32();
        let proxy_header = match src.get_u8() {
            0 => None,
            1 => {
                ensure_remaining!(src, 4);
                Some(ProxyHeader {
                    conn_id: src.get_i32(),
                })
            }
            _ => return Err(ProtocolError::InvalidMessage),
        };

        let payload = match tag {
            kind::TXN_HANDLE => {
                ensure_remaining!(src, 4);
                ResultPayload::TxnHandle(TxnHandle::new(src.get_i32()))
            }
            kind::GXID_TIMESTAMP => {
                ensure_remaining!(src, 16);
                ResultPayload::GxidTimestamp {
                    gxid: GlobalXid::new(src.get_u64()),
                    timestamp: src.get_i64(),
                }
            }
            kind::GXID => {
                ensure_remaining!(src, 8);
                ResultPayload::Gxid(GlobalXid::new(src.get_u64()))
            }
            kind::TXN_GXID => {
                ensure_remaining!(src, 12);
                ResultPayload::TxnGxid {
                    handle: TxnHandle::new(src.get_i32()),
                    gxid: GlobalXid::new(src.get_u64()),
                }
            }
            kind::SEQUENCE_KEY => ResultPayload::SequenceKey(SequenceKey::new(get_bytes(src)?)),
            kind::SEQUENCE_VALUE => {
                let key = SequenceKey::new(get_bytes(src)?);
                ensure_remaining!(src, 8);
                ResultPayload::SequenceValue {
                    key,
                    value: src.get_i64(),
                }
            }
            kind::TXN_BEGIN_MULTI => {
                ensure_remaining!(src, 4);
                let count = src.get_i32();
                if count < 0 {
                    return Err(ProtocolError::InvalidMessage);
                }
                if count as usize > MAX_TRANSACTION_BATCH {
                    return Err(ProtocolError::BatchTooLarge(count));
                }
                let count = count as usize;
                ensure_remaining!(src, count * 16);
                let xids = (0..count)
                    .map(|_| (GlobalXid::new(src.get_u64()), src.get_i64()))
                    .collect();
                ResultPayload::TxnBeginMulti { xids }
            }
            kind::TXN_STATUS_MULTI => ResultPayload::TxnStatusMulti {
                statuses: get_status_batch(src)?,
            },
            kind::SNAPSHOT_STATUS => {
                ensure_remaining!(src, 8);
                let gxid = GlobalXid::new(src.get_u64());
                let statuses = get_status_batch(src)?;
                ResultPayload::SnapshotStatus { gxid, statuses }
            }
            kind::GID_DATA => {
                ensure_remaining!(src, 16);
                let gxid = GlobalXid::new(src.get_u64());
                let prepared_gxid = GlobalXid::new(src.get_u64());
                let datanodes = get_node_list(src)?;
                let coordinators = get_node_list(src)?;
                ResultPayload::GidData {
                    gxid,
                    prepared_gxid,
                    datanodes,
                    coordinators,
                }
            }
            kind::NODE => {
                ensure_remaining!(src, 5);
                let node_type =
                    NodeType::from_byte(src.get_u8()).ok_or(ProtocolError::InvalidMessage)?;
                ResultPayload::Node {
                    node_type,
                    node_id: src.get_u32(),
                }
            }
            other => return Err(ProtocolError::UnknownResultKind(other)),
        };

        // Side records follow the payload for every kind.
        ensure_remaining!(src, 20);
        let xmin = GlobalXid::new(src.get_u64());
        let xmax = GlobalXid::new(src.get_u64());
        let xip_count = src.get_i32();
        if xip_count < 0 {
            return Err(ProtocolError::InvalidMessage);
        }
        let xip_count = xip_count as usize;
        ensure_remaining!(src, xip_count * 8);
        let xip = (0..xip_count).map(|_| GlobalXid::new(src.get_u64())).collect();
        let proxy_data = get_bytes(src)?;

        Ok(Self {
            status,
            proxy_header,
            payload,
            snapshot: GtmSnapshot { xmin, xmax, xip },
            proxy_data,
        })
    }
}

fn put_status_batch(dst: &mut BytesMut, statuses: &[i32]) {
    dst.put_i32(statuses.len() as i32);
    for status in statuses {
        dst.put_i32(*status);
    }
}

fn get_status_batch(src: &mut BytesMut) -> Result<Vec<i32>, ProtocolError> {
    ensure_remaining!(src, 4);
    let count = src.get_i32();
    if count < 0 {
        return Err(ProtocolError::InvalidMessage);
    }
    if count as usize > MAX_TRANSACTION_BATCH {
        return Err(ProtocolError::BatchTooLarge(count));
    }
    let count = count as usize;
    ensure_remaining!(src, count * 4);
    Ok((0..count).map(|_| src.get_i32()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    use crate::protocol::codec::{ClientCodec, ServerCodec};

    /// Encode with the server codec, decode with the client codec.
    fn round_trip(result: GtmResult) -> GtmResult {
        let mut buf = BytesMut::new();
        ServerCodec::new().encode(result, &mut buf).unwrap();
        ClientCodec::new().decode(&mut buf).unwrap().unwrap()
    }

    fn snapshot(xmin: u64, xmax: u64, xip: &[u64]) -> GtmSnapshot {
        GtmSnapshot {
            xmin: GlobalXid::new(xmin),
            xmax: GlobalXid::new(xmax),
            xip: xip.iter().copied().map(GlobalXid::new).collect(),
        }
    }

    #[test]
    fn test_round_trip_gxid_timestamp() {
        let result = GtmResult::ok(ResultPayload::GxidTimestamp {
            gxid: GlobalXid::new(101),
            timestamp: 1_700_000_000_000_000,
        });
        assert_eq!(round_trip(result.clone()), result);
    }

    #[test]
    fn test_round_trip_snapshot_rides_side_record() {
        let result = GtmResult::ok(ResultPayload::SnapshotStatus {
            gxid: GlobalXid::new(101),
            statuses: vec![],
        })
        .with_snapshot(snapshot(99, 102, &[99, 101]));
        let decoded = round_trip(result.clone());
        assert_eq!(decoded, result);
        assert_eq!(decoded.snapshot.xip.len(), 2);
        assert!(decoded.snapshot.is_in_progress(GlobalXid::new(101)));
    }

    #[test]
    fn test_side_records_survive_any_payload_kind() {
        // The snapshot and proxy data sit outside the tagged variant, so
        // they decode intact alongside a payload that has nothing to do
        // with snapshots.
        let result = GtmResult {
            status: 0,
            proxy_header: Some(ProxyHeader { conn_id: 42 }),
            payload: ResultPayload::SequenceValue {
                key: SequenceKey::from("orders_id_seq"),
                value: 17,
            },
            snapshot: snapshot(5, 9, &[5, 6]),
            proxy_data: vec![0xDE, 0xAD, 0xBE, 0xEF],
        };
        let decoded = round_trip(result.clone());
        assert_eq!(decoded, result);
        assert_eq!(decoded.snapshot, snapshot(5, 9, &[5, 6]));
        assert_eq!(decoded.proxy_data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_round_trip_gid_data() {
        let result = GtmResult::ok(ResultPayload::GidData {
            gxid: GlobalXid::new(55),
            prepared_gxid: GlobalXid::new(56),
            datanodes: vec![1, 2],
            coordinators: vec![1],
        });
        assert_eq!(round_trip(result.clone()), result);
    }

    #[test]
    fn test_round_trip_begin_multi() {
        let result = GtmResult::ok(ResultPayload::TxnBeginMulti {
            xids: vec![(GlobalXid::new(10), 1000), (GlobalXid::new(11), 1001)],
        });
        assert_eq!(round_trip(result.clone()), result);
    }

    #[test]
    fn test_batch_count_over_maximum_rejected_at_decode() {
        // Hand-build a TXN_STATUS_MULTI frame whose declared count exceeds
        // the maximum; the decoder must reject it, not truncate.
        let mut buf = BytesMut::new();
        buf.put_u8(kind::TXN_STATUS_MULTI);
        buf.put_i32(4 + 4 + 1 + 4); // length: itself + status + proxy flag + count
        buf.put_i32(0); // status
        buf.put_u8(0); // no proxy header
        buf.put_i32((MAX_TRANSACTION_BATCH + 1) as i32);
        let result = ClientCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::BatchTooLarge(_))));
    }

    #[test]
    fn test_batch_bound_enforced_at_encode() {
        let result = GtmResult::ok(ResultPayload::TxnStatusMulti {
            statuses: vec![0; MAX_TRANSACTION_BATCH + 1],
        });
        let mut buf = BytesMut::new();
        let encoded = ServerCodec::new().encode(result, &mut buf);
        assert!(matches!(encoded, Err(ProtocolError::BatchTooLarge(_))));
    }

    #[test]
    fn test_batch_at_maximum_accepted() {
        let result = GtmResult::ok(ResultPayload::TxnStatusMulti {
            statuses: vec![0; MAX_TRANSACTION_BATCH],
        });
        let decoded = round_trip(result.clone());
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_unknown_result_kind_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xEE);
        buf.put_i32(4 + 4 + 1);
        buf.put_i32(0);
        buf.put_u8(0);
        let result = ClientCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownResultKind(0xEE))));
    }
}
