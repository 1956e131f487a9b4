use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::ProtocolError;
use crate::protocol::request::Request;
use crate::protocol::result::GtmResult;

/// Maximum message size in bytes (16 MB).
///
/// Large enough for a snapshot whose in-progress array is at its practical
/// worst case, small enough to bound memory per connection.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Ensures that the buffer has at least `n` bytes remaining.
/// Returns `ProtocolError::InvalidMessage` if not enough bytes are available.
macro_rules! ensure_remaining {
    ($buf:expr, $n:expr) => {
        if $buf.len() < $n {
            return Err(ProtocolError::InvalidMessage);
        }
    };
}
pub(crate) use ensure_remaining;

/// Read a length-prefixed byte string from a BytesMut buffer.
///
/// Wire format: Int32 length (>= 0), followed by that many data bytes.
/// Rejects negative lengths and lengths exceeding the available data.
pub fn get_bytes(src: &mut BytesMut) -> Result<Vec<u8>, ProtocolError> {
    ensure_remaining!(src, 4);
    let len = src.get_i32();
    if len < 0 {
        return Err(ProtocolError::InvalidMessage);
    }
    let len = len as usize;
    ensure_remaining!(src, len);
    Ok(src.split_to(len).to_vec())
}

/// Write a length-prefixed byte string to a BytesMut buffer.
pub fn put_bytes(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_i32(bytes.len() as i32);
    dst.put_slice(bytes);
}

/// Read a length-prefixed UTF-8 string.
pub fn get_string(src: &mut BytesMut) -> Result<String, ProtocolError> {
    String::from_utf8(get_bytes(src)?).map_err(ProtocolError::InvalidUtf8)
}

/// Write a length-prefixed UTF-8 string.
pub fn put_string(dst: &mut BytesMut, s: &str) {
    put_bytes(dst, s.as_bytes());
}

/// Read a boolean encoded as a single byte (0 or 1; anything else is rejected).
pub fn get_bool(src: &mut BytesMut) -> Result<bool, ProtocolError> {
    ensure_remaining!(src, 1);
    match src.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolError::InvalidMessage),
    }
}

/// Write a boolean as a single byte.
pub fn put_bool(dst: &mut BytesMut, b: bool) {
    dst.put_u8(b as u8);
}

/// Read a count-prefixed list of node ids.
pub fn get_node_list(src: &mut BytesMut) -> Result<Vec<u32>, ProtocolError> {
    ensure_remaining!(src, 4);
    let count = src.get_i32();
    if count < 0 {
        return Err(ProtocolError::InvalidMessage);
    }
    let count = count as usize;
    ensure_remaining!(src, count * 4);
    Ok((0..count).map(|_| src.get_u32()).collect())
}

/// Write a count-prefixed list of node ids.
pub fn put_node_list(dst: &mut BytesMut, nodes: &[u32]) {
    dst.put_i32(nodes.len() as i32);
    for node in nodes {
        dst.put_u32(*node);
    }
}

/// Decode one framed message: 1 kind byte + Int32 length (counting itself
/// and the body, not the kind byte) + body. Returns the kind and the body
/// buffer once a complete frame is buffered.
fn decode_frame(
    src: &mut BytesMut,
    max_message_size: usize,
) -> Result<Option<(u8, BytesMut)>, ProtocolError> {
    // Need at least 5 bytes (kind + length)
    if src.len() < 5 {
        return Ok(None);
    }

    // Peek at the length (bytes 1-4, don't consume yet)
    let len = i32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    if len < 4 || len > max_message_size {
        return Err(ProtocolError::InvalidMessage);
    }

    // Total message size = 1 (kind byte) + length
    let total = 1 + len;

    // Wait for complete message
    if src.len() < total {
        return Ok(None);
    }

    let mut frame = src.split_to(total);
    let kind = frame.get_u8();
    let _length = frame.get_i32();
    Ok(Some((kind, frame)))
}

/// Encode one framed message, back-patching the length field once the
/// body is written.
fn encode_frame(
    dst: &mut BytesMut,
    kind: u8,
    write_body: impl FnOnce(&mut BytesMut),
) {
    dst.put_u8(kind);
    let len_pos = dst.len();
    dst.put_i32(0); // placeholder
    write_body(dst);
    let len = (dst.len() - len_pos) as i32;
    dst[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
}

/// Codec for the client side of the GTM link.
/// Encodes [`Request`] and decodes [`GtmResult`].
pub struct ClientCodec {
    pub(crate) max_message_size: usize,
}

impl ClientCodec {
    /// Creates a new ClientCodec with the default maximum message size.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        item.check_batch_bounds()?;
        encode_frame(dst, item.kind(), |dst| item.encode_body(dst));
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = GtmResult;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((kind, mut body)) = decode_frame(src, self.max_message_size)? else {
            return Ok(None);
        };
        Ok(Some(GtmResult::decode_body(kind, &mut body)?))
    }
}

/// Codec for the server side of the GTM link.
/// Decodes [`Request`] and encodes [`GtmResult`].
pub struct ServerCodec {
    pub(crate) max_message_size: usize,
}

impl ServerCodec {
    /// Creates a new ServerCodec with the default maximum message size.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((kind, mut body)) = decode_frame(src, self.max_message_size)? else {
            return Ok(None);
        };
        Ok(Some(Request::decode_body(kind, &mut body)?))
    }
}

impl Encoder<GtmResult> for ServerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: GtmResult, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        item.check_batch_bounds()?;
        encode_frame(dst, item.kind(), |dst| item.encode_body(dst));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bytes() {
        let mut buf = BytesMut::from(&[0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o', b'!'][..]);
        assert_eq!(get_bytes(&mut buf).unwrap(), b"hello".to_vec());
        assert_eq!(buf, b"!"[..]);
    }

    #[test]
    fn test_get_bytes_negative_length() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF][..]); // -1
        assert!(get_bytes(&mut buf).is_err());
    }

    #[test]
    fn test_get_bytes_incomplete() {
        let mut buf = BytesMut::from(&[0, 0, 0, 10, b'h', b'i'][..]); // says 10, only 2 present
        assert!(get_bytes(&mut buf).is_err());
    }

    #[test]
    fn test_put_get_string_round_trip() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "orders_id_seq");
        assert_eq!(get_string(&mut buf).unwrap(), "orders_id_seq");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_get_bool_rejects_other_bytes() {
        let mut buf = BytesMut::from(&[2u8][..]);
        assert!(get_bool(&mut buf).is_err());
    }

    #[test]
    fn test_node_list_round_trip() {
        let mut buf = BytesMut::new();
        put_node_list(&mut buf, &[1, 2, 7]);
        assert_eq!(get_node_list(&mut buf).unwrap(), vec![1, 2, 7]);
    }

    #[test]
    fn test_decode_frame_waits_for_complete_message() {
        // kind + claimed length of 12, but only 4 body bytes buffered
        let mut buf = BytesMut::from(&[7u8, 0, 0, 0, 12, 1, 2, 3, 4][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_MESSAGE_SIZE).unwrap().is_none());
        // Buffer untouched until the frame completes
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn test_decode_frame_rejects_oversized_length() {
        let mut buf = BytesMut::from(&[7u8, 0x7F, 0xFF, 0xFF, 0xFF][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_MESSAGE_SIZE).is_err());
    }

    #[test]
    fn test_encode_frame_backpatches_length() {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, 9, |dst| dst.put_u64(0xAABB));
        assert_eq!(buf[0], 9);
        // length = 4 (itself) + 8 (body)
        assert_eq!(&buf[1..5], &[0, 0, 0, 12]);
        let (kind, body) = decode_frame(&mut buf, DEFAULT_MAX_MESSAGE_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(kind, 9);
        assert_eq!(body.len(), 8);
    }
}
