use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + flags (1) + length (4) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Magic bytes: "BS" (0x42 0x53).
pub const MAGIC: [u8; 2] = [0x42, 0x53];

/// Flag bit: another frame of the same message follows.
pub const FLAG_MORE: u8 = 0x01;

/// Default maximum payload size: 64 MiB (detector images fit in one frame).
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// One frame of a multipart message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// The frame payload. May be empty.
    pub payload: Bytes,
    /// Whether further frames of the same message follow.
    pub more: bool,
}

impl Part {
    pub fn new(payload: impl Into<Bytes>, more: bool) -> Self {
        Self {
            payload: payload.into(),
            more,
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a single frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Flags   │ Length   │ Payload         │
/// │ 0x42 0x53    │ (1B)    │ (4B LE)  │ (Length bytes)  │
/// │ "BS"         │ bit0=MORE│         │                 │
/// └──────────────┴─────────┴──────────┴─────────────────┘
/// ```
pub fn encode_part(payload: &[u8], more: bool, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(if more { FLAG_MORE } else { 0 });
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Encode every frame of a message; only the last one clears `FLAG_MORE`.
pub fn encode_message<P: AsRef<[u8]>>(parts: &[P], dst: &mut BytesMut) -> Result<()> {
    let Some(last) = parts.len().checked_sub(1) else {
        return Err(FrameError::EmptyMessage);
    };
    for (index, part) in parts.iter().enumerate() {
        encode_part(part.as_ref(), index != last, dst)?;
    }
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_part(src: &mut BytesMut, max_payload: usize) -> Result<Option<Part>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let flags = src[2];
    if flags & !FLAG_MORE != 0 {
        return Err(FrameError::InvalidFlags(flags));
    }

    let mut length = [0u8; 4];
    length.copy_from_slice(&src[3..HEADER_SIZE]);
    let payload_len = u32::from_le_bytes(length) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Part {
        payload,
        more: flags & FLAG_MORE != 0,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size of a single frame. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_part() {
        let mut buf = BytesMut::new();
        let payload = b"{\"htype\":\"bsr_m-1.1\"}";

        encode_part(payload, true, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let part = decode_part(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert!(part.more);
        assert_eq!(part.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_message_flags_close_on_last_part() {
        let mut buf = BytesMut::new();
        let parts: [&[u8]; 3] = [b"main", b"", b"ts"];
        encode_message(&parts, &mut buf).unwrap();

        let flags: Vec<bool> =
            std::iter::from_fn(|| decode_part(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap())
                .map(|part| part.more)
                .collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut buf = BytesMut::new();
        let parts: [&[u8]; 0] = [];
        assert!(matches!(
            encode_message(&parts, &mut buf),
            Err(FrameError::EmptyMessage)
        ));
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x42, 0x53, 0x00][..]);
        assert!(decode_part(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_part(b"hello", false, &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_part(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_part(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_unknown_flags() {
        let mut buf = BytesMut::from(&[0x42, 0x53, 0x80, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_part(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidFlags(0x80))));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(0);
        buf.put_u32_le(128);

        let result = decode_part(&mut buf, 64);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_part(b"", true, &mut buf).unwrap();

        let part = decode_part(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert!(part.payload.is_empty());
        assert!(part.more);
    }

    #[test]
    fn test_part_wire_size() {
        let part = Part::new(Bytes::from_static(b"test"), false);
        assert_eq!(part.wire_size(), HEADER_SIZE + 4);
    }
}
