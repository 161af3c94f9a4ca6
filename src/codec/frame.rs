//! The wire frame: `magic | command[12] | length | checksum | payload`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::NodeError;
use crate::primitives::hash::Hash256;

pub const FRAME_HEADER_LEN: usize = 24;
pub const MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;

/// Checksum of an empty payload: `checksum()`'s general formula applied to
/// the well-known `DoubleSHA256(b"")` digest (whose first four bytes are
/// `5D F6 E0 E2`), i.e. `u32::from_le_bytes([0x5D, 0xF6, 0xE0, 0xE2])`.
pub const EMPTY_PAYLOAD_CHECKSUM: u32 = 0xE2E0_F65D;

#[derive(Debug, Clone)]
pub struct Frame {
    pub command: [u8; 12],
    pub payload: Bytes,
}

impl Frame {
    pub fn new(command: &str, payload: Bytes) -> Self {
        let mut cmd = [0u8; 12];
        let bytes = command.as_bytes();
        let n = bytes.len().min(12);
        cmd[..n].copy_from_slice(&bytes[..n]);
        Frame { command: cmd, payload }
    }

    pub fn command_str(&self) -> String {
        let end = self.command.iter().position(|&b| b == 0).unwrap_or(12);
        String::from_utf8_lossy(&self.command[..end]).into_owned()
    }

    fn checksum(payload: &[u8]) -> u32 {
        if payload.is_empty() {
            return EMPTY_PAYLOAD_CHECKSUM;
        }
        let hash = Hash256::double_sha256(payload);
        u32::from_le_bytes([hash.as_bytes()[0], hash.as_bytes()[1], hash.as_bytes()[2], hash.as_bytes()[3]])
    }

    pub fn encode(&self, magic: u32, buf: &mut BytesMut) {
        buf.put_u32_le(magic);
        buf.put_slice(&self.command);
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_u32_le(Self::checksum(&self.payload));
        buf.put_slice(&self.payload);
    }

    /// Attempt to extract one complete frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when fewer than a full frame is buffered (the
    /// caller should wait for more bytes). A checksum mismatch consumes
    /// and discards the frame (single-message drop, session continues);
    /// a bad magic is reported so the caller can close the connection.
    pub fn try_parse(buf: &mut BytesMut, expected_magic: u32) -> Result<Option<Frame>, NodeError> {
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let mut header = &buf[..FRAME_HEADER_LEN];
        let magic = header.get_u32_le();
        if magic != expected_magic {
            return Err(NodeError::BadMagic {
                expected: expected_magic,
                actual: magic,
            });
        }

        let mut command = [0u8; 12];
        command.copy_from_slice(&header[..12]);
        header.advance(12);
        let length = header.get_u32_le();
        let checksum = header.get_u32_le();

        if length > MAX_PAYLOAD_LEN {
            return Err(NodeError::Codec(format!(
                "payload length {length} exceeds max {MAX_PAYLOAD_LEN}"
            )));
        }

        let total_len = FRAME_HEADER_LEN + length as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_LEN);
        let payload = buf.split_to(length as usize).freeze();

        let expected_checksum = Self::checksum(&payload);
        let frame = Frame { command, payload };
        if checksum != expected_checksum {
            let cmd = frame.command_str();
            return Err(NodeError::BadChecksum { command: cmd });
        }

        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_uses_fixed_checksum() {
        assert_eq!(Frame::checksum(&[]), EMPTY_PAYLOAD_CHECKSUM);
    }

    #[test]
    fn frame_roundtrips() {
        let frame = Frame::new("ping", Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]));
        let mut buf = BytesMut::new();
        frame.encode(0xD9B4_BEF9, &mut buf);
        let parsed = Frame::try_parse(&mut buf, 0xD9B4_BEF9).unwrap().unwrap();
        assert_eq!(parsed.command_str(), "ping");
        assert_eq!(&parsed.payload[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn incomplete_frame_yields_none() {
        let mut buf = BytesMut::from(&[0u8; 10][..]);
        assert!(Frame::try_parse(&mut buf, 0xD9B4_BEF9).unwrap().is_none());
    }

    #[test]
    fn wrong_magic_is_fatal() {
        let frame = Frame::new("verack", Bytes::new());
        let mut buf = BytesMut::new();
        frame.encode(0xD9B4_BEF9, &mut buf);
        let err = Frame::try_parse(&mut buf, 0xDAB5_BFFA).unwrap_err();
        assert!(matches!(err, NodeError::BadMagic { .. }));
    }

    #[test]
    fn bad_checksum_is_dropped_not_panicked() {
        let frame = Frame::new("headers", Bytes::from_static(b"not-empty"));
        let mut buf = BytesMut::new();
        frame.encode(0xD9B4_BEF9, &mut buf);
        // stomp the checksum field (bytes 20..24)
        buf[20..24].copy_from_slice(&[0, 0, 0, 0]);
        let err = Frame::try_parse(&mut buf, 0xD9B4_BEF9).unwrap_err();
        assert!(matches!(err, NodeError::BadChecksum { .. }));
        // bytes past the frame were still consumed
        assert!(buf.is_empty());
    }
}
