//! Bitcoin CompactSize integers and length-prefixed strings.

use bytes::{Buf, BufMut};

use crate::error::NodeError;

/// Maximum entries permitted in any list-bearing message payload.
pub const MAX_VARINT_LIST_LEN: u64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    pub fn new(value: u64) -> Self {
        VarInt(value)
    }

    pub fn encoded_len(&self) -> usize {
        match self.0 {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        match self.0 {
            0..=0xFC => buf.put_u8(self.0 as u8),
            0xFD..=0xFFFF => {
                buf.put_u8(0xFD);
                buf.put_u16_le(self.0 as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                buf.put_u8(0xFE);
                buf.put_u32_le(self.0 as u32);
            }
            _ => {
                buf.put_u8(0xFF);
                buf.put_u64_le(self.0);
            }
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, NodeError> {
        if !buf.has_remaining() {
            return Err(NodeError::Truncated("varint prefix"));
        }
        let prefix = buf.get_u8();
        let value = match prefix {
            0xFD => {
                if buf.remaining() < 2 {
                    return Err(NodeError::Truncated("varint u16 body"));
                }
                buf.get_u16_le() as u64
            }
            0xFE => {
                if buf.remaining() < 4 {
                    return Err(NodeError::Truncated("varint u32 body"));
                }
                buf.get_u32_le() as u64
            }
            0xFF => {
                if buf.remaining() < 8 {
                    return Err(NodeError::Truncated("varint u64 body"));
                }
                buf.get_u64_le()
            }
            v => v as u64,
        };
        Ok(VarInt(value))
    }

    /// Decode a varint that is known to be a list length and enforce the
    /// 50,000-entry cap.
    pub fn decode_list_len(buf: &mut impl Buf) -> Result<u64, NodeError> {
        let v = Self::decode(buf)?.0;
        if v > MAX_VARINT_LIST_LEN {
            return Err(NodeError::Codec(format!(
                "list length {v} exceeds cap of {MAX_VARINT_LIST_LEN}"
            )));
        }
        Ok(v)
    }
}

/// A variable-length byte string: a `VarInt` length prefix followed by
/// that many raw bytes.
pub fn encode_varstr(buf: &mut impl BufMut, s: &[u8]) {
    VarInt::new(s.len() as u64).encode(buf);
    buf.put_slice(s);
}

pub fn decode_varstr(buf: &mut impl Buf) -> Result<Vec<u8>, NodeError> {
    let len = VarInt::decode_list_len(buf)?;
    if buf.remaining() < len as usize {
        return Err(NodeError::Truncated("varstr body"));
    }
    let mut out = vec![0u8; len as usize];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(v: u64) {
        let mut buf = BytesMut::new();
        VarInt::new(v).encode(&mut buf);
        let mut reader = &buf[..];
        let decoded = VarInt::decode(&mut reader).unwrap();
        assert_eq!(decoded.0, v, "roundtrip failed for {v}");
    }

    #[test]
    fn varint_roundtrips_boundaries() {
        for v in [
            0u64,
            0xFC,
            0xFD,
            0xFFFF,
            0x1_0000,
            0xFFFF_FFFF,
            0x1_0000_0000,
            u64::MAX,
        ] {
            roundtrip(v);
        }
    }

    #[test]
    fn varint_encoded_len_matches_prefix() {
        assert_eq!(VarInt::new(0xFC).encoded_len(), 1);
        assert_eq!(VarInt::new(0xFD).encoded_len(), 3);
        assert_eq!(VarInt::new(0x1_0000).encoded_len(), 5);
        assert_eq!(VarInt::new(u64::MAX).encoded_len(), 9);
    }

    #[test]
    fn varstr_roundtrip() {
        let mut buf = BytesMut::new();
        encode_varstr(&mut buf, b"/spv-node:0.1/");
        let mut reader = &buf[..];
        let decoded = decode_varstr(&mut reader).unwrap();
        assert_eq!(decoded, b"/spv-node:0.1/");
    }

    #[test]
    fn list_len_cap_rejected() {
        let mut buf = BytesMut::new();
        VarInt::new(50_001).encode(&mut buf);
        let mut reader = &buf[..];
        assert!(VarInt::decode_list_len(&mut reader).is_err());
    }

    proptest::proptest! {
        #[test]
        fn varint_proptest_roundtrip(v: u64) {
            roundtrip(v);
        }
    }
}
