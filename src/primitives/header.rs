//! The 80-byte block header and its persisted record wrapper.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::primitives::compact::CompactTarget;
use crate::primitives::hash::Hash256;

pub const HEADER_SIZE: usize = 80;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl std::fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHeader")
            .field("version", &self.version)
            .field("prev_hash", &self.prev_hash)
            .field("merkle_root", &self.merkle_root)
            .field("timestamp", &self.timestamp)
            .field("bits", &self.bits)
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl BlockHeader {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.version);
        buf.put_slice(self.prev_hash.as_slice());
        buf.put_slice(self.merkle_root.as_slice());
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.bits.to_u32());
        buf.put_u32_le(self.nonce);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, NodeError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(NodeError::Truncated("block header"));
        }
        let version = buf.get_i32_le();
        let mut prev = [0u8; 32];
        buf.copy_to_slice(&mut prev);
        let mut merkle = [0u8; 32];
        buf.copy_to_slice(&mut merkle);
        let timestamp = buf.get_u32_le();
        let bits = buf.get_u32_le();
        let nonce = buf.get_u32_le();
        Ok(BlockHeader {
            version,
            prev_hash: Hash256::from_bytes(prev),
            merkle_root: Hash256::from_bytes(merkle),
            timestamp,
            bits: CompactTarget::new(bits),
            nonce,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.encode(&mut buf);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// `DoubleSHA256` of the 80-byte serialization.
    pub fn block_hash(&self) -> Hash256 {
        Hash256::double_sha256(&self.to_bytes())
    }
}

/// The persisted form of a header: its chain position alongside the raw
/// header bytes. `file_index`/`file_offset` are retained for a future
/// block-body store this node does not implement; `is_orphan` is derived
/// at read time from chain membership, not stored (see header-store notes).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeaderRecord {
    pub height: u32,
    pub txn_count: u32,
    pub header: BlockHeader,
    pub file_index: i64,
    pub file_offset: i64,
}

impl BlockHeaderRecord {
    pub fn new(height: u32, header: BlockHeader) -> Self {
        BlockHeaderRecord {
            height,
            txn_count: 0,
            header,
            file_index: -1,
            file_offset: -1,
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.block_hash()
    }
}
