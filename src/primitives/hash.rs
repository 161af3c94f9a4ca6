//! 256-bit block hashes.
//!
//! Bitcoin hashes are stored and transmitted in network byte order (the
//! order double-SHA256 produces them) but displayed to humans reversed,
//! byte for byte, as big-endian hex. `Hash256` keeps the network order
//! internally and only reverses for `Display`/`FromStr`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::NodeError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Double SHA-256 of `data`, result kept in network (little-endian) order.
    pub fn double_sha256(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        Hash256(out)
    }

    /// Interpret the hash as a 256-bit unsigned integer in little-endian
    /// order, for proof-of-work comparisons against a decoded target.
    pub fn as_uint256_le(&self) -> crypto_bigint::U256 {
        let mut be = self.0;
        be.reverse();
        crypto_bigint::U256::from_be_slice(&be)
    }

    /// Display-reversed big-endian hex, the convention used by block
    /// explorers and `bitcoin-cli`.
    pub fn to_hex_be(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_be())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex_be())
    }
}

impl FromStr for Hash256 {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| NodeError::Codec(format!("invalid hex hash: {e}")))?;
        if bytes.len() != 32 {
            return Err(NodeError::Codec(format!(
                "hash must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        arr.reverse();
        Ok(Hash256(arr))
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Hash256::ZERO
    }
}
