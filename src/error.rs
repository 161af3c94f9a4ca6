//! Typed error taxonomy for the node's core subsystems.
//!
//! NO PANICS in the codec, chain engine, or store paths: every fallible
//! operation here returns a typed, displayable variant rather than
//! unwinding, matching the status-code discipline the original design
//! documents (every fallible call returns a status, never throws).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    // ==================== Codec errors ====================
    #[error("codec error: {0}")]
    Codec(String),

    #[error("truncated frame: need more of {0}")]
    Truncated(&'static str),

    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("checksum mismatch for command {command}")]
    BadChecksum { command: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    // ==================== Chain errors ====================
    #[error("invalid proof of work for header {hash}")]
    InvalidProofOfWork { hash: String },

    #[error("unknown parent {parent} for header {hash}")]
    UnknownParent { hash: String, parent: String },

    #[error("parent-cycle detected at {0}")]
    ParentCycle(String),

    #[error("cannot remove genesis node")]
    CannotRemoveGenesis,

    #[error("attempted to remove a node on the active chain: {0}")]
    NotAnOrphan(String),

    // ==================== Store errors ====================
    #[error("store backend error: {0}")]
    Store(String),

    #[error("store not initialized")]
    StoreNotInitialized,

    // ==================== Session errors ====================
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),

    #[error("protocol version too old: peer advertised {0}")]
    ProtocolTooOld(i32),

    // ==================== Ambient errors ====================
    #[error("I/O error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),
}

impl NodeError {
    /// Stable short code for log correlation and monitoring.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Codec(_) => "E1000",
            Self::Truncated(_) => "E1001",
            Self::BadMagic { .. } => "E1002",
            Self::BadChecksum { .. } => "E1003",
            Self::UnknownCommand(_) => "E1004",

            Self::InvalidProofOfWork { .. } => "E2000",
            Self::UnknownParent { .. } => "E2001",
            Self::ParentCycle(_) => "E2002",
            Self::CannotRemoveGenesis => "E2003",
            Self::NotAnOrphan(_) => "E2004",

            Self::Store(_) => "E3000",
            Self::StoreNotInitialized => "E3001",

            Self::ConnectFailed(_) => "E4000",
            Self::HandshakeFailed(_) => "E4001",
            Self::RetriesExhausted(_) => "E4002",
            Self::ProtocolTooOld(_) => "E4003",

            Self::Io(_) => "E5000",
            Self::Config(_) => "E5001",
        }
    }

    /// Is the session expected to continue after this error, or does it
    /// force a disconnect/reconnect? Mirrors the "drop the single message,
    /// continue the session" vs "fatal to the session" split.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::Truncated(_)
                | Self::ConnectFailed(_)
                | Self::HandshakeFailed(_)
                | Self::RetriesExhausted(_)
                | Self::ProtocolTooOld(_)
        )
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BadChecksum { .. }
                | Self::UnknownCommand(_)
                | Self::InvalidProofOfWork { .. }
                | Self::UnknownParent { .. }
        )
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::Config(e.to_string())
    }
}

impl From<bincode::Error> for NodeError {
    fn from(e: bincode::Error) -> Self {
        NodeError::Store(e.to_string())
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for NodeError {
    fn from(e: sled::Error) -> Self {
        NodeError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_distinct_per_variant_family() {
        assert_ne!(
            NodeError::Codec("x".into()).error_code(),
            NodeError::Store("x".into()).error_code()
        );
    }

    #[test]
    fn bad_checksum_is_recoverable_but_bad_magic_is_fatal() {
        assert!(NodeError::BadChecksum { command: "headers".into() }.is_recoverable());
        assert!(NodeError::BadMagic { expected: 1, actual: 2 }.is_session_fatal());
    }
}
