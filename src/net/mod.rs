//! Peer session: connect/handshake/sync state machine and its dispatch
//! table, driven as a single async task per the concurrency model's
//! single-threaded event loop.

pub mod dispatch;
pub mod session;

pub use dispatch::{Handler, HandlerTable};
pub use session::{PeerSession, PeerState, SessionState, PROTOCOL_VERSION};
