//! The wire-protocol codec: frame layer, message variants, and a
//! `tokio_util::codec` adapter for use with `Framed` over a socket.

pub mod frame;
pub mod message;
pub mod network;

pub use frame::{Frame, EMPTY_PAYLOAD_CHECKSUM, MAX_PAYLOAD_LEN};
pub use message::{
    GetHeadersMessage, HeaderAndTxnCount, InventoryItem, Message, NetworkAddress, RejectMessage,
    TimestampedAddress, VersionMessage,
};
pub use network::Network;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NodeError;

/// Bridges the frame/message layer to `tokio_util::codec::Framed`. The
/// receive side implements the spec's "repeatedly attempt to extract one
/// complete frame; if not enough bytes, wait for more" contract directly
/// through `Decoder::decode`'s `Ok(None)` convention. A checksum failure
/// or unknown command does not tear down the stream; only a bad magic
/// (mapped to an `Err`) does.
pub struct MessageCodec {
    magic: u32,
}

impl MessageCodec {
    pub fn new(network: Network) -> Self {
        MessageCodec { magic: network.magic() }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = NodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let frame = match frame::Frame::try_parse(src, self.magic) {
                Ok(Some(f)) => f,
                Ok(None) => return Ok(None),
                Err(e) if !e.is_session_fatal() => {
                    tracing::warn!(error = %e, "dropping malformed frame");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let command = frame.command_str();
            return match Message::parse(&command, &frame.payload) {
                Ok(msg) => Ok(Some(msg)),
                Err(e) => {
                    tracing::warn!(error = %e, command = %command, "dropping unparseable message");
                    continue;
                }
            };
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = NodeError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.serialize_payload();
        let frame = frame::Frame::new(item.command(), payload);
        frame.encode(self.magic, dst);
        Ok(())
    }
}
