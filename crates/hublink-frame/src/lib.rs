//! Wire packet model and stream framing for the hublink gateway protocol.
//!
//! Every packet starts with a fixed 8-byte header carrying the target device
//! identity, the total packet length, a function selector, and a combined
//! sequence/flags byte. The framer recovers whole packets from a TCP byte
//! stream regardless of how the segments were split or coalesced.

mod error;
mod packet;
mod sequence;

pub use error::{FrameError, Result};
pub use packet::{
    decode_packet, encode_packet, Packet, PacketHeader, BROADCAST_UID, HEADER_SIZE, MAX_PAYLOAD,
};
pub use sequence::SequenceCounter;

/// Reserved function id: broadcast enumerate request (no payload, no response).
pub const FUNCTION_ENUMERATE: u8 = 254;

/// Reserved function id: unsolicited broadcast enumerate callback.
pub const CALLBACK_ENUMERATE: u8 = 253;

/// Reserved function id: zero-payload liveness probe.
pub const FUNCTION_DISCONNECT_PROBE: u8 = 128;
