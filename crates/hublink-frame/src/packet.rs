use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Packet header size: UID (4) + length (1) + function (1) + seq/flags (1) +
/// error/reserved (1) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Maximum payload size. The length byte covers the whole packet, so the
/// payload is capped at 255 minus the header.
pub const MAX_PAYLOAD: usize = u8::MAX as usize - HEADER_SIZE;

/// Target identity addressing every device behind the gateway at once.
pub const BROADCAST_UID: u32 = 0;

/// The fixed 8-byte packet header.
///
/// Wire format, all little-endian:
/// ```text
/// ┌────────────┬──────────┬──────────┬─────────────┬──────────────┐
/// │ UID        │ Length   │ Function │ Seq/Flags   │ Err/Reserved │
/// │ (4B LE)    │ (1B)     │ (1B)     │ (1B)        │ (1B)         │
/// └────────────┴──────────┴──────────┴─────────────┴──────────────┘
/// ```
///
/// Seq/Flags: bits 4-7 sequence number (0 = unsolicited callback), bit 3
/// response-expected, bit 2 auth-present, bits 0-1 reserved. Err/Reserved:
/// bits 6-7 error code, bits 0-5 reserved and treated as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Target device identity; 0 addresses the broadcast.
    pub uid: u32,
    /// Total packet length including this header.
    pub length: u8,
    /// Request/response function selector.
    pub function_id: u8,
    /// Sequence number, 0-15. Zero marks unsolicited callbacks.
    pub sequence: u8,
    /// Whether the peer is expected to answer this packet.
    pub response_expected: bool,
    /// Whether the sender carries an authentication key (informational).
    pub auth: bool,
    /// Error code from the peer: 0 ok, 1 invalid parameter, 2 unsupported.
    pub error_code: u8,
}

impl PacketHeader {
    /// Build a header for an outgoing packet.
    pub fn request(
        uid: u32,
        payload_len: usize,
        function_id: u8,
        sequence: u8,
        response_expected: bool,
        auth: bool,
    ) -> Result<Self> {
        if payload_len > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            uid,
            length: (HEADER_SIZE + payload_len) as u8,
            function_id,
            sequence,
            response_expected,
            auth,
            error_code: 0,
        })
    }

    /// Encode the header into the wire format.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.uid);
        dst.put_u8(self.length);
        dst.put_u8(self.function_id);
        let mut seq_flags = self.sequence << 4;
        if self.response_expected {
            seq_flags |= 1 << 3;
        }
        if self.auth {
            seq_flags |= 1 << 2;
        }
        dst.put_u8(seq_flags);
        dst.put_u8(self.error_code << 6);
    }

    /// Decode a header from the first 8 bytes of `src`.
    ///
    /// The reserved option bits and the low 6 bits of the error byte are
    /// opaque and not retained.
    pub fn decode(src: &[u8]) -> Self {
        debug_assert!(src.len() >= HEADER_SIZE);
        let seq_flags = src[6];
        Self {
            uid: u32::from_le_bytes(src[0..4].try_into().unwrap()),
            length: src[4],
            function_id: src[5],
            sequence: (seq_flags >> 4) & 0x0F,
            response_expected: (seq_flags >> 3) & 0x01 == 1,
            auth: (seq_flags >> 2) & 0x01 == 1,
            error_code: (src[7] >> 6) & 0x03,
        }
    }

    /// Whether this packet is an unsolicited callback.
    pub fn is_callback(&self) -> bool {
        self.sequence == 0
    }
}

/// A whole packet recovered from the stream.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

/// Encode a complete packet (header + payload) into `dst`.
pub fn encode_packet(header: &PacketHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    header.encode(dst);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one packet from the merge buffer.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete packet.
/// On success, consumes exactly the packet's declared length from `src`.
/// A declared length below the header size means the stream is corrupt and
/// cannot be re-synchronized.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let length = src[4];
    if (length as usize) < HEADER_SIZE {
        return Err(FrameError::InvalidLength { length });
    }
    if src.len() < length as usize {
        return Ok(None);
    }

    let header = PacketHeader::decode(&src[..HEADER_SIZE]);
    src.advance(HEADER_SIZE);
    let payload = src.split_to(length as usize - HEADER_SIZE).freeze();

    Ok(Some(Packet { header, payload }))
}
