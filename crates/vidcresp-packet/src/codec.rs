use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{PacketError, Result};
use crate::types::{PacketFlags, Port, PAYLOAD_NONE};

/// Response header: size, session id, header id, reserved[4], packet count.
pub const HEADER_SIZE: usize = 32;

/// Packet header: size, type, flags, payload info, port, packet id, reserved[2].
pub const PACKET_HEADER_SIZE: usize = 32;

/// Default maximum response size: 4 MiB.
pub const DEFAULT_MAX_RESPONSE: usize = 4 * 1024 * 1024;

/// Decoded response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Total response size in bytes, header included.
    pub size: u32,
    /// Owning session, or zero for system-scope responses.
    pub session_id: u32,
    pub header_id: u32,
    /// Number of packets following the header.
    pub num_packets: u32,
}

impl ResponseHeader {
    /// Decode a response header. The caller has already validated that
    /// `buf` holds at least the bytes the header declares.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(PacketError::Undersized {
                offset: 0,
                size: buf.len(),
                min: HEADER_SIZE,
            });
        }
        Ok(Self {
            size: le_u32(buf, 0),
            session_id: le_u32(buf, 4),
            header_id: le_u32(buf, 8),
            num_packets: le_u32(buf, 28),
        })
    }

    /// True for responses that address the shared firmware state.
    pub fn is_system(&self) -> bool {
        self.session_id == 0
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Declared size in bytes, header included.
    pub size: u32,
    pub packet_type: u32,
    pub flags: PacketFlags,
    pub payload_info: u32,
    pub port: Port,
    pub packet_id: u32,
}

impl PacketHeader {
    /// Start a header for encoding. The size is filled in by [`encode_packet`].
    pub fn new(packet_type: u32) -> Self {
        Self {
            size: 0,
            packet_type,
            flags: PacketFlags::empty(),
            payload_info: PAYLOAD_NONE,
            port: Port::None,
            packet_id: 0,
        }
    }

    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.port = port;
        self
    }

    pub fn with_payload_info(mut self, payload_info: u32) -> Self {
        self.payload_info = payload_info;
        self
    }

    pub fn with_packet_id(mut self, packet_id: u32) -> Self {
        self.packet_id = packet_id;
        self
    }

    pub(crate) fn decode(buf: &[u8]) -> Self {
        Self {
            size: le_u32(buf, 0),
            packet_type: le_u32(buf, 4),
            flags: PacketFlags::from_bits_retain(le_u32(buf, 8)),
            payload_info: le_u32(buf, 12),
            port: Port::from_raw(le_u32(buf, 16)),
            packet_id: le_u32(buf, 20),
        }
    }
}

/// Read a little-endian `u32` at `at`. Callers check bounds first.
pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}

/// Read a little-endian `u64` at `at`. Callers check bounds first.
pub(crate) fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(word)
}

/// Read the `index`-th `u32` word of a packet payload.
pub fn payload_word(payload: &[u8], index: usize, what: &'static str) -> Result<u32> {
    let need = index
        .checked_add(1)
        .and_then(|words| words.checked_mul(4))
        .unwrap_or(usize::MAX);
    if payload.len() < need {
        return Err(PacketError::PayloadTooShort {
            what,
            len: payload.len(),
            need,
        });
    }
    Ok(le_u32(payload, index * 4))
}

/// Encode one packet into the wire format.
///
/// ```text
/// ┌──────┬──────┬───────┬──────────────┬──────┬───────────┬──────────┬─────────┐
/// │ size │ type │ flags │ payload_info │ port │ packet_id │ rsvd[2]  │ payload │
/// │ 4B   │ 4B   │ 4B    │ 4B           │ 4B   │ 4B        │ 8B       │ ...     │
/// └──────┴──────┴───────┴──────────────┴──────┴───────────┴──────────┴─────────┘
/// ```
pub fn encode_packet(header: &PacketHeader, payload: &[u8], dst: &mut BytesMut) {
    let size = PACKET_HEADER_SIZE + payload.len();
    dst.reserve(size);
    dst.put_u32_le(size as u32);
    dst.put_u32_le(header.packet_type);
    dst.put_u32_le(header.flags.bits());
    dst.put_u32_le(header.payload_info);
    dst.put_u32_le(header.port.raw());
    dst.put_u32_le(header.packet_id);
    dst.put_u64_le(0);
    dst.put_slice(payload);
}

/// Assembles a complete response (header plus packets).
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    session_id: u32,
    header_id: u32,
    packets: BytesMut,
    count: u32,
}

impl ResponseBuilder {
    pub fn new(session_id: u32) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    pub fn header_id(mut self, header_id: u32) -> Self {
        self.header_id = header_id;
        self
    }

    /// Append a packet.
    pub fn packet(mut self, header: PacketHeader, payload: &[u8]) -> Self {
        encode_packet(&header, payload, &mut self.packets);
        self.count += 1;
        self
    }

    /// Append a packet whose payload is a list of `u32` words.
    pub fn words(self, header: PacketHeader, words: &[u32]) -> Self {
        let mut payload = BytesMut::with_capacity(words.len() * 4);
        for word in words {
            payload.put_u32_le(*word);
        }
        self.packet(header, &payload)
    }

    /// Finish the response.
    pub fn build(self) -> Bytes {
        let size = HEADER_SIZE + self.packets.len();
        let mut out = BytesMut::with_capacity(size);
        out.put_u32_le(size as u32);
        out.put_u32_le(self.session_id);
        out.put_u32_le(self.header_id);
        out.put_bytes(0, 16);
        out.put_u32_le(self.count);
        out.put_slice(&self.packets);
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CMD_OPEN, PAYLOAD_U32};

    #[test]
    fn header_layout() {
        let bytes = ResponseBuilder::new(7).header_id(3).build();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let header = ResponseHeader::decode(&bytes).unwrap();
        assert_eq!(header.size as usize, HEADER_SIZE);
        assert_eq!(header.session_id, 7);
        assert_eq!(header.header_id, 3);
        assert_eq!(header.num_packets, 0);
        assert!(!header.is_system());
    }

    #[test]
    fn packet_header_decodes_encoded_fields() {
        let header = PacketHeader::new(CMD_OPEN)
            .with_flags(PacketFlags::SUCCESS)
            .with_port(Port::Raw)
            .with_payload_info(PAYLOAD_U32)
            .with_packet_id(9);
        let mut buf = BytesMut::new();
        encode_packet(&header, &[1, 2, 3, 4], &mut buf);

        assert_eq!(buf.len(), PACKET_HEADER_SIZE + 4);
        let decoded = PacketHeader::decode(&buf);
        assert_eq!(decoded.size as usize, PACKET_HEADER_SIZE + 4);
        assert_eq!(decoded.packet_type, CMD_OPEN);
        assert_eq!(decoded.flags, PacketFlags::SUCCESS);
        assert_eq!(decoded.port, Port::Raw);
        assert_eq!(decoded.packet_id, 9);
    }

    #[test]
    fn short_header_rejected() {
        let err = ResponseHeader::decode(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, PacketError::Undersized { min: HEADER_SIZE, .. }));
    }

    #[test]
    fn payload_word_is_bounds_checked() {
        let payload = [1, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(payload_word(&payload, 1, "test").unwrap(), 2);
        let err = payload_word(&payload, 2, "test").unwrap_err();
        assert_eq!(
            err,
            PacketError::PayloadTooShort {
                what: "test",
                len: 8,
                need: 12
            }
        );
    }
}
