//! The buffer descriptor carried by `CMD_BUFFER` packets.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};

use crate::codec::{le_u32, le_u64};
use crate::error::{PacketError, Result};

/// Buffer descriptor size: type, index, base address (8B), address offset,
/// buffer size, data offset, data size, timestamp (8B), flags, reserved[5].
pub const BUFFER_PAYLOAD_SIZE: usize = 64;

bitflags! {
    /// Flags the firmware attaches to a returned buffer.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferFwFlags: u32 {
        const RELEASE_DONE = 0x0000_0001;
        const READONLY = 0x0000_0010;
        const CODEC_CONFIG = 0x0000_0100;
        const LAST = 0x1000_0000;
    }
}

bitflags! {
    /// Picture types reported through the picture-type property.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PictureType: u32 {
        const IDR = 0x01;
        const P = 0x02;
        const B = 0x04;
        const I = 0x08;
        const CRA = 0x10;
        const BLA = 0x20;
    }
}

/// Buffer types as the firmware names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HfiBufferType {
    Bitstream,
    Raw,
    Metadata,
    Dpb,
    Bin,
    Arp,
    Comv,
    NonComv,
    Line,
    Persist,
}

impl HfiBufferType {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Self::Bitstream,
            2 => Self::Raw,
            3 => Self::Metadata,
            6 => Self::Dpb,
            7 => Self::Bin,
            8 => Self::Arp,
            9 => Self::Comv,
            10 => Self::NonComv,
            11 => Self::Line,
            12 => Self::Persist,
            _ => return None,
        })
    }

    pub const fn raw(self) -> u32 {
        match self {
            Self::Bitstream => 1,
            Self::Raw => 2,
            Self::Metadata => 3,
            Self::Dpb => 6,
            Self::Bin => 7,
            Self::Arp => 8,
            Self::Comv => 9,
            Self::NonComv => 10,
            Self::Line => 11,
            Self::Persist => 12,
        }
    }
}

/// Buffer descriptor returned by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferPayload {
    /// Raw buffer type; see [`HfiBufferType::from_raw`].
    pub buffer_type: u32,
    pub index: u32,
    /// Device address the buffer was queued with.
    pub base_address: u64,
    /// Offset of this sub-frame within a batched buffer.
    pub addr_offset: u32,
    pub buffer_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub timestamp: u64,
    pub flags: BufferFwFlags,
}

impl BufferPayload {
    /// Decode a descriptor from a packet payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < BUFFER_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooShort {
                what: "buffer descriptor",
                len: payload.len(),
                need: BUFFER_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            buffer_type: le_u32(payload, 0),
            index: le_u32(payload, 4),
            base_address: le_u64(payload, 8),
            addr_offset: le_u32(payload, 16),
            buffer_size: le_u32(payload, 20),
            data_offset: le_u32(payload, 24),
            data_size: le_u32(payload, 28),
            timestamp: le_u64(payload, 32),
            flags: BufferFwFlags::from_bits_retain(le_u32(payload, 40)),
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(BUFFER_PAYLOAD_SIZE);
        dst.put_u32_le(self.buffer_type);
        dst.put_u32_le(self.index);
        dst.put_u64_le(self.base_address);
        dst.put_u32_le(self.addr_offset);
        dst.put_u32_le(self.buffer_size);
        dst.put_u32_le(self.data_offset);
        dst.put_u32_le(self.data_size);
        dst.put_u64_le(self.timestamp);
        dst.put_u32_le(self.flags.bits());
        dst.put_bytes(0, 20);
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(BUFFER_PAYLOAD_SIZE);
        self.encode(&mut out);
        out
    }

    pub fn hfi_type(&self) -> Option<HfiBufferType> {
        HfiBufferType::from_raw(self.buffer_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_layout_is_fixed() {
        let buffer = BufferPayload {
            buffer_type: HfiBufferType::Raw.raw(),
            index: 4,
            base_address: 0x1_2345_6000,
            addr_offset: 3072,
            buffer_size: 4096,
            data_offset: 16,
            data_size: 512,
            timestamp: 33_000,
            flags: BufferFwFlags::LAST | BufferFwFlags::READONLY,
        };
        let bytes = buffer.to_bytes();
        assert_eq!(bytes.len(), BUFFER_PAYLOAD_SIZE);
        assert_eq!(&bytes[8..16], &0x1_2345_6000u64.to_le_bytes());

        let decoded = BufferPayload::decode(&bytes).unwrap();
        assert_eq!(decoded, buffer);
        assert_eq!(decoded.hfi_type(), Some(HfiBufferType::Raw));
    }

    #[test]
    fn short_descriptor_rejected() {
        let err = BufferPayload::decode(&[0u8; 40]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::PayloadTooShort {
                len: 40,
                need: BUFFER_PAYLOAD_SIZE,
                ..
            }
        ));
    }

    #[test]
    fn unknown_buffer_type() {
        assert_eq!(HfiBufferType::from_raw(4), None);
        assert_eq!(HfiBufferType::from_raw(12), Some(HfiBufferType::Persist));
    }

    #[test]
    fn unknown_flag_bits_are_retained() {
        let flags = BufferFwFlags::from_bits_retain(0x8000_0010);
        assert!(flags.contains(BufferFwFlags::READONLY));
        assert_eq!(flags.bits(), 0x8000_0010);
    }
}
