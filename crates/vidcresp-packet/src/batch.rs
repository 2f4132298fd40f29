use tracing::{debug, warn};

use crate::codec::{le_u32, PacketHeader, ResponseHeader, HEADER_SIZE, PACKET_HEADER_SIZE};
use crate::error::{PacketError, Result};

/// Validate the packet starting at `offset` within `batch`.
///
/// The packet's first word is its self-declared size. That size is untrusted:
/// it must be non-zero, cover at least `min_size` header bytes, and fit in
/// what remains of the batch. Returns the declared size.
pub fn validate_packet(batch: &[u8], offset: usize, min_size: usize) -> Result<usize> {
    if batch.is_empty() {
        return Err(PacketError::EmptyBuffer);
    }
    if offset > batch.len() {
        return Err(PacketError::OffsetOutOfBounds {
            offset,
            len: batch.len(),
        });
    }

    let remaining = batch.len() - offset;
    if remaining < 4 {
        return Err(PacketError::Truncated { offset, remaining });
    }

    let size = le_u32(batch, offset) as usize;
    if size == 0 {
        return Err(PacketError::ZeroSize { offset });
    }
    if size > remaining {
        return Err(PacketError::Overrun {
            offset,
            size,
            remaining,
        });
    }
    if size < min_size {
        return Err(PacketError::Undersized {
            offset,
            size,
            min: min_size,
        });
    }
    Ok(size)
}

/// Location of a validated packet within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSpan {
    pub offset: usize,
    pub size: usize,
}

/// A borrowed view of one validated packet.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    pub header: PacketHeader,
    pub payload: &'a [u8],
    /// Position of this packet in wire order.
    pub index: usize,
}

/// A fully validated response batch.
///
/// Construction checks the header and every packet before anything can be
/// dispatched; the packet offsets are computed once and reused.
#[derive(Debug, Clone)]
pub struct ResponseBatch<'a> {
    header: ResponseHeader,
    bytes: &'a [u8],
    spans: Vec<PacketSpan>,
}

impl<'a> ResponseBatch<'a> {
    /// Parse and validate a raw response buffer.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let size = validate_packet(buf, 0, HEADER_SIZE)?;
        let bytes = &buf[..size];
        let header = ResponseHeader::decode(bytes)?;

        let mut spans = Vec::new();
        let mut offset = HEADER_SIZE;
        for index in 0..header.num_packets {
            let size = validate_packet(bytes, offset, PACKET_HEADER_SIZE).inspect_err(|err| {
                warn!(index, %err, "rejecting response batch");
            })?;
            spans.push(PacketSpan { offset, size });
            offset += size;
        }

        if offset != bytes.len() {
            debug!(
                consumed = offset,
                declared = bytes.len(),
                "response has trailing bytes after last packet"
            );
        }

        Ok(Self {
            header,
            bytes,
            spans,
        })
    }

    /// Parse with an upper bound on the response size.
    pub fn parse_with_limit(buf: &'a [u8], max_size: usize) -> Result<Self> {
        if buf.len() > max_size {
            return Err(PacketError::TooLarge {
                size: buf.len(),
                max: max_size,
            });
        }
        Self::parse(buf)
    }

    pub fn header(&self) -> &ResponseHeader {
        &self.header
    }

    pub fn session_id(&self) -> u32 {
        self.header.session_id
    }

    pub fn is_system(&self) -> bool {
        self.header.is_system()
    }

    /// The response bytes the header covers.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[PacketSpan] {
        &self.spans
    }

    /// Bytes occupied by the header plus all packets.
    pub fn consumed(&self) -> usize {
        HEADER_SIZE + self.spans.iter().map(|span| span.size).sum::<usize>()
    }

    /// The packet at wire position `index`.
    pub fn packet(&self, index: usize) -> Option<Packet<'a>> {
        let span = *self.spans.get(index)?;
        let raw = &self.bytes[span.offset..span.offset + span.size];
        Some(Packet {
            header: PacketHeader::decode(raw),
            payload: &raw[PACKET_HEADER_SIZE..],
            index,
        })
    }

    /// Packets in wire order.
    pub fn packets(&self) -> impl Iterator<Item = Packet<'a>> + '_ {
        (0..self.spans.len()).filter_map(move |index| self.packet(index))
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::ResponseBuilder;
    use crate::types::{PacketFlags, CMD_CLOSE, CMD_OPEN};

    fn two_packet_response() -> bytes::Bytes {
        ResponseBuilder::new(5)
            .packet(
                PacketHeader::new(CMD_OPEN).with_flags(PacketFlags::SUCCESS),
                &[],
            )
            .words(PacketHeader::new(CMD_CLOSE), &[1, 2])
            .build()
    }

    #[test]
    fn parses_well_formed_batch() {
        let raw = two_packet_response();
        let batch = ResponseBatch::parse(&raw).unwrap();

        assert_eq!(batch.session_id(), 5);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.consumed(), raw.len());

        let packets: Vec<_> = batch.packets().collect();
        assert_eq!(packets[0].header.packet_type, CMD_OPEN);
        assert!(packets[0].payload.is_empty());
        assert_eq!(packets[1].header.packet_type, CMD_CLOSE);
        assert_eq!(packets[1].payload.len(), 8);
        assert_eq!(packets[1].index, 1);
    }

    #[test]
    fn consumed_sizes_sum_to_declared_total() {
        let raw = two_packet_response();
        let batch = ResponseBatch::parse(&raw).unwrap();
        let total: usize = batch.spans().iter().map(|s| s.size).sum();
        assert_eq!(HEADER_SIZE + total, batch.header().size as usize);
    }

    #[test]
    fn rejects_oversized_final_packet() {
        let mut raw = BytesMut::from(&two_packet_response()[..]);
        let last = HEADER_SIZE + PACKET_HEADER_SIZE;
        raw[last..last + 4].copy_from_slice(&1024u32.to_le_bytes());

        let err = ResponseBatch::parse(&raw).unwrap_err();
        assert!(matches!(err, PacketError::Overrun { offset, size: 1024, .. } if offset == last));
    }

    #[test]
    fn rejects_zero_size_packet() {
        let mut raw = BytesMut::from(&two_packet_response()[..]);
        raw[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&0u32.to_le_bytes());

        let err = ResponseBatch::parse(&raw).unwrap_err();
        assert_eq!(err, PacketError::ZeroSize { offset: HEADER_SIZE });
    }

    #[test]
    fn rejects_packet_smaller_than_its_header() {
        let mut raw = BytesMut::from(&two_packet_response()[..]);
        raw[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&8u32.to_le_bytes());

        let err = ResponseBatch::parse(&raw).unwrap_err();
        assert!(matches!(err, PacketError::Undersized { size: 8, .. }));
    }

    #[test]
    fn rejects_packet_count_beyond_data() {
        let mut raw = BytesMut::from(&two_packet_response()[..]);
        raw[28..32].copy_from_slice(&3u32.to_le_bytes());

        let err = ResponseBatch::parse(&raw).unwrap_err();
        assert!(matches!(err, PacketError::Truncated { remaining: 0, .. }));
    }

    #[test]
    fn rejects_header_declaring_more_than_supplied() {
        let raw = two_packet_response();
        let err = ResponseBatch::parse(&raw[..raw.len() - 4]).unwrap_err();
        assert!(matches!(err, PacketError::Overrun { offset: 0, .. }));
    }

    #[test]
    fn header_size_bounds_the_packets() {
        // Extra bytes past the declared size must not be treated as packet data.
        let raw = two_packet_response();
        let mut padded = BytesMut::from(&raw[..]);
        padded.put_bytes(0xAA, 64);

        let batch = ResponseBatch::parse(&padded).unwrap();
        assert_eq!(batch.as_bytes().len(), raw.len());
    }

    #[test]
    fn empty_and_limit_checks() {
        assert_eq!(ResponseBatch::parse(&[]).unwrap_err(), PacketError::EmptyBuffer);

        let raw = two_packet_response();
        let err = ResponseBatch::parse_with_limit(&raw, 16).unwrap_err();
        assert!(matches!(err, PacketError::TooLarge { max: 16, .. }));
    }

    #[test]
    fn validate_packet_rejects_offset_past_end() {
        let raw = two_packet_response();
        let err = validate_packet(&raw, raw.len() + 1, PACKET_HEADER_SIZE).unwrap_err();
        assert!(matches!(err, PacketError::OffsetOutOfBounds { .. }));
    }
}
