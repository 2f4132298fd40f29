//! Bounds-checked decoding of video firmware (HFI) response packets.
//!
//! A firmware response is a 32-byte header followed by back-to-back packets,
//! each declaring its own size in its first word:
//! - the header carries the total size, the owning session id (zero for
//!   system-scope responses) and the packet count
//! - every packet carries a type code, result flags and a port
//!
//! Nothing in a response is trusted. [`ResponseBatch::parse`] validates the
//! header and every packet before handing out a single view.

pub mod batch;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod report;
pub mod types;

pub use batch::{validate_packet, Packet, PacketSpan, ResponseBatch};
pub use buffer::{BufferFwFlags, BufferPayload, HfiBufferType, PictureType, BUFFER_PAYLOAD_SIZE};
pub use codec::{
    encode_packet, payload_word, PacketHeader, ResponseBuilder, ResponseHeader,
    DEFAULT_MAX_RESPONSE, HEADER_SIZE, PACKET_HEADER_SIZE,
};
pub use error::{PacketError, Result};
pub use report::{decode_crash_report, decode_image_version, VERSION_LENGTH};
pub use types::*;
