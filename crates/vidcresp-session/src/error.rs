use vidcresp_packet::{PacketError, Port};

use crate::buffer::BufferKind;

/// Errors that can occur while handling a firmware response.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The response failed bounds validation; nothing was dispatched.
    #[error("malformed response: {0}")]
    Malformed(#[from] PacketError),

    /// The response names a session this core does not know.
    #[error("unknown session {0:#x}")]
    UnknownSession(u32),

    /// The session is in the error state and accepts no more responses.
    #[error("session {0:#x} is in error state")]
    SessionInError(u32),

    /// A session with this id is already open.
    #[error("session {0:#x} already exists")]
    DuplicateSession(u32),

    /// Session id zero addresses the system and cannot be opened.
    #[error("session id 0 is reserved for system responses")]
    ReservedSessionId,

    /// The packet type belongs to no category the session handles.
    #[error("unknown packet type {0:#x}")]
    UnknownType(u32),

    /// The packet names a port that makes no sense for it.
    #[error("invalid port {port:?} for packet type {packet_type:#x}")]
    InvalidPort { packet_type: u32, port: Port },

    /// The property code is not one a session accepts.
    #[error("invalid property {0:#x}")]
    InvalidProperty(u32),

    /// The firmware returned a buffer the driver never queued.
    #[error("{kind:?} buffer not found at device address {address:#x}")]
    BufferNotFound { kind: BufferKind, address: u64 },

    /// Batched buffer geometry resolved to zero.
    #[error("invalid batch geometry (frame size {frame_size}, batch size {batch_size})")]
    InvalidBatchGeometry { frame_size: u32, batch_size: u32 },

    /// A packet followed a port settings change in the same response.
    #[error("packet type {0:#x} follows a port settings change")]
    UnexpectedAfterSettingsChange(u32),

    /// An external collaborator reported failure.
    #[error("{op} failed: {reason}")]
    Collaborator { op: &'static str, reason: String },
}

impl ResponseError {
    /// Convenience constructor for collaborator failures.
    pub fn collaborator(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            op,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResponseError>;
