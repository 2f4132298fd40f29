//! Handling of video firmware (HFI) responses.
//!
//! The firmware answers the driver through a shared queue of responses, each
//! a header followed by typed packets. This crate validates those responses
//! and applies them to per-session driver state.
//!
//! # Crate Structure
//!
//! - [`packet`]: bounds-checked wire decoding, type ranges and payload layouts
//! - [`session`]: the response core, session state machine, buffer
//!   reconciliation and deferred work
//!
//! The most used types are re-exported at the crate root.

/// Re-export packet types.
pub mod packet {
    pub use vidcresp_packet::*;
}

/// Re-export session types.
pub mod session {
    pub use vidcresp_session::*;
}

pub use vidcresp_packet::{PacketError, ResponseBatch, ResponseBuilder};
pub use vidcresp_session::{
    BufferKind, CoreConfig, Outcome, ResponseError, SessionConfig, SessionInstance, SessionOps,
    VidcCore,
};
