//! Collaborator seams.
//!
//! The response engine decides *what* happened to a buffer or a session; the
//! surrounding driver decides what to do about it. Every [`SessionOps`]
//! method has a no-op default, so an implementation overrides only the hooks
//! it cares about.
//!
//! Hooks run while the session lock is held. They must not call back into the
//! same [`SessionInstance`](crate::SessionInstance).

use crate::buffer::{BufferKind, BufferRecord};
use crate::deferred::WorkKind;
use crate::error::Result;
use crate::session::InstanceState;
use crate::subscription::SubscriptionParams;

/// Completion signals a session waiter can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSignal {
    Close,
    StopInput,
    StopOutput,
}

/// Verdict on whether deferred work may run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admission {
    Allow,
    /// Not yet; leave the item queued and retry on the next drain.
    Defer,
    /// Never; the session goes to error and the item is dropped.
    Disallow,
}

/// Per-session collaborator: buffer queue, session state, port
/// reconfiguration and admission.
pub trait SessionOps: Send + Sync {
    /// Size of one frame within a batched buffer of `kind`.
    fn frame_size(&self, _session: u32, _kind: BufferKind) -> u32 {
        0
    }

    /// A buffer completed and should be returned to the client.
    fn buffer_done(&self, _session: u32, _buffer: &BufferRecord) {}

    /// The driver no longer tracks this buffer.
    fn release_buffer(&self, _session: u32, _buffer: &BufferRecord) {}

    /// The firmware gave back an internal buffer.
    fn destroy_internal_buffer(&self, _session: u32, _buffer: &BufferRecord) -> Result<()> {
        Ok(())
    }

    fn signal(&self, _session: u32, _signal: SessionSignal) {}

    fn state_changed(&self, _session: u32, _from: InstanceState, _to: InstanceState) {}

    fn input_port_settings_change(
        &self,
        _session: u32,
        _params: &SubscriptionParams,
    ) -> Result<()> {
        Ok(())
    }

    fn output_port_settings_change(
        &self,
        _session: u32,
        _params: &SubscriptionParams,
    ) -> Result<()> {
        Ok(())
    }

    /// Seed the input subscription before an input settings change is
    /// replayed. `params` arrives zeroed.
    fn init_input_subscription(&self, _session: u32, _params: &mut SubscriptionParams) {}

    fn admit(&self, _session: u32, _kind: WorkKind) -> Admission {
        Admission::Allow
    }

    fn complete_input_settings_change(&self, _session: u32) -> Result<()> {
        Ok(())
    }

    /// Whether the last-flag state transition applies in the current state.
    fn allow_last_flag(&self, _session: u32) -> bool {
        true
    }

    fn complete_last_flag(&self, _session: u32) -> Result<()> {
        Ok(())
    }
}

/// Core-wide collaborator.
pub trait CoreOps: Send + Sync {
    /// Tear the core down after a fatal firmware error.
    fn deinit(&self, _forced: bool) {}
}

/// Collaborator that accepts every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOps;

impl SessionOps for NoopOps {}

impl CoreOps for NoopOps {}
