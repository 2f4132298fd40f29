use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use vidcresp_packet::ResponseBatch;

use crate::buffer::{BufferKind, BufferPools, BufferRecord};
use crate::config::{DriverPort, SessionConfig};
use crate::deferred::{self, DeferredQueue, DeferredWorkItem, DrainReport, WorkKind};
use crate::dispatch::{self, PipelineMode};
use crate::error::{ResponseError, Result};
use crate::frame::FrameInfo;
use crate::ops::SessionOps;
use crate::subscription::SubscriptionParams;

/// Lifecycle state of a session instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Open,
    Active,
    Closing,
    /// Terminal: no further responses are dispatched.
    Error,
}

impl InstanceState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Error => "error",
        }
    }
}

/// Mutable session state, guarded by the instance lock.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) state: InstanceState,
    pub(crate) buffers: BufferPools,
    pub(crate) subscription: [SubscriptionParams; 2],
    pub(crate) frame: FrameInfo,
    pub(crate) deferred: DeferredQueue,
}

impl Session {
    fn new() -> Self {
        Self {
            state: InstanceState::Open,
            buffers: BufferPools::default(),
            subscription: [SubscriptionParams::default(); 2],
            frame: FrameInfo::default(),
            deferred: DeferredQueue::default(),
        }
    }
}

/// Borrowed view handed to the packet handlers for the duration of one
/// locked operation.
pub(crate) struct SessionCtx<'a> {
    pub(crate) id: u32,
    pub(crate) config: &'a SessionConfig,
    pub(crate) ops: &'a dyn SessionOps,
    pub(crate) session: &'a mut Session,
}

impl SessionCtx<'_> {
    /// Move to `to`. The error state is sticky.
    pub(crate) fn set_state(&mut self, to: InstanceState) {
        let from = self.session.state;
        if from == to || from == InstanceState::Error {
            return;
        }
        self.session.state = to;
        debug!(session = self.id, from = from.name(), to = to.name(), "session state change");
        self.ops.state_changed(self.id, from, to);
    }

    pub(crate) fn fail(&mut self, reason: &str) {
        if self.session.state != InstanceState::Error {
            warn!(session = self.id, reason, "session moving to error state");
        }
        self.set_state(InstanceState::Error);
    }

    pub(crate) fn is_error(&self) -> bool {
        self.session.state == InstanceState::Error
    }
}

/// How a session response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Dispatched(usize),
    Deferred(WorkKind),
}

/// A firmware session and everything the driver tracks for it.
pub struct SessionInstance {
    id: u32,
    config: SessionConfig,
    ops: Arc<dyn SessionOps>,
    inner: Mutex<Session>,
}

impl SessionInstance {
    pub(crate) fn new(id: u32, config: SessionConfig, ops: Arc<dyn SessionOps>) -> Self {
        Self {
            id,
            config,
            ops,
            inner: Mutex::new(Session::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> InstanceState {
        self.lock().state
    }

    /// Queue a buffer to the firmware.
    ///
    /// Inserts a new record in the queued state, or re-arms a retained
    /// read-only record at the same address. Returns true when re-armed.
    pub fn queue_buffer(&self, kind: BufferKind, device_address: u64, index: u32) -> bool {
        let rearmed = self.lock().buffers.queue(kind, device_address, index);
        debug!(
            session = self.id,
            kind = kind.name(),
            addr = format_args!("{device_address:#x}"),
            rearmed,
            "queued buffer"
        );
        rearmed
    }

    /// Snapshot of one buffer record.
    pub fn buffer(&self, kind: BufferKind, device_address: u64) -> Option<BufferRecord> {
        self.lock().buffers.get(kind, device_address).cloned()
    }

    /// Snapshot of every record of `kind`, in queue order.
    pub fn buffers(&self, kind: BufferKind) -> Vec<BufferRecord> {
        self.lock().buffers.records(kind).to_vec()
    }

    pub fn subscription(&self, port: DriverPort) -> SubscriptionParams {
        self.lock().subscription[port.index()]
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.lock().frame
    }

    pub fn deferred_len(&self) -> usize {
        self.lock().deferred.len()
    }

    /// Copies of the queued deferred items, head first.
    pub fn deferred_items(&self) -> Vec<DeferredWorkItem> {
        self.lock().deferred.items()
    }

    /// Kinds of the queued deferred items, head first.
    pub fn deferred_kinds(&self) -> Vec<WorkKind> {
        self.lock().deferred.kinds()
    }

    /// Handle a validated response addressed to this session.
    pub(crate) fn handle(&self, batch: &ResponseBatch<'_>) -> Result<Disposition> {
        let mut guard = self.lock();
        if guard.state == InstanceState::Error {
            return Err(ResponseError::SessionInError(self.id));
        }

        if let Some(kind) = deferred::deferral_kind(batch)? {
            let order = guard.deferred.push(kind, batch.as_bytes());
            debug!(session = self.id, ?kind, order, "deferred response");
            return Ok(Disposition::Deferred(kind));
        }

        let mut ctx = self.ctx(&mut guard);
        dispatch::run(&mut ctx, batch, PipelineMode::Direct).map(Disposition::Dispatched)
    }

    /// Process queued deferred work.
    pub(crate) fn drain_deferred(&self) -> DrainReport {
        let mut guard = self.lock();
        let mut ctx = self.ctx(&mut guard);
        deferred::drain(&mut ctx)
    }

    fn ctx<'a>(&'a self, session: &'a mut Session) -> SessionCtx<'a> {
        SessionCtx {
            id: self.id,
            config: &self.config,
            ops: self.ops.as_ref(),
            session,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SessionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInstance")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::NoopOps;

    fn instance() -> SessionInstance {
        SessionInstance::new(7, SessionConfig::default(), Arc::new(NoopOps))
    }

    #[test]
    fn error_state_is_sticky() {
        let inst = instance();
        let mut guard = inst.lock();
        let mut ctx = inst.ctx(&mut guard);

        ctx.set_state(InstanceState::Active);
        assert_eq!(ctx.session.state, InstanceState::Active);
        ctx.fail("test");
        ctx.set_state(InstanceState::Open);
        assert!(ctx.is_error());
    }

    #[test]
    fn queue_buffer_is_visible_through_snapshots() {
        let inst = instance();
        assert!(!inst.queue_buffer(BufferKind::Input, 0x4000, 1));
        let rec = inst
            .buffer(BufferKind::Input, 0x4000)
            .expect("queued buffer should be tracked");
        assert_eq!(rec.index, 1);
        assert_eq!(inst.buffers(BufferKind::Input).len(), 1);
        assert!(inst.buffers(BufferKind::Output).is_empty());
    }

    #[test]
    fn debug_output_names_the_session() {
        let rendered = format!("{:?}", instance());
        assert!(rendered.contains("id: 7"));
        assert!(rendered.contains("Open"));
    }
}
