use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tracing::{debug, info, warn};
use vidcresp_packet::ResponseBatch;

use crate::config::{CoreConfig, SessionConfig};
use crate::deferred::{DrainReport, WorkKind};
use crate::error::{ResponseError, Result};
use crate::ops::{CoreOps, NoopOps, SessionOps};
use crate::scheduler::{ManualScheduler, WorkScheduler};
use crate::session::{Disposition, SessionInstance};
use crate::signal::InitSignal;
use crate::system::{SystemReport, SystemState};

/// What [`VidcCore::handle_response`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    System(SystemReport),
    /// Dispatched synchronously to a session.
    Session { session_id: u32, packets: usize },
    /// Queued for the scheduler.
    Deferred { session_id: u32, kind: WorkKind },
}

/// Entry point for every response the firmware delivers.
pub struct VidcCore {
    config: CoreConfig,
    sessions: RwLock<HashMap<u32, Arc<SessionInstance>>>,
    system: SystemState,
    ops: Arc<dyn CoreOps>,
    scheduler: Arc<dyn WorkScheduler>,
}

impl VidcCore {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            system: SystemState::default(),
            ops: Arc::new(NoopOps),
            scheduler: Arc::new(ManualScheduler::new()),
        }
    }

    /// Override the core collaborator.
    pub fn with_core_ops(mut self, ops: Arc<dyn CoreOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Override where deferred work is scheduled.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn WorkScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Register a session. Id zero is reserved for system responses.
    pub fn open_session(
        &self,
        session_id: u32,
        config: SessionConfig,
        ops: Arc<dyn SessionOps>,
    ) -> Result<Arc<SessionInstance>> {
        if session_id == 0 {
            return Err(ResponseError::ReservedSessionId);
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&session_id) {
            return Err(ResponseError::DuplicateSession(session_id));
        }
        let instance = Arc::new(SessionInstance::new(session_id, config, ops));
        sessions.insert(session_id, Arc::clone(&instance));
        info!(session = session_id, "session opened");
        Ok(instance)
    }

    /// Forget a session. In-flight drains keep their reference until done.
    pub fn close_session(&self, session_id: u32) -> Option<Arc<SessionInstance>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
        if removed.is_some() {
            info!(session = session_id, "session closed");
        }
        removed
    }

    pub fn session(&self, session_id: u32) -> Option<Arc<SessionInstance>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned()
    }

    pub fn session_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Validate and dispatch one raw response.
    ///
    /// Every packet is bounds-checked before anything is dispatched; a
    /// malformed response changes no state.
    pub fn handle_response(&self, response: &[u8]) -> Result<Outcome> {
        let batch = ResponseBatch::parse_with_limit(response, self.config.max_response_size)?;

        if batch.is_system() {
            return self
                .system
                .handle(&batch, self.ops.as_ref())
                .map(Outcome::System);
        }

        let session_id = batch.session_id();
        let Some(instance) = self.session(session_id) else {
            warn!(session = session_id, "response for unknown session");
            return Err(ResponseError::UnknownSession(session_id));
        };

        match instance.handle(&batch)? {
            Disposition::Dispatched(packets) => Ok(Outcome::Session {
                session_id,
                packets,
            }),
            Disposition::Deferred(kind) => {
                self.scheduler.schedule(session_id);
                Ok(Outcome::Deferred { session_id, kind })
            }
        }
    }

    /// Drain one session's deferred queue.
    ///
    /// A drain stopped by [`Admission::Defer`](crate::ops::Admission::Defer)
    /// is not rescheduled. The queue moves again on the next deferred response
    /// for the session, which schedules a new drain, or when the owner calls
    /// this again once the collaborator is ready to admit the head item.
    pub fn process_deferred(&self, session_id: u32) -> Result<DrainReport> {
        let instance = self
            .session(session_id)
            .ok_or(ResponseError::UnknownSession(session_id))?;
        let report = instance.drain_deferred();
        debug!(session = session_id, ?report, "drained deferred work");
        Ok(report)
    }

    /// Run everything a [`ManualScheduler`] has recorded.
    ///
    /// Sessions closed since scheduling are skipped.
    pub fn run_scheduled(&self, scheduler: &ManualScheduler) -> Vec<DrainReport> {
        scheduler
            .take()
            .into_iter()
            .filter_map(|session_id| self.process_deferred(session_id).ok())
            .collect()
    }

    pub fn init_done(&self) -> &InitSignal {
        &self.system.init_done
    }

    /// Firmware image version, once reported.
    pub fn firmware_version(&self) -> Option<String> {
        self.system.firmware_version()
    }

    /// Install the shared crash-report region read on a system error.
    pub fn set_crash_region(&self, region: Bytes) {
        self.system.set_crash_region(region);
    }
}

impl Default for VidcCore {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl fmt::Debug for VidcCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VidcCore")
            .field("config", &self.config)
            .field("sessions", &self.session_ids())
            .field("init_done", &self.system.init_done.is_complete())
            .finish_non_exhaustive()
    }
}
