//! Running deferred work off the response path.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Requests that a session's deferred queue be drained soon.
///
/// `schedule` is called with no session lock held and must not block.
pub trait WorkScheduler: Send + Sync {
    fn schedule(&self, session_id: u32);
}

/// Records requests for the owner to run explicitly with
/// [`VidcCore::run_scheduled`](crate::VidcCore::run_scheduled).
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pending: Mutex<VecDeque<u32>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending request, oldest first.
    pub fn take(&self) -> Vec<u32> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl WorkScheduler for ManualScheduler {
    fn schedule(&self, session_id: u32) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // One drain handles everything queued so far.
        if !pending.contains(&session_id) {
            pending.push_back(session_id);
        }
    }
}

#[cfg(feature = "async")]
pub use self::tokio_impl::{spawn_deferred_runner, TokioScheduler};

#[cfg(feature = "async")]
mod tokio_impl {
    use std::sync::{Arc, Weak};

    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    use super::WorkScheduler;
    use crate::engine::VidcCore;

    /// Forwards requests over an unbounded channel to a runner task.
    #[derive(Debug, Clone)]
    pub struct TokioScheduler {
        tx: mpsc::UnboundedSender<u32>,
    }

    impl TokioScheduler {
        /// Create the scheduler and the receiver to hand to
        /// [`spawn_deferred_runner`].
        pub fn channel() -> (Self, mpsc::UnboundedReceiver<u32>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    impl WorkScheduler for TokioScheduler {
        fn schedule(&self, session_id: u32) {
            if self.tx.send(session_id).is_err() {
                warn!(session = session_id, "deferred runner is gone; work stays queued");
            }
        }
    }

    /// Spawn the task that drains deferred queues.
    ///
    /// Each request runs on the blocking pool, so different sessions drain
    /// concurrently while drains of one session serialize on its lock. The
    /// task ends when the core is dropped or every scheduler is gone. Must be
    /// called from within a tokio runtime.
    pub fn spawn_deferred_runner(
        core: Weak<VidcCore>,
        mut rx: mpsc::UnboundedReceiver<u32>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(session_id) = rx.recv().await {
                let Some(core) = core.upgrade() else {
                    debug!("core dropped; stopping deferred runner");
                    break;
                };
                tokio::task::spawn_blocking(move || drain(&core, session_id));
            }
        })
    }

    fn drain(core: &Arc<VidcCore>, session_id: u32) {
        match core.process_deferred(session_id) {
            Ok(report) => debug!(
                session = session_id,
                completed = report.completed,
                remaining = report.remaining,
                "deferred drain finished"
            ),
            Err(err) => warn!(session = session_id, %err, "deferred drain failed"),
        }
    }
}
