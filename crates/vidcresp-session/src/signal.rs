use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One-shot completion flag, re-armable for the next init cycle.
#[derive(Debug, Default)]
pub struct InitSignal {
    done: Mutex<bool>,
    cond: Condvar,
}

impl InitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark complete and wake every waiter.
    pub fn complete(&self) {
        *self.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        *self.lock()
    }

    /// Block until complete or `timeout` elapses. Returns whether the signal
    /// completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut done = self.lock();
        while !*done {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            done = match self.cond.wait_timeout(done, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Block until complete.
    pub fn wait(&self) {
        let mut done = self.lock();
        while !*done {
            done = self
                .cond
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Clear for the next cycle.
    pub fn reset(&self) {
        *self.lock() = false;
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
