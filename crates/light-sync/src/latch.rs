use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Signalled,
    TimedOut,
    Stopping,
}

#[derive(Debug, Default)]
struct LatchState {
    set: bool,
    stopping: bool,
}

/// "Sync observed" flag plus the loop's stop request, behind one condvar so
/// either can wake a waiting loop.
#[derive(Debug, Default)]
pub(crate) struct SyncLatch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl SyncLatch {
    pub(crate) fn set(&self) {
        self.state.lock().set = true;
        self.cond.notify_all();
    }

    pub(crate) fn clear(&self) {
        self.state.lock().set = false;
    }

    pub(crate) fn is_set(&self) -> bool {
        self.state.lock().set
    }

    pub(crate) fn request_stop(&self) {
        self.state.lock().stopping = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    /// Waits for the latch to be set. Reports `TimedOut` once the deadline
    /// passes even if a set raced the wake-up; callers re-check `is_set`.
    pub(crate) fn wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.stopping {
                return WaitOutcome::Stopping;
            }
            if state.set {
                return WaitOutcome::Signalled;
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return if state.stopping {
                    WaitOutcome::Stopping
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }

    /// Sleeps for `duration` unless a stop is requested first. Returns whether
    /// the loop should exit.
    pub(crate) fn park(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        while !state.stopping {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.stopping
    }
}
