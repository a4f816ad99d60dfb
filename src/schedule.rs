//! Cooperative scheduling primitives shared by every loop.
//!
//! Loops never block indefinitely: each suspension point is either a
//! [`CancelToken::sleep`] or a bounded-wait queue pop, so a cancelled token is
//! observed within one interval plus whatever blocking call is in flight.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Pause between controller polls.
pub const CONTROLLER_POLL: Duration = Duration::from_secs(1);
/// Pause between queue analyzer passes.
pub const ANALYZER_POLL: Duration = Duration::from_secs(5);
/// Pause between buffer fill passes.
pub const FILL_INTERVAL: Duration = Duration::from_secs(1);
/// Player idle-check cadence.
pub const PLAYER_TICK: Duration = Duration::from_millis(100);
/// Bounded wait when popping from an empty queue.
pub const POP_WAIT: Duration = Duration::from_secs(1);
/// Poll cadence while waiting on a file-backed queue.
pub const FILE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Clonable stop flag with an interruptible sleep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every holder to stop at its next suspension point.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `dur` unless cancelled first.
    ///
    /// Returns `true` when the full interval elapsed and the caller should
    /// keep going, `false` when the token was cancelled.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            cancelled = match self.inner.wake.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        false
    }
}
