use std::time::Duration;

/// Wait schedule after failed polls: `error_wait` per failure, and
/// `cooldown` once `max_failures` failures in a row have piled up.
#[derive(Debug, Clone)]
pub struct Backoff {
    failures: u32,
    max_failures: u32,
    error_wait: Duration,
    cooldown: Duration,
}

impl Backoff {
    pub fn new(max_failures: u32, error_wait: Duration, cooldown: Duration) -> Self {
        Self {
            failures: 0,
            max_failures: max_failures.max(1),
            error_wait,
            cooldown,
        }
    }

    /// Record a failure and return how long to wait before the next poll.
    pub fn failure(&mut self) -> Duration {
        self.failures += 1;
        if self.failures >= self.max_failures {
            self.failures = 0;
            self.cooldown
        } else {
            self.error_wait
        }
    }

    pub fn success(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
