// Time source for container readiness polling
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstracts time so readiness loops can be driven without real sleeps
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A point in time after which polling gives up
pub struct Deadline {
    clock: Arc<dyn Clock>,
    expires_at: Instant,
}

impl Deadline {
    /// None when `timeout` reaches past what `Instant` can represent
    pub fn after(clock: Arc<dyn Clock>, timeout: Duration) -> Option<Self> {
        let expires_at = clock.now().checked_add(timeout)?;
        Some(Self { clock, expires_at })
    }

    pub fn expired(&self) -> bool {
        self.clock.now() >= self.expires_at
    }

    /// Sleep for `interval`, returning false once the deadline has passed
    pub fn wait(&self, interval: Duration) -> bool {
        if self.expired() {
            return false;
        }
        self.clock.sleep(interval);
        true
    }
}
