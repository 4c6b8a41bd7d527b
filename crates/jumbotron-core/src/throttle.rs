//! Coalescing timer for outbound viewport updates.

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Minimum spacing between outbound viewport messages.
pub const VIEWPORT_THROTTLE: Duration = Duration::from_millis(100);

/// A deferred task that fires at most once per interval.
///
/// Scheduling while a firing is already pending does nothing; the pending
/// firing covers every change made before it.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(VIEWPORT_THROTTLE)
    }
}

impl Throttle {
    /// Create an idle throttle with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Whether a firing is pending.
    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending firing is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Schedule a firing one interval from `now`, unless one is pending.
    ///
    /// Returns true if this call scheduled it.
    pub fn schedule(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.interval);
        true
    }

    /// Consume the pending firing if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
