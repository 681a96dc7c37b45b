//! Production implementation of Clock using the system clock.

use crate::Clock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production clock backed by the OS.
///
/// This is the "real" implementation used when the engine runs inside a
/// rendering host. Monotonic time comes from `Instant`, wall time from
/// `chrono::Utc`.
pub struct SystemClock {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl SystemClock {
    /// Creates a new SystemClock.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped clock for sharing between scene and drivers.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        let t2 = clock.now();
        assert!(t2 >= t1);
    }
}
