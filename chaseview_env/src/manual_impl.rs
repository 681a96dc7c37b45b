//! Simulation implementation of Clock with manually advanced virtual time.

use crate::Clock;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Virtual clock for deterministic simulation.
///
/// Time only moves when the scenario driver calls [`ManualClock::advance`],
/// so any tick sequence replays identically. Wall-clock UTC is a fixed epoch
/// plus the virtual offset.
pub struct ManualClock {
    /// Virtual time in microseconds since clock creation
    micros: AtomicU64,

    /// UTC instant corresponding to virtual time zero
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Creates a clock at virtual time zero with a fixed default epoch.
    pub fn new() -> Self {
        // Arbitrary but stable epoch so orbital scenarios reproduce exactly.
        let epoch = Utc.with_ymd_and_hms(2024, 9, 13, 12, 0, 0).unwrap();
        Self::with_epoch(epoch)
    }

    /// Creates a clock whose virtual time zero maps to the given UTC instant.
    pub fn with_epoch(epoch: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicU64::new(0),
            epoch,
        }
    }

    /// Creates an Arc-wrapped clock for sharing between scene and driver.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    /// Sets virtual time to an absolute offset from clock creation.
    pub fn set(&self, to: Duration) {
        self.micros.store(to.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(self.now()).unwrap_or_else(|_| chrono::Duration::zero());
        self.epoch + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_advance_accumulates() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(16));
        clock.advance(Duration::from_millis(17));
        assert_eq!(clock.now(), Duration::from_millis(33));
    }

    #[test]
    fn test_manual_clock_utc_tracks_virtual_time() {
        let clock = ManualClock::new();
        let t0 = clock.utc_now();
        clock.advance(Duration::from_secs(60));
        let t1 = clock.utc_now();
        assert_eq!(t1 - t0, chrono::Duration::seconds(60));
    }

    #[test]
    fn test_manual_clock_set_overwrites() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(5));
        clock.set(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }
}
