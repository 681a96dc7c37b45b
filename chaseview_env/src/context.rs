//! Core clock trait for ChaseView engines.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// The central interface for time interaction.
///
/// This trait abstracts the "real world" so that ChaseView engines can run
/// in both production (display frames) and simulation (virtual ticks)
/// environments.
///
/// # Implementations
///
/// - **Production**: [`crate::SystemClock`] - wraps `std::time::Instant` and
///   `chrono::Utc::now`
/// - **Simulation**: [`crate::ManualClock`] - virtual time advanced by the
///   test/scenario driver
///
/// # Determinism
///
/// Frame deltas, smoothing alphas, throttles and accident timers are all
/// derived from `now()`; orbital propagation epochs from `utc_now()`. A
/// manual implementation therefore makes every engine output reproducible.
pub trait Clock {
    /// Returns the current monotonic time since clock creation.
    ///
    /// Used for frame deltas, smoothing and throttle bookkeeping.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock UTC time.
    ///
    /// Used as the propagation epoch for orbital entities. In simulation,
    /// this is derived from a fixed epoch plus the virtual clock.
    fn utc_now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        (**self).utc_now()
    }
}
