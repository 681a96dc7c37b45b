//! The "SMOOTHING" Engine - Bearing and Exponential-Decay Primitives
//!
//! Everything per-frame motion needs to look continuous on screen:
//! - signed bearing math with shortest-path wrap-around
//! - time-based exponential smoothing (`alpha = 1 - exp(-dt/tau)`)
//! - speed-adaptive time constants so fast entities track crisply and slow
//!   ones glide
//! - frame-delta normalization against the nominal 60 Hz frame

use std::time::Duration;

/// Nominal display frame in milliseconds (60 Hz).
pub const NOMINAL_FRAME_MS: f64 = 16.67;

/// Scale a raw per-frame advance so progress rate is time-based rather than
/// frame-rate-based.
pub fn frame_scale(dt_ms: f64) -> f64 {
    dt_ms.max(0.0) / NOMINAL_FRAME_MS
}

/// Linear interpolation.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Exponential smoothing factor for an elapsed `dt_ms` and time constant
/// `tau_ms`. The time constant is floored at 1 ms.
pub fn smoothing_alpha(dt_ms: f64, tau_ms: f64) -> f64 {
    1.0 - (-dt_ms.max(0.0) / tau_ms.max(1.0)).exp()
}

/// Speed-adaptive time constant.
///
/// The base constant is divided by a speed-derived factor clamped to
/// `[0.1, 2.0]` (speed in progress-per-frame units, scaled by 1000), so
/// faster entities turn and move crisper while slower ones stay smooth.
pub fn adaptive_tau(base_tau_ms: f64, speed: f64) -> f64 {
    let factor = (speed.abs() * 1000.0).clamp(0.1, 2.0);
    base_tau_ms / factor
}

/// Normalize an angle in degrees to the signed range (-180, 180].
pub fn normalize_angle_deg(deg: f64) -> f64 {
    let a = deg.rem_euclid(360.0);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Shortest signed delta from `previous` to `target`, in (-180, 180].
pub fn shortest_angle_delta(target: f64, previous: f64) -> f64 {
    normalize_angle_deg(target - previous)
}

/// Absolute angular difference in [0, 180].
pub fn angle_diff_abs(a: f64, b: f64) -> f64 {
    shortest_angle_delta(a, b).abs()
}

/// Advance a smoothed heading toward a target along the shortest path.
pub fn smooth_heading(previous: f64, target: f64, alpha: f64) -> f64 {
    previous + shortest_angle_delta(target, previous) * alpha
}

/// Host-side render gate.
///
/// Position and callback computation run every tick; repositioning the
/// visual asset is worth a draw call only when enough time has passed AND
/// something perceptibly changed. The movement floor is ~1e-6 degrees and
/// the heading floor 0.1 degrees, matching what a screen pixel resolves.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    min_interval: Duration,
    last_render: Option<Duration>,
}

impl FrameLimiter {
    /// Limiter targeting 60 FPS.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_micros(16_670))
    }

    /// Limiter with a custom minimum render interval.
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_render: None,
        }
    }

    /// Returns true (and records the render) when a draw is warranted.
    pub fn should_render(
        &mut self,
        now: Duration,
        position_delta_deg: f64,
        heading_delta_deg: f64,
    ) -> bool {
        let elapsed = match self.last_render {
            Some(last) => now.saturating_sub(last),
            None => self.min_interval,
        };
        let moved = position_delta_deg.abs() > 1e-6 || heading_delta_deg.abs() > 0.1;

        if elapsed >= self.min_interval && moved {
            self.last_render = Some(now);
            true
        } else {
            false
        }
    }
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_smoothing_idempotent_at_fixed_point() {
        // target == previous must not move, whatever dt is
        for dt in [0.0, 1.0, 16.67, 500.0, 10_000.0] {
            let alpha = smoothing_alpha(dt, 160.0);
            assert_relative_eq!(lerp(42.5, 42.5, alpha), 42.5);
            assert_relative_eq!(smooth_heading(90.0, 90.0, alpha), 90.0);
        }
    }

    #[test]
    fn test_smoothing_alpha_bounds() {
        assert_eq!(smoothing_alpha(0.0, 120.0), 0.0);
        assert!(smoothing_alpha(16.67, 120.0) > 0.0);
        assert!(smoothing_alpha(10_000.0, 120.0) < 1.0);
        assert!(smoothing_alpha(10_000.0, 120.0) > 0.99);
    }

    #[test]
    fn test_normalize_angle_deg() {
        assert_relative_eq!(normalize_angle_deg(0.0), 0.0);
        assert_relative_eq!(normalize_angle_deg(190.0), -170.0);
        assert_relative_eq!(normalize_angle_deg(-190.0), 170.0);
        assert_relative_eq!(normalize_angle_deg(540.0), 180.0);
        assert_relative_eq!(normalize_angle_deg(-360.0), 0.0);
    }

    #[test]
    fn test_shortest_angle_delta_wraps() {
        assert_relative_eq!(shortest_angle_delta(10.0, 350.0), 20.0);
        assert_relative_eq!(shortest_angle_delta(350.0, 10.0), -20.0);
        assert_relative_eq!(shortest_angle_delta(-170.0, 170.0), 20.0);
    }

    #[test]
    fn test_adaptive_tau_clamps_speed_factor() {
        // Very slow: factor floors at 0.1 -> tau grows 10x
        assert_relative_eq!(adaptive_tau(90.0, 0.00001), 900.0);
        // Very fast: factor caps at 2.0 -> tau halves
        assert_relative_eq!(adaptive_tau(90.0, 1.0), 45.0);
        // Mid-range scales linearly
        assert_relative_eq!(adaptive_tau(90.0, 0.0005), 180.0);
    }

    #[test]
    fn test_frame_scale_normalizes_dt() {
        assert_relative_eq!(frame_scale(16.67), 1.0);
        assert_relative_eq!(frame_scale(33.34), 2.0);
        assert_eq!(frame_scale(-5.0), 0.0);
    }

    #[test]
    fn test_frame_limiter_gates_static_frames() {
        let mut limiter = FrameLimiter::new();

        // Movement on the first eligible frame renders
        assert!(limiter.should_render(Duration::from_millis(100), 1e-4, 0.0));
        // Too soon after, even with movement
        assert!(!limiter.should_render(Duration::from_millis(105), 1e-4, 0.0));
        // Enough time but no perceptible change
        assert!(!limiter.should_render(Duration::from_millis(200), 1e-9, 0.01));
        // Enough time and a heading change
        assert!(limiter.should_render(Duration::from_millis(200), 0.0, 0.5));
    }
}
