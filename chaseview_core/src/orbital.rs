//! The "ORBIT" Engine - TLE Propagation as a Position Stream
//!
//! Wraps SGP4 propagation of two-line elements so satellites feed the same
//! smoothing pipeline as route-based entities: one lon/lat sample per tick,
//! heading from a one-second-ahead propagated sample, and a short-horizon
//! ground-track polyline recomputed at most once per second.
//!
//! TLE parsing is the only caller-visible failure in the engine. Per-tick
//! propagation failures produce no sample for that tick; the entity holds
//! its last position instead of halting the frame loop.

use crate::geomath::{self, NOMINAL_FRAME_MS};
use crate::route::{LonLat, Route};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use sgp4::{Constants, Elements, MinutesSinceEpoch};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// WGS84 equatorial radius in kilometers.
const WGS84_A_KM: f64 = 6378.137;

/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Errors from orbital element handling.
#[derive(Debug, Error)]
pub enum OrbitalError {
    #[error("TLE parse failed: {0}")]
    Parse(String),

    #[error("propagation constants rejected: {0}")]
    Constants(String),
}

/// A propagated sub-satellite point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSample {
    pub coords: LonLat,
    pub altitude_km: f64,
}

/// SGP4 propagator for one set of two-line elements.
pub struct OrbitalPropagator {
    elements: Elements,
    constants: Constants,
}

impl OrbitalPropagator {
    /// Parse a TLE pair and initialize the propagator.
    pub fn from_tle(line1: &str, line2: &str) -> Result<Self, OrbitalError> {
        let elements = Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| OrbitalError::Parse(e.to_string()))?;
        let constants = Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::Constants(e.to_string()))?;
        Ok(Self {
            elements,
            constants,
        })
    }

    fn minutes_since_epoch(&self, at: DateTime<Utc>) -> MinutesSinceEpoch {
        let elapsed = at.naive_utc() - self.elements.datetime;
        MinutesSinceEpoch(elapsed.num_milliseconds() as f64 / 60_000.0)
    }

    /// Sub-satellite point at a UTC instant, or `None` when propagation
    /// fails for that instant.
    pub fn sample_at(&self, at: DateTime<Utc>) -> Option<GroundSample> {
        let prediction = match self.constants.propagate(self.minutes_since_epoch(at)) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(error = %e, "orbital propagation failed");
                return None;
            }
        };

        let gmst = gmst_radians(at);
        let (lat_deg, lon_deg, altitude_km) = teme_to_geodetic(prediction.position, gmst);
        Some(GroundSample {
            coords: LonLat::new(lon_deg, lat_deg),
            altitude_km,
        })
    }

    /// Earth-fixed speed in meters per second at a UTC instant, 0 when
    /// propagation fails.
    pub fn ground_speed_mps(&self, at: DateTime<Utc>) -> f64 {
        let prediction = match self.constants.propagate(self.minutes_since_epoch(at)) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(error = %e, "orbital speed sample failed");
                return 0.0;
            }
        };

        let gmst = gmst_radians(at);
        let (sin_g, cos_g) = gmst.sin_cos();
        let [vx, vy, vz] = prediction.velocity;
        let ve = cos_g * vx + sin_g * vy;
        let vn = -sin_g * vx + cos_g * vy;
        (ve * ve + vn * vn + vz * vz).sqrt() * 1000.0
    }
}

/// Tuning for the per-tick orbital adapter.
#[derive(Debug, Clone)]
pub struct OrbitalTuning {
    /// Position smoothing time constant in ms (default: 300)
    pub position_tau_ms: f64,

    /// Rotation smoothing time constant in ms (default: 300)
    pub rotation_tau_ms: f64,

    /// Heading look-ahead horizon (default: 1 s)
    pub heading_lookahead: Duration,

    /// Wall-clock to propagation-time factor (default: 1.0). Smoothing time
    /// constants stay wall-clock-based regardless.
    pub time_scale: f64,
}

impl Default for OrbitalTuning {
    fn default() -> Self {
        Self {
            position_tau_ms: 300.0,
            rotation_tau_ms: 300.0,
            heading_lookahead: Duration::from_secs(1),
            time_scale: 1.0,
        }
    }
}

/// Ground-track polyline configuration.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Horizon the track covers ahead of the satellite (default: 600 s)
    pub window: Duration,

    /// Sampling step (default: 20 s)
    pub step: Duration,

    /// Minimum interval between track recomputes (default: 1 s)
    pub refresh: Duration,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
            step: Duration::from_secs(20),
            refresh: Duration::from_secs(1),
        }
    }
}

/// One tick's orbital output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalFrame {
    /// Smoothed world coordinate
    pub coordinates: LonLat,

    /// Smoothed heading in degrees
    pub heading_deg: f64,

    /// Whether the ground track was recomputed this tick
    pub track_refreshed: bool,
}

/// Per-tick adapter feeding orbital samples through the shared smoothing
/// primitives.
pub struct OrbitalAdapter {
    propagator: OrbitalPropagator,
    tuning: OrbitalTuning,
    track_config: TrackConfig,
    prev: Option<LonLat>,
    prev_heading_deg: f64,
    last_tick: Option<Duration>,
    last_track_refresh: Option<Duration>,
    track: Route,
    playback_origin: Option<(Duration, DateTime<Utc>)>,
}

impl OrbitalAdapter {
    /// Build an adapter over a parsed propagator.
    pub fn new(propagator: OrbitalPropagator, tuning: OrbitalTuning, track: TrackConfig) -> Self {
        Self {
            propagator,
            tuning,
            track_config: track,
            prev: None,
            prev_heading_deg: 0.0,
            last_tick: None,
            last_track_refresh: None,
            track: Route::new(Vec::new()),
            playback_origin: None,
        }
    }

    /// Adapter with default tuning and track configuration.
    pub fn with_defaults(propagator: OrbitalPropagator) -> Self {
        Self::new(propagator, OrbitalTuning::default(), TrackConfig::default())
    }

    /// The most recently computed ground-track polyline.
    pub fn ground_track(&self) -> &Route {
        &self.track
    }

    /// Map wall-clock time onto propagation time via the time-scale factor.
    fn propagation_time(&mut self, now: Duration, wall: DateTime<Utc>) -> DateTime<Utc> {
        let (origin_now, origin_wall) = *self.playback_origin.get_or_insert((now, wall));
        let elapsed_ms = now.saturating_sub(origin_now).as_secs_f64() * 1000.0;
        let scaled_ms = (elapsed_ms * self.tuning.time_scale).round() as i64;
        origin_wall + ChronoDuration::milliseconds(scaled_ms)
    }

    /// Advance one frame. `None` when propagation failed for this instant;
    /// the caller keeps the entity at its last position.
    pub fn tick(&mut self, now: Duration, wall: DateTime<Utc>) -> Option<OrbitalFrame> {
        let dt_ms = match self.last_tick {
            Some(last) => now.saturating_sub(last).as_secs_f64() * 1000.0,
            None => NOMINAL_FRAME_MS,
        };
        self.last_tick = Some(now);

        let at = self.propagation_time(now, wall);
        let sample = self.propagator.sample_at(at)?;

        // Position smoothing; the first sample initializes the anchors
        let smoothed = match self.prev {
            None => sample.coords,
            Some(prev) => {
                let alpha = geomath::smoothing_alpha(dt_ms, self.tuning.position_tau_ms);
                LonLat::new(
                    geomath::lerp(prev.lon, sample.coords.lon, alpha),
                    geomath::lerp(prev.lat, sample.coords.lat, alpha),
                )
            }
        };
        self.prev = Some(smoothed);

        // Heading from a propagated look-ahead, never from frame deltas
        let lookahead = ChronoDuration::from_std(self.tuning.heading_lookahead)
            .unwrap_or_else(|_| ChronoDuration::seconds(1));
        if let Some(ahead) = self.propagator.sample_at(at + lookahead) {
            let target = smoothed.bearing_to(ahead.coords);
            let alpha = geomath::smoothing_alpha(dt_ms, self.tuning.rotation_tau_ms);
            self.prev_heading_deg =
                geomath::smooth_heading(self.prev_heading_deg, target, alpha);
        }

        let track_refreshed = self.maybe_refresh_track(now, at);

        Some(OrbitalFrame {
            coordinates: smoothed,
            heading_deg: self.prev_heading_deg,
            track_refreshed,
        })
    }

    /// Recompute the ground track at most once per refresh interval,
    /// independent of the per-frame smoothing cadence.
    fn maybe_refresh_track(&mut self, now: Duration, at: DateTime<Utc>) -> bool {
        let due = match self.last_track_refresh {
            Some(last) => now.saturating_sub(last) > self.track_config.refresh,
            None => true,
        };
        if !due {
            return false;
        }
        self.last_track_refresh = Some(now);

        let step_secs = self.track_config.step.as_secs().max(1) as i64;
        let window_secs = self.track_config.window.as_secs() as i64;
        let mut points = Vec::with_capacity((window_secs / step_secs + 1) as usize);
        let mut offset = 0;
        while offset <= window_secs {
            if let Some(sample) = self
                .propagator
                .sample_at(at + ChronoDuration::seconds(offset))
            {
                points.push(sample.coords);
            }
            offset += step_secs;
        }
        self.track = Route::new(points);
        true
    }
}

/// Greenwich Mean Sidereal Time in radians (IAU 1982 polynomial).
fn gmst_radians(at: DateTime<Utc>) -> f64 {
    let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
    let days = (at - j2000).num_milliseconds() as f64 / 86_400_000.0;
    let centuries = days / 36_525.0;
    let gmst_deg = 280.460_618_37
        + 360.985_647_366_29 * days
        + 0.000_387_933 * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    gmst_deg.rem_euclid(360.0).to_radians()
}

/// Rotate a TEME position by GMST and convert to WGS84 geodetic
/// `(latitude_deg, longitude_deg, altitude_km)`.
fn teme_to_geodetic(position_km: [f64; 3], gmst: f64) -> (f64, f64, f64) {
    let (sin_g, cos_g) = gmst.sin_cos();
    let x = cos_g * position_km[0] + sin_g * position_km[1];
    let y = -sin_g * position_km[0] + cos_g * position_km[1];
    let z = position_km[2];

    let e2 = WGS84_F * (2.0 - WGS84_F);
    let r = (x * x + y * y).sqrt().max(1e-9);
    let lon = geomath::normalize_angle_deg(y.atan2(x).to_degrees());

    let mut lat = z.atan2(r);
    let mut c = 1.0;
    for _ in 0..6 {
        let sin_lat = lat.sin();
        c = 1.0 / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = (z + WGS84_A_KM * c * e2 * sin_lat).atan2(r);
    }
    let altitude_km = r / lat.cos() - WGS84_A_KM * c;

    (lat.to_degrees(), lon, altitude_km)
}
