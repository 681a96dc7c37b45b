//! The "CHASE" Engine - Camera Synchronization for a Followed Entity
//!
//! Given the stream of a chased entity's smoothed positions, decides per
//! tick how the camera should move: an immediate snap for sub-pixel drift,
//! a short linear ease for ordinary motion, a longer quadratic ease-out for
//! large jumps. A fixed-duration ease either lags at high update rates or
//! jitters at near-zero movement; the tiering is what keeps both ends
//! smooth.
//!
//! The controller never mutates camera state directly: it issues transition
//! requests through [`CameraHost`] and is the single writer of those
//! requests. Any user-originated gesture deactivates the chase; synthetic
//! moves (the controller's own) never do.

use crate::route::LonLat;
use crate::telemetry::ChaseStatus;
use nalgebra::Vector2;
use std::f64::consts::PI;
use std::time::Duration;
use uuid::Uuid;

/// Web-mercator latitude limit.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Easing curve for an eased camera transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasingKind {
    Linear,
    QuadraticOut,
}

impl EasingKind {
    /// Evaluate the curve at `t` in [0, 1].
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingKind::Linear => t,
            EasingKind::QuadraticOut => t * (2.0 - t),
        }
    }
}

/// Camera state snapshot, owned by the rendering host and read per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub center: LonLat,
    pub zoom: f64,
    pub bearing_deg: f64,
}

/// Transition strategy selected from the screen-space distance to the
/// chased entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseStrategy {
    /// Below the snap threshold: recentering without easing
    Snap,

    /// Ordinary motion: short linear transition
    ShortEase,

    /// Large jump: longer quadratic ease-out
    LongEase,
}

/// Configuration for the ChaseController
#[derive(Debug, Clone)]
pub struct ChaseTuning {
    /// Below this pixel distance the camera snaps (default: 4.0)
    pub snap_threshold_px: f64,

    /// At or above this pixel distance the long ease kicks in (default: 64.0)
    pub ease_threshold_px: f64,

    /// Short transition duration (default: 120 ms)
    pub short_ease: Duration,

    /// Long transition duration (default: 220 ms)
    pub long_ease: Duration,

    /// Minimum interval between chase status pushes (default: 50 ms)
    pub status_interval: Duration,

    /// Map tile size in pixels for world projection (default: 512.0)
    pub tile_size_px: f64,
}

impl Default for ChaseTuning {
    fn default() -> Self {
        Self {
            snap_threshold_px: 4.0,
            ease_threshold_px: 64.0,
            short_ease: Duration::from_millis(120),
            long_ease: Duration::from_millis(220),
            status_interval: Duration::from_millis(50),
            tile_size_px: 512.0,
        }
    }
}

/// One requested camera move. Zoom and bearing are optional; `None` keeps
/// the host's current values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransition {
    pub center: LonLat,
    pub zoom: Option<f64>,
    pub bearing_deg: Option<f64>,
}

impl CameraTransition {
    /// A recenter that leaves zoom and bearing alone.
    pub fn center(center: LonLat) -> Self {
        Self {
            center,
            zoom: None,
            bearing_deg: None,
        }
    }
}

/// Camera request surface consumed by the rendering host.
pub trait CameraHost {
    /// Recenter immediately, no easing.
    fn snap_to(&mut self, transition: CameraTransition);

    /// Ease toward a target over a duration with the given curve.
    fn ease_to(&mut self, transition: CameraTransition, duration: Duration, easing: EasingKind);
}

/// Where a camera gesture originated.
///
/// The host tags events so the controller's own transitions are never
/// mistaken for user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOrigin {
    /// Pan, zoom, rotate, drag or direct map click by the user
    UserInput,

    /// Programmatic move, including chase transitions
    Synthetic,
}

/// Camera-follow controller for at most one chased entity.
pub struct ChaseController {
    target: Option<Uuid>,
    tuning: ChaseTuning,
    last_status: Option<Duration>,
}

impl ChaseController {
    /// Create a controller with the given tuning.
    pub fn new(tuning: ChaseTuning) -> Self {
        Self {
            target: None,
            tuning,
            last_status: None,
        }
    }

    /// Create a controller with default tuning.
    pub fn with_defaults() -> Self {
        Self::new(ChaseTuning::default())
    }

    /// The currently chased entity, if any.
    pub fn target(&self) -> Option<Uuid> {
        self.target
    }

    /// Start chasing an entity.
    pub fn set_target(&mut self, id: Uuid) {
        self.target = Some(id);
        self.last_status = None;
    }

    /// Stop chasing.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.last_status = None;
    }

    /// Apply a camera gesture. User input while a chase is active clears
    /// the chased entity; synthetic moves never do. Returns true when the
    /// chase was deactivated.
    pub fn on_gesture(&mut self, origin: GestureOrigin) -> bool {
        match origin {
            GestureOrigin::UserInput if self.target.is_some() => {
                self.clear_target();
                true
            }
            _ => false,
        }
    }

    /// Project a coordinate into web-mercator world pixels at a zoom level.
    pub fn world_pixel(&self, coords: LonLat, zoom: f64) -> Vector2<f64> {
        let world = self.tuning.tile_size_px * 2f64.powf(zoom);
        let x = (coords.lon + 180.0) / 360.0 * world;
        let lat = coords
            .lat
            .clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
            .to_radians();
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
        Vector2::new(x, y)
    }

    /// Screen-space distance between the camera center and a target.
    pub fn pixel_distance(&self, pose: &CameraPose, target: LonLat) -> f64 {
        let a = self.world_pixel(pose.center, pose.zoom);
        let b = self.world_pixel(target, pose.zoom);
        (b - a).norm()
    }

    /// Pick the transition strategy for a pixel distance.
    pub fn select_strategy(&self, pixel_distance: f64) -> ChaseStrategy {
        if pixel_distance < self.tuning.snap_threshold_px {
            ChaseStrategy::Snap
        } else if pixel_distance < self.tuning.ease_threshold_px {
            ChaseStrategy::ShortEase
        } else {
            ChaseStrategy::LongEase
        }
    }

    /// Feed one chased-entity position. Issues the camera request and
    /// returns a throttled status record for the UI layer (at most one per
    /// `status_interval`).
    ///
    /// Positions for entities other than the chase target are ignored, so
    /// callers can fan every entity frame through here.
    pub fn follow(
        &mut self,
        now: Duration,
        id: Uuid,
        coords: LonLat,
        message: Option<&str>,
        pose: &CameraPose,
        host: &mut dyn CameraHost,
    ) -> Option<ChaseStatus> {
        if self.target != Some(id) {
            return None;
        }

        let transition = CameraTransition::center(coords);
        match self.select_strategy(self.pixel_distance(pose, coords)) {
            ChaseStrategy::Snap => host.snap_to(transition),
            ChaseStrategy::ShortEase => {
                host.ease_to(transition, self.tuning.short_ease, EasingKind::Linear)
            }
            ChaseStrategy::LongEase => {
                host.ease_to(transition, self.tuning.long_ease, EasingKind::QuadraticOut)
            }
        }

        let due = match self.last_status {
            Some(last) => now.saturating_sub(last) >= self.tuning.status_interval,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_status = Some(now);
        Some(ChaseStatus {
            lat: coords.lat,
            lng: coords.lon,
            message: message.map(str::to_string),
        })
    }
}
