//! The "MOTION" Engine - Per-Entity Route Progress and Phase Derivation
//!
//! Integrates speed over frame time into route progress, tracks that
//! progress with a critically damped spring (so speed changes never cause
//! overshoot), resolves the smoothed world position/heading through the
//! route index and smoothing primitives, and derives the movement-phase
//! state machine:
//!
//! `Start` -> `Moving` -> (`Stop` | `Accident`)* -> `End` -> wrap
//!
//! Exactly one phase (or none) is reported per tick. The accident sub-state
//! is layered by [`AccidentManager`]; while active it freezes the reported
//! position and overrides the phase.

use crate::accident::{AccidentConfig, AccidentEvent, AccidentManager, AccidentSite};
use crate::geomath::{self, NOMINAL_FRAME_MS};
use crate::route::{LonLat, Route, RouteIndex};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Discrete movement-lifecycle signal, emitted once per transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Entity left the route origin this lap
    Start,

    /// Entity is advancing under positive speed
    Moving,

    /// Speed dropped to zero or below
    Stop,

    /// Lap wrap: the route origin comes next
    End,

    /// Frozen at an accident site
    Accident,
}

/// Where the per-tick speed sample comes from.
///
/// Replaces the "undefined means fallback" idiom: a live getter carries its
/// own static fallback, used when the sampled value is non-finite.
pub enum SpeedSource {
    /// Fixed progress-per-frame fraction
    Static(f64),

    /// Polled every tick
    Live {
        poll: Box<dyn FnMut() -> f64>,
        /// Used when the live sample is NaN or infinite
        fallback: f64,
    },
}

impl SpeedSource {
    /// Sample the current speed.
    pub fn poll(&mut self) -> f64 {
        match self {
            SpeedSource::Static(speed) => *speed,
            SpeedSource::Live { poll, fallback } => {
                let sample = poll();
                if sample.is_finite() {
                    sample
                } else {
                    *fallback
                }
            }
        }
    }
}

/// Where the route comes from.
pub enum RouteSource {
    /// Route fixed at construction
    Fixed(Route),

    /// Polled every tick; `None` (or an empty polyline) keeps the current
    /// route
    Live {
        poll: Box<dyn FnMut() -> Option<Route>>,
        initial: Route,
    },
}

impl RouteSource {
    fn initial(&self) -> &Route {
        match self {
            RouteSource::Fixed(route) => route,
            RouteSource::Live { initial, .. } => initial,
        }
    }

    fn poll(&mut self) -> Option<Route> {
        match self {
            RouteSource::Fixed(_) => None,
            RouteSource::Live { poll, .. } => poll(),
        }
    }
}

/// One tick's output: what the host repositions the asset with, what the
/// chase controller and UI layer consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionFrame {
    /// Smoothed world coordinate
    pub coordinates: LonLat,

    /// Smoothed heading in signed degrees (0 = North)
    pub heading_deg: f64,

    /// Phase transition this tick, if any
    pub phase: Option<Phase>,

    /// Smoothed progress fraction [0, 1] along the route
    pub progress: f64,
}

/// Observer interface for per-tick motion and accident lifecycle.
pub trait MotionObserver {
    /// Called every tick with the smoothed frame.
    fn on_move(&mut self, id: Uuid, frame: &MotionFrame);

    /// Called once when an accident site triggers.
    fn on_accident_start(&mut self, id: Uuid, site: &AccidentSite, at: Duration) {
        let _ = (id, site, at);
    }

    /// Called once when the active accident resolves.
    fn on_accident_end(&mut self, id: Uuid) {
        let _ = id;
    }
}

/// Observer that discards everything (entities nobody watches).
pub struct NullObserver;

impl MotionObserver for NullObserver {
    fn on_move(&mut self, _id: Uuid, _frame: &MotionFrame) {}
}

/// Tunable constants for progress tracking and visual smoothing.
///
/// The defaults suit street-scale maps; hosts rendering at other scales
/// override them.
#[derive(Debug, Clone)]
pub struct MotionTuning {
    /// Spring snap band: within this progress error the spring snaps to the
    /// target and bleeds velocity instead of integrating
    pub progress_epsilon: f64,

    /// Spring stiffness (per-frame^2 gain on progress error)
    pub spring_stiffness: f64,

    /// Spring damping (per-frame gain on velocity error)
    pub spring_damping: f64,

    /// Acceleration cap floor, and its speed-proportional term
    pub max_acceleration_floor: f64,
    pub acceleration_speed_ratio: f64,

    /// Velocity cap floor, and its speed-proportional term
    pub max_velocity_floor: f64,
    pub velocity_speed_ratio: f64,

    /// Velocity bleed factor inside the snap band
    pub velocity_decay: f64,

    /// Base position smoothing time constant in ms (speed-adaptive)
    pub base_position_tau_ms: f64,

    /// Base rotation smoothing time constant in ms (speed-adaptive)
    pub base_rotation_tau_ms: f64,

    /// "Distance-along is approximately zero" threshold for the Start phase
    pub start_epsilon_m: f64,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            progress_epsilon: 2e-4,
            spring_stiffness: 0.05,
            spring_damping: 0.45,
            max_acceleration_floor: 5e-5,
            acceleration_speed_ratio: 0.25,
            max_velocity_floor: 1e-3,
            velocity_speed_ratio: 2.0,
            velocity_decay: 0.95,
            base_position_tau_ms: 160.0,
            base_rotation_tau_ms: 90.0,
            start_epsilon_m: 1.0,
        }
    }
}

/// Configuration for one route-based entity, consumed once at construction.
pub struct EntityConfig {
    /// Display name (also used in logs)
    pub name: String,

    /// Route polyline, fixed or live-polled
    pub route: RouteSource,

    /// Speed in progress-per-frame units, static or live-polled
    pub speed: SpeedSource,

    /// Static correction for the asset's forward axis, degrees
    pub heading_offset_deg: f64,

    /// Flip the heading 180 degrees when it deviates more than 90 degrees
    /// from the overall route bearing
    pub auto_flip: bool,

    /// Proximity-triggered halt sites
    pub accidents: Vec<AccidentSite>,

    /// Accident trigger tuning
    pub accident_config: AccidentConfig,

    /// Motion tuning
    pub tuning: MotionTuning,
}

impl EntityConfig {
    /// Config with defaults for everything but the essentials.
    pub fn new(name: impl Into<String>, route: Route, speed: SpeedSource) -> Self {
        Self {
            name: name.into(),
            route: RouteSource::Fixed(route),
            speed,
            heading_offset_deg: 0.0,
            auto_flip: true,
            accidents: Vec::new(),
            accident_config: AccidentConfig::default(),
            tuning: MotionTuning::default(),
        }
    }

    pub fn with_live_route(mut self, poll: Box<dyn FnMut() -> Option<Route>>) -> Self {
        let initial = match self.route {
            RouteSource::Fixed(route) => route,
            RouteSource::Live { initial, .. } => initial,
        };
        self.route = RouteSource::Live { poll, initial };
        self
    }

    pub fn with_heading_offset(mut self, degrees: f64) -> Self {
        self.heading_offset_deg = degrees;
        self
    }

    pub fn with_auto_flip(mut self, enabled: bool) -> Self {
        self.auto_flip = enabled;
        self
    }

    pub fn with_accidents(mut self, sites: Vec<AccidentSite>) -> Self {
        self.accidents = sites;
        self
    }

    pub fn with_tuning(mut self, tuning: MotionTuning) -> Self {
        self.tuning = tuning;
        self
    }
}

#[derive(Debug, Clone)]
struct MotionState {
    target_progress: f64,
    smoothed_progress: f64,
    velocity: f64,
    acceleration: f64,
    prev_lon: f64,
    prev_lat: f64,
    prev_heading_deg: f64,
    last_tick: Option<Duration>,
    start_sent: bool,
    stop_sent: bool,
    laps_completed: u64,
}

/// Per-entity motion state machine, ticked once per host frame.
///
/// Owns its state exclusively; entities share nothing, so update order
/// between entities is irrelevant.
pub struct EntityMotionController {
    id: Uuid,
    name: String,
    speed: SpeedSource,
    route_source: RouteSource,
    route: Route,
    index: RouteIndex,
    overall_bearing: f64,
    heading_offset_deg: f64,
    auto_flip: bool,
    tuning: MotionTuning,
    accidents: AccidentManager,
    observer: Box<dyn MotionObserver>,
    state: MotionState,
    ready: bool,
}

impl EntityMotionController {
    /// Build a controller from its configuration and observer.
    pub fn new(config: EntityConfig, observer: Box<dyn MotionObserver>) -> Self {
        let route = config.route.initial().clone();
        if route.len() < 2 {
            warn!(entity = %config.name, points = route.len(), "degenerate route");
        }
        let index = RouteIndex::build(&route);
        let overall_bearing = route.overall_bearing();
        let anchor = route.first().unwrap_or(LonLat::new(0.0, 0.0));

        Self {
            id: Uuid::new_v4(),
            name: config.name,
            speed: config.speed,
            route_source: config.route,
            route,
            index,
            overall_bearing,
            heading_offset_deg: config.heading_offset_deg,
            auto_flip: config.auto_flip,
            tuning: config.tuning,
            accidents: AccidentManager::new(config.accidents, config.accident_config),
            observer,
            state: MotionState {
                target_progress: 0.0,
                smoothed_progress: 0.0,
                velocity: 0.0,
                acceleration: 0.0,
                prev_lon: anchor.lon,
                prev_lat: anchor.lat,
                prev_heading_deg: 0.0,
                last_tick: None,
                start_sent: false,
                stop_sent: false,
                laps_completed: 0,
            },
            ready: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Smoothed progress fraction along the route.
    pub fn progress(&self) -> f64 {
        self.state.smoothed_progress.clamp(0.0, 1.0)
    }

    pub fn laps_completed(&self) -> u64 {
        self.state.laps_completed
    }

    pub fn is_in_accident(&self) -> bool {
        self.accidents.is_active()
    }

    /// Message of the active accident, surfaced through chase telemetry.
    pub fn accident_message(&self) -> Option<&str> {
        self.accidents.active_site().map(|site| site.message.as_str())
    }

    /// Gate ticks on the visual asset having loaded. Not an error state,
    /// just a precondition.
    pub fn set_asset_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_asset_ready(&self) -> bool {
        self.ready
    }

    /// Advance one frame. Returns the emitted frame, or `None` while the
    /// asset gate is closed or the route is empty.
    pub fn tick(&mut self, now: Duration) -> Option<MotionFrame> {
        if !self.ready {
            return None;
        }

        self.poll_route_swap();

        let dt_ms = match self.state.last_tick {
            Some(last) => now.saturating_sub(last).as_secs_f64() * 1000.0,
            None => NOMINAL_FRAME_MS,
        };
        self.state.last_tick = Some(now);
        let scale = geomath::frame_scale(dt_ms);

        let speed = self.speed.poll();
        let frozen_before = self.accidents.is_active();
        let mut lap_wrapped = false;

        // Start detection keys off where the entity was when the tick began;
        // after the advance even the first tick can be well past the origin.
        let pre_distance = self.progress() * self.index.total_meters();

        if !frozen_before {
            lap_wrapped = self.advance_progress(speed, scale);
        }

        let distance = self.progress() * self.index.total_meters();
        let resolved = match self.index.position_at(distance) {
            Some(position) => position,
            None => {
                warn!(entity = %self.name, "route has no points, skipping tick");
                return None;
            }
        };

        // Accident layering: may freeze the position and override the phase
        let mut target = resolved.coords;
        match self.accidents.update(now, target) {
            Some(AccidentEvent::Triggered(site_index)) => {
                if let Some(site) = self.accidents.site(site_index) {
                    debug!(entity = %self.name, message = %site.message, "accident triggered");
                    self.observer.on_accident_start(self.id, site, now);
                }
            }
            Some(AccidentEvent::Resolved) => {
                debug!(entity = %self.name, "accident resolved");
                self.observer.on_accident_end(self.id);
            }
            None => {}
        }
        let frozen = self.accidents.is_active();
        if let Some(position) = self.accidents.frozen_position() {
            target = position;
        }

        let target_heading = if frozen {
            self.state.prev_heading_deg
        } else {
            self.lookahead_heading(resolved.coords)
        };

        // Time-based exponential smoothing, speed-adaptive
        let pos_tau = geomath::adaptive_tau(self.tuning.base_position_tau_ms, speed);
        let alpha_pos = geomath::smoothing_alpha(dt_ms, pos_tau);
        self.state.prev_lon = geomath::lerp(self.state.prev_lon, target.lon, alpha_pos);
        self.state.prev_lat = geomath::lerp(self.state.prev_lat, target.lat, alpha_pos);

        if !frozen {
            let rot_tau = geomath::adaptive_tau(self.tuning.base_rotation_tau_ms, speed);
            let alpha_rot = geomath::smoothing_alpha(dt_ms, rot_tau);
            self.state.prev_heading_deg =
                geomath::smooth_heading(self.state.prev_heading_deg, target_heading, alpha_rot);
        }

        let phase = if frozen {
            Some(Phase::Accident)
        } else {
            self.derive_phase(speed, lap_wrapped, pre_distance)
        };

        let frame = MotionFrame {
            coordinates: LonLat::new(self.state.prev_lon, self.state.prev_lat),
            heading_deg: self.state.prev_heading_deg,
            phase,
            progress: self.progress(),
        };
        self.observer.on_move(self.id, &frame);
        Some(frame)
    }

    /// Pick up a hot-swapped route. Progress is preserved (the entity is
    /// repositioned, not teleported); smoothing anchors reset to the new
    /// start to avoid a continent-sized lerp.
    fn poll_route_swap(&mut self) {
        let Some(latest) = self.route_source.poll() else {
            return;
        };
        if latest.is_empty() || !latest.endpoints_differ(&self.route) {
            return;
        }

        debug!(entity = %self.name, points = latest.len(), "route hot-swap");
        self.index = RouteIndex::build(&latest);
        self.overall_bearing = latest.overall_bearing();
        self.route = latest;
        self.state.target_progress = self.state.target_progress.clamp(0.0, 1.0);
        self.state.smoothed_progress = self.state.smoothed_progress.clamp(0.0, 1.0);
        if let Some(start) = self.route.first() {
            self.state.prev_lon = start.lon;
            self.state.prev_lat = start.lat;
        }
    }

    /// Integrate speed into target progress and track it with the spring.
    /// Returns true on a lap-wrap edge.
    fn advance_progress(&mut self, speed: f64, scale: f64) -> bool {
        let state = &mut self.state;
        state.target_progress += speed * scale;

        let mut wrapped = false;
        if state.target_progress > 1.0 {
            state.target_progress %= 1.0;
            state.smoothed_progress -= 1.0;
            state.velocity = 0.0;
            state.acceleration = 0.0;
            state.laps_completed += 1;
            wrapped = true;
            self.accidents.lap_wrapped();
        }
        if state.target_progress < 0.0 {
            state.target_progress = 0.0;
        }

        let tuning = &self.tuning;
        let error = state.target_progress - state.smoothed_progress;
        if error.abs() > tuning.progress_epsilon {
            let max_acc = tuning
                .max_acceleration_floor
                .max(speed.abs() * tuning.acceleration_speed_ratio);
            let max_vel = tuning
                .max_velocity_floor
                .max(speed.abs() * tuning.velocity_speed_ratio);

            let raw = error * tuning.spring_stiffness
                + (speed - state.velocity) * tuning.spring_damping;
            state.acceleration = raw.clamp(-max_acc, max_acc);
            state.velocity =
                (state.velocity + state.acceleration * scale).clamp(-max_vel, max_vel);
            state.smoothed_progress += state.velocity * scale;
        } else {
            state.velocity *= tuning.velocity_decay;
            state.acceleration = 0.0;
            state.smoothed_progress = state.target_progress;
        }

        wrapped
    }

    /// Heading from a forward look-ahead sample rather than consecutive
    /// frame positions, so a nearly frozen position does not produce heading
    /// noise. Forward and backward candidates are disambiguated against the
    /// overall route bearing.
    fn lookahead_heading(&self, current: LonLat) -> f64 {
        if self.route.len() < 2 || self.index.total_meters() <= 0.0 {
            return self.state.prev_heading_deg;
        }

        let total = self.index.total_meters();
        let total_km = total / 1000.0;
        let eps = (0.001 / total_km.max(1e-6)).max(5e-4);

        let p = self.progress();
        let forward = (p + eps) % 1.0;
        let backward = (p - eps + 1.0) % 1.0;

        let bearing_at = |fraction: f64| -> Option<f64> {
            let sample = self.index.position_at(fraction * total)?;
            Some(current.bearing_to(sample.coords))
        };

        let bearing_fwd = bearing_at(forward).unwrap_or(self.state.prev_heading_deg);
        let bearing_back = bearing_at(backward).unwrap_or(self.state.prev_heading_deg);

        let mut chosen = if geomath::angle_diff_abs(bearing_fwd, self.overall_bearing)
            <= geomath::angle_diff_abs(bearing_back, self.overall_bearing)
        {
            bearing_fwd
        } else {
            bearing_back
        };

        chosen = geomath::normalize_angle_deg(chosen + self.heading_offset_deg);
        if self.auto_flip && geomath::angle_diff_abs(chosen, self.overall_bearing) > 90.0 {
            chosen = geomath::normalize_angle_deg(chosen + 180.0);
        }
        chosen
    }

    /// One phase (or none) per tick, in priority order.
    fn derive_phase(&mut self, speed: f64, lap_wrapped: bool, distance_m: f64) -> Option<Phase> {
        let state = &mut self.state;

        if distance_m <= self.tuning.start_epsilon_m && !state.start_sent {
            state.start_sent = true;
            return Some(Phase::Start);
        }
        if speed <= 0.0 && !state.stop_sent {
            state.stop_sent = true;
            return Some(Phase::Stop);
        }
        if lap_wrapped {
            state.start_sent = false;
            return Some(Phase::End);
        }
        if speed > 0.0 {
            state.stop_sent = false;
            return Some(Phase::Moving);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const TICK: Duration = Duration::from_micros(16_670);

    #[derive(Default)]
    struct Log {
        frames: Vec<MotionFrame>,
        accidents_started: usize,
        accidents_ended: usize,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl MotionObserver for Recorder {
        fn on_move(&mut self, _id: Uuid, frame: &MotionFrame) {
            self.0.borrow_mut().frames.push(frame.clone());
        }

        fn on_accident_start(&mut self, _id: Uuid, _site: &AccidentSite, _at: Duration) {
            self.0.borrow_mut().accidents_started += 1;
        }

        fn on_accident_end(&mut self, _id: Uuid) {
            self.0.borrow_mut().accidents_ended += 1;
        }
    }

    fn meridian() -> Route {
        Route::from_pairs(&[[0.0, 0.0], [0.0, 1.0]])
    }

    fn controller(speed: SpeedSource) -> (EntityMotionController, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("car-1", meridian(), speed);
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);
        (ctl, log)
    }

    fn run_ticks(ctl: &mut EntityMotionController, from: u32, count: u32) {
        for i in from..from + count {
            ctl.tick(TICK * (i + 1));
        }
    }

    fn phases(log: &Rc<RefCell<Log>>) -> Vec<Option<Phase>> {
        log.borrow().frames.iter().map(|f| f.phase).collect()
    }

    #[test]
    fn test_asset_gate_blocks_ticks() {
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("car-1", meridian(), SpeedSource::Static(0.01));
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));

        assert!(ctl.tick(TICK).is_none());
        assert!(log.borrow().frames.is_empty());

        ctl.set_asset_ready(true);
        assert!(ctl.tick(TICK * 2).is_some());
        assert_eq!(log.borrow().frames.len(), 1);
    }

    #[test]
    fn test_full_lap_phase_sequence() {
        let (mut ctl, log) = controller(SpeedSource::Static(0.01));
        run_ticks(&mut ctl, 0, 130);

        let seq = phases(&log);
        assert_eq!(seq[0], Some(Phase::Start));
        assert_eq!(seq.iter().filter(|p| **p == Some(Phase::End)).count(), 1);
        assert_eq!(seq.iter().filter(|p| **p == Some(Phase::Stop)).count(), 0);
        // Lap wrap re-arms Start for the next lap
        assert_eq!(seq.iter().filter(|p| **p == Some(Phase::Start)).count(), 2);
        assert!(seq.iter().filter(|p| **p == Some(Phase::Moving)).count() > 100);
        assert_eq!(ctl.laps_completed(), 1);
    }

    #[test]
    fn test_stop_fires_once_then_moving() {
        let speed = Rc::new(Cell::new(0.01));
        let live = speed.clone();
        let (mut ctl, log) = controller(SpeedSource::Live {
            poll: Box::new(move || live.get()),
            fallback: 0.01,
        });

        run_ticks(&mut ctl, 0, 10);
        speed.set(0.0);
        run_ticks(&mut ctl, 10, 5);
        speed.set(0.01);
        run_ticks(&mut ctl, 15, 1);

        let seq = phases(&log);
        assert_eq!(seq.iter().filter(|p| **p == Some(Phase::Stop)).count(), 1);
        assert_eq!(seq[10], Some(Phase::Stop));
        assert_eq!(seq[11], None);
        assert_eq!(seq[15], Some(Phase::Moving));
    }

    #[test]
    fn test_live_speed_nan_falls_back() {
        let (mut ctl, log) = controller(SpeedSource::Live {
            poll: Box::new(|| f64::NAN),
            fallback: 0.01,
        });

        run_ticks(&mut ctl, 0, 5);
        // Fallback speed keeps the entity moving, so no Stop is emitted
        let seq = phases(&log);
        assert_eq!(seq.iter().filter(|p| **p == Some(Phase::Stop)).count(), 0);
        assert!(ctl.progress() > 0.0);
    }

    #[test]
    fn test_half_lap_position() {
        // One traversal takes 100 ticks at nominal dt
        let (mut ctl, log) = controller(SpeedSource::Static(0.01));
        run_ticks(&mut ctl, 0, 50);

        assert!((ctl.progress() - 0.5).abs() < 0.02, "progress {}", ctl.progress());

        let last = log.borrow().frames.last().cloned().unwrap();
        // Position smoothing lags the progress point by a bounded amount
        assert!((last.coordinates.lat - 0.5).abs() < 0.06, "lat {}", last.coordinates.lat);
        assert_relative_eq!(last.coordinates.lon, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_converges_north() {
        let (mut ctl, log) = controller(SpeedSource::Static(0.005));
        run_ticks(&mut ctl, 0, 60);

        let last = log.borrow().frames.last().cloned().unwrap();
        assert!(last.heading_deg.abs() < 1.0, "heading {}", last.heading_deg);
    }

    #[test]
    fn test_heading_offset_applied() {
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("plane-1", meridian(), SpeedSource::Static(0.005))
            .with_heading_offset(90.0)
            .with_auto_flip(false);
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);

        run_ticks(&mut ctl, 0, 60);
        let last = log.borrow().frames.last().cloned().unwrap();
        assert!((last.heading_deg - 90.0).abs() < 1.0, "heading {}", last.heading_deg);
    }

    /// A ~111 m block route: per-tick steps at speed 0.01 are ~1.1 m, well
    /// inside the 10 m accident trigger radius.
    fn short_block() -> Route {
        Route::from_pairs(&[[0.0, 0.0], [0.0, 0.001]])
    }

    #[test]
    fn test_accident_freezes_then_resumes() {
        let site = AccidentSite {
            coordinates: LonLat::new(0.0, 0.0005),
            duration: Duration::from_millis(500),
            message: "pileup".to_string(),
        };
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("car-1", short_block(), SpeedSource::Static(0.01))
            .with_accidents(vec![site]);
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);

        // The mid-route site triggers near half a lap (~tick 45);
        // 500 ms is ~30 ticks; run well past resolution.
        run_ticks(&mut ctl, 0, 100);

        assert_eq!(log.borrow().accidents_started, 1);
        assert_eq!(log.borrow().accidents_ended, 1);

        let seq = phases(&log);
        let accident_ticks = seq.iter().filter(|p| **p == Some(Phase::Accident)).count();
        assert!(
            (28..=33).contains(&accident_ticks),
            "{accident_ticks} accident ticks"
        );

        assert!(ctl.progress() > 0.5, "resumed past the trigger point");
        assert!(!ctl.is_in_accident());
        assert!(ctl.accident_message().is_none());
    }

    #[test]
    fn test_accident_does_not_retrigger_until_wrap() {
        let site = AccidentSite {
            coordinates: LonLat::new(0.0, 0.0005),
            duration: Duration::from_millis(100),
            message: "stall".to_string(),
        };
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("car-1", short_block(), SpeedSource::Static(0.01))
            .with_accidents(vec![site]);
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);

        // Two full laps (plus the two ~6 tick halts)
        run_ticks(&mut ctl, 0, 230);

        assert!(ctl.laps_completed() >= 2);
        assert_eq!(log.borrow().accidents_started, 2);
        assert_eq!(log.borrow().accidents_ended, 2);
    }

    #[test]
    fn test_route_hot_swap_preserves_progress() {
        let swapped = Rc::new(Cell::new(false));
        let flag = swapped.clone();
        let replacement = Route::from_pairs(&[[10.0, 10.0], [10.0, 11.0]]);
        let poll_route = replacement.clone();

        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new("car-1", meridian(), SpeedSource::Static(0.01))
            .with_live_route(Box::new(move || {
                if flag.get() {
                    Some(poll_route.clone())
                } else {
                    None
                }
            }));
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);

        run_ticks(&mut ctl, 0, 30);
        let progress_before = ctl.progress();
        swapped.set(true);
        run_ticks(&mut ctl, 30, 1);

        // Progress survives the swap (within one tick of advance)
        assert!((ctl.progress() - progress_before).abs() < 0.05);

        // The entity now resolves positions on the new route
        let last = log.borrow().frames.last().cloned().unwrap();
        assert!(last.coordinates.lon > 9.0, "lon {}", last.coordinates.lon);
    }

    #[test]
    fn test_degenerate_route_emits_fixed_point() {
        let log = Rc::new(RefCell::new(Log::default()));
        let config = EntityConfig::new(
            "beacon",
            Route::from_pairs(&[[7.5, 45.0]]),
            SpeedSource::Static(0.01),
        );
        let mut ctl = EntityMotionController::new(config, Box::new(Recorder(log.clone())));
        ctl.set_asset_ready(true);

        run_ticks(&mut ctl, 0, 5);
        let last = log.borrow().frames.last().cloned().unwrap();
        assert_relative_eq!(last.coordinates.lon, 7.5, epsilon = 1e-9);
        assert_relative_eq!(last.coordinates.lat, 45.0, epsilon = 1e-9);
    }
}
