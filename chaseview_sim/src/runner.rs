//! Scenario runner - executes motion/chase scenarios and checks invariants.

use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use chaseview_core::chase::GestureOrigin;
use chaseview_core::motion::{EntityConfig, Phase, SpeedSource};
use chaseview_core::orbital::{OrbitalAdapter, OrbitalPropagator};
use chaseview_core::route::{LonLat, Route};
use chaseview_core::AccidentSite;
use chrono::{TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// ISS elements used by the orbital scenario (epoch 2020-07-12).
const ISS_TLE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
const ISS_TLE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during the run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Motion frames emitted
    pub frames: u64,

    /// Camera requests issued by the chase controller
    pub camera_requests: u64,

    /// Throttled chase status pushes
    pub status_pushes: u64,

    /// Laps completed by the observed entity
    pub laps: u64,
}

/// Runs motion scenarios against a deterministic world.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    /// Frame-time jitter fraction
    dt_jitter_frac: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 60,
            max_duration_secs: 10.0,
            dt_jitter_frac: 0.0,
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets frame-time jitter.
    pub fn with_jitter(mut self, frac: f64) -> Self {
        self.dt_jitter_frac = frac;
        self
    }

    fn config(&self, duration_secs: f64) -> SimConfig {
        SimConfig {
            seed: self.seed,
            num_entities: 0,
            tick_rate_hz: self.tick_rate_hz,
            max_duration_secs: duration_secs.min(self.max_duration_secs.max(2.0)),
            dt_jitter_frac: self.dt_jitter_frac,
        }
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let (world, check) = match scenario {
            ScenarioId::SteadyLap => self.run_steady_lap(),
            ScenarioId::StopAndGo => self.run_stop_and_go(),
            ScenarioId::AccidentHalt => self.run_accident_halt(),
            ScenarioId::RouteSwap => self.run_route_swap(),
            ScenarioId::Chase => self.run_chase(),
            ScenarioId::Orbital => self.run_orbital(),
        };

        let (passed, failure_reason, metrics) = match check {
            Ok(metrics) => (true, None, metrics),
            Err(reason) => (false, Some(reason), ScenarioMetrics::default()),
        };

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            failure_reason,
            metrics,
        }
    }

    /// Two-plus constant-speed laps: one Start per lap, End exactly at each
    /// wrap, never a spurious Stop.
    fn run_steady_lap(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        let duration = 5.0;
        let mut world = SimWorld::new(self.config(duration));

        // One lap every two seconds
        let speed = 1.0 / (2.0 * self.tick_rate_hz as f64);
        let route = Route::from_pairs(&[[0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001]]);
        let id = world.spawn_entity(EntityConfig::new(
            "lap-car",
            route,
            SpeedSource::Static(speed),
        ));

        for _ in 0..world.target_ticks() {
            world.tick();
        }

        let log = world.log(id).expect("entity log");
        let log = log.borrow();
        let laps = world.scene.entity(id).map(|e| e.laps_completed()).unwrap_or(0);

        let check = (|| {
            let starts = log.phase_count(Phase::Start);
            let ends = log.phase_count(Phase::End);
            let stops = log.phase_count(Phase::Stop);
            let moving = log.phase_count(Phase::Moving);

            if laps < 2 {
                return Err(format!("expected at least 2 laps, got {laps}"));
            }
            if ends != laps as usize {
                return Err(format!("End fired {ends} times over {laps} laps"));
            }
            if starts != ends + 1 && starts != ends {
                return Err(format!("Start fired {starts} times for {ends} ends"));
            }
            if stops != 0 {
                return Err(format!("spurious Stop x{stops} at constant speed"));
            }
            if moving * 2 < log.frames.len() {
                return Err(format!("Moving on only {moving}/{} ticks", log.frames.len()));
            }
            if log.frames.iter().any(|f| !(0.0..=1.0).contains(&f.progress)) {
                return Err("progress left [0, 1]".to_string());
            }
            Ok(ScenarioMetrics {
                frames: log.frames.len() as u64,
                laps,
                ..Default::default()
            })
        })();

        drop(log);
        (world, check)
    }

    /// Speed toggled to zero mid-route: Stop exactly once, then silence,
    /// then Moving on the first positive-speed tick.
    fn run_stop_and_go(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        let mut world = SimWorld::new(self.config(3.0));
        let hz = self.tick_rate_hz as u64;

        let speed = Rc::new(Cell::new(0.005));
        let live = speed.clone();
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 0.01]]);
        let id = world.spawn_entity(EntityConfig::new(
            "commuter",
            route,
            SpeedSource::Live {
                poll: Box::new(move || live.get()),
                fallback: 0.005,
            },
        ));

        // One second driving, one second parked, one second driving
        for _ in 0..hz {
            world.tick();
        }
        speed.set(0.0);
        for _ in 0..hz {
            world.tick();
        }
        speed.set(0.005);
        for _ in 0..hz {
            world.tick();
        }

        let log = world.log(id).expect("entity log");
        let log = log.borrow();

        let check = (|| {
            if log.phase_count(Phase::Stop) != 1 {
                return Err(format!("Stop fired {} times", log.phase_count(Phase::Stop)));
            }
            // The tick right after the restart reports Moving
            let resume_tick = 2 * hz as usize;
            match log.frames.get(resume_tick).and_then(|f| f.phase) {
                Some(Phase::Moving) => {}
                other => return Err(format!("expected Moving at restart, got {other:?}")),
            }
            // Parked ticks after the Stop edge report no phase
            let parked_none = log.frames[hz as usize + 1..resume_tick]
                .iter()
                .all(|f| f.phase.is_none());
            if !parked_none {
                return Err("parked ticks re-reported a phase".to_string());
            }
            if log.phase_count(Phase::End) != 0 {
                return Err("entity wrapped a lap in a stop/go run".to_string());
            }
            Ok(ScenarioMetrics {
                frames: log.frames.len() as u64,
                ..Default::default()
            })
        })();

        drop(log);
        (world, check)
    }

    /// Accident site halts the entity for its duration, then motion resumes
    /// from the current progress.
    fn run_accident_halt(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        let mut world = SimWorld::new(self.config(2.0));
        let hz = self.tick_rate_hz as f64;

        let site = AccidentSite {
            coordinates: LonLat::new(0.0, 0.0005),
            duration: Duration::from_millis(500),
            message: "multi-vehicle pileup".to_string(),
        };
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 0.001]]);
        let id = world.spawn_entity(
            EntityConfig::new("hauler", route, SpeedSource::Static(0.01))
                .with_accidents(vec![site.clone()]),
        );

        for _ in 0..world.target_ticks() {
            world.tick();
        }

        let log = world.log(id).expect("entity log");
        let log = log.borrow();

        let check = (|| {
            if log.accidents_started != 1 || log.accidents_ended != 1 {
                return Err(format!(
                    "accident lifecycle fired start={} end={}",
                    log.accidents_started, log.accidents_ended
                ));
            }
            let halted = log.phase_count(Phase::Accident);
            let expected = (0.5 * hz) as usize;
            if halted.abs_diff(expected) > 2 {
                return Err(format!(
                    "halted for {halted} ticks, expected ~{expected}"
                ));
            }
            // The last frozen frame has been smoothed onto the site
            let last_frozen = log
                .frames
                .iter()
                .filter(|f| f.phase == Some(Phase::Accident))
                .last()
                .expect("at least one frozen frame");
            let offset = last_frozen.coordinates.distance_m(site.coordinates);
            if offset > 20.0 {
                return Err(format!("frozen frame drifted {offset:.1} m off the site"));
            }
            // Motion resumed past the site afterwards
            let final_progress = log.last_frame().map(|f| f.progress).unwrap_or(0.0);
            if final_progress <= 0.5 {
                return Err(format!("no resume after accident (progress {final_progress})"));
            }
            Ok(ScenarioMetrics {
                frames: log.frames.len() as u64,
                ..Default::default()
            })
        })();

        drop(log);
        (world, check)
    }

    /// Route hot-swap mid-run: index rebuilt, progress preserved, entity
    /// repositioned onto the new corridor.
    fn run_route_swap(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        let mut world = SimWorld::new(self.config(2.0));
        let hz = self.tick_rate_hz as u64;

        let live_route: Rc<RefCell<Option<Route>>> = Rc::new(RefCell::new(None));
        let poll_handle = live_route.clone();
        let initial = Route::from_pairs(&[[0.0, 0.0], [0.0, 0.001]]);
        let id = world.spawn_entity(
            EntityConfig::new("rerouted", initial, SpeedSource::Static(0.004)).with_live_route(
                Box::new(move || poll_handle.borrow().clone()),
            ),
        );

        for _ in 0..hz {
            world.tick();
        }
        let progress_before = world.scene.entity(id).map(|e| e.progress()).unwrap_or(0.0);
        debug!(progress_before, "swapping route");
        *live_route.borrow_mut() =
            Some(Route::from_pairs(&[[0.5, 0.5], [0.5, 0.501]]));
        for _ in 0..hz {
            world.tick();
        }

        let log = world.log(id).expect("entity log");
        let log = log.borrow();

        let check = (|| {
            let progress_after = world.scene.entity(id).map(|e| e.progress()).unwrap_or(0.0);
            // Progress kept advancing smoothly through the swap
            if progress_after <= progress_before {
                return Err(format!(
                    "progress regressed across swap ({progress_before} -> {progress_after})"
                ));
            }
            let last = log.last_frame().expect("frames recorded");
            if (last.coordinates.lon - 0.5).abs() > 0.01 {
                return Err(format!(
                    "entity not on the new corridor (lon {})",
                    last.coordinates.lon
                ));
            }
            Ok(ScenarioMetrics {
                frames: log.frames.len() as u64,
                ..Default::default()
            })
        })();

        drop(log);
        (world, check)
    }

    /// Chase: every chased frame issues exactly one camera request, status
    /// pushes obey the 50ms throttle, a user gesture cancels the chase.
    fn run_chase(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        let mut world = SimWorld::new(self.config(2.0));
        let hz = self.tick_rate_hz as u64;

        let route = Route::from_pairs(&[[0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001]]);
        let id = world.spawn_entity(EntityConfig::new(
            "pursued",
            route,
            SpeedSource::Static(0.005),
        ));
        world.scene.set_chase_target(Some(id));

        let chased_ticks = 2 * hz;
        let mut status_pushes = 0u64;
        for _ in 0..chased_ticks {
            if world.tick().chase_status.is_some() {
                status_pushes += 1;
            }
        }

        let requests_while_chasing = world.camera.total_requests();

        // User pans the map: chase deactivates, synthetic moves would not
        let pose = world.pose;
        world
            .scene
            .on_camera_gesture(GestureOrigin::UserInput, &pose, 1000.0);
        for _ in 0..hz {
            world.tick();
        }

        let check = (|| {
            if requests_while_chasing != chased_ticks {
                return Err(format!(
                    "expected {chased_ticks} camera requests, saw {requests_while_chasing}"
                ));
            }
            // 50ms throttle over 2s allows ~40 pushes
            let expected = (chased_ticks as f64 / self.tick_rate_hz as f64) * 1000.0 / 50.0;
            if (status_pushes as f64) < expected * 0.8 || (status_pushes as f64) > expected * 1.2 + 2.0 {
                return Err(format!(
                    "status pushes {status_pushes}, expected ~{expected:.0}"
                ));
            }
            if world.scene.chase_target().is_some() {
                return Err("user gesture did not cancel the chase".to_string());
            }
            if world.camera.total_requests() != requests_while_chasing {
                return Err("camera requests issued after chase cancel".to_string());
            }
            Ok(ScenarioMetrics {
                frames: chased_ticks,
                camera_requests: requests_while_chasing,
                status_pushes,
                ..Default::default()
            })
        })();

        (world, check)
    }

    /// Orbital entity: propagated positions every tick, ground track
    /// recomputed at 1Hz with the configured window and step.
    fn run_orbital(&self) -> (SimWorld, Result<ScenarioMetrics, String>) {
        // Virtual wall clock near the TLE epoch
        let epoch = Utc.with_ymd_and_hms(2020, 7, 13, 12, 0, 0).unwrap();
        let mut world = SimWorld::new_at_epoch(self.config(3.0), epoch);

        let propagator = match OrbitalPropagator::from_tle(ISS_TLE1, ISS_TLE2) {
            Ok(p) => p,
            Err(e) => return (world, Err(format!("TLE rejected: {e}"))),
        };
        let id = world
            .scene
            .add_orbital("iss", OrbitalAdapter::with_defaults(propagator));

        let mut first_position = None;
        let mut last_position = None;
        let mut frames = 0u64;
        for _ in 0..world.target_ticks() {
            let report = world.tick();
            if let Some((_, coords)) = report.positions.iter().find(|(rid, _)| *rid == id) {
                frames += 1;
                if first_position.is_none() {
                    first_position = Some(*coords);
                }
                last_position = Some(*coords);
            }
        }

        let check = (|| {
            if frames < world.tick_count() {
                return Err(format!(
                    "satellite emitted {frames}/{} frames",
                    world.tick_count()
                ));
            }
            let track = world
                .scene
                .orbital_track(id)
                .ok_or("no ground track".to_string())?;
            // 600s window at 20s steps
            if track.len() != 31 {
                return Err(format!("ground track has {} points", track.len()));
            }
            let (first, last) = match (first_position, last_position) {
                (Some(f), Some(l)) => (f, l),
                _ => return Err("no positions recorded".to_string()),
            };
            let moved = first.distance_m(last);
            if moved < 1_000.0 {
                return Err(format!("satellite moved only {moved:.0} m in 3 s"));
            }
            Ok(ScenarioMetrics {
                frames,
                ..Default::default()
            })
        })();

        (world, check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass_with_default_seed() {
        let runner = ScenarioRunner::new(42).with_duration(10.0);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario.name(),
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_steady_lap_survives_frame_jitter() {
        let runner = ScenarioRunner::new(7).with_jitter(0.3);
        let result = runner.run(ScenarioId::SteadyLap);
        assert!(result.passed, "{:?}", result.failure_reason);
    }
}
