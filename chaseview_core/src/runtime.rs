//! Scene runtime - per-frame fan-out over entity drivers.
//!
//! Owns every entity's motion state, the chase controller and the clock
//! capability. The rendering host calls [`Scene::on_frame`] once per display
//! frame; each entity's update is synchronous and independent, so update
//! order between entities is irrelevant. Removing an entity stops its
//! controller and drops its state.

use crate::chase::{CameraHost, CameraPose, ChaseController, ChaseTuning, GestureOrigin};
use crate::motion::{EntityConfig, EntityMotionController, MotionObserver};
use crate::orbital::OrbitalAdapter;
use crate::route::LonLat;
use crate::telemetry::{CameraStatus, ChaseStatus};
use chaseview_env::Clock;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

enum EntityDriver {
    Route(EntityMotionController),
    Orbital { name: String, adapter: OrbitalAdapter },
}

/// Everything one frame produced for the host and UI layer.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Smoothed positions of every entity that emitted this frame
    pub positions: Vec<(Uuid, LonLat)>,

    /// Throttled chase telemetry, when the chased entity moved
    pub chase_status: Option<ChaseStatus>,
}

/// Container for all entity drivers in one rendered scene.
pub struct Scene<C: Clock> {
    clock: C,
    drivers: HashMap<Uuid, EntityDriver>,
    chase: ChaseController,
}

impl<C: Clock> Scene<C> {
    /// Scene with default chase tuning.
    pub fn new(clock: C) -> Self {
        Self::with_chase_tuning(clock, ChaseTuning::default())
    }

    pub fn with_chase_tuning(clock: C, tuning: ChaseTuning) -> Self {
        Self {
            clock,
            drivers: HashMap::new(),
            chase: ChaseController::new(tuning),
        }
    }

    /// Attach a route-based entity. Motion state is created here and lives
    /// until the entity is removed.
    pub fn add_entity(&mut self, config: EntityConfig, observer: Box<dyn MotionObserver>) -> Uuid {
        let controller = EntityMotionController::new(config, observer);
        let id = controller.id();
        debug!(entity = %controller.name(), %id, "entity attached");
        self.drivers.insert(id, EntityDriver::Route(controller));
        id
    }

    /// Attach a satellite driven by orbital propagation.
    pub fn add_orbital(&mut self, name: impl Into<String>, adapter: OrbitalAdapter) -> Uuid {
        let id = Uuid::new_v4();
        let name = name.into();
        debug!(entity = %name, %id, "orbital entity attached");
        self.drivers.insert(id, EntityDriver::Orbital { name, adapter });
        id
    }

    /// Detach an entity: it is no longer ticked and its state is released.
    /// A removed chase target also clears the chase.
    pub fn remove_entity(&mut self, id: Uuid) -> bool {
        let removed = self.drivers.remove(&id).is_some();
        if removed && self.chase.target() == Some(id) {
            self.chase.clear_target();
        }
        removed
    }

    pub fn entity_count(&self) -> usize {
        self.drivers.len()
    }

    /// Route-based entity accessor (telemetry, progress inspection).
    pub fn entity(&self, id: Uuid) -> Option<&EntityMotionController> {
        match self.drivers.get(&id) {
            Some(EntityDriver::Route(controller)) => Some(controller),
            _ => None,
        }
    }

    /// Orbital ground track accessor for the host's track-line layer.
    pub fn orbital_track(&self, id: Uuid) -> Option<&crate::route::Route> {
        match self.drivers.get(&id) {
            Some(EntityDriver::Orbital { adapter, .. }) => Some(adapter.ground_track()),
            _ => None,
        }
    }

    /// Open or close the asset gate of a route-based entity.
    pub fn set_asset_ready(&mut self, id: Uuid, ready: bool) -> bool {
        match self.drivers.get_mut(&id) {
            Some(EntityDriver::Route(controller)) => {
                controller.set_asset_ready(ready);
                true
            }
            _ => false,
        }
    }

    /// Select the chased entity (None stops chasing).
    pub fn set_chase_target(&mut self, id: Option<Uuid>) {
        match id {
            Some(id) => self.chase.set_target(id),
            None => self.chase.clear_target(),
        }
    }

    pub fn chase_target(&self) -> Option<Uuid> {
        self.chase.target()
    }

    /// Advance every entity one frame and route the chased entity's frame
    /// into the chase controller.
    pub fn on_frame(&mut self, pose: &CameraPose, camera: &mut dyn CameraHost) -> FrameReport {
        let now = self.clock.now();
        let wall = self.clock.utc_now();
        let chased = self.chase.target();

        let mut positions = Vec::with_capacity(self.drivers.len());
        let mut chase_status = None;

        for (id, driver) in self.drivers.iter_mut() {
            let emitted = match driver {
                EntityDriver::Route(controller) => controller.tick(now).map(|frame| {
                    (
                        frame.coordinates,
                        controller.accident_message().map(str::to_string),
                    )
                }),
                EntityDriver::Orbital { adapter, .. } => adapter
                    .tick(now, wall)
                    .map(|frame| (frame.coordinates, None)),
            };

            if let Some((coords, message)) = emitted {
                positions.push((*id, coords));
                if chased == Some(*id) {
                    chase_status =
                        self.chase
                            .follow(now, *id, coords, message.as_deref(), pose, camera);
                }
            }
        }

        FrameReport {
            positions,
            chase_status,
        }
    }

    /// Apply a camera gesture. User gestures yield camera telemetry and, if
    /// a chase is active, deactivate it before the next chase request;
    /// synthetic moves do neither.
    pub fn on_camera_gesture(
        &mut self,
        origin: GestureOrigin,
        pose: &CameraPose,
        scale: f64,
    ) -> Option<CameraStatus> {
        if self.chase.on_gesture(origin) {
            debug!("chase deactivated by user gesture");
        }
        match origin {
            GestureOrigin::UserInput => Some(CameraStatus {
                lat: pose.center.lat,
                lng: pose.center.lon,
                zoom: pose.zoom,
                scale,
            }),
            GestureOrigin::Synthetic => None,
        }
    }
}
