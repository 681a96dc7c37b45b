//! ChaseView Core - Entity Motion & Camera Synchronization Engine
//!
//! The per-frame algorithms behind a 3D map scene of moving entities:
//! 1. **Route Engine**: cumulative arc-length indexing over geographic
//!    polylines, answering "position at distance D"
//! 2. **Motion Engine**: speed integration, spring-tracked progress, phase
//!    state machine (start/moving/stop/end), accident sub-state
//! 3. **Chase Engine**: screen-space tiered camera transitions for a
//!    followed entity, with user-gesture arbitration
//! 4. **Orbit Engine**: SGP4 propagation adapted into the same smoothed
//!    position stream as route-based entities

pub mod accident;
pub mod chase;
pub mod geomath;
pub mod motion;
pub mod orbital;
pub mod route;
pub mod runtime;
pub mod telemetry;

// Re-export key types for convenience
pub use accident::{AccidentConfig, AccidentSite};
pub use chase::{
    CameraHost, CameraPose, CameraTransition, ChaseController, ChaseStrategy, ChaseTuning,
    EasingKind, GestureOrigin,
};
pub use motion::{
    EntityConfig, EntityMotionController, MotionFrame, MotionObserver, MotionTuning, Phase,
    RouteSource, SpeedSource,
};
pub use orbital::{OrbitalAdapter, OrbitalError, OrbitalPropagator, OrbitalTuning, TrackConfig};
pub use route::{LonLat, Route, RouteIndex};
pub use runtime::{FrameReport, Scene};
pub use telemetry::{CameraStatus, ChaseStatus, CompassDirection};
