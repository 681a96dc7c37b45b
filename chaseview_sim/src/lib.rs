//! ChaseView deterministic simulation harness.
//!
//! Replays the engine against a virtual clock: synthetic routes, scripted
//! speed changes, accident sites, camera chases and orbital entities, with
//! every assertion reproducible from a seed.

pub mod exporter;
pub mod runner;
pub mod scenarios;
pub mod world;

pub use exporter::{EntityFrame, SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use world::{EntityLog, RecordingCamera, SimConfig, SimWorld};
