//! JSON exporter for frame-by-frame inspection of a simulation run.

use chaseview_core::telemetry::ChaseStatus;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Position of one entity in one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFrame {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
}

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Smoothed entity positions
    pub entities: Vec<EntityFrame>,

    /// Chase telemetry pushed this frame, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chase: Option<ChaseStatus>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final result
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Writes the export as pretty JSON.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_roundtrips_through_json() {
        let mut export = SimExport::new("steady_lap", 42);
        export.add_frame(SimFrame {
            time_sec: 0.016,
            entities: vec![EntityFrame {
                id: "entity-0".to_string(),
                lon: 51.42,
                lat: 35.70,
            }],
            chase: Some(ChaseStatus {
                lat: 35.70,
                lng: 51.42,
                message: None,
            }),
        });
        export.finalize(true);

        let json = serde_json::to_string(&export).unwrap();
        let parsed: SimExport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.frames.len(), 1);
        assert!(parsed.passed);
        assert_eq!(parsed.duration_sec, export.duration_sec);
    }
}
