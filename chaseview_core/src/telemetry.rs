//! Telemetry surfaces reported to the UI layer.
//!
//! The engine never renders UI; it produces small serializable status
//! records on camera interaction and chase updates, plus the compass
//! helpers the status panels format bearings with.

use crate::route::Route;
use serde::{Deserialize, Serialize};

/// Camera telemetry emitted on user camera interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
    pub scale: f64,
}

/// Chase telemetry pushed (throttled) while an entity is being followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseStatus {
    pub lat: f64,
    pub lng: f64,

    /// Operator-facing note, e.g. the active accident message
    pub message: Option<String>,
}

/// Eight-way compass direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassDirection {
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

impl CompassDirection {
    const ALL: [CompassDirection; 8] = [
        CompassDirection::North,
        CompassDirection::Northeast,
        CompassDirection::East,
        CompassDirection::Southeast,
        CompassDirection::South,
        CompassDirection::Southwest,
        CompassDirection::West,
        CompassDirection::Northwest,
    ];

    /// Nearest direction for a bearing in degrees (any representation).
    pub fn from_bearing(bearing_deg: f64) -> Self {
        let normalized = bearing_deg.rem_euclid(360.0);
        let index = (normalized / 45.0).round() as usize % 8;
        Self::ALL[index]
    }

    pub fn label(self) -> &'static str {
        match self {
            CompassDirection::North => "North",
            CompassDirection::Northeast => "Northeast",
            CompassDirection::East => "East",
            CompassDirection::Southeast => "Southeast",
            CompassDirection::South => "South",
            CompassDirection::Southwest => "Southwest",
            CompassDirection::West => "West",
            CompassDirection::Northwest => "Northwest",
        }
    }
}

/// Overall direction summary for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteDirection {
    /// Start-to-end bearing in signed degrees
    pub bearing: f64,

    /// None for routes with fewer than two points
    pub direction: Option<CompassDirection>,
}

/// Summarize where a route leads, start to end.
pub fn route_direction(route: &Route) -> RouteDirection {
    if route.len() < 2 {
        return RouteDirection {
            bearing: 0.0,
            direction: None,
        };
    }
    let bearing = route.overall_bearing();
    RouteDirection {
        bearing,
        direction: Some(CompassDirection::from_bearing(bearing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bearing_cardinals() {
        assert_eq!(CompassDirection::from_bearing(0.0), CompassDirection::North);
        assert_eq!(CompassDirection::from_bearing(90.0), CompassDirection::East);
        assert_eq!(CompassDirection::from_bearing(180.0), CompassDirection::South);
        assert_eq!(CompassDirection::from_bearing(270.0), CompassDirection::West);
    }

    #[test]
    fn test_from_bearing_rounds_and_wraps() {
        assert_eq!(
            CompassDirection::from_bearing(44.0),
            CompassDirection::Northeast
        );
        assert_eq!(
            CompassDirection::from_bearing(350.0),
            CompassDirection::North
        );
        // Signed bearings work too
        assert_eq!(CompassDirection::from_bearing(-90.0), CompassDirection::West);
    }

    #[test]
    fn test_route_direction_northbound() {
        let route = Route::from_pairs(&[[0.0, 0.0], [0.0, 1.0]]);
        let summary = route_direction(&route);
        assert!(summary.bearing.abs() < 1e-6);
        assert_eq!(summary.direction, Some(CompassDirection::North));
    }

    #[test]
    fn test_route_direction_degenerate() {
        let route = Route::from_pairs(&[[12.0, 34.0]]);
        let summary = route_direction(&route);
        assert_eq!(summary.bearing, 0.0);
        assert_eq!(summary.direction, None);
    }
}
