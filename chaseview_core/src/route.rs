//! The "ROUTE" Engine - Geographic Polylines and Arc-Length Indexing
//!
//! Solves the "position at distance D" problem for entity routes:
//! - Cumulative great-circle arc length per vertex (built once per route)
//! - Binary-search lookup + linear interpolation within a segment
//! - Cheap hot-swap detection via endpoint comparison
//!
//! The index is rebuilt whenever the route reference changes, but progress
//! fractions are preserved across rebuilds so a route update repositions an
//! entity instead of teleporting it.

use geo::{HaversineBearing, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// Epsilon floor for segment lengths to guard divide-by-near-zero.
const MIN_SEGMENT_METERS: f64 = 1e-9;

/// A geographic coordinate in `[longitude, latitude]` order (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude in degrees, positive East
    pub lon: f64,

    /// Latitude in degrees, positive North
    pub lat: f64,
}

impl LonLat {
    /// Create a coordinate from longitude/latitude degrees.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convert to a `geo` point (x = lon, y = lat).
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Great-circle (haversine) distance to another coordinate, in meters.
    pub fn distance_m(self, other: LonLat) -> f64 {
        self.to_point().haversine_distance(&other.to_point())
    }

    /// Initial great-circle bearing to another coordinate.
    ///
    /// Degrees, 0 = North, 90 = East, signed range [-180, 180].
    pub fn bearing_to(self, other: LonLat) -> f64 {
        self.to_point().haversine_bearing(other.to_point())
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// An ordered polyline of geographic coordinates an entity travels along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    points: Vec<LonLat>,
}

impl Route {
    /// Create a route from coordinates.
    pub fn new(points: Vec<LonLat>) -> Self {
        Self { points }
    }

    /// Create a route from `[lon, lat]` pairs.
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Self {
        Self::new(pairs.iter().copied().map(LonLat::from).collect())
    }

    /// All vertices in order.
    pub fn points(&self) -> &[LonLat] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First vertex, if any.
    pub fn first(&self) -> Option<LonLat> {
        self.points.first().copied()
    }

    /// Last vertex, if any.
    pub fn last(&self) -> Option<LonLat> {
        self.points.last().copied()
    }

    /// Hot-swap detection: compares length and first/last vertices only.
    ///
    /// Deep equality would cost O(n) per frame for every entity; endpoint
    /// comparison is cheap enough to run every tick.
    pub fn endpoints_differ(&self, other: &Route) -> bool {
        if self.points.len() != other.points.len() {
            return true;
        }
        match (self.first(), other.first(), self.last(), other.last()) {
            (Some(a0), Some(b0), Some(al), Some(bl)) => a0 != b0 || al != bl,
            _ => self.points.len() != other.points.len(),
        }
    }

    /// Overall intended route direction: initial bearing from the first
    /// vertex to the last, in signed degrees. Routes with fewer than two
    /// points have no direction and report 0.
    pub fn overall_bearing(&self) -> f64 {
        match (self.first(), self.last()) {
            (Some(start), Some(end)) if self.points.len() >= 2 => start.bearing_to(end),
            _ => 0.0,
        }
    }
}

/// A resolved position along a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePosition {
    /// Interpolated coordinate
    pub coords: LonLat,

    /// Index of the segment containing the position
    pub segment: usize,

    /// Fraction [0, 1] within that segment
    pub segment_t: f64,
}

/// Cumulative arc-length index over a route.
///
/// Invariants: `cumulative[0] == 0`, strictly non-decreasing,
/// `cumulative[n-1] == total_meters()`.
#[derive(Debug, Clone)]
pub struct RouteIndex {
    points: Vec<LonLat>,
    cumulative: Vec<f64>,
    total: f64,
}

impl RouteIndex {
    /// Build the cumulative-distance index for a route.
    pub fn build(route: &Route) -> Self {
        let points = route.points().to_vec();
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;

        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].distance_m(*point);
            }
            cumulative.push(total);
        }

        Self {
            points,
            cumulative,
            total,
        }
    }

    /// Total route length in meters.
    pub fn total_meters(&self) -> f64 {
        self.total
    }

    /// Resolve the position at `distance_m` meters along the route.
    ///
    /// The distance is clamped to `[0, total]`. Degenerate routes (fewer
    /// than two points, or zero total length) return the sole point with
    /// the distance ignored; an empty route has no position.
    pub fn position_at(&self, distance_m: f64) -> Option<RoutePosition> {
        let first = *self.points.first()?;
        if self.points.len() < 2 || self.total <= 0.0 {
            return Some(RoutePosition {
                coords: first,
                segment: 0,
                segment_t: 0.0,
            });
        }

        let distance = distance_m.clamp(0.0, self.total);

        // Last vertex whose cumulative distance is <= the query.
        let upper = self.cumulative.partition_point(|&d| d <= distance);
        let segment = upper.saturating_sub(1).min(self.points.len() - 2);

        let seg_start = self.cumulative[segment];
        let seg_len = (self.cumulative[segment + 1] - seg_start).max(MIN_SEGMENT_METERS);
        let t = ((distance - seg_start) / seg_len).clamp(0.0, 1.0);

        let a = self.points[segment];
        let b = self.points[segment + 1];
        let coords = LonLat::new(a.lon + (b.lon - a.lon) * t, a.lat + (b.lat - a.lat) * t);

        Some(RoutePosition {
            coords,
            segment,
            segment_t: t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meridian_route() -> Route {
        Route::from_pairs(&[[0.0, 0.0], [0.0, 0.5], [0.0, 1.0]])
    }

    #[test]
    fn test_index_invariants() {
        let index = RouteIndex::build(&meridian_route());

        assert_eq!(index.cumulative[0], 0.0);
        assert!(index
            .cumulative
            .windows(2)
            .all(|pair| pair[1] >= pair[0]));
        assert_relative_eq!(
            index.cumulative[index.cumulative.len() - 1],
            index.total_meters()
        );
    }

    #[test]
    fn test_position_at_endpoints() {
        let route = meridian_route();
        let index = RouteIndex::build(&route);

        let start = index.position_at(0.0).unwrap();
        assert_eq!(start.coords, route.first().unwrap());

        let end = index.position_at(index.total_meters()).unwrap();
        assert_relative_eq!(end.coords.lat, 1.0, epsilon = 1e-9);
        assert_relative_eq!(end.coords.lon, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_position_at_clamps_out_of_range() {
        let index = RouteIndex::build(&meridian_route());

        let before = index.position_at(-500.0).unwrap();
        assert_eq!(before.coords, LonLat::new(0.0, 0.0));

        let after = index.position_at(index.total_meters() + 500.0).unwrap();
        assert_relative_eq!(after.coords.lat, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_position_at_midpoint() {
        let index = RouteIndex::build(&meridian_route());
        let mid = index.position_at(index.total_meters() / 2.0).unwrap();

        assert_relative_eq!(mid.coords.lat, 0.5, epsilon = 1e-6);
        assert_relative_eq!(mid.coords.lon, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_position_at_is_monotonic() {
        let index = RouteIndex::build(&meridian_route());
        let total = index.total_meters();

        let mut prev_lat = f64::NEG_INFINITY;
        for step in 0..=100 {
            let d = total * (step as f64) / 100.0;
            let pos = index.position_at(d).unwrap();
            assert!(pos.coords.lat >= prev_lat, "lat regressed at d={d}");
            prev_lat = pos.coords.lat;
        }
    }

    #[test]
    fn test_degenerate_single_point_route() {
        let route = Route::from_pairs(&[[51.42, 35.70]]);
        let index = RouteIndex::build(&route);

        assert_eq!(index.total_meters(), 0.0);
        let pos = index.position_at(1234.0).unwrap();
        assert_eq!(pos.coords, LonLat::new(51.42, 35.70));
        assert_eq!(pos.segment, 0);
    }

    #[test]
    fn test_empty_route_has_no_position() {
        let index = RouteIndex::build(&Route::new(Vec::new()));
        assert!(index.position_at(0.0).is_none());
    }

    #[test]
    fn test_endpoints_differ() {
        let a = Route::from_pairs(&[[0.0, 0.0], [1.0, 1.0]]);
        let same = Route::from_pairs(&[[0.0, 0.0], [1.0, 1.0]]);
        let moved_end = Route::from_pairs(&[[0.0, 0.0], [1.0, 2.0]]);
        let longer = Route::from_pairs(&[[0.0, 0.0], [0.5, 0.5], [1.0, 1.0]]);

        assert!(!a.endpoints_differ(&same));
        assert!(a.endpoints_differ(&moved_end));
        assert!(a.endpoints_differ(&longer));
    }

    #[test]
    fn test_overall_bearing_northbound() {
        let route = meridian_route();
        assert_relative_eq!(route.overall_bearing(), 0.0, epsilon = 1e-6);

        let single = Route::from_pairs(&[[3.0, 4.0]]);
        assert_eq!(single.overall_bearing(), 0.0);
    }
}
