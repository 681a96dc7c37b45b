//! The "ACCIDENT" Engine - Proximity-Triggered Transient Halts
//!
//! A layered sub-state on top of normal route motion: when an entity comes
//! within a configured radius of an accident site, it freezes at the site
//! coordinate for the site's duration, then resumes from its current
//! progress. Each site fires at most once per lap; lap wrap re-arms it.
//!
//! Resolution is checked per tick (`now - started_at >= duration`) rather
//! than scheduled, so arbitrary tick jitter cannot strand an entity.

use crate::route::LonLat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the AccidentManager
#[derive(Debug, Clone)]
pub struct AccidentConfig {
    /// Trigger radius around a site in meters (default: 10.0)
    pub proximity_radius_m: f64,
}

impl Default for AccidentConfig {
    fn default() -> Self {
        Self {
            proximity_radius_m: 10.0,
        }
    }
}

/// A configured accident location on or near a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentSite {
    /// Where the halt happens
    pub coordinates: LonLat,

    /// How long the entity stays frozen
    pub duration: Duration,

    /// Operator-facing description, surfaced through chase telemetry
    pub message: String,
}

/// A state change reported by [`AccidentManager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccidentEvent {
    /// An accident began at the given site index this tick
    Triggered(usize),

    /// The active accident ran out its duration this tick
    Resolved,
}

#[derive(Debug, Clone)]
struct ActiveAccident {
    site: usize,
    started_at: Duration,
}

/// Per-entity accident runtime state.
pub struct AccidentManager {
    sites: Vec<AccidentSite>,
    triggered_this_lap: Vec<bool>,
    active: Option<ActiveAccident>,
    config: AccidentConfig,
}

impl AccidentManager {
    /// Create a manager for the given sites.
    pub fn new(sites: Vec<AccidentSite>, config: AccidentConfig) -> Self {
        let count = sites.len();
        Self {
            sites,
            triggered_this_lap: vec![false; count],
            active: None,
            config,
        }
    }

    /// Whether the entity is currently halted.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The site of the active accident, if any.
    pub fn active_site(&self) -> Option<&AccidentSite> {
        self.active.as_ref().and_then(|a| self.sites.get(a.site))
    }

    /// The coordinate the entity is frozen at, if halted.
    pub fn frozen_position(&self) -> Option<LonLat> {
        self.active_site().map(|site| site.coordinates)
    }

    /// Advance the accident state machine one tick.
    ///
    /// While active, checks the timed resolution. While inactive, checks
    /// whether `position` is within the proximity radius of a site that has
    /// not yet fired this lap. At most one event is reported per tick.
    pub fn update(&mut self, now: Duration, position: LonLat) -> Option<AccidentEvent> {
        if let Some(active) = &self.active {
            let site = self.sites.get(active.site)?;
            if now.saturating_sub(active.started_at) >= site.duration {
                self.active = None;
                return Some(AccidentEvent::Resolved);
            }
            return None;
        }

        for (i, site) in self.sites.iter().enumerate() {
            if self.triggered_this_lap[i] {
                continue;
            }
            if position.distance_m(site.coordinates) <= self.config.proximity_radius_m {
                self.triggered_this_lap[i] = true;
                self.active = Some(ActiveAccident {
                    site: i,
                    started_at: now,
                });
                return Some(AccidentEvent::Triggered(i));
            }
        }

        None
    }

    /// Re-arm all sites for the next lap.
    pub fn lap_wrapped(&mut self) {
        for flag in &mut self.triggered_this_lap {
            *flag = false;
        }
    }

    /// The site at a given index (for host notifications).
    pub fn site(&self, index: usize) -> Option<&AccidentSite> {
        self.sites.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(sites: Vec<AccidentSite>) -> AccidentManager {
        AccidentManager::new(sites, AccidentConfig::default())
    }

    fn site_at(lon: f64, lat: f64, secs: u64) -> AccidentSite {
        AccidentSite {
            coordinates: LonLat::new(lon, lat),
            duration: Duration::from_secs(secs),
            message: "collision ahead".to_string(),
        }
    }

    #[test]
    fn test_trigger_within_radius() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 5)]);

        // ~5.5 m north of the site
        let near = LonLat::new(0.0, 0.00005);
        let event = mgr.update(Duration::from_secs(1), near);

        assert_eq!(event, Some(AccidentEvent::Triggered(0)));
        assert!(mgr.is_active());
        assert_eq!(mgr.frozen_position(), Some(LonLat::new(0.0, 0.0)));
    }

    #[test]
    fn test_no_trigger_outside_radius() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 5)]);

        // ~111 m north of the site
        let far = LonLat::new(0.0, 0.001);
        assert_eq!(mgr.update(Duration::from_secs(1), far), None);
        assert!(!mgr.is_active());
    }

    #[test]
    fn test_resolves_after_duration() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 5)]);
        let near = LonLat::new(0.0, 0.0);

        mgr.update(Duration::from_secs(1), near);
        assert!(mgr.is_active());

        // Still frozen before the deadline
        assert_eq!(mgr.update(Duration::from_secs(4), near), None);
        assert!(mgr.is_active());

        // Released at/after the deadline
        assert_eq!(
            mgr.update(Duration::from_secs(6), near),
            Some(AccidentEvent::Resolved)
        );
        assert!(!mgr.is_active());
    }

    #[test]
    fn test_no_retrigger_same_lap() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 1)]);
        let near = LonLat::new(0.0, 0.0);

        mgr.update(Duration::from_secs(1), near);
        mgr.update(Duration::from_secs(3), near); // resolves

        // Still sitting on the site, but the lap flag blocks a re-fire
        assert_eq!(mgr.update(Duration::from_secs(4), near), None);
        assert!(!mgr.is_active());
    }

    #[test]
    fn test_lap_wrap_rearms_sites() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 1)]);
        let near = LonLat::new(0.0, 0.0);

        mgr.update(Duration::from_secs(1), near);
        mgr.update(Duration::from_secs(3), near); // resolves
        mgr.lap_wrapped();

        assert_eq!(
            mgr.update(Duration::from_secs(5), near),
            Some(AccidentEvent::Triggered(0))
        );
    }

    #[test]
    fn test_multiple_sites_first_match_wins() {
        let mut mgr = manager(vec![site_at(0.0, 0.0, 1), site_at(0.0, 0.00002, 1)]);

        // Within radius of both; the first configured site fires
        let event = mgr.update(Duration::from_secs(1), LonLat::new(0.0, 0.00001));
        assert_eq!(event, Some(AccidentEvent::Triggered(0)));
    }
}
