//! Motion and chase scenarios for deterministic simulation.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Full laps at constant speed: Start/Moving/End ordering
    SteadyLap,

    /// Speed toggled to zero and back: Stop fires once, Moving resumes
    StopAndGo,

    /// Proximity-triggered halt with timed resume
    AccidentHalt,

    /// Route hot-swapped mid-run without teleporting the entity
    RouteSwap,

    /// Camera follows a chased entity, user gesture cancels
    Chase,

    /// Satellite driven by TLE propagation with ground track refresh
    Orbital,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadyLap,
            ScenarioId::StopAndGo,
            ScenarioId::AccidentHalt,
            ScenarioId::RouteSwap,
            ScenarioId::Chase,
            ScenarioId::Orbital,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadyLap => "steady_lap",
            ScenarioId::StopAndGo => "stop_and_go",
            ScenarioId::AccidentHalt => "accident_halt",
            ScenarioId::RouteSwap => "route_swap",
            ScenarioId::Chase => "chase",
            ScenarioId::Orbital => "orbital",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadyLap => "Constant-speed laps: one Start per lap, End at wrap, no Stop",
            ScenarioId::StopAndGo => "Speed dropped to zero mid-route: Stop exactly once, Moving resumes",
            ScenarioId::AccidentHalt => "10m proximity trigger freezes the entity for the configured duration",
            ScenarioId::RouteSwap => "Live route replaced mid-run, progress preserved across the rebuild",
            ScenarioId::Chase => "Tiered snap/ease camera requests, 50ms status throttle, gesture cancel",
            ScenarioId::Orbital => "SGP4-driven satellite with 1Hz ground-track refresh",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_lap" | "steadylap" => Ok(ScenarioId::SteadyLap),
            "stop_and_go" | "stopandgo" => Ok(ScenarioId::StopAndGo),
            "accident_halt" | "accident" => Ok(ScenarioId::AccidentHalt),
            "route_swap" | "routeswap" => Ok(ScenarioId::RouteSwap),
            "chase" => Ok(ScenarioId::Chase),
            "orbital" | "satellite" => Ok(ScenarioId::Orbital),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_names_parse_back() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert!("warp_speed".parse::<ScenarioId>().is_err());
    }
}
