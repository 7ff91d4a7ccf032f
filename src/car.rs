use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::tyre::Compound;

/// Compound fitted at every pit stop, whatever the car was running before.
pub const POST_PIT_COMPOUND: Compound = Compound::Medium;

/// When a car boxes. Consulted once per lap by the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "PolicyRepr", into = "PolicyRepr")]
pub enum PitPolicy {
    #[default]
    Never,
    OnLap(u32),
    OnLaps(BTreeSet<u32>),
}

// JSON shape: null | 25 | [12, 30]
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Never,
    Lap(u32),
    Laps(Vec<u32>),
}

impl From<PolicyRepr> for PitPolicy {
    fn from(repr: PolicyRepr) -> Self {
        match repr {
            PolicyRepr::Never => PitPolicy::Never,
            PolicyRepr::Lap(lap) => PitPolicy::OnLap(lap),
            PolicyRepr::Laps(laps) => PitPolicy::from_laps(laps),
        }
    }
}

impl From<PitPolicy> for PolicyRepr {
    fn from(policy: PitPolicy) -> Self {
        match policy {
            PitPolicy::Never => PolicyRepr::Never,
            PitPolicy::OnLap(lap) => PolicyRepr::Lap(lap),
            PitPolicy::OnLaps(laps) => PolicyRepr::Laps(laps.into_iter().collect()),
        }
    }
}

impl PitPolicy {
    /// An empty lap list means never pitting.
    pub fn from_laps(laps: impl IntoIterator<Item = u32>) -> Self {
        let laps: BTreeSet<u32> = laps.into_iter().collect();
        if laps.is_empty() {
            PitPolicy::Never
        } else {
            PitPolicy::OnLaps(laps)
        }
    }

    pub fn should_pit(&self, lap: u32) -> bool {
        match self {
            PitPolicy::Never => false,
            PitPolicy::OnLap(pit_lap) => *pit_lap == lap,
            PitPolicy::OnLaps(laps) => laps.contains(&lap),
        }
    }
}

/// A car entered in the race. The simulator reads it but never writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: u32,
    pub initial_compound: Compound,
    #[serde(default)]
    pub strategy: PitPolicy,
}

impl Car {
    pub fn new(id: u32, initial_compound: Compound) -> Self {
        Self {
            id,
            initial_compound,
            strategy: PitPolicy::Never,
        }
    }

    pub fn with_strategy(mut self, strategy: PitPolicy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Mutable part of a car during one run, advanced one lap at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarState {
    pub compound: Compound,
    pub tyre_age: u32,
    pub total_time: f64,
}

impl CarState {
    pub fn fresh(compound: Compound) -> Self {
        Self {
            compound,
            tyre_age: 0,
            total_time: 0.0,
        }
    }

    /// Run one lap and return the next state together with that lap's time.
    ///
    /// A pit lap is timed on the worn tyres plus `pit_lane_time`, then the car
    /// leaves on fresh `POST_PIT_COMPOUND` tyres.
    pub fn advance(self, pit: bool, pit_lane_time: f64) -> (CarState, f64) {
        let lap_time = self.compound.lap_time(self.tyre_age);
        if pit {
            let lap_time = lap_time + pit_lane_time;
            let next = CarState {
                compound: POST_PIT_COMPOUND,
                tyre_age: 0,
                total_time: self.total_time + lap_time,
            };
            (next, lap_time)
        } else {
            let next = CarState {
                compound: self.compound,
                tyre_age: self.tyre_age + 1,
                total_time: self.total_time + lap_time,
            };
            (next, lap_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        assert!(!PitPolicy::Never.should_pit(1));
        assert!(PitPolicy::OnLap(3).should_pit(3));
        assert!(!PitPolicy::OnLap(3).should_pit(4));
        let multi = PitPolicy::from_laps([30, 12]);
        assert!(multi.should_pit(12) && multi.should_pit(30));
        assert!(!multi.should_pit(13));
        assert_eq!(PitPolicy::from_laps(Vec::new()), PitPolicy::Never);
    }

    #[test]
    fn test_no_pit_ages_tyre() {
        let mut state = CarState::fresh(Compound::Hard);
        for lap in 1..=10 {
            let (next, _) = state.advance(false, 20.0);
            assert_eq!(next.tyre_age, lap);
            assert_eq!(next.compound, Compound::Hard);
            state = next;
        }
    }

    #[test]
    fn test_pit_resets_to_medium_from_any_compound() {
        for compound in Compound::ALL {
            let worn = CarState {
                compound,
                tyre_age: 7,
                total_time: 500.0,
            };
            let (next, lap_time) = worn.advance(true, 20.0);
            assert_eq!(next.tyre_age, 0);
            assert_eq!(next.compound, Compound::Medium);
            assert!((lap_time - (compound.lap_time(7) + 20.0)).abs() < 1e-9);
            assert!((next.total_time - (500.0 + lap_time)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_policy_json_shapes() {
        let never: PitPolicy = serde_json::from_str("null").unwrap();
        assert_eq!(never, PitPolicy::Never);
        let single: PitPolicy = serde_json::from_str("25").unwrap();
        assert_eq!(single, PitPolicy::OnLap(25));
        let multi: PitPolicy = serde_json::from_str("[30, 12]").unwrap();
        assert_eq!(multi, PitPolicy::from_laps([12, 30]));
        assert_eq!(serde_json::to_string(&multi).unwrap(), "[12,30]");

        let car: Car = serde_json::from_str(r#"{"id": 2, "initial_compound": "Soft"}"#).unwrap();
        assert_eq!(car, Car::new(2, Compound::Soft));
    }
}
