use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::{fs, path::Path};

use crate::car::Car;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    pub total_laps: u32,
    /// Seconds added on top of the lap time when a car pits.
    pub pit_lane_time: f64,
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_laps == 0 {
            return Err(ConfigError::NoLaps);
        }
        if !(self.pit_lane_time.is_finite() && self.pit_lane_time > 0.0) {
            return Err(ConfigError::InvalidPitLaneTime(self.pit_lane_time));
        }
        Ok(())
    }
}

/// Candidate pit laps, ascending and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WindowRepr", into = "Vec<u32>")]
pub struct PitWindow(Vec<u32>);

#[derive(Deserialize)]
#[serde(untagged)]
enum WindowRepr {
    Laps(Vec<u32>),
    Range { first: u32, last: u32 },
}

impl From<WindowRepr> for PitWindow {
    fn from(repr: WindowRepr) -> Self {
        match repr {
            WindowRepr::Laps(laps) => PitWindow::from_laps(laps),
            WindowRepr::Range { first, last } => PitWindow::range(first, last),
        }
    }
}

impl From<PitWindow> for Vec<u32> {
    fn from(window: PitWindow) -> Self {
        window.0
    }
}

impl PitWindow {
    pub fn from_laps(laps: impl IntoIterator<Item = u32>) -> Self {
        let laps: BTreeSet<u32> = laps.into_iter().collect();
        PitWindow(laps.into_iter().collect())
    }

    /// Inclusive range; empty when `first > last`.
    pub fn range(first: u32, last: u32) -> Self {
        PitWindow((first..=last).collect())
    }

    pub fn laps(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self, race: &RaceConfig) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::EmptyPitWindow);
        }
        if let Some(&lap) = self.0.iter().find(|&&lap| lap == 0 || lap > race.total_laps) {
            return Err(ConfigError::LapOutsideRace {
                lap,
                total_laps: race.total_laps,
            });
        }
        Ok(())
    }
}

/// Penalty weights of the two cardinality constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    /// P1: exactly-S stops per car.
    pub stops: f64,
    /// P2: per-lap pit lane capacity.
    pub capacity: f64,
}

impl PenaltyWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("stops", self.stops), ("capacity", self.capacity)] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidPenalty { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerParams {
    pub pit_window: PitWindow,
    /// Exact number of stops required per car id. Cars not listed only feel
    /// the capacity penalty.
    pub stops: BTreeMap<u32, u32>,
    /// Max cars in the pit lane on any one lap.
    pub capacity: u32,
    pub penalties: PenaltyWeights,
}

impl OptimizerParams {
    /// Checks that need the car list; nothing is simulated before this passes.
    pub fn validate(&self, race: &RaceConfig, cars: &[Car]) -> Result<(), ConfigError> {
        self.pit_window.validate(race)?;
        self.penalties.validate()?;
        if let Some(&unknown) = self
            .stops
            .keys()
            .find(|id| !cars.iter().any(|car| car.id == **id))
        {
            return Err(ConfigError::UnknownCar(unknown));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub num_reads: usize,
    pub sweeps: usize,
    pub seed: u64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            num_reads: 10,
            sweeps: 1000,
            seed: 0,
        }
    }
}

/// Complete optimization input, as stored in a scenario JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub race: RaceConfig,
    pub cars: Vec<Car>,
    pub optimizer: OptimizerParams,
    #[serde(default)]
    pub solver: SolverParams,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let scenario_err = |message: String| ConfigError::Scenario {
            path: path.display().to_string(),
            message,
        };
        let data = fs::read_to_string(path).map_err(|e| scenario_err(e.to_string()))?;
        let scenario: Scenario =
            serde_json::from_str(&data).map_err(|e| scenario_err(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.race.validate()?;
        validate_cars(&self.cars)?;
        self.optimizer.validate(&self.race, &self.cars)
    }
}

/// Non-empty, unique ids.
pub fn validate_cars(cars: &[Car]) -> Result<(), ConfigError> {
    if cars.is_empty() {
        return Err(ConfigError::NoCars);
    }
    let mut seen = BTreeSet::new();
    for car in cars {
        if !seen.insert(car.id) {
            return Err(ConfigError::DuplicateCar(car.id));
        }
    }
    Ok(())
}
