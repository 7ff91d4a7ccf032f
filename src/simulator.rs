use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::car::{Car, CarState};
use crate::config::{validate_cars, RaceConfig};
use crate::error::ConfigError;
use crate::tyre::Compound;

/// Read-only result for one car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarOutcome {
    pub car_id: u32,
    /// Per-lap times, rounded to 2 decimals.
    pub lap_times: Vec<f64>,
    /// Unrounded sum of all lap times.
    pub total_time: f64,
    pub pit_laps: Vec<u32>,
    pub final_compound: Compound,
}

/// Outcome of one race, cars in the order they were entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub cars: Vec<CarOutcome>,
}

impl RaceOutcome {
    pub fn car(&self, car_id: u32) -> Option<&CarOutcome> {
        self.cars.iter().find(|c| c.car_id == car_id)
    }

    pub fn total_time(&self, car_id: u32) -> Option<f64> {
        self.car(car_id).map(|c| c.total_time)
    }

    pub fn totals(&self) -> BTreeMap<u32, f64> {
        self.cars.iter().map(|c| (c.car_id, c.total_time)).collect()
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Deterministic lap-by-lap race simulator.
#[derive(Debug, Clone, Copy)]
pub struct Simulator {
    race: RaceConfig,
}

impl Simulator {
    pub fn new(race: RaceConfig) -> Result<Self, ConfigError> {
        race.validate()?;
        Ok(Self { race })
    }

    pub fn race(&self) -> &RaceConfig {
        &self.race
    }

    /// Run laps `1..=total_laps`, cars in slice order within each lap.
    ///
    /// Every run starts each car from fresh tyres of its initial compound,
    /// so repeated runs over the same cars give identical results.
    pub fn run(&self, cars: &[Car]) -> Result<RaceOutcome, ConfigError> {
        validate_cars(cars)?;
        let laps = self.race.total_laps as usize;

        let mut states: Vec<CarState> = cars
            .iter()
            .map(|car| CarState::fresh(car.initial_compound))
            .collect();
        let mut outcomes: Vec<CarOutcome> = cars
            .iter()
            .map(|car| CarOutcome {
                car_id: car.id,
                lap_times: Vec::with_capacity(laps),
                total_time: 0.0,
                pit_laps: Vec::new(),
                final_compound: car.initial_compound,
            })
            .collect();

        for lap in 1..=self.race.total_laps {
            for ((car, state), outcome) in cars.iter().zip(states.iter_mut()).zip(outcomes.iter_mut()) {
                let pit = car.strategy.should_pit(lap);
                let (next, lap_time) = state.advance(pit, self.race.pit_lane_time);
                *state = next;
                if pit {
                    outcome.pit_laps.push(lap);
                }
                outcome.lap_times.push(round2(lap_time));
            }
        }

        for (state, outcome) in states.iter().zip(outcomes.iter_mut()) {
            outcome.total_time = state.total_time;
            outcome.final_compound = state.compound;
        }
        Ok(RaceOutcome { cars: outcomes })
    }
}
