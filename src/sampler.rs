use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::car::{Car, PitPolicy};
use crate::config::{validate_cars, PitWindow};
use crate::error::ConfigError;
use crate::simulator::Simulator;

/// Marginal time cost `q[(car, lap)]`: total time when pitting once on `lap`
/// minus the car's no-pit baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable {
    entries: BTreeMap<(u32, u32), f64>,
}

impl CostTable {
    pub fn from_entries(entries: impl IntoIterator<Item = ((u32, u32), f64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, car_id: u32, lap: u32) -> Option<f64> {
        self.entries.get(&(car_id, lap)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32), f64)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    /// Car ids present, ascending.
    pub fn car_ids(&self) -> Vec<u32> {
        let ids: BTreeSet<u32> = self.entries.keys().map(|(car, _)| *car).collect();
        ids.into_iter().collect()
    }

    /// Laps present, ascending.
    pub fn laps(&self) -> Vec<u32> {
        let laps: BTreeSet<u32> = self.entries.keys().map(|(_, lap)| *lap).collect();
        laps.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest |q|, for sizing penalty weights.
    pub fn max_abs(&self) -> f64 {
        self.entries.values().fold(0.0, |m, v| m.max(v.abs()))
    }
}

#[derive(Serialize)]
struct CostEntry {
    car_id: u32,
    lap: u32,
    delta: f64,
}

impl Serialize for CostTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|((car_id, lap), delta)| CostEntry {
            car_id,
            lap,
            delta,
        }))
    }
}

/// Builds the cost table by re-running the simulator once per (car, lap).
pub struct CostSampler<'a> {
    sim: &'a Simulator,
}

impl<'a> CostSampler<'a> {
    pub fn new(sim: &'a Simulator) -> Self {
        Self { sim }
    }

    pub fn sample(&self, cars: &[Car], window: &PitWindow) -> Result<CostTable, ConfigError> {
        validate_cars(cars)?;
        window.validate(self.sim.race())?;

        let baseline_cars: Vec<Car> = cars
            .iter()
            .map(|car| car.clone().with_strategy(PitPolicy::Never))
            .collect();
        let baseline = self.sim.run(&baseline_cars)?.totals();

        let jobs: Vec<(&Car, u32)> = baseline_cars
            .iter()
            .flat_map(|car| window.laps().iter().map(move |&lap| (car, lap)))
            .collect();
        tracing::debug!(
            "sampling {} pit perturbations ({} cars x {} laps)",
            jobs.len(),
            cars.len(),
            window.len()
        );

        // Each run sees only its own car: pit lane contention is priced by
        // the QUBO capacity penalty, not simulated here.
        let deltas = jobs
            .par_iter()
            .map(|&(car, lap)| {
                let solo = car.clone().with_strategy(PitPolicy::OnLap(lap));
                let out = self.sim.run(std::slice::from_ref(&solo))?;
                let total = out.total_time(car.id).unwrap_or_default();
                let base = baseline.get(&car.id).copied().unwrap_or_default();
                Ok(((car.id, lap), total - base))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(CostTable::from_entries(deltas))
    }
}
