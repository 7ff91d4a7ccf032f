use serde::Serialize;

use crate::car::Car;
use crate::simulator::{round2, RaceOutcome};
use crate::tyre::Compound;

/// One row of the baseline vs optimized results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarComparison {
    pub car_id: u32,
    pub starting_compound: Compound,
    pub baseline_time: f64,
    pub optimized_time: f64,
    /// Positive when the optimized strategy is faster.
    pub improvement: f64,
}

/// Compare two runs of the same field. Cars missing from either run are skipped.
pub fn compare(cars: &[Car], baseline: &RaceOutcome, optimized: &RaceOutcome) -> Vec<CarComparison> {
    cars.iter()
        .filter_map(|car| {
            let b = baseline.total_time(car.id)?;
            let o = optimized.total_time(car.id)?;
            Some(CarComparison {
                car_id: car.id,
                starting_compound: car.initial_compound,
                baseline_time: round2(b),
                optimized_time: round2(o),
                improvement: round2(b - o),
            })
        })
        .collect()
}
