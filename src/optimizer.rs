use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::car::{Car, PitPolicy};
use crate::config::{validate_cars, OptimizerParams};
use crate::error::{PlannerError, SolverError};
use crate::qubo::{build_qubo, VariableIndex};
use crate::sampler::{CostSampler, CostTable};
use crate::simulator::Simulator;
use crate::solver::QuboMinimizer;

/// Chosen pit laps per car, ascending. Cars with no stop map to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule(pub BTreeMap<u32, Vec<u32>>);

impl Schedule {
    pub fn laps(&self, car_id: u32) -> &[u32] {
        self.0.get(&car_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copies of `cars` whose strategy is this schedule. Cars missing from
    /// the schedule never pit.
    pub fn apply(&self, cars: &[Car]) -> Vec<Car> {
        cars.iter()
            .map(|car| {
                let policy = PitPolicy::from_laps(self.laps(car.id).iter().copied());
                car.clone().with_strategy(policy)
            })
            .collect()
    }
}

/// Turn the minimizer's bit vector back into per-car pit laps.
///
/// Every car in `car_ids` gets an entry, possibly empty.
pub fn decode(
    variables: &VariableIndex,
    assignment: &[u8],
    car_ids: impl IntoIterator<Item = u32>,
) -> Result<Schedule, SolverError> {
    if assignment.len() != variables.len() {
        return Err(SolverError::DimensionMismatch {
            got: assignment.len(),
            expected: variables.len(),
        });
    }
    let mut schedule: BTreeMap<u32, Vec<u32>> =
        car_ids.into_iter().map(|id| (id, Vec::new())).collect();
    for (index, &value) in assignment.iter().enumerate() {
        match value {
            0 => {}
            1 => {
                if let Some(d) = variables.decision(index) {
                    schedule.entry(d.car_id).or_default().push(d.lap);
                }
            }
            _ => return Err(SolverError::NonBinary { index, value }),
        }
    }
    for laps in schedule.values_mut() {
        laps.sort_unstable();
    }
    Ok(Schedule(schedule))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    StopCount {
        car_id: u32,
        required: u32,
        actual: u32,
    },
    CapacityExceeded {
        lap: u32,
        cars: Vec<u32>,
        capacity: u32,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feasibility {
    pub violations: Vec<Violation>,
}

impl Feasibility {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Post-hoc constraint check. The optimizer never rejects a schedule itself.
pub fn check_feasibility(schedule: &Schedule, stops: &BTreeMap<u32, u32>, capacity: u32) -> Feasibility {
    let mut violations = Vec::new();

    for (&car_id, &required) in stops {
        let actual = schedule.laps(car_id).len() as u32;
        if actual != required {
            violations.push(Violation::StopCount {
                car_id,
                required,
                actual,
            });
        }
    }

    let mut by_lap: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (&car_id, laps) in &schedule.0 {
        for &lap in laps {
            by_lap.entry(lap).or_default().push(car_id);
        }
    }
    for (lap, cars) in by_lap {
        if cars.len() as u32 > capacity {
            violations.push(Violation::CapacityExceeded { lap, cars, capacity });
        }
    }

    Feasibility { violations }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub schedule: Schedule,
    pub feasibility: Feasibility,
    /// Objective value `x^T Q x` of the returned assignment.
    pub energy: f64,
    pub num_variables: usize,
    pub costs: CostTable,
}

/// Sample costs, build the QUBO, hand it to the minimizer and decode.
pub struct ScheduleOptimizer<M> {
    simulator: Simulator,
    params: OptimizerParams,
    minimizer: M,
}

impl<M: QuboMinimizer> ScheduleOptimizer<M> {
    pub fn new(simulator: Simulator, params: OptimizerParams, minimizer: M) -> Self {
        Self {
            simulator,
            params,
            minimizer,
        }
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    pub fn optimize(&self, cars: &[Car]) -> Result<OptimizationReport, PlannerError> {
        validate_cars(cars)?;
        self.params.validate(self.simulator.race(), cars)?;

        let costs = CostSampler::new(&self.simulator).sample(cars, &self.params.pit_window)?;
        let problem = build_qubo(&costs, &self.params.stops, self.params.capacity, self.params.penalties)?;
        tracing::info!(
            "built QUBO: {} variables, max |q| {:.2}, max |Q| {:.1}",
            problem.variables.len(),
            costs.max_abs(),
            problem.matrix.max_abs()
        );

        let assignment = self.minimizer.minimize(&problem.matrix)?;
        let schedule = decode(&problem.variables, &assignment, cars.iter().map(|c| c.id))?;
        let energy = problem.matrix.energy(&assignment);

        let feasibility = check_feasibility(&schedule, &self.params.stops, self.params.capacity);
        if feasibility.is_feasible() {
            tracing::info!("schedule {:?} (energy {:.3})", schedule.0, energy);
        } else {
            tracing::warn!(
                "schedule {:?} violates {} constraint(s)",
                schedule.0,
                feasibility.violations.len()
            );
        }

        Ok(OptimizationReport {
            schedule,
            feasibility,
            energy,
            num_variables: problem.variables.len(),
            costs,
        })
    }
}
