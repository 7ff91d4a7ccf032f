//! Pit stop scheduling for a simulated race.
//!
//! A deterministic lap simulator prices every candidate pit lap for every car,
//! the prices plus a one-stop-per-car rule and a pit lane capacity limit are
//! encoded as a QUBO, and any [`solver::QuboMinimizer`] turns that into a
//! schedule.

pub mod car;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod qubo;
pub mod report;
pub mod sampler;
pub mod server;
pub mod simulator;
pub mod solver;
pub mod tyre;

pub use car::{Car, CarState, PitPolicy};
pub use config::{OptimizerParams, PenaltyWeights, PitWindow, RaceConfig, Scenario, SolverParams};
pub use error::{ConfigError, PlannerError, SolverError};
pub use optimizer::{check_feasibility, decode, Feasibility, OptimizationReport, Schedule, ScheduleOptimizer, Violation};
pub use qubo::{build_qubo, Decision, QuboMatrix, QuboProblem, VariableIndex};
pub use sampler::{CostSampler, CostTable};
pub use simulator::{CarOutcome, RaceOutcome, Simulator};
pub use solver::{AnnealingMinimizer, ExhaustiveMinimizer, QuboMinimizer};
pub use tyre::Compound;
