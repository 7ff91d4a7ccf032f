use std::time::Duration;
use thiserror::Error;

/// Invalid race or optimizer setup. Always detected before any simulation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("total_laps must be positive")]
    NoLaps,
    #[error("pit_lane_time must be a positive finite number, got {0}")]
    InvalidPitLaneTime(f64),
    #[error("no cars in race")]
    NoCars,
    #[error("car id {0} appears more than once")]
    DuplicateCar(u32),
    #[error("pit window is empty")]
    EmptyPitWindow,
    #[error("pit window lap {lap} is outside the race (1..={total_laps})")]
    LapOutsideRace { lap: u32, total_laps: u32 },
    #[error("stop requirement references unknown car {0}")]
    UnknownCar(u32),
    #[error("decision variable space is empty")]
    EmptyVariableSpace,
    #[error("penalty weight {name} must be finite, got {value}")]
    InvalidPenalty { name: &'static str, value: f64 },
    #[error("scenario file {path}: {message}")]
    Scenario { path: String, message: String },
}

/// Failure of the external QUBO minimizer, or of its returned assignment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("minimizer failed: {0}")]
    Failed(String),
    #[error("minimizer timed out after {0:?}")]
    TimedOut(Duration),
    #[error("assignment has {got} entries, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
    #[error("assignment value {value} at index {index} is not binary")]
    NonBinary { index: usize, value: u8 },
    #[error("{variables} variables is too many for exhaustive search (max {max})")]
    TooLarge { variables: usize, max: usize },
}

/// Anything that fails an optimization attempt as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}
