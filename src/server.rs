use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Duration};

use crate::car::Car;
use crate::config::{RaceConfig, Scenario};
use crate::error::{PlannerError, SolverError};
use crate::optimizer::{OptimizationReport, ScheduleOptimizer};
use crate::report::{compare, CarComparison};
use crate::simulator::{RaceOutcome, Simulator};
use crate::solver::AnnealingMinimizer;

// ---------- Request/Response types ----------

#[derive(Deserialize, Debug)]
pub struct SimulateRequest {
    pub race: RaceConfig,
    pub cars: Vec<Car>,
}

#[derive(Serialize, Debug, Clone)]
pub struct OptimizeResponse {
    pub report: OptimizationReport,
    /// Race with the strategies the cars were submitted with.
    pub baseline: RaceOutcome,
    /// Race with the optimized schedule applied.
    pub optimized: RaceOutcome,
    pub comparison: Vec<CarComparison>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(err: PlannerError) -> ApiError {
    let status = match err {
        PlannerError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PlannerError::Solver(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    solver_timeout: Duration,
    latest: Arc<RwLock<Option<OptimizeResponse>>>,
}

impl AppState {
    pub fn new(solver_timeout: Duration) -> Self {
        Self {
            solver_timeout,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    pub fn latest(&self) -> Option<OptimizeResponse> {
        self.latest.read().clone()
    }
}

/// Baseline run, optimization, then a final run on the optimized schedule.
pub fn run_scenario(scenario: &Scenario) -> Result<OptimizeResponse, PlannerError> {
    scenario.validate()?;
    let sim = Simulator::new(scenario.race)?;
    let baseline = sim.run(&scenario.cars)?;

    let optimizer = ScheduleOptimizer::new(
        sim,
        scenario.optimizer.clone(),
        AnnealingMinimizer::new(scenario.solver),
    );
    let report = optimizer.optimize(&scenario.cars)?;

    let optimized = sim.run(&report.schedule.apply(&scenario.cars))?;
    let comparison = compare(&scenario.cars, &baseline, &optimized);
    Ok(OptimizeResponse {
        report,
        baseline,
        optimized,
        comparison,
    })
}

// ---------- Handlers ----------

async fn simulate(Json(req): Json<SimulateRequest>) -> Result<Json<RaceOutcome>, ApiError> {
    let outcome = Simulator::new(req.race)
        .and_then(|sim| sim.run(&req.cars))
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(outcome))
}

async fn optimize(
    State(state): State<AppState>,
    Json(scenario): Json<Scenario>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let timeout = state.solver_timeout;
    // The solve is CPU bound and has no partial result; on timeout the
    // blocking task is left to finish on its own.
    let job = tokio::task::spawn_blocking(move || run_scenario(&scenario));
    let response = match tokio::time::timeout(timeout, job).await {
        Ok(Ok(result)) => result.map_err(api_error)?,
        Ok(Err(join_err)) => return Err(api_error(SolverError::Failed(join_err.to_string()).into())),
        Err(_) => {
            tracing::warn!("optimization exceeded {:?}", timeout);
            return Err(api_error(SolverError::TimedOut(timeout).into()));
        }
    };

    for row in &response.comparison {
        tracing::info!(
            "car={} baseline={:.2}s optimized={:.2}s improvement={:.2}s",
            row.car_id,
            row.baseline_time,
            row.optimized_time,
            row.improvement
        );
    }
    *state.latest.write() = Some(response.clone());
    Ok(Json(response))
}

async fn latest_schedule(State(state): State<AppState>) -> Result<Json<OptimizeResponse>, ApiError> {
    state.latest().map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no optimization has run yet" })),
        )
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/simulate", post(simulate))
        .route("/optimize", post(optimize))
        .route("/schedule", get(latest_schedule))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::PitPolicy;
    use crate::config::{OptimizerParams, PenaltyWeights, PitWindow, SolverParams};
    use crate::tyre::Compound;
    use std::collections::BTreeMap;

    fn scenario(total_laps: u32, window: PitWindow) -> Scenario {
        Scenario {
            race: RaceConfig {
                total_laps,
                pit_lane_time: 20.0,
            },
            cars: vec![
                Car::new(0, Compound::Soft).with_strategy(PitPolicy::OnLap(25)),
                Car::new(1, Compound::Medium).with_strategy(PitPolicy::OnLap(26)),
                Car::new(2, Compound::Soft).with_strategy(PitPolicy::OnLap(25)),
            ],
            optimizer: OptimizerParams {
                pit_window: window,
                stops: BTreeMap::from([(0, 1), (1, 1), (2, 1)]),
                capacity: 1,
                penalties: PenaltyWeights {
                    stops: 10_000.0,
                    capacity: 5_000.0,
                },
            },
            solver: SolverParams::default(),
        }
    }

    #[tokio::test]
    async fn test_simulate_endpoint() {
        let req = SimulateRequest {
            race: RaceConfig {
                total_laps: 5,
                pit_lane_time: 20.0,
            },
            cars: vec![Car::new(0, Compound::Soft)],
        };
        let Json(out) = simulate(Json(req)).await.unwrap();
        assert!((out.total_time(0).unwrap() - 404.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_simulate_rejects_zero_laps() {
        let req = SimulateRequest {
            race: RaceConfig {
                total_laps: 0,
                pit_lane_time: 20.0,
            },
            cars: vec![Car::new(0, Compound::Soft)],
        };
        let (status, _) = simulate(Json(req)).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_optimize_stores_latest() {
        let state = AppState::new(Duration::from_secs(60));
        assert!(latest_schedule(State(state.clone())).await.is_err());

        let Json(resp) = optimize(State(state.clone()), Json(scenario(30, PitWindow::range(20, 24))))
            .await
            .unwrap();
        assert!(resp.report.feasibility.is_feasible(), "{:?}", resp.report.feasibility);
        assert_eq!(resp.comparison.len(), 3);
        for car in &resp.optimized.cars {
            assert_eq!(car.pit_laps.len(), 1);
        }

        let Json(stored) = latest_schedule(State(state)).await.unwrap();
        assert_eq!(stored.report.schedule, resp.report.schedule);
    }

    #[tokio::test]
    async fn test_optimize_config_error_status() {
        let state = AppState::new(Duration::from_secs(60));
        let mut bad = scenario(30, PitWindow::range(20, 24));
        bad.optimizer.stops.insert(42, 1);
        let (status, Json(body)) = optimize(State(state.clone()), Json(bad)).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("42"));
        assert!(state.latest().is_none());
    }

    #[tokio::test]
    async fn test_optimize_timeout_is_solver_failure() {
        let state = AppState::new(Duration::ZERO);
        let (status, Json(body)) = optimize(State(state), Json(scenario(50, PitWindow::range(10, 40))))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }
}
