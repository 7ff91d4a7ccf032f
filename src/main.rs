use anyhow::Context;
use std::{path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;

use pit_scheduler::config::Scenario;
use pit_scheduler::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let timeout_ms: u64 = std::env::var("SOLVER_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30_000);

    let state = AppState::new(Duration::from_millis(timeout_ms));

    // Optional warmup: solve the startup scenario once so the log shows a
    // baseline vs optimized table before serving.
    if let Some(path) = resolve_scenario_path() {
        let scenario = Scenario::load(&path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?;
        tracing::info!(
            "loaded scenario {}: {} cars, {} laps, window of {} laps",
            path.display(),
            scenario.cars.len(),
            scenario.race.total_laps,
            scenario.optimizer.pit_window.len()
        );
        let resp = tokio::task::spawn_blocking(move || server::run_scenario(&scenario))
            .await
            .context("startup optimization panicked")??;
        for row in &resp.comparison {
            tracing::info!(
                "car={} tyre={} baseline={:.2}s optimized={:.2}s improvement={:.2}s",
                row.car_id,
                row.starting_compound,
                row.baseline_time,
                row.optimized_time,
                row.improvement
            );
        }
        tracing::info!("startup schedule: {:?}", resp.report.schedule.0);
    }

    let app = server::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// `SCENARIO_PATH` if set, otherwise `scenarios/default.json` when present.
fn resolve_scenario_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SCENARIO_PATH") {
        return Some(PathBuf::from(p));
    }
    let candidates = [
        PathBuf::from("scenarios/default.json"),
        {
            let mut p = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
            p.pop();
            p.push("scenarios/default.json");
            p
        },
    ];
    candidates.into_iter().find(|c| c.exists())
}
