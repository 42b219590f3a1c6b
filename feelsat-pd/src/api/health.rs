//! `GET /health`: liveness plus what the service can actually predict

use axum::{extract::State, routing::get, Json, Router};
use feelsat_common::time;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when no city model is loaded
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub build: &'static str,
    pub uptime_seconds: u64,
    /// Cities with a registered model
    pub cities: Vec<String>,
    /// Registered cities without any trained dimension
    pub untrained: Vec<String>,
    pub forwarding: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = time::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let registry = &state.registry;
    let untrained = registry
        .cities()
        .into_iter()
        .filter(|city| registry.get(city).is_some_and(|m| !m.is_trained()))
        .collect();

    Json(HealthResponse {
        status: if registry.is_empty() { "degraded" } else { "ok" },
        module: "feelsat-pd",
        version: env!("CARGO_PKG_VERSION"),
        build: env!("GIT_HASH"),
        uptime_seconds,
        cities: registry.cities(),
        untrained,
        forwarding: state.forwarder.url().is_some(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
