//! feelsat-pd library interface
//!
//! Satisfaction prediction: training sources, the daily aligner, per-city
//! models and the HTTP service that serves and forwards predictions.

pub mod align;
pub mod api;
pub mod error;
pub mod forward;
pub mod model;
pub mod points;
pub mod registry;
pub mod sources;
pub mod sweep;

pub use crate::error::{ApiError, ApiResult};

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use feelsat_common::time;
use tower_http::trace::TraceLayer;

use crate::forward::Forwarder;
use crate::registry::ModelRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Trained models, immutable after startup
    pub registry: Arc<ModelRegistry>,
    /// Downstream automation endpoint
    pub forwarder: Arc<Forwarder>,
    /// Raw request points are dumped here when set
    pub points_dump_dir: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, forwarder: Forwarder) -> Self {
        Self {
            registry: Arc::new(registry),
            forwarder: Arc::new(forwarder),
            points_dump_dir: None,
            startup_time: time::now(),
        }
    }

    pub fn with_points_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.points_dump_dir = dir;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::predict_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
