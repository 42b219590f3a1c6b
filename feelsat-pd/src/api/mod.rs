//! HTTP API handlers for feelsat-pd

pub mod health;
pub mod predict;

pub use health::health_routes;
pub use predict::{predict_routes, safe_mean, PredictResponse, PredictionResult};
