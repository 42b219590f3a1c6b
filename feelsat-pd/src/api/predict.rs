//! Prediction endpoint
//!
//! `POST /postData` with `{ "city": str, "temperature": [...], "aqi": [...] }`.
//! Each array holds point objects carrying the reading under `value` or
//! `_value`. The two means feed the city model, and the result is
//! forwarded downstream before being returned.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use feelsat_common::config::city_slug;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::forward::ForwardStatus;
use crate::model::SatisfactionPrediction;
use crate::points::dump_points;
use crate::{ApiError, ApiResult, AppState};

/// Keys checked, in order, for a point's reading
const VALUE_KEYS: [&str; 2] = ["value", "_value"];

/// Prediction payload returned to the caller and forwarded downstream
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub city: String,
    pub avg_temperature: f64,
    pub avg_aqi: f64,
    /// Rounded to 3 decimals; `null` for an untrained dimension
    pub predictions: SatisfactionPrediction,
    /// Unrounded predictions keyed by city
    pub raw_model_output: BTreeMap<String, SatisfactionPrediction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub result: PredictionResult,
    pub forward: ForwardStatus,
}

/// Numeric reading of one point: the first present key among `value`,
/// `_value`. Numbers and numeric strings count.
fn point_value(item: &Value) -> Option<f64> {
    let object = item.as_object()?;
    let raw = VALUE_KEYS
        .iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))?;

    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Mean of all numeric point readings, `None` when there are none
pub fn safe_mean(items: &[Value]) -> Option<f64> {
    let values: Vec<f64> = items.iter().filter_map(point_value).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A signal array; an absent key is an empty array
fn signal<'a>(body: &'a Value, key: &str) -> ApiResult<&'a [Value]> {
    match body.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ApiError::BadRequest(
            "temperature and aqi must be arrays".to_string(),
        )),
    }
}

/// POST /postData
///
/// **Errors:**
/// - 400 Bad Request: invalid body, missing city, non-array signal, both
///   arrays empty, or no numeric reading in either
/// - 404 Not Found: no model for the city
///
/// A signal without numeric readings averages to 0.0 when the other one has
/// readings.
pub async fn post_data(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(body) = payload
        .map_err(|_| ApiError::BadRequest("invalid or missing json body".to_string()))?;

    if !body.is_object() {
        return Err(ApiError::BadRequest("invalid or missing json body".to_string()));
    }

    let city = body
        .get("city")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing city".to_string()))?;

    let temperatures = signal(&body, "temperature")?;
    let aqis = signal(&body, "aqi")?;

    if temperatures.is_empty() && aqis.is_empty() {
        return Err(ApiError::BadRequest(
            "both temperature and aqi arrays are empty".to_string(),
        ));
    }

    let (avg_temperature, avg_aqi) = match (safe_mean(temperatures), safe_mean(aqis)) {
        (None, None) => {
            return Err(ApiError::BadRequest(
                "no numeric values found in temperature or aqi arrays".to_string(),
            ))
        }
        (t, a) => (t.unwrap_or(0.0), a.unwrap_or(0.0)),
    };

    info!(city, avg_temperature, avg_aqi, "Prediction requested");

    let model = state
        .registry
        .get(city)
        .ok_or_else(|| ApiError::UnknownCity(city.to_string()))?;

    let raw = model.predict(avg_temperature, avg_aqi);
    if raw.weather_satisfaction.is_none() && raw.air_quality_satisfaction.is_none() {
        warn!(city, "City has no trained dimension");
    }

    let result = PredictionResult {
        city: city.to_string(),
        avg_temperature,
        avg_aqi,
        predictions: SatisfactionPrediction {
            weather_satisfaction: raw.weather_satisfaction.map(round3),
            air_quality_satisfaction: raw.air_quality_satisfaction.map(round3),
        },
        raw_model_output: BTreeMap::from([(model.city().to_string(), raw)]),
    };

    if let Some(dir) = state.points_dump_dir.clone() {
        let slug = city_slug(model.city());
        let temperatures = temperatures.to_vec();
        let aqis = aqis.to_vec();
        let dumped = tokio::task::spawn_blocking(move || {
            dump_points(&dir, &slug, &temperatures, &aqis);
        })
        .await;
        if let Err(e) = dumped {
            warn!(error = %e, "Point dump task failed");
        }
    }

    let forward = state.forwarder.forward(&result).await;

    Ok(Json(PredictResponse { result, forward }))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/postData", post(post_data))
}
