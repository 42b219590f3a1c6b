//! HTTP API integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use feelsat_pd::align::AlignedRow;
use feelsat_pd::forward::Forwarder;
use feelsat_pd::model::{LinearTrainer, SatisfactionModel};
use feelsat_pd::registry::ModelRegistry;
use feelsat_pd::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn training_rows() -> Vec<AlignedRow> {
    (1..=8)
        .map(|d| {
            let temp = 10.0 + f64::from(d) * 3.0;
            let aqi = 40.0 + f64::from(d * d) * 4.0;
            AlignedRow {
                date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
                temp: Some(temp),
                aqi: Some(aqi),
                weather_satisfaction: Some(9.0 - temp / 10.0),
                air_quality_satisfaction: Some(9.0 - aqi / 100.0),
            }
        })
        .collect()
}

fn test_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    let (model, report) = SatisfactionModel::train("Lahore", &training_rows(), &LinearTrainer, 5).unwrap();
    registry.insert(model, report);
    // Registered but untrained
    let (model, report) = SatisfactionModel::train("Quetta", &[], &LinearTrainer, 5).unwrap();
    registry.insert(model, report);
    registry
}

fn test_state(forward_url: Option<String>) -> AppState {
    let forwarder = Forwarder::new(forward_url, Duration::from_secs(2)).unwrap();
    AppState::new(test_registry(), forwarder)
}

async fn post_json(state: AppState, body: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/postData")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Downstream stub recording every body it receives
async fn spawn_downstream(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/webhook",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                (status, "accepted")
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/webhook"), received)
}

fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_bad_requests() {
    let cases = [
        ("not json", "invalid or missing json body"),
        ("[1, 2]", "invalid or missing json body"),
        (r#"{"temperature": [{"value": 1}]}"#, "missing city"),
        (r#"{"city": "  ", "temperature": [{"value": 1}]}"#, "missing city"),
        (r#"{"city": "Lahore", "temperature": 5, "aqi": []}"#, "temperature and aqi must be arrays"),
        (r#"{"city": "Lahore", "temperature": [], "aqi": []}"#, "both temperature and aqi arrays are empty"),
        (r#"{"city": "Lahore"}"#, "both temperature and aqi arrays are empty"),
        (
            r#"{"city": "Lahore", "temperature": [{"value": "n/a"}], "aqi": [{"other": 3}]}"#,
            "no numeric values found in temperature or aqi arrays",
        ),
    ];

    for (body, message) in cases {
        let (status, response) = post_json(test_state(None), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response["error"]["code"], "BAD_REQUEST");
        assert_eq!(error_message(&response), message, "body: {body}");
    }
}

#[tokio::test]
async fn test_unknown_city_is_not_found() {
    let body = json!({"city": "Atlantis", "temperature": [{"value": 20}], "aqi": [{"value": 80}]});
    let (status, response) = post_json(test_state(None), &body.to_string()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_prediction_with_forwarding_disabled() {
    let body = json!({
        "city": "lahore",
        "temperature": [{"_time": "2024-03-01T10:00:00Z", "_value": 20.0}, {"value": "24"}],
        "aqi": [{"value": 90}, {"value": 110}, {"value": null}],
    });
    let (status, response) = post_json(test_state(None), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    let result = &response["result"];
    assert_eq!(result["city"], "lahore");
    assert_eq!(result["avg_temperature"], 22.0);
    assert_eq!(result["avg_aqi"], 100.0);

    let weather = result["predictions"]["weather_satisfaction"].as_f64().unwrap();
    let air = result["predictions"]["air_quality_satisfaction"].as_f64().unwrap();
    assert!((weather - 6.8).abs() < 1e-3, "weather {weather}");
    assert!((air - 8.0).abs() < 1e-3, "air {air}");
    assert!(result["raw_model_output"]["Lahore"].is_object());

    assert_eq!(response["forward"]["success"], false);
    assert_eq!(response["forward"]["error"], "forwarding disabled");
}

#[tokio::test]
async fn test_missing_signal_averages_to_zero() {
    let body = json!({"city": "Lahore", "temperature": [{"value": 25}], "aqi": []});
    let (status, response) = post_json(test_state(None), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["result"]["avg_temperature"], 25.0);
    assert_eq!(response["result"]["avg_aqi"], 0.0);
}

#[tokio::test]
async fn test_untrained_city_returns_nulls() {
    let body = json!({"city": "Quetta", "temperature": [{"value": 15}], "aqi": [{"value": 40}]});
    let (status, response) = post_json(test_state(None), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(response["result"]["predictions"]["weather_satisfaction"].is_null());
    assert!(response["result"]["predictions"]["air_quality_satisfaction"].is_null());
}

#[tokio::test]
async fn test_prediction_is_forwarded() {
    let (url, received) = spawn_downstream(StatusCode::OK).await;
    let body = json!({"city": "Lahore", "temperature": [{"value": 20}], "aqi": [{"value": 100}]});
    let (status, response) = post_json(test_state(Some(url)), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["forward"]["success"], true);
    assert_eq!(response["forward"]["status_code"], 200);
    assert_eq!(response["forward"]["response_text"], "accepted");
    assert!(response["forward"].get("error").is_none());

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], response["result"]);
}

#[tokio::test]
async fn test_downstream_error_is_reported() {
    let (url, _received) = spawn_downstream(StatusCode::INTERNAL_SERVER_ERROR).await;
    let body = json!({"city": "Lahore", "temperature": [{"value": 20}], "aqi": [{"value": 100}]});
    let (status, response) = post_json(test_state(Some(url)), &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["forward"]["success"], false);
    assert_eq!(response["forward"]["status_code"], 500);
    assert!(response["forward"]["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_unreachable_downstream_still_answers() {
    let body = json!({"city": "Lahore", "temperature": [{"value": 20}], "aqi": [{"value": 100}]});
    let state = test_state(Some("http://127.0.0.1:1/webhook".to_string()));
    let (status, response) = post_json(state, &body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["forward"]["success"], false);
    assert!(response["forward"].get("status_code").is_none());
    assert!(response["forward"]["error"].is_string());
}

#[tokio::test]
async fn test_request_points_are_dumped() {
    let dir = tempfile::TempDir::new().unwrap();
    let state = test_state(None).with_points_dump_dir(Some(dir.path().join("points")));
    let body = json!({
        "city": "Lahore",
        "temperature": [{"_time": "t1", "_value": 20.5}, {"_time": "t2", "_value": 21.5}],
        "aqi": [{"value": 100, "station": "Gulberg"}],
    });
    let (status, _) = post_json(state, &body.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    let temperature =
        std::fs::read_to_string(dir.path().join("points/lahore_temperature_points.csv")).unwrap();
    assert_eq!(temperature, "_time,_value\nt1,20.5\nt2,21.5\n");

    let aqi = std::fs::read_to_string(dir.path().join("points/lahore_aqi_points.csv")).unwrap();
    assert_eq!(aqi, "station,value\nGulberg,100\n");
}

#[tokio::test]
async fn test_health_lists_cities() {
    let response = build_router(test_state(None))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["module"], "feelsat-pd");
    assert_eq!(health["cities"], json!(["Lahore", "Quetta"]));
    assert_eq!(health["untrained"], json!(["Quetta"]));
    assert_eq!(health["forwarding"], false);
}

#[tokio::test]
async fn test_health_degraded_without_models() {
    let forwarder = Forwarder::new(None, Duration::from_secs(1)).unwrap();
    let state = AppState::new(ModelRegistry::new(), forwarder);
    let response = build_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "degraded");
}
