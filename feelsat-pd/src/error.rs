//! HTTP error responses
//!
//! Every error renders as `{"error": {"code": ..., "message": ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body (400)
    #[error("{0}")]
    BadRequest(String),

    /// No model registered for the city (404)
    #[error("no model for city '{0}'")]
    UnknownCity(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownCity(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::UnknownCity(_) => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (self.status(), body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
