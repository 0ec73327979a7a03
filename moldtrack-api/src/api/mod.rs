//! HTTP handlers and error mapping

pub mod analytics;
pub mod health;
pub mod inspections;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Handler-level error, mapped onto HTTP status codes
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<moldtrack_common::Error> for ApiError {
    fn from(err: moldtrack_common::Error) -> Self {
        use moldtrack_common::Error;
        match err {
            Error::Validation(_) | Error::InvalidInput(_) | Error::Normalization(_) => {
                ApiError::BadRequest(err.to_string())
            }
            Error::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
