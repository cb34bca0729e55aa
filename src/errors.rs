use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::middleware::validate::LookupError;

/// Errors for the JSON-speaking routes. The scan endpoint answers with bare
/// status codes and does not go through this type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("not ready: {0}")]
    NotReady(#[from] LookupError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::NotReady(e) => {
                tracing::warn!("readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
