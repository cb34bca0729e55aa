use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::json;

use crate::errors::AppError;
use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// 200 once the pass store answers; 503 otherwise.
pub async fn readiness(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    state.passes.ping().await?;
    Ok("ok")
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let body = state.recorder.metrics().encode()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
