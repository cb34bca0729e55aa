//! Scanner-facing endpoint.
//!
//! `GET /api/rfid/scanId?tagId=<tag>` answers with a status code and an
//! empty body. The reason for a denial goes to the scan log, not the caller.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::middleware::validate::{validate, LookupError};
use crate::models::scan::ScanTiming;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(rename = "tagId")]
    pub tag_id: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/scanId", get(scan_id))
}

/// A missing or unparsable query is treated the same as an absent tag.
pub async fn scan_id(
    State(state): State<Arc<AppState>>,
    query: Option<Query<ScanQuery>>,
) -> StatusCode {
    let tag_id = query.and_then(|Query(q)| q.tag_id);
    let tag_id = tag_id.as_deref();
    let started_at = Utc::now();

    // Spawned so a panicking lookup is reported as a fault, not an unwind.
    let passes = state.passes.clone();
    let owned_tag = tag_id.map(str::to_owned);
    let result = match tokio::spawn(async move {
        validate(owned_tag.as_deref(), started_at, passes.as_ref()).await
    })
    .await
    {
        Ok(result) => result,
        Err(e) => Err(LookupError::from(e)),
    };
    let timing = ScanTiming {
        started_at,
        responded_at: Utc::now(),
    };

    match result {
        Ok(outcome) => {
            state
                .recorder
                .metrics()
                .observe_outcome(&outcome, timing.response_time_ms());

            let status = StatusCode::from_u16(outcome.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            match tag_id.filter(|t| !t.is_empty()) {
                Some(tag) => {
                    tracing::info!(
                        tag,
                        status = status.as_u16(),
                        result = outcome.result().as_str(),
                        code = outcome.error_code().unwrap_or("-"),
                        "tag scanned"
                    );
                    state.recorder.record(&outcome, tag, timing).await;
                }
                None => tracing::debug!("scan request without tagId"),
            }
            status
        }
        Err(e) => {
            let tag = tag_id.unwrap_or_default();
            tracing::error!(tag, "tag lookup failed: {}", e);
            state.recorder.metrics().observe_fault(timing.response_time_ms());
            state.recorder.record_fault(tag, &e.to_string(), timing).await;
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
