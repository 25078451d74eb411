//! Sync run control: `POST /scan` and `GET /scan-status`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{ApiError, ApiState};
use crate::sync::ScanStatus;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Only the host's own identity may be scanned.
    #[serde(default)]
    pub owner: Option<String>,
}

pub async fn start_scan(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<ScanRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    if let Some(owner) = request.owner.as_deref().filter(|o| !o.is_empty()) {
        if owner != state.host_owner() {
            return Err(ApiError::BadRequest(format!(
                "this node scans only its own media ('{}')",
                state.host_owner()
            )));
        }
    }

    state.sync.trigger()?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))))
}

pub async fn scan_status(State(state): State<Arc<ApiState>>) -> Json<ScanStatus> {
    Json(state.sync.status())
}
