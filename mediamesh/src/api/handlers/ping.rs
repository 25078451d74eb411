//! Liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::ApiState;

/// `GET /ping` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    /// `master` or `satellite`.
    pub role: String,
    pub owner: String,
    pub version: String,
}

pub async fn ping(State(state): State<Arc<ApiState>>) -> Json<PingResponse> {
    let role = if state.sync.is_master() {
        "master"
    } else {
        "satellite"
    };
    Json(PingResponse {
        status: "ok".to_string(),
        role: role.to_string(),
        owner: state.host_owner().to_string(),
        version: crate::VERSION.to_string(),
    })
}
