//! `POST /sync`: a satellite pushes its full catalog to the master.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiError, ApiState};
use crate::sync::SyncPush;

/// Acknowledgement of an accepted push.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAck {
    pub status: String,
    pub owner: String,
    pub received: usize,
}

pub async fn receive_sync(
    State(state): State<Arc<ApiState>>,
    Json(push): Json<SyncPush>,
) -> Result<Json<SyncAck>, ApiError> {
    if !state.sync.is_master() {
        return Err(ApiError::Forbidden(
            "this node is a satellite and does not accept pushes".to_string(),
        ));
    }

    let owner = push.owner.trim();
    if owner.is_empty() || push.url.trim().is_empty() {
        return Err(ApiError::BadRequest("owner and url are required".to_string()));
    }
    if owner == state.host_owner() {
        warn!(owner, "Rejected push claiming this node's identity");
        return Err(ApiError::Forbidden(format!(
            "owner '{}' is this node's own identity",
            owner
        )));
    }
    if !state.allowed_owners.is_empty() && !state.allowed_owners.iter().any(|o| o == owner) {
        warn!(owner, "Rejected push from owner not on the allow-list");
        return Err(ApiError::Forbidden(format!("owner '{}' is not allowed", owner)));
    }

    state.store.replace_owner_catalog(owner, &push.files)?;
    state.registry.register(owner, push.url.trim())?;
    info!(owner, url = %push.url, files = push.files.len(), "Accepted catalog push");

    Ok(Json(SyncAck {
        status: "ok".to_string(),
        owner: owner.to_string(),
        received: push.files.len(),
    }))
}
