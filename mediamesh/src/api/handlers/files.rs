//! `GET /files`: the merged catalog with reachable URLs.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiState};
use crate::catalog::{CatalogFile, Node};

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<CatalogFile>,
    pub nodes: Vec<Node>,
}

pub async fn list_files(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FilesResponse>, ApiError> {
    let (files, nodes) = state.store.listing()?;
    Ok(Json(FilesResponse { files, nodes }))
}
