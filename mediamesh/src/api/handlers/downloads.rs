//! Download job handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiError, ApiState};
use crate::jobs::{DownloadItem, DownloadRequest, JobView};

/// `POST /download` body: a single `path`, or a `files` list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBody {
    pub owner: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub files: Vec<DownloadFile>,
    #[serde(default)]
    pub folder_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFile {
    #[serde(alias = "remotePath")]
    pub path: String,
    #[serde(default)]
    pub filename: String,
}

impl DownloadBody {
    pub fn into_request(self) -> DownloadRequest {
        let mut items: Vec<DownloadItem> = self
            .files
            .into_iter()
            .map(|f| DownloadItem::new(f.path, f.filename))
            .collect();
        if items.is_empty() {
            if let Some(path) = self.path {
                items.push(DownloadItem::new(path, self.filename.unwrap_or_default()));
            }
        }

        let request = DownloadRequest::new(self.owner, items);
        match self.folder_name {
            Some(folder) if !folder.trim().is_empty() => request.with_folder_name(folder),
            _ => request,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadAccepted {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobIdBody {
    pub id: String,
}

pub async fn start_download(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<DownloadBody>,
) -> Result<(StatusCode, Json<DownloadAccepted>), ApiError> {
    let ids = state.downloads.enqueue(body.into_request())?;
    Ok((StatusCode::ACCEPTED, Json(DownloadAccepted { ids })))
}

pub async fn list_downloads(State(state): State<Arc<ApiState>>) -> Json<Vec<JobView>> {
    Json(state.downloads.jobs())
}

pub async fn cancel_download(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<JobIdBody>,
) -> Result<Json<Value>, ApiError> {
    state.downloads.cancel(&body.id)?;
    Ok(Json(json!({ "status": "cancelled", "id": body.id })))
}

pub async fn retry_download(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<JobIdBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.downloads.retry(&body.id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "retrying", "id": body.id })),
    ))
}

pub async fn clear_downloads(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let removed = state.downloads.clear_finished().await;
    Json(json!({ "removed": removed }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file_body() {
        let body: DownloadBody = serde_json::from_value(json!({
            "owner": "Josh",
            "path": "Movies/Heat.mkv",
            "filename": "Heat.mkv"
        }))
        .unwrap();

        let request = body.into_request();
        assert_eq!(request.owner, "Josh");
        assert_eq!(request.items, vec![DownloadItem::new("Movies/Heat.mkv", "Heat.mkv")]);
        assert_eq!(request.folder_name, None);
    }

    #[test]
    fn test_batch_body_with_folder() {
        let body: DownloadBody = serde_json::from_value(json!({
            "owner": "Josh",
            "files": [
                {"path": "Shows/S01E01.mkv", "filename": "S01E01.mkv"},
                {"remotePath": "Shows/S01E02.mkv"}
            ],
            "folderName": "Show"
        }))
        .unwrap();

        let request = body.into_request();
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[1].remote_path, "Shows/S01E02.mkv");
        assert_eq!(request.folder_name.as_deref(), Some("Show"));
    }

    #[test]
    fn test_empty_body_yields_empty_batch() {
        let body: DownloadBody = serde_json::from_value(json!({ "owner": "Josh" })).unwrap();
        assert!(body.into_request().items.is_empty());
    }
}
