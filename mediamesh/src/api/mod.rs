//! HTTP API of a node.
//!
//! | Route                   | Caller | Purpose                              |
//! |-------------------------|--------|--------------------------------------|
//! | `GET  /ping`            | any    | liveness, role and version           |
//! | `POST /sync`            | node   | satellite pushes its catalog         |
//! | `GET  /files`           | node   | merged catalog and node list         |
//! | `GET  /serve`           | node   | range-aware file download            |
//! | `POST /scan`            | user   | start a sync run                     |
//! | `GET  /scan-status`     | user   | progress of the current run          |
//! | `POST /download`        | user   | queue files from another owner       |
//! | `GET  /downloads`       | user   | job list, newest first               |
//! | `POST /download/cancel` | user   | cancel a job                         |
//! | `POST /download/retry`  | user   | retry a finished job                 |
//! | `POST /downloads/clear` | user   | drop finished jobs                   |

mod auth;
mod error;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub use auth::{require_pin, require_secret, AuthConfig};
pub use error::ApiError;

use crate::catalog::{CatalogStore, NodeRegistry};
use crate::jobs::DownloadManager;
use crate::sync::SyncCoordinator;

/// Largest accepted `POST /sync` body.
pub const MAX_SYNC_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for API handlers.
pub struct ApiState {
    pub store: CatalogStore,
    pub registry: NodeRegistry,
    pub sync: SyncCoordinator,
    pub downloads: DownloadManager,
    /// Root that `/serve` is confined to.
    pub media_root: PathBuf,
    /// Owners a master accepts pushes from. Empty accepts anyone.
    pub allowed_owners: Vec<String>,
    pub auth: AuthConfig,
}

impl ApiState {
    pub fn new(
        store: CatalogStore,
        registry: NodeRegistry,
        sync: SyncCoordinator,
        downloads: DownloadManager,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            sync,
            downloads,
            media_root: media_root.into(),
            allowed_owners: Vec::new(),
            auth: AuthConfig::default(),
        }
    }

    pub fn with_allowed_owners(mut self, owners: Vec<String>) -> Self {
        self.allowed_owners = owners;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn host_owner(&self) -> &str {
        self.store.host_owner()
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    let node_routes = Router::new()
        .route(
            "/sync",
            post(handlers::sync::receive_sync).layer(DefaultBodyLimit::max(MAX_SYNC_BODY_BYTES)),
        )
        .route("/files", get(handlers::files::list_files))
        .route("/serve", get(handlers::serve::serve_file))
        .route_layer(from_fn_with_state(Arc::clone(&state), require_secret));

    let user_routes = Router::new()
        .route("/scan", post(handlers::scan::start_scan))
        .route("/scan-status", get(handlers::scan::scan_status))
        .route("/download", post(handlers::downloads::start_download))
        .route("/downloads", get(handlers::downloads::list_downloads))
        .route("/download/cancel", post(handlers::downloads::cancel_download))
        .route("/download/retry", post(handlers::downloads::retry_download))
        .route("/downloads/clear", post(handlers::downloads::clear_downloads))
        .route_layer(from_fn_with_state(Arc::clone(&state), require_pin));

    Router::new()
        .route("/ping", get(handlers::ping::ping))
        .merge(node_routes)
        .merge(user_routes)
        .with_state(state)
}
