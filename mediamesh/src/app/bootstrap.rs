//! Node bootstrap implementation.
//!
//! `NodeApp` opens the catalog, registers the host, and assembles the sync
//! coordinator, the download manager and the HTTP state in dependency order.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::AppError;
use crate::api::{self, ApiState, AuthConfig};
use crate::catalog::{CatalogStore, Database, NodeRegistry};
use crate::config::NodeConfig;
use crate::jobs::DownloadManager;
use crate::scanner::LocalScanner;
use crate::sync::{MasterClient, ScanStatus, SyncCoordinator, SyncSchedule};
use crate::transfer::TransferWorker;

/// A fully wired MediaMesh node.
///
/// # Example
///
/// ```ignore
/// use mediamesh::app::NodeApp;
/// use mediamesh::config::NodeConfig;
///
/// let config = NodeConfig::new("Josh", "http://josh.lan:4242", "/srv/media")
///     .with_master_url("http://master.lan:4242");
/// let app = NodeApp::new(config)?;
///
/// // Serves until Ctrl+C or `shutdown()`
/// app.serve().await?;
/// ```
pub struct NodeApp {
    config: NodeConfig,
    state: Arc<ApiState>,
    shutdown: CancellationToken,
}

impl NodeApp {
    /// Build every component of the node.
    ///
    /// The host's own owner is registered at its advertised URL so that its
    /// files are downloadable through the same lookup as any other node.
    pub fn new(config: NodeConfig) -> Result<Self, AppError> {
        let role = if config.is_master() { "master" } else { "satellite" };
        info!(
            owner = %config.owner,
            role,
            media_root = %config.media_root.display(),
            database = %config.database.display(),
            "Initializing node"
        );

        let db = Arc::new(Database::open(&config.database)?);
        let store = CatalogStore::new(Arc::clone(&db), config.owner.clone());
        let registry = NodeRegistry::new(db);
        registry.register(&config.owner, &config.advertised_url)?;

        let scanner: Arc<dyn LocalScanner> = Arc::new(config.scanner());
        let mut sync = SyncCoordinator::new(store.clone(), scanner, config.advertised_url.clone());
        if let Some(master_url) = &config.master_url {
            let client = MasterClient::new(master_url.clone(), config.shared_secret.clone())?;
            info!(master = %client.master_url(), "Configured upstream master");
            sync = sync.with_master(client);
        }

        let worker = TransferWorker::new(config.transfer_config())?;
        let downloads = DownloadManager::new(registry.clone(), worker, config.download_root.clone());

        let state = ApiState::new(store, registry, sync, downloads, config.media_root.clone())
            .with_allowed_owners(config.allowed_owners.clone())
            .with_auth(AuthConfig::new(
                config.shared_secret.clone(),
                config.pin.clone(),
            ));

        if config.shared_secret.is_empty() {
            warn!("No shared secret configured; node endpoints are open");
        }

        Ok(Self {
            config,
            state: Arc::new(state),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<ApiState> {
        &self.state
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.state.sync
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.state.downloads
    }

    pub fn router(&self) -> Router {
        api::router(Arc::clone(&self.state))
    }

    /// Token that stops `serve` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run a single sync cycle inline.
    pub async fn sync_once(&self) -> Result<ScanStatus, AppError> {
        Ok(self.state.sync.run_now().await?)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn serve(self) -> Result<(), AppError> {
        let addr = self.config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AppError::Bind { addr, source })?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener, running the sync schedule
    /// alongside the HTTP server.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), AppError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, owner = %self.config.owner, "Listening");
        }

        let schedule = SyncSchedule::new(self.state.sync.clone(), self.config.sync_interval)
            .with_run_on_startup(self.config.sync_on_startup)
            .spawn(self.shutdown.child_token());

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal(self.shutdown.clone()))
            .await;

        self.shutdown.cancel();
        if let Err(e) = schedule.await {
            warn!(error = %e, "Sync schedule task failed");
        }
        info!("Node stopped");
        result.map_err(AppError::Serve)
    }
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                token.cancel();
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl+C");
                token.cancelled().await;
            }
        },
    }
}
