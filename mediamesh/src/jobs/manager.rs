//! Download job manager.
//!
//! Accepts batches of files to fetch from one owner, records a job per file
//! and returns the ids right away. Each batch then runs on its own task,
//! strictly one file after another:
//!
//! ```text
//! enqueue ──► JobTable (pending × N) ──► ids returned
//!                 │
//!                 └── spawned batch: job 1 ─► job 2 ─► ... ─► job N
//!                                   (TransferWorker::run each)
//! ```
//!
//! Retries run as their own single-job task outside any batch ordering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::model::{DownloadJob, JobView};
use super::table::{JobTable, JobTicket};
use crate::catalog::{NodeRegistry, StoreError};
use crate::transfer::TransferWorker;

/// One file in a download request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadItem {
    /// Path relative to the owner's media root.
    pub remote_path: String,
    /// Local file name; defaults to the last component of the remote path.
    #[serde(default)]
    pub filename: String,
}

impl DownloadItem {
    pub fn new(remote_path: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            filename: filename.into(),
        }
    }
}

/// A batch of files from a single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub owner: String,
    pub items: Vec<DownloadItem>,
    /// Optional subdirectory of the download root.
    pub folder_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(owner: impl Into<String>, items: Vec<DownloadItem>) -> Self {
        Self {
            owner: owner.into(),
            items,
            folder_name: None,
        }
    }

    pub fn with_folder_name(mut self, folder: impl Into<String>) -> Self {
        self.folder_name = Some(folder.into());
        self
    }
}

/// Owns the job table and drives transfers.
#[derive(Clone)]
pub struct DownloadManager {
    registry: NodeRegistry,
    table: Arc<JobTable>,
    worker: TransferWorker,
    download_root: PathBuf,
}

impl DownloadManager {
    pub fn new(
        registry: NodeRegistry,
        worker: TransferWorker,
        download_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            table: Arc::new(JobTable::new()),
            worker,
            download_root: download_root.into(),
        }
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Record a job per item and start the batch in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, request: DownloadRequest) -> Result<Vec<String>, DownloadError> {
        if request.items.is_empty() {
            return Err(DownloadError::EmptyBatch);
        }

        let base_url = self.registry.lookup(&request.owner).map_err(|e| match e {
            StoreError::NodeNotFound(owner) => DownloadError::UnknownOwner(owner),
            other => DownloadError::Store(other),
        })?;

        let dir = match request.folder_name.as_deref().and_then(sanitize_component) {
            Some(folder) => self.download_root.join(folder),
            None => self.download_root.clone(),
        };

        let tickets: Vec<JobTicket> = request
            .items
            .iter()
            .map(|item| {
                let filename = local_filename(item);
                let job = DownloadJob::new(
                    &request.owner,
                    &filename,
                    &base_url,
                    &item.remote_path,
                    dir.join(&filename),
                );
                self.table.insert(job)
            })
            .collect();
        let ids = tickets.iter().map(|t| t.id.clone()).collect();

        info!(
            owner = %request.owner,
            files = tickets.len(),
            dir = %dir.display(),
            "Download batch accepted"
        );

        let table = Arc::clone(&self.table);
        let worker = self.worker.clone();
        tokio::spawn(async move {
            for ticket in tickets {
                run_job(&table, &worker, ticket).await;
            }
        });

        Ok(ids)
    }

    /// Cancel a pending or downloading job.
    pub fn cancel(&self, id: &str) -> Result<(), DownloadError> {
        self.table.cancel(id)?;
        debug!(job = id, "Download cancelled");
        Ok(())
    }

    /// Re-run a finished job on its own task.
    pub fn retry(&self, id: &str) -> Result<(), DownloadError> {
        let ticket = self.table.begin_retry(id)?;
        debug!(job = id, generation = ticket.generation, "Download retried");

        let table = Arc::clone(&self.table);
        let worker = self.worker.clone();
        tokio::spawn(async move {
            run_job(&table, &worker, ticket).await;
        });
        Ok(())
    }

    /// Remove finished jobs and their leftover partial files.
    ///
    /// Returns the number of jobs removed.
    pub async fn clear_finished(&self) -> usize {
        let before = self.table.len();
        let partials = self.table.clear_finished();
        for partial in partials {
            match tokio::fs::remove_file(&partial).await {
                Ok(()) => debug!(path = %partial.display(), "Removed partial file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %partial.display(), error = %e, "Failed to remove partial file"),
            }
        }
        before.saturating_sub(self.table.len())
    }

    /// All jobs, newest first.
    pub fn jobs(&self) -> Vec<JobView> {
        self.table.views()
    }

    pub fn job(&self, id: &str) -> Option<JobView> {
        self.table.get(id)
    }
}

async fn run_job(table: &JobTable, worker: &TransferWorker, ticket: JobTicket) {
    if !table.start(&ticket.id, ticket.generation) {
        debug!(job = %ticket.id, "Skipping job no longer pending");
        return;
    }
    let observer = table.observer(&ticket);
    let outcome = worker.run(&ticket.request, &observer, &ticket.cancel).await;
    table.finish(&ticket.id, ticket.generation, outcome);
}

fn local_filename(item: &DownloadItem) -> String {
    sanitize_component(&item.filename)
        .or_else(|| sanitize_component(&item.remote_path))
        .unwrap_or_else(|| "download".to_string())
}

/// Reduce `name` to a single safe path component.
///
/// Only the last `/` or `\` separated segment is kept and characters that
/// are invalid in file names are replaced. Returns `None` for names that
/// are empty or refer to `.`/`..`.
pub fn sanitize_component(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Database;
    use crate::transfer::TransferConfig;
    use tempfile::TempDir;

    fn manager(root: &Path) -> DownloadManager {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = NodeRegistry::new(db);
        registry.register("Josh", "http://127.0.0.1:9").unwrap();
        let worker = TransferWorker::new(TransferConfig::default()).unwrap();
        DownloadManager::new(registry, worker, root)
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Heat.mkv").as_deref(), Some("Heat.mkv"));
        assert_eq!(sanitize_component("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_component("a\\b\\c.mkv").as_deref(), Some("c.mkv"));
        assert_eq!(sanitize_component("what?.mkv").as_deref(), Some("what_.mkv"));
        assert_eq!(sanitize_component(".."), None);
        assert_eq!(sanitize_component("dir/"), None);
        assert_eq!(sanitize_component("  "), None);
    }

    #[test]
    fn test_local_filename_falls_back_to_remote_path() {
        let item = DownloadItem::new("Movies/Heat.mkv", "");
        assert_eq!(local_filename(&item), "Heat.mkv");
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_batch() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path());

        let result = manager.enqueue(DownloadRequest::new("Josh", vec![]));
        assert!(matches!(result, Err(DownloadError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_enqueue_unknown_owner() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path());

        let request = DownloadRequest::new("Nobody", vec![DownloadItem::new("a.mkv", "a.mkv")]);
        let result = manager.enqueue(request);
        assert!(matches!(result, Err(DownloadError::UnknownOwner(owner)) if owner == "Nobody"));
        assert!(manager.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_skips_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("Heat");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Heat.mkv"), b"done").unwrap();
        let manager = manager(temp_dir.path());

        let request = DownloadRequest::new("Josh", vec![DownloadItem::new("Movies/Heat.mkv", "Heat.mkv")])
            .with_folder_name("../Heat");
        let ids = manager.enqueue(request).unwrap();
        assert_eq!(ids.len(), 1);

        let mut status = None;
        for _ in 0..100 {
            status = manager.job(&ids[0]).map(|v| v.status);
            if status == Some(crate::jobs::JobStatus::Skipped) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(crate::jobs::JobStatus::Skipped));
        let view = manager.job(&ids[0]).unwrap();
        assert_eq!(PathBuf::from(view.local_path), folder.join("Heat.mkv"));
    }

    #[tokio::test]
    async fn test_clear_finished_removes_partials() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path());
        let ticket = manager.table.insert(DownloadJob::new(
            "Josh",
            "a.mkv",
            "http://127.0.0.1:9",
            "a.mkv",
            temp_dir.path().join("a.mkv"),
        ));
        std::fs::write(temp_dir.path().join("a.mkv.part"), b"half").unwrap();
        manager.cancel(&ticket.id).unwrap();

        assert_eq!(manager.clear_finished().await, 1);
        assert!(!temp_dir.path().join("a.mkv.part").exists());
        assert!(manager.jobs().is_empty());
    }
}
