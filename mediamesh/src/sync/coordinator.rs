//! Sync coordinator: one full synchronization cycle.
//!
//! # Run sequence
//!
//! ```text
//! Idle ─► ScanningLocal ─► replace_owner_catalog(host)
//!              │
//!              ├── no master ───────────────────────────────► Complete
//!              │
//!              └── PushingToMaster (POST /sync, best effort)
//!                       │
//!                  PullingFromMaster (GET /files, best effort)
//!                       │
//!                  merge_external_catalog ──────────────────► Complete
//!
//! any hard failure ─────────────────────────────────────────► Error
//! ```
//!
//! Only one run may be in flight. The running flag is taken with a
//! compare-and-swap before any asynchronous work and released by
//! [`RunGuard`] on drop, so an error or a panic inside the run can never
//! leave the node stuck in "running".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::client::{MasterClient, SyncPush};
use super::error::{SyncError, SyncResult};
use super::status::{ScanStatus, SharedScanStatus, SyncStep};
use crate::catalog::CatalogStore;
use crate::scanner::LocalScanner;

/// Drives sync runs for the host owner.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: CatalogStore,
    scanner: Arc<dyn LocalScanner>,
    master: Option<MasterClient>,
    advertised_url: String,
    running: Arc<AtomicBool>,
    status: SharedScanStatus,
}

impl SyncCoordinator {
    /// Create a coordinator for a master node (no upstream).
    pub fn new(
        store: CatalogStore,
        scanner: Arc<dyn LocalScanner>,
        advertised_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scanner,
            master: None,
            advertised_url: advertised_url.into(),
            running: Arc::new(AtomicBool::new(false)),
            status: SharedScanStatus::new(),
        }
    }

    /// Make this node a satellite of `master`.
    pub fn with_master(mut self, master: MasterClient) -> Self {
        self.master = Some(master);
        self
    }

    pub fn host_owner(&self) -> &str {
        self.store.host_owner()
    }

    pub fn is_master(&self) -> bool {
        self.master.is_none()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ScanStatus {
        self.status.snapshot()
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Start a run on a background task.
    ///
    /// Fails immediately with [`SyncError::AlreadyRunning`] if a run is in
    /// progress. Must be called from within a Tokio runtime.
    pub fn trigger(&self) -> SyncResult<()> {
        let guard = self.try_begin()?;
        let this = self.clone();
        tokio::spawn(async move {
            // Outcome is recorded in the shared status.
            let _ = this.execute(guard).await;
        });
        Ok(())
    }

    /// Run a full cycle on the current task and return the final status.
    pub async fn run_now(&self) -> SyncResult<ScanStatus> {
        let guard = self.try_begin()?;
        self.execute(guard).await
    }

    fn try_begin(&self) -> SyncResult<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        self.status.begin_run();
        Ok(RunGuard {
            running: Arc::clone(&self.running),
            status: self.status.clone(),
            finished: false,
        })
    }

    async fn execute(&self, mut guard: RunGuard) -> SyncResult<ScanStatus> {
        let result = self.run_steps().await;
        let error = result.as_ref().err().map(|e| e.to_string());
        if let Some(message) = &error {
            warn!(error = %message, "Sync run failed");
        }
        self.status.end_run(error);
        guard.finished = true;
        drop(guard);

        result.map(|()| self.status.snapshot())
    }

    async fn run_steps(&self) -> SyncResult<()> {
        let host = self.store.host_owner().to_string();
        let previous = self.store.ids_for_owner(&host)?;

        let scanner = Arc::clone(&self.scanner);
        let owner = host.clone();
        let files = tokio::task::spawn_blocking(move || scanner.scan(&owner))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;

        let new_local = files.iter().filter(|f| !previous.contains(&f.id)).count();
        self.store.replace_owner_catalog(&host, &files)?;
        self.status.update(|status| {
            status.local_files = files.len();
            status.new_local = new_local;
        });
        info!(owner = %host, files = files.len(), new = new_local, "Local catalog replaced");

        let Some(master) = &self.master else {
            return Ok(());
        };

        self.status.set_step(SyncStep::PushingToMaster);
        let push = SyncPush {
            owner: host,
            url: self.advertised_url.clone(),
            files,
        };
        match master.push(&push).await {
            Ok(()) => self
                .status
                .add_remote_note(format!("pushed {} files to master", push.files.len())),
            Err(e) => {
                warn!(master = %master.master_url(), error = %e, "Push to master failed");
                self.status.add_remote_note(format!("push failed: {}", e));
            }
        }

        self.status.set_step(SyncStep::PullingFromMaster);
        match master.pull().await {
            Ok(listing) => {
                let merged = self
                    .store
                    .merge_external_catalog(&listing.files, &listing.nodes)?;
                info!(files = merged, nodes = listing.nodes.len(), "External catalog merged");
                self.status.add_remote_note(format!(
                    "pulled {} files from {} nodes",
                    merged,
                    listing.nodes.len()
                ));
            }
            Err(e) => {
                warn!(master = %master.master_url(), error = %e, "Pull from master failed");
                self.status.add_remote_note(format!("pull failed: {}", e));
            }
        }

        Ok(())
    }
}

/// Holds the single-flight flag for one run.
///
/// Dropping an unfinished guard marks the run as failed.
pub struct RunGuard {
    running: Arc<AtomicBool>,
    status: SharedScanStatus,
    finished: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.status
                .end_run(Some("sync run aborted before completion".to_string()));
        }
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, Database};
    use crate::scanner::ScanError;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;

    struct StaticScanner(Vec<(&'static str, u64)>);

    impl LocalScanner for StaticScanner {
        fn scan(&self, owner: &str) -> Result<Vec<CatalogEntry>, ScanError> {
            Ok(self
                .0
                .iter()
                .map(|(path, size)| CatalogEntry::new(owner, *path, *path, *size))
                .collect())
        }
    }

    struct FailingScanner;

    impl LocalScanner for FailingScanner {
        fn scan(&self, _owner: &str) -> Result<Vec<CatalogEntry>, ScanError> {
            Err(ScanError::MissingRoot(PathBuf::from("/nowhere")))
        }
    }

    /// Blocks until the test releases it.
    struct GatedScanner(parking_lot::Mutex<mpsc::Receiver<()>>);

    impl LocalScanner for GatedScanner {
        fn scan(&self, _owner: &str) -> Result<Vec<CatalogEntry>, ScanError> {
            let _ = self.0.lock().recv();
            Ok(Vec::new())
        }
    }

    fn coordinator(scanner: Arc<dyn LocalScanner>) -> SyncCoordinator {
        let db = Arc::new(Database::open_in_memory().unwrap());
        SyncCoordinator::new(CatalogStore::new(db, "Master"), scanner, "http://master:4242")
    }

    #[tokio::test]
    async fn test_run_now_replaces_local_catalog() {
        let sync = coordinator(Arc::new(StaticScanner(vec![("a.mkv", 1), ("b.mkv", 2)])));

        let status = sync.run_now().await.unwrap();

        assert_eq!(status.step, SyncStep::Complete);
        assert_eq!(status.local_files, 2);
        assert_eq!(status.new_local, 2);
        assert!(!status.is_running);
        assert!(status.remote_summary.is_empty());
        assert_eq!(sync.store.entries_for_owner("Master").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_new_local_counts_only_unseen_entries() {
        let sync = coordinator(Arc::new(StaticScanner(vec![("a.mkv", 1), ("b.mkv", 2)])));
        sync.store
            .replace_owner_catalog("Master", &[CatalogEntry::new("Master", "a.mkv", "a.mkv", 1)])
            .unwrap();

        let status = sync.run_now().await.unwrap();
        assert_eq!(status.new_local, 1);
    }

    #[tokio::test]
    async fn test_failed_run_clears_running_flag() {
        let sync = coordinator(Arc::new(FailingScanner));

        let err = sync.run_now().await.unwrap_err();

        assert!(matches!(err, SyncError::Scan(_)));
        assert!(!sync.is_running());
        let status = sync.status();
        assert_eq!(status.step, SyncStep::Error);
        assert!(!status.is_running);
        assert!(status.error.unwrap().contains("/nowhere"));

        // The next run is accepted again.
        assert!(matches!(sync.run_now().await, Err(SyncError::Scan(_))));
    }

    #[tokio::test]
    async fn test_second_run_while_running_conflicts() {
        let (release, gate) = mpsc::channel();
        let sync = coordinator(Arc::new(GatedScanner(parking_lot::Mutex::new(gate))));

        sync.trigger().unwrap();
        assert!(sync.is_running());
        assert!(matches!(sync.trigger(), Err(SyncError::AlreadyRunning)));
        assert!(matches!(sync.run_now().await, Err(SyncError::AlreadyRunning)));

        release.send(()).unwrap();
        for _ in 0..200 {
            if !sync.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!sync.is_running());
        assert_eq!(sync.status().step, SyncStep::Complete);
    }

    #[tokio::test]
    async fn test_unreachable_master_is_best_effort() {
        let sync = coordinator(Arc::new(StaticScanner(vec![("a.mkv", 1)])))
            .with_master(MasterClient::new("http://127.0.0.1:9", "").unwrap());
        assert!(!sync.is_master());

        let status = sync.run_now().await.unwrap();

        assert_eq!(status.step, SyncStep::Complete);
        assert_eq!(status.remote_summary.len(), 2);
        assert!(status.remote_summary[0].starts_with("push failed"));
        assert!(status.remote_summary[1].starts_with("pull failed"));
        assert_eq!(sync.store.count().unwrap(), 1);
    }

    #[test]
    fn test_dropped_guard_marks_error() {
        let sync = coordinator(Arc::new(FailingScanner));
        let guard = sync.try_begin().unwrap();
        assert!(sync.is_running());

        drop(guard);

        assert!(!sync.is_running());
        let status = sync.status();
        assert_eq!(status.step, SyncStep::Error);
        assert!(!status.is_running);
    }
}
