//! Periodic sync trigger.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::coordinator::SyncCoordinator;
use super::error::SyncError;

/// Background loop that starts a sync run every `interval`.
///
/// A tick that lands while a run is in progress is dropped.
pub struct SyncSchedule {
    coordinator: SyncCoordinator,
    interval: Duration,
    run_on_startup: bool,
}

impl SyncSchedule {
    /// `interval` of zero disables the periodic trigger.
    pub fn new(coordinator: SyncCoordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            run_on_startup: false,
        }
    }

    pub fn with_run_on_startup(mut self, enabled: bool) -> Self {
        self.run_on_startup = enabled;
        self
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        if self.run_on_startup {
            self.fire();
        }
        if self.interval.is_zero() {
            debug!("Periodic sync disabled");
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Periodic sync scheduled");
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Sync schedule shutting down");
                    break;
                }

                _ = ticker.tick() => self.fire(),
            }
        }
    }

    fn fire(&self) {
        match self.coordinator.trigger() {
            Ok(()) => debug!("Scheduled sync started"),
            Err(SyncError::AlreadyRunning) => debug!("Sync already running, skipping tick"),
            Err(e) => warn!(error = %e, "Scheduled sync could not start"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, CatalogStore, Database};
    use crate::scanner::{LocalScanner, ScanError};
    use crate::sync::SyncStep;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingScanner(AtomicUsize);

    impl LocalScanner for CountingScanner {
        fn scan(&self, _owner: &str) -> Result<Vec<CatalogEntry>, ScanError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn coordinator(scanner: Arc<CountingScanner>) -> SyncCoordinator {
        let db = Arc::new(Database::open_in_memory().unwrap());
        SyncCoordinator::new(CatalogStore::new(db, "Master"), scanner, "http://master:4242")
    }

    #[tokio::test]
    async fn test_runs_on_startup_and_stops_on_shutdown() {
        let scanner = Arc::new(CountingScanner::default());
        let sync = coordinator(Arc::clone(&scanner));
        let shutdown = CancellationToken::new();

        let handle = SyncSchedule::new(sync.clone(), Duration::from_secs(3600))
            .with_run_on_startup(true)
            .spawn(shutdown.clone());

        for _ in 0..200 {
            if sync.status().step == SyncStep::Complete {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(scanner.0.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("schedule did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_disables_loop() {
        let scanner = Arc::new(CountingScanner::default());
        let schedule = SyncSchedule::new(coordinator(Arc::clone(&scanner)), Duration::ZERO);

        // Returns without waiting for shutdown.
        tokio::time::timeout(Duration::from_secs(1), schedule.run(CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(scanner.0.load(Ordering::SeqCst), 0);
    }
}
