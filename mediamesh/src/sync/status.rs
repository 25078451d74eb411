//! Progress of the current or most recent sync run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStep {
    #[default]
    Idle,
    ScanningLocal,
    PushingToMaster,
    PullingFromMaster,
    Complete,
    Error,
}

/// Snapshot of sync progress, as returned by `GET /scan-status`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub is_running: bool,
    pub step: SyncStep,
    /// Files found by the local scan.
    pub local_files: usize,
    /// Scanned files that were not in the previous local catalog.
    pub new_local: usize,
    /// Notes from the push and pull phases.
    pub remote_summary: Vec<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Process-wide sync status shared between the coordinator and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedScanStatus {
    inner: Arc<Mutex<ScanStatus>>,
}

impl SharedScanStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ScanStatus {
        self.inner.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ScanStatus)) {
        f(&mut self.inner.lock());
    }

    pub fn set_step(&self, step: SyncStep) {
        self.update(|status| status.step = step);
    }

    pub fn add_remote_note(&self, note: impl Into<String>) {
        let note = note.into();
        self.update(|status| status.remote_summary.push(note));
    }

    /// Clear the previous run and mark a new one as started.
    pub(crate) fn begin_run(&self) {
        self.update(|status| {
            *status = ScanStatus {
                is_running: true,
                step: SyncStep::ScanningLocal,
                started_at: Some(Utc::now()),
                ..ScanStatus::default()
            };
        });
    }

    /// Record the terminal step of a run.
    pub(crate) fn end_run(&self, error: Option<String>) {
        self.update(|status| {
            status.step = if error.is_some() {
                SyncStep::Error
            } else {
                SyncStep::Complete
            };
            status.error = error;
            status.is_running = false;
            status.finished_at = Some(Utc::now());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_run_resets_previous_state() {
        let status = SharedScanStatus::new();
        status.update(|s| {
            s.local_files = 10;
            s.error = Some("boom".to_string());
            s.remote_summary.push("old".to_string());
        });

        status.begin_run();

        let snapshot = status.snapshot();
        assert!(snapshot.is_running);
        assert_eq!(snapshot.step, SyncStep::ScanningLocal);
        assert_eq!(snapshot.local_files, 0);
        assert!(snapshot.error.is_none());
        assert!(snapshot.remote_summary.is_empty());
        assert!(snapshot.started_at.is_some());
    }

    #[test]
    fn test_end_run_with_error() {
        let status = SharedScanStatus::new();
        status.begin_run();
        status.end_run(Some("scan failed".to_string()));

        let snapshot = status.snapshot();
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.step, SyncStep::Error);
        assert_eq!(snapshot.error.as_deref(), Some("scan failed"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(ScanStatus::default()).unwrap();
        assert_eq!(value["isRunning"], false);
        assert_eq!(value["step"], "idle");
        assert!(value["remoteSummary"].as_array().unwrap().is_empty());
    }
}
