//! Download job records and their wire view.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::transfer::{TransferProgress, TransferRequest};

/// Lifecycle of a download job.
///
/// Each case carries only the data meaningful in that state.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Accepted, waiting for its turn in the batch.
    Pending,
    /// An attempt is running or a retry is scheduled.
    Downloading {
        progress: TransferProgress,
        attempt: u32,
        /// Transient note such as "retrying in 5s".
        note: Option<String>,
    },
    Completed {
        total_bytes: u64,
        finished_at: DateTime<Utc>,
    },
    Error {
        message: String,
        attempts: u32,
        progress: TransferProgress,
    },
    Cancelled {
        progress: TransferProgress,
    },
    /// The destination already existed.
    Skipped,
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Downloading { .. } => JobStatus::Downloading,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Error { .. } => JobStatus::Error,
            Self::Cancelled { .. } => JobStatus::Cancelled,
            Self::Skipped => JobStatus::Skipped,
        }
    }

    /// Whether the job will not change again without a retry.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Downloading { .. })
    }

    /// Last known byte progress.
    pub fn progress(&self) -> TransferProgress {
        match self {
            Self::Downloading { progress, .. }
            | Self::Error { progress, .. }
            | Self::Cancelled { progress } => *progress,
            Self::Completed { total_bytes, .. } => TransferProgress {
                downloaded_bytes: *total_bytes,
                total_bytes: *total_bytes,
                speed: 0.0,
            },
            Self::Pending | Self::Skipped => TransferProgress::default(),
        }
    }
}

/// Flat status tag used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Completed,
    Error,
    Cancelled,
    Skipped,
}

/// An in-memory download job.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: String,
    pub owner: String,
    pub filename: String,
    /// Base URL of the owning node.
    pub remote_url: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub start_time: DateTime<Utc>,
    pub state: JobState,
    /// Bumped on every retry; work tagged with an older value is ignored.
    pub generation: u64,
    pub(crate) sequence: u64,
    pub(crate) cancel: CancellationToken,
}

impl DownloadJob {
    pub fn new(
        owner: impl Into<String>,
        filename: impl Into<String>,
        remote_url: impl Into<String>,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: String::new(),
            owner: owner.into(),
            filename: filename.into(),
            remote_url: remote_url.into(),
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            start_time: Utc::now(),
            state: JobState::Pending,
            generation: 0,
            sequence: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn transfer_request(&self) -> TransferRequest {
        TransferRequest::new(
            self.remote_url.clone(),
            self.remote_path.clone(),
            self.local_path.clone(),
        )
    }

    pub fn view(&self) -> JobView {
        let progress = self.state.progress();
        let (attempt, note, error) = match &self.state {
            JobState::Downloading { attempt, note, .. } => (*attempt, note.clone(), None),
            JobState::Error {
                message, attempts, ..
            } => (*attempts, None, Some(message.clone())),
            _ => (0, None, None),
        };

        JobView {
            id: self.id.clone(),
            owner: self.owner.clone(),
            filename: self.filename.clone(),
            remote_url: self.remote_url.clone(),
            remote_path: self.remote_path.clone(),
            local_path: self.local_path.to_string_lossy().into_owned(),
            total_bytes: progress.total_bytes,
            downloaded_bytes: progress.downloaded_bytes,
            status: self.state.status(),
            start_time: self.start_time.timestamp_millis(),
            speed: progress.speed,
            attempt,
            note,
            error,
        }
    }
}

/// Serialized form of a [`DownloadJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub owner: String,
    pub filename: String,
    pub remote_url: String,
    pub remote_path: String,
    pub local_path: String,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub status: JobStatus,
    /// Unix milliseconds.
    pub start_time: i64,
    /// Bytes per second.
    pub speed: f64,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> DownloadJob {
        DownloadJob::new("Josh", "Heat.mkv", "http://josh:4242", "Movies/Heat.mkv", "/dl/Heat.mkv")
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Downloading {
            progress: TransferProgress::default(),
            attempt: 1,
            note: None
        }
        .is_terminal());
        assert!(JobState::Skipped.is_terminal());
        assert!(JobState::Cancelled {
            progress: TransferProgress::default()
        }
        .is_terminal());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let mut job = job();
        job.id = "abcd1234".to_string();
        job.state = JobState::Downloading {
            progress: TransferProgress {
                downloaded_bytes: 10,
                total_bytes: 100,
                speed: 5.0,
            },
            attempt: 2,
            note: Some("retrying in 2s".to_string()),
        };

        let value = serde_json::to_value(job.view()).unwrap();
        assert_eq!(value["id"], "abcd1234");
        assert_eq!(value["status"], "downloading");
        assert_eq!(value["remotePath"], "Movies/Heat.mkv");
        assert_eq!(value["downloadedBytes"], 10);
        assert_eq!(value["totalBytes"], 100);
        assert_eq!(value["note"], "retrying in 2s");
        assert!(value.get("error").is_none());
        assert!(value.get("cancel").is_none());
    }

    #[test]
    fn test_error_view_carries_message() {
        let mut job = job();
        job.state = JobState::Error {
            message: "transfer stalled: no data for 45s".to_string(),
            attempts: 5,
            progress: TransferProgress::default(),
        };

        let view = job.view();
        assert_eq!(view.status, JobStatus::Error);
        assert_eq!(view.attempt, 5);
        assert_eq!(view.error.as_deref(), Some("transfer stalled: no data for 45s"));
    }
}
