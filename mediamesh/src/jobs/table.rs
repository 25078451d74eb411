//! Concurrent job table.
//!
//! All job mutations go through [`JobTable`]. Updates from running work are
//! tagged with the job's generation and ignored once the job is terminal or
//! has been retried, so a cancelled or superseded transfer can never
//! overwrite newer state.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::model::{DownloadJob, JobState, JobView};
use crate::transfer::{
    partial_path_for, TransferError, TransferObserver, TransferOutcome, TransferProgress,
    TransferRequest,
};

/// Length of generated job ids.
pub const JOB_ID_LEN: usize = 8;

/// Everything a runner needs to drive one job generation.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub id: String,
    pub generation: u64,
    pub request: TransferRequest,
    pub cancel: CancellationToken,
}

/// In-memory table of download jobs keyed by id.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: DashMap<String, DownloadJob>,
    sequence: AtomicU64,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new job under a fresh id and return its ticket.
    pub fn insert(&self, mut job: DownloadJob) -> JobTicket {
        job.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        loop {
            let id = generate_id();
            if let Entry::Vacant(slot) = self.jobs.entry(id.clone()) {
                job.id = id;
                let ticket = ticket_for(&job);
                slot.insert(job);
                return ticket;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<JobView> {
        self.jobs.get(id).map(|job| job.view())
    }

    /// All jobs, newest first.
    pub fn views(&self) -> Vec<JobView> {
        let mut jobs: Vec<(u64, JobView)> = self
            .jobs
            .iter()
            .map(|job| (job.sequence, job.view()))
            .collect();
        jobs.sort_by(|a, b| b.0.cmp(&a.0));
        jobs.into_iter().map(|(_, view)| view).collect()
    }

    /// Move a pending job of `generation` to downloading.
    ///
    /// Returns false when the job was cancelled, retried or removed.
    pub fn start(&self, id: &str, generation: u64) -> bool {
        self.with_current(id, generation, |state| {
            if *state == JobState::Pending {
                *state = JobState::Downloading {
                    progress: TransferProgress::default(),
                    attempt: 1,
                    note: None,
                };
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Record the terminal outcome of a transfer.
    pub fn finish(&self, id: &str, generation: u64, outcome: TransferOutcome) {
        self.with_current(id, generation, |state| {
            let progress = state.progress();
            *state = match outcome {
                TransferOutcome::Completed { bytes } => JobState::Completed {
                    total_bytes: bytes,
                    finished_at: Utc::now(),
                },
                TransferOutcome::Skipped => JobState::Skipped,
                TransferOutcome::Failed { message, attempts } => JobState::Error {
                    message,
                    attempts,
                    progress,
                },
                TransferOutcome::Cancelled => JobState::Cancelled { progress },
            };
        });
    }

    /// Cancel a job. Terminal jobs are left as they are.
    pub fn cancel(&self, id: &str) -> Result<(), DownloadError> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| DownloadError::JobNotFound(id.to_string()))?;
        if !job.state.is_terminal() {
            let progress = job.state.progress();
            job.state = JobState::Cancelled { progress };
            job.cancel.cancel();
        }
        Ok(())
    }

    /// Reset a terminal job to pending under a new generation.
    pub fn begin_retry(&self, id: &str) -> Result<JobTicket, DownloadError> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| DownloadError::JobNotFound(id.to_string()))?;
        if !job.state.is_terminal() {
            return Err(DownloadError::JobActive(id.to_string()));
        }
        job.generation += 1;
        job.cancel = CancellationToken::new();
        job.state = JobState::Pending;
        job.start_time = Utc::now();
        Ok(ticket_for(&job))
    }

    /// Remove every terminal job.
    ///
    /// Returns the partial files left behind by cancelled or failed jobs,
    /// except those an active job for the same destination is still writing.
    pub fn clear_finished(&self) -> Vec<PathBuf> {
        let active: HashSet<PathBuf> = self
            .jobs
            .iter()
            .filter(|job| !job.state.is_terminal())
            .map(|job| job.local_path.clone())
            .collect();

        let mut partials = Vec::new();
        self.jobs.retain(|_, job| {
            if !job.state.is_terminal() {
                return true;
            }
            if matches!(job.state, JobState::Cancelled { .. } | JobState::Error { .. })
                && !active.contains(&job.local_path)
            {
                let partial = partial_path_for(&job.local_path);
                if !partials.contains(&partial) {
                    partials.push(partial);
                }
            }
            false
        });
        partials
    }

    /// Observer that writes progress of one job generation into the table.
    pub fn observer(&self, ticket: &JobTicket) -> JobObserver<'_> {
        JobObserver {
            table: self,
            id: ticket.id.clone(),
            generation: ticket.generation,
        }
    }

    fn with_current<R>(
        &self,
        id: &str,
        generation: u64,
        f: impl FnOnce(&mut JobState) -> R,
    ) -> Option<R> {
        let mut job = self.jobs.get_mut(id)?;
        if job.generation != generation || job.state.is_terminal() {
            return None;
        }
        Some(f(&mut job.state))
    }
}

/// Progress sink bound to one job generation.
pub struct JobObserver<'a> {
    table: &'a JobTable,
    id: String,
    generation: u64,
}

impl TransferObserver for JobObserver<'_> {
    fn on_attempt(&self, attempt: u32) {
        self.table.with_current(&self.id, self.generation, |state| {
            let progress = state.progress();
            *state = JobState::Downloading {
                progress,
                attempt,
                note: None,
            };
        });
    }

    fn on_progress(&self, update: TransferProgress) {
        self.table.with_current(&self.id, self.generation, |state| {
            if let JobState::Downloading { progress, .. } = state {
                *progress = update;
            }
        });
    }

    fn on_retry_scheduled(&self, _attempt: u32, delay: Duration, error: &TransferError) {
        let note = format!("{}; retrying in {}", error, format_delay(delay));
        self.table.with_current(&self.id, self.generation, |state| {
            if let JobState::Downloading { note: slot, progress, .. } = state {
                progress.speed = 0.0;
                *slot = Some(note);
            }
        });
    }
}

fn ticket_for(job: &DownloadJob) -> JobTicket {
    JobTicket {
        id: job.id.clone(),
        generation: job.generation,
        request: job.transfer_request(),
        cancel: job.cancel.clone(),
    }
}

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(JOB_ID_LEN)
        .map(char::from)
        .collect()
}

/// `2s`, `12.5s`
fn format_delay(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}
