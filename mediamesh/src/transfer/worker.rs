//! Resumable HTTP transfer worker.
//!
//! One logical transfer is a sequence of attempts against a remote node's
//! `/serve` endpoint. Each attempt resumes from the bytes already present in
//! `<dest>.part`, so an interrupted attempt never throws data away:
//!
//! ```text
//!   attempt 1: Range bytes=0-      ──► 0 ... N   (stalled)
//!              backoff 2s
//!   attempt 2: Range bytes=N-      ──► N ... total
//!              rename .part → dest
//! ```
//!
//! Failures other than cancellation are retried according to the
//! configured [`RetryPolicy`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode, Url};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{TransferError, TransferResult};
use super::policy::RetryPolicy;
use super::progress::{SpeedMeter, TransferObserver, TransferProgress};
use crate::SECRET_HEADER;

/// Default window without data before an attempt is abandoned.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(45);

/// Suffix of the partial file next to the final destination.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Worker settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum time without data (headers or body chunk).
    pub stall_timeout: Duration,
    /// Attempt and backoff policy.
    pub policy: RetryPolicy,
    /// Shared secret sent to the remote node (empty sends nothing).
    pub secret: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            policy: RetryPolicy::transfer_default(),
            secret: String::new(),
        }
    }
}

impl TransferConfig {
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }
}

/// A file to fetch from a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Base URL of the owning node, e.g. `http://josh.lan:4242`.
    pub base_url: String,
    /// Path of the file relative to the remote media root.
    pub remote_path: String,
    /// Final local destination.
    pub dest: PathBuf,
}

impl TransferRequest {
    pub fn new(
        base_url: impl Into<String>,
        remote_path: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            remote_path: remote_path.into(),
            dest: dest.into(),
        }
    }

    /// Location of the partial file for this request.
    pub fn partial_path(&self) -> PathBuf {
        partial_path_for(&self.dest)
    }

    /// The remote `/serve` URL for this request.
    pub fn serve_url(&self) -> TransferResult<Url> {
        let invalid = |reason: String| TransferError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("serve");
        url.query_pairs_mut().append_pair("path", &self.remote_path);
        Ok(url)
    }
}

/// `<dest>.part`
pub fn partial_path_for(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Final result of a logical transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was fetched and renamed into place.
    Completed { bytes: u64 },
    /// The destination already existed; nothing was fetched.
    Skipped,
    /// Every attempt failed.
    Failed { message: String, attempts: u32 },
    /// The transfer was cancelled.
    Cancelled,
}

/// Fetches files from remote nodes with resume, stall detection and retry.
#[derive(Debug, Clone)]
pub struct TransferWorker {
    client: Client,
    config: TransferConfig,
}

impl TransferWorker {
    /// Create a worker with its own HTTP client.
    pub fn new(config: TransferConfig) -> TransferResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.stall_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a worker around an existing client.
    pub fn with_client(client: Client, config: TransferConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Run a full transfer: skip check, attempts and backoff waits.
    pub async fn run(
        &self,
        request: &TransferRequest,
        observer: &dyn TransferObserver,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        if fs::try_exists(&request.dest).await.unwrap_or(false) {
            debug!(dest = %request.dest.display(), "Destination exists, skipping transfer");
            return TransferOutcome::Skipped;
        }

        let max_attempts = self.config.policy.max_attempts();
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return TransferOutcome::Cancelled;
            }
            observer.on_attempt(attempt);

            let error = match self.attempt(request, observer, cancel).await {
                Ok(bytes) => {
                    info!(
                        dest = %request.dest.display(),
                        bytes,
                        attempt,
                        "Transfer completed"
                    );
                    return TransferOutcome::Completed { bytes };
                }
                Err(TransferError::Cancelled) => return TransferOutcome::Cancelled,
                Err(e) => e,
            };

            let delay = if error.is_retryable() {
                self.config.policy.delay_for_attempt(attempt)
            } else {
                None
            };

            let Some(delay) = delay else {
                warn!(
                    remote_path = %request.remote_path,
                    attempt,
                    max_attempts,
                    error = %error,
                    "Transfer failed"
                );
                return TransferOutcome::Failed {
                    message: error.to_string(),
                    attempts: attempt,
                };
            };

            debug!(
                remote_path = %request.remote_path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transfer attempt failed, backing off"
            );
            observer.on_retry_scheduled(attempt, delay, &error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return TransferOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// A single attempt. Returns the final file size on success.
    pub async fn attempt(
        &self,
        request: &TransferRequest,
        observer: &dyn TransferObserver,
        cancel: &CancellationToken,
    ) -> TransferResult<u64> {
        let partial = request.partial_path();
        let offset = match fs::metadata(&partial).await {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };
        let url = request.serve_url()?;
        let stall = self.config.stall_timeout;

        let mut builder = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes={}-", offset));
        if !self.config.secret.is_empty() {
            builder = builder.header(SECRET_HEADER, &self.config.secret);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            sent = tokio::time::timeout(stall, builder.send()) => {
                sent.map_err(|_| TransferError::Stalled(stall))??
            }
        };

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            // The partial file no longer matches the remote file.
            remove_partial(&partial).await;
            return Err(TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if is_html(&response) {
            return Err(TransferError::HtmlPayload);
        }

        // A plain 200 carries the whole file regardless of the range asked for.
        let offset = if status == StatusCode::PARTIAL_CONTENT {
            offset
        } else {
            0
        };
        let total = response
            .content_length()
            .map(|len| offset + len)
            .unwrap_or(0);
        observer.on_progress(TransferProgress {
            downloaded_bytes: offset,
            total_bytes: total,
            speed: 0.0,
        });

        if let Some(parent) = request.dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| write_error(parent, source))?;
        }
        let mut file = open_partial(&partial, offset > 0).await?;

        let streamed = stream_body(
            response, &mut file, &partial, offset, total, stall, observer, cancel,
        )
        .await;
        let flushed = file.flush().await.map_err(|e| write_error(&partial, e));
        drop(file);
        let received = streamed?;
        flushed?;

        if total > 0 && received != total {
            return Err(TransferError::Incomplete {
                received,
                expected: total,
            });
        }

        fs::rename(&partial, &request.dest)
            .await
            .map_err(|source| write_error(&request.dest, source))?;
        Ok(received)
    }
}

#[allow(clippy::too_many_arguments)]
async fn stream_body(
    response: reqwest::Response,
    file: &mut File,
    partial: &Path,
    offset: u64,
    total: u64,
    stall: Duration,
    observer: &dyn TransferObserver,
    cancel: &CancellationToken,
) -> TransferResult<u64> {
    let mut stream = response.bytes_stream();
    let mut received = offset;
    let mut meter = SpeedMeter::new(received);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            next = tokio::time::timeout(stall, stream.next()) => next,
        };

        let chunk = match next {
            Err(_) => return Err(TransferError::Stalled(stall)),
            Ok(None) => break,
            Ok(Some(chunk)) => chunk?,
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| write_error(partial, e))?;
        received += chunk.len() as u64;
        meter.record(received);
        observer.on_progress(TransferProgress {
            downloaded_bytes: received,
            total_bytes: total,
            speed: meter.speed(),
        });
    }

    Ok(received)
}

async fn open_partial(partial: &Path, append: bool) -> TransferResult<File> {
    let opened = if append {
        OpenOptions::new().append(true).open(partial).await
    } else {
        File::create(partial).await
    };
    opened.map_err(|e| write_error(partial, e))
}

async fn remove_partial(partial: &Path) {
    if let Err(e) = fs::remove_file(partial).await {
        warn!(path = %partial.display(), error = %e, "Failed to remove stale partial file");
    }
}

fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

fn write_error(path: &Path, source: std::io::Error) -> TransferError {
    TransferError::Write {
        path: path.to_path_buf(),
        source,
    }
}
