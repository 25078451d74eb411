//! Error types for file transfers.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Reasons a single transfer attempt can fail.
///
/// Everything except [`TransferError::Cancelled`] is retried by the worker's
/// retry loop; callers only ever see the final message on the job record.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote answered with something other than 200 or 206.
    #[error("remote answered HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The remote sent an HTML page instead of file bytes.
    #[error("remote sent an HTML page instead of file data (check the node URL and secret)")]
    HtmlPayload,

    /// No data arrived within the stall window.
    #[error("transfer stalled: no data for {}s", .0.as_secs())]
    Stalled(Duration),

    /// The connection failed or was reset.
    #[error("connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// The body ended before the announced length was received.
    #[error("transfer ended early: received {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    /// Writing the partial or final file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The request URL could not be built.
    #[error("invalid remote URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The transfer was cancelled.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Whether the retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::InvalidUrl { .. })
    }
}
