use thiserror::Error;

use crate::catalog::StoreError;
use crate::scanner::ScanError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the sync coordinator and the master client.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run holds the single-flight guard.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    #[error("local scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A push or pull against the master failed.
    #[error("{0}")]
    Remote(String),

    /// The blocking scan task panicked or was aborted.
    #[error("scan task failed: {0}")]
    Task(String),
}
