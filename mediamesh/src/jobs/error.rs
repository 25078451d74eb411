use thiserror::Error;

use crate::catalog::StoreError;

/// Errors returned by the download job manager.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No node is registered for the requested owner.
    #[error("unknown owner '{0}'")]
    UnknownOwner(String),

    #[error("download job '{0}' not found")]
    JobNotFound(String),

    /// Retry was requested for a job that is still pending or downloading.
    #[error("download job '{0}' is still active")]
    JobActive(String),

    #[error("download request contains no files")]
    EmptyBatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}
