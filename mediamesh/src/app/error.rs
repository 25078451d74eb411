//! Application error types.

use std::fmt;
use std::net::SocketAddr;

use crate::catalog::StoreError;
use crate::sync::SyncError;
use crate::transfer::TransferError;

/// Errors that can occur while building or running a node.
#[derive(Debug)]
pub enum AppError {
    /// Failed to open the catalog database or register the host.
    Catalog(StoreError),

    /// Failed to build the master client, or a sync run failed.
    Sync(SyncError),

    /// Failed to build the transfer worker.
    Transfer(TransferError),

    /// Failed to bind the listen address.
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    Serve(std::io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Catalog(e) => write!(f, "Catalog error: {}", e),
            AppError::Sync(e) => write!(f, "Sync error: {}", e),
            AppError::Transfer(e) => {
                write!(f, "Failed to create transfer worker: {}", e)
            }
            AppError::Bind { addr, source } => {
                write!(f, "Failed to listen on {}: {}", addr, source)
            }
            AppError::Serve(e) => write!(f, "HTTP server error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Catalog(e) => Some(e),
            AppError::Sync(e) => Some(e),
            AppError::Transfer(e) => Some(e),
            AppError::Bind { source, .. } => Some(source),
            AppError::Serve(e) => Some(e),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Catalog(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        AppError::Sync(e)
    }
}

impl From<TransferError> for AppError {
    fn from(e: TransferError) -> Self {
        AppError::Transfer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Bind {
            addr: "127.0.0.1:4242".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:4242"));
        assert!(err.to_string().contains("in use"));
    }

    #[test]
    fn test_app_error_from_sync_error() {
        let app_err: AppError = SyncError::AlreadyRunning.into();
        assert!(matches!(app_err, AppError::Sync(_)));
        assert!(std::error::Error::source(&app_err).is_some());
    }
}
