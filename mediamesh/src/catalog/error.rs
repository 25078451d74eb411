//! Error types for the catalog store and node registry.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for catalog operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the catalog database.
///
/// Every write runs inside a transaction; when one of these is returned the
/// transaction has been rolled back and the previous state is intact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or initialized.
    #[error("failed to open catalog database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement or the commit of a transaction failed.
    #[error("catalog persistence failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// No node is registered for the owner.
    #[error("no node registered for owner '{0}'")]
    NodeNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found_display() {
        let err = StoreError::NodeNotFound("Josh".to_string());
        assert_eq!(err.to_string(), "no node registered for owner 'Josh'");
    }

    #[test]
    fn test_persistence_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(err.to_string().starts_with("catalog persistence failed"));
    }
}
