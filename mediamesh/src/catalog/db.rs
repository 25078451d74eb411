//! SQLite connection shared by the catalog store and the node registry.

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::debug;

use super::error::{StoreError, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        owner TEXT PRIMARY KEY,
        url TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS catalog (
        id TEXT NOT NULL,
        owner TEXT NOT NULL,
        filename TEXT NOT NULL,
        path TEXT NOT NULL,
        library TEXT NOT NULL,
        quality TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        last_modified INTEGER NOT NULL,
        PRIMARY KEY (owner, path)
    );
    CREATE INDEX IF NOT EXISTS catalog_owner ON catalog(owner);
";

/// Catalog database.
///
/// A single connection guarded by a mutex. Callers never touch rows directly;
/// the store and the registry run each operation inside one transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            // SQLite does not create missing parent directories
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn, path)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, path: &Path) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Catalog database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("catalog.db");

        let db = Database::open(&path).unwrap();
        drop(db);

        assert!(path.exists());
    }

    #[test]
    fn test_open_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");

        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();

        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
