//! Node registry: owner identity to reachable base URL.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::db::Database;
use super::error::{StoreError, StoreResult};
use super::model::Node;

/// Persistent owner → URL mapping.
#[derive(Clone)]
pub struct NodeRegistry {
    db: Arc<Database>,
}

impl NodeRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register (or re-register) a node. The last writer for an owner wins.
    pub fn register(&self, owner: &str, url: &str) -> StoreResult<()> {
        let conn = self.db.lock();
        upsert_node(&conn, owner, url)?;
        debug!(owner, url, "Node registered");
        Ok(())
    }

    /// Resolve the base URL of `owner`.
    pub fn lookup(&self, owner: &str) -> StoreResult<String> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT url FROM nodes WHERE owner = ?1",
            [owner],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::NodeNotFound(owner.to_string()))
    }

    /// All registered nodes, ordered by owner.
    pub fn list(&self) -> StoreResult<Vec<Node>> {
        let conn = self.db.lock();
        list_nodes(&conn)
    }
}

/// Upsert a node row. Shared with the external merge, which must write nodes
/// inside its own transaction.
pub(crate) fn upsert_node(conn: &Connection, owner: &str, url: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO nodes (owner, url) VALUES (?1, ?2)
         ON CONFLICT(owner) DO UPDATE SET url = excluded.url",
        params![owner, url],
    )?;
    Ok(())
}

pub(crate) fn list_nodes(conn: &Connection) -> StoreResult<Vec<Node>> {
    let mut stmt = conn.prepare("SELECT owner, url FROM nodes ORDER BY owner")?;
    let nodes = stmt
        .query_map([], |row| {
            Ok(Node {
                owner: row.get(0)?,
                url: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}
