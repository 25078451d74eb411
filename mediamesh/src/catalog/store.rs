//! Catalog store: per-owner file descriptors with atomic bulk writes.
//!
//! Two write paths exist and they never overlap:
//!
//! - [`CatalogStore::replace_owner_catalog`] is used by the local scan (for the
//!   host owner) and by a master receiving a satellite push (for that owner).
//! - [`CatalogStore::merge_external_catalog`] is used by a satellite absorbing
//!   the master's merged view. It can never touch host-owned rows.

use std::collections::HashSet;
use std::sync::Arc;

use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use super::db::Database;
use super::error::StoreResult;
use super::model::{CatalogEntry, CatalogFile, Node};
use super::registry::{list_nodes, upsert_node};

const ENTRY_COLUMNS: &str =
    "id, owner, filename, path, library, quality, size_bytes, last_modified";

/// Persistent catalog of every known file.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
    host_owner: String,
}

impl CatalogStore {
    /// Create a store for the node whose own identity is `host_owner`.
    pub fn new(db: Arc<Database>, host_owner: impl Into<String>) -> Self {
        Self {
            db,
            host_owner: host_owner.into(),
        }
    }

    /// The local host's owner identity.
    pub fn host_owner(&self) -> &str {
        &self.host_owner
    }

    /// Replace every entry of `owner` with `entries` in one transaction.
    ///
    /// Entries are re-owned to `owner` before insert. On error the transaction
    /// is rolled back and the previous catalog of `owner` is unchanged.
    pub fn replace_owner_catalog(&self, owner: &str, entries: &[CatalogEntry]) -> StoreResult<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM catalog WHERE owner = ?1", [owner])?;
        for entry in entries {
            insert_entry(&tx, &entry.clone().assign_owner(owner))?;
        }
        tx.commit()?;

        info!(owner, removed, inserted = entries.len(), "Owner catalog replaced");
        Ok(())
    }

    /// Absorb an external merged view of the catalog.
    ///
    /// In one transaction: upserts every other node, deletes every entry not owned by
    /// the host, then inserts every entry of `entries` not claiming the host
    /// identity. Host-owned rows are never touched.
    pub fn merge_external_catalog(
        &self,
        entries: &[CatalogEntry],
        nodes: &[Node],
    ) -> StoreResult<usize> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        for node in nodes.iter().filter(|n| n.owner != self.host_owner) {
            upsert_node(&tx, &node.owner, &node.url)?;
        }
        tx.execute("DELETE FROM catalog WHERE owner <> ?1", [&self.host_owner])?;

        let mut inserted = 0;
        let mut filtered = 0;
        for entry in entries {
            if entry.owner == self.host_owner {
                filtered += 1;
                continue;
            }
            // Ids from the wire are not trusted
            insert_entry(&tx, &entry.clone().assign_owner(&entry.owner))?;
            inserted += 1;
        }
        tx.commit()?;

        info!(
            inserted,
            filtered,
            nodes = nodes.len(),
            "External catalog merged"
        );
        Ok(inserted)
    }

    /// All entries of one owner, ordered by path.
    pub fn entries_for_owner(&self, owner: &str) -> StoreResult<Vec<CatalogEntry>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM catalog WHERE owner = ?1 ORDER BY path"
        ))?;
        let entries = stmt
            .query_map([owner], read_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Ids currently stored for `owner`.
    pub fn ids_for_owner(&self, owner: &str) -> StoreResult<HashSet<String>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare("SELECT id FROM catalog WHERE owner = ?1")?;
        let ids = stmt
            .query_map([owner], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    /// The full catalog joined with the node registry.
    ///
    /// Entries of other owners carry their node's URL; host entries carry none.
    pub fn list_files(&self) -> StoreResult<Vec<CatalogFile>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.owner, c.filename, c.path, c.library, c.quality,
                    c.size_bytes, c.last_modified, n.url
             FROM catalog c LEFT JOIN nodes n ON n.owner = c.owner
             ORDER BY c.owner, c.path",
        )?;
        let files = stmt
            .query_map([], |row| {
                let entry = read_entry(row)?;
                let url: Option<String> = row.get(8)?;
                let url = if entry.owner == self.host_owner {
                    None
                } else {
                    url
                };
                Ok(CatalogFile { entry, url })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = files.len(), "Catalog listed");
        Ok(files)
    }

    /// Files and nodes as exchanged with satellites.
    pub fn listing(&self) -> StoreResult<(Vec<CatalogFile>, Vec<Node>)> {
        let files = self.list_files()?;
        let nodes = list_nodes(&self.db.lock())?;
        Ok((files, nodes))
    }

    /// Total number of entries.
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_entry(conn: &Connection, entry: &CatalogEntry) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO catalog ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            entry.id,
            entry.owner,
            entry.filename,
            entry.path,
            entry.library,
            entry.quality,
            entry.size_bytes as i64,
            entry.last_modified,
        ],
    )?;
    Ok(())
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let size_bytes: i64 = row.get(6)?;
    Ok(CatalogEntry {
        id: row.get(0)?,
        owner: row.get(1)?,
        filename: row.get(2)?,
        path: row.get(3)?,
        library: row.get(4)?,
        quality: row.get(5)?,
        size_bytes: size_bytes.max(0) as u64,
        last_modified: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeRegistry;

    fn store(host: &str) -> CatalogStore {
        CatalogStore::new(Arc::new(Database::open_in_memory().unwrap()), host)
    }

    fn entries(owner: &str, count: usize) -> Vec<CatalogEntry> {
        (0..count)
            .map(|i| {
                let path = format!("Movies/film-{i:03}.mkv");
                CatalogEntry::new(owner, &path, format!("film-{i:03}.mkv"), 1000 + i as u64)
                    .with_library("Movies")
                    .with_quality("1080p")
            })
            .collect()
    }

    #[test]
    fn test_replace_sets_owner_catalog_exactly() {
        let store = store("Master");
        store.replace_owner_catalog("Josh", &entries("Josh", 5)).unwrap();
        store.replace_owner_catalog("Josh", &entries("Josh", 2)).unwrap();

        assert_eq!(store.entries_for_owner("Josh").unwrap(), entries("Josh", 2));
    }

    #[test]
    fn test_replace_leaves_other_owners_unchanged() {
        let store = store("Master");
        store.replace_owner_catalog("Master", &entries("Master", 3)).unwrap();
        store.replace_owner_catalog("Josh", &entries("Josh", 4)).unwrap();
        store.replace_owner_catalog("Josh", &[]).unwrap();

        assert_eq!(store.entries_for_owner("Master").unwrap().len(), 3);
        assert!(store.entries_for_owner("Josh").unwrap().is_empty());
    }

    #[test]
    fn test_replace_reowns_foreign_entries() {
        let store = store("Master");
        store.replace_owner_catalog("Josh", &entries("Mallory", 1)).unwrap();

        assert!(store.entries_for_owner("Mallory").unwrap().is_empty());
        let josh = store.entries_for_owner("Josh").unwrap();
        assert_eq!(josh[0].id, "JoshMovies/film-000.mkv");
    }

    #[test]
    fn test_failed_replace_rolls_back() {
        let store = store("Master");
        store.replace_owner_catalog("Josh", &entries("Josh", 3)).unwrap();

        // Two entries with the same path collide on the primary key
        let mut bad = entries("Josh", 1);
        bad.push(bad[0].clone());
        assert!(store.replace_owner_catalog("Josh", &bad).is_err());

        assert_eq!(store.entries_for_owner("Josh").unwrap(), entries("Josh", 3));
    }

    #[test]
    fn test_merge_never_touches_host_rows() {
        let store = store("Josh");
        store.replace_owner_catalog("Josh", &entries("Josh", 3)).unwrap();

        // Adversarial input claims the host identity
        let mut incoming = entries("Mia", 2);
        incoming.extend(entries("Josh", 10));
        incoming[2].size_bytes = 0;

        let inserted = store
            .merge_external_catalog(&incoming, &[Node::new("Mia", "http://mia")])
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.entries_for_owner("Josh").unwrap(), entries("Josh", 3));
        assert_eq!(store.entries_for_owner("Mia").unwrap().len(), 2);
    }

    #[test]
    fn test_merge_replaces_all_external_owners() {
        let store = store("Josh");
        store.merge_external_catalog(&entries("Mia", 2), &[]).unwrap();
        store.merge_external_catalog(&entries("Alex", 1), &[]).unwrap();

        assert!(store.entries_for_owner("Mia").unwrap().is_empty());
        assert_eq!(store.entries_for_owner("Alex").unwrap().len(), 1);
    }

    #[test]
    fn test_merge_upserts_nodes() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = CatalogStore::new(Arc::clone(&db), "Josh");
        let registry = NodeRegistry::new(db);
        registry.register("Mia", "http://old").unwrap();
        registry.register("Josh", "http://josh").unwrap();

        let nodes = [Node::new("Mia", "http://new"), Node::new("Josh", "http://stale")];
        store.merge_external_catalog(&[], &nodes).unwrap();

        assert_eq!(registry.lookup("Josh").unwrap(), "http://josh");

        assert_eq!(registry.lookup("Mia").unwrap(), "http://new");
    }

    #[test]
    fn test_list_files_attaches_url_to_remote_entries_only() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = CatalogStore::new(Arc::clone(&db), "Josh");
        let registry = NodeRegistry::new(db);
        registry.register("Josh", "http://josh").unwrap();
        registry.register("Mia", "http://mia").unwrap();
        store.replace_owner_catalog("Josh", &entries("Josh", 1)).unwrap();
        store.replace_owner_catalog("Mia", &entries("Mia", 1)).unwrap();

        let files = store.list_files().unwrap();
        let josh = files.iter().find(|f| f.entry.owner == "Josh").unwrap();
        let mia = files.iter().find(|f| f.entry.owner == "Mia").unwrap();

        assert_eq!(josh.url, None);
        assert_eq!(mia.url.as_deref(), Some("http://mia"));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_ids_for_owner() {
        let store = store("Josh");
        store.replace_owner_catalog("Josh", &entries("Josh", 2)).unwrap();

        let ids = store.ids_for_owner("Josh").unwrap();
        assert!(ids.contains("JoshMovies/film-001.mkv"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_owners_with_colliding_ids_coexist() {
        let store = store("Master");
        let josh = CatalogEntry::new("Josh", "Movies/a.mkv", "a.mkv", 1);
        let jo = CatalogEntry::new("Jo", "shMovies/a.mkv", "a.mkv", 2);
        assert_eq!(josh.id, jo.id);

        store.replace_owner_catalog("Josh", &[josh.clone()]).unwrap();
        store.replace_owner_catalog("Jo", &[jo.clone()]).unwrap();

        assert_eq!(store.entries_for_owner("Josh").unwrap(), vec![josh]);
        assert_eq!(store.entries_for_owner("Jo").unwrap(), vec![jo]);
    }

    #[test]
    fn test_merge_with_colliding_ids() {
        let store = store("Josh");
        store
            .replace_owner_catalog("Josh", &[CatalogEntry::new("Josh", "Movies/a.mkv", "a.mkv", 1)])
            .unwrap();

        let incoming = vec![
            CatalogEntry::new("Mia", "x.mkv", "x.mkv", 3),
            CatalogEntry::new("Jo", "shMovies/a.mkv", "a.mkv", 2),
        ];
        let inserted = store.merge_external_catalog(&incoming, &[]).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.entries_for_owner("Mia").unwrap().len(), 1);
        assert_eq!(store.entries_for_owner("Jo").unwrap().len(), 1);
        assert_eq!(store.entries_for_owner("Josh").unwrap().len(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn replace_restricts_owner_to_exact_set(
                first in 0usize..20,
                second in 0usize..20,
                other in 0usize..20,
            ) {
                let store = store("Host");
                store.replace_owner_catalog("Other", &entries("Other", other)).unwrap();
                store.replace_owner_catalog("Josh", &entries("Josh", first)).unwrap();
                store.replace_owner_catalog("Josh", &entries("Josh", second)).unwrap();

                prop_assert_eq!(store.entries_for_owner("Josh").unwrap(), entries("Josh", second));
                prop_assert_eq!(store.entries_for_owner("Other").unwrap(), entries("Other", other));
            }
        }
    }
}
