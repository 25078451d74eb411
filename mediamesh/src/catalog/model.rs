//! Catalog data types shared by the store, the scanner and the sync protocol.

use serde::{Deserialize, Serialize};

/// A reachable node: the owner identity and the base URL it serves from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub owner: String,
    pub url: String,
}

impl Node {
    pub fn new(owner: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            url: url.into(),
        }
    }
}

/// One file known to the catalog.
///
/// Entries are never updated in place. A full-catalog replace for the owner
/// is the only way an entry changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Concatenation of `owner` and `path`, see [`CatalogEntry::derive_id`].
    pub id: String,
    pub owner: String,
    pub filename: String,
    /// Path relative to the owner's media root, `/`-separated.
    pub path: String,
    /// Top-level folder under the media root, empty for root-level files.
    #[serde(default)]
    pub library: String,
    #[serde(default)]
    pub quality: String,
    pub size_bytes: u64,
    /// Modification time in unix milliseconds.
    #[serde(default)]
    pub last_modified: i64,
}

impl CatalogEntry {
    /// Build an entry, deriving its id from `owner` and `path`.
    pub fn new(
        owner: impl Into<String>,
        path: impl Into<String>,
        filename: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        let owner = owner.into();
        let path = path.into();
        Self {
            id: Self::derive_id(&owner, &path),
            owner,
            filename: filename.into(),
            path,
            library: String::new(),
            quality: String::new(),
            size_bytes,
            last_modified: 0,
        }
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = millis;
        self
    }

    /// Deterministic id for an owner + path pair.
    pub fn derive_id(owner: &str, path: &str) -> String {
        format!("{}{}", owner, path)
    }

    /// Rewrite owner and id so the entry belongs to `owner`.
    ///
    /// Used when accepting entries from the network: the per-entry owner field
    /// is never trusted over the owner the catalog is being written for.
    pub fn assign_owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self.id = Self::derive_id(owner, &self.path);
        self
    }
}

/// A catalog entry as published by `GET /files`, with the owning node's URL
/// attached for entries that live on another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The full merged view exchanged between master and satellites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogListing {
    pub files: Vec<CatalogEntry>,
    pub nodes: Vec<Node>,
}
