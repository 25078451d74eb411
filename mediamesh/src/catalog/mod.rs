//! Catalog storage: the per-owner file catalog and the node registry.
//!
//! Both live in one SQLite database so that an external merge can upsert
//! nodes and rewrite catalog rows inside a single transaction.
//!
//! ```text
//! Database (rusqlite, Mutex<Connection>)
//!     ├── CatalogStore  replace_owner_catalog / merge_external_catalog
//!     └── NodeRegistry  register / lookup
//! ```

mod db;
mod error;
mod model;
mod registry;
mod store;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use model::{CatalogEntry, CatalogFile, CatalogListing, Node};
pub use registry::NodeRegistry;
pub use store::CatalogStore;
