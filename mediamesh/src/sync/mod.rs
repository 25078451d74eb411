//! Master/satellite catalog synchronization.
//!
//! Every node scans its own media into the local catalog. A satellite then
//! pushes that catalog to its master and pulls back the master's merged
//! view; a master only receives pushes (see `POST /sync` in [`crate::api`]).
//!
//! ```text
//!   satellite                          master
//!   ─────────                          ──────
//!   scan ─► replace(host)
//!   POST /sync {owner,url,files} ────► replace(owner) + register(owner,url)
//!   GET /files ──────────────────────► {files, nodes}
//!   merge_external_catalog ◄─────────┘
//! ```

mod client;
mod coordinator;
mod error;
mod schedule;
mod status;

pub use client::{MasterClient, SyncPush, DEFAULT_REQUEST_TIMEOUT};
pub use coordinator::{RunGuard, SyncCoordinator};
pub use error::{SyncError, SyncResult};
pub use schedule::SyncSchedule;
pub use status::{ScanStatus, SharedScanStatus, SyncStep};
