//! Node bootstrap and lifecycle management.
//!
//! [`NodeApp`] builds every component from a [`NodeConfig`](crate::config::NodeConfig)
//! and runs the HTTP server next to the periodic sync.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           NodeApp                            │
//! │                                                              │
//! │  Database ──┬──► CatalogStore ──► SyncCoordinator ◄── Scanner │
//! │             │                          │                     │
//! │             │                          └──► MasterClient     │
//! │             │                               (satellites)     │
//! │             └──► NodeRegistry ──► DownloadManager            │
//! │                                        └──► TransferWorker   │
//! │                                                              │
//! │  ApiState ──► axum Router          SyncSchedule (interval)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;
mod error;

pub use bootstrap::NodeApp;
pub use error::AppError;
