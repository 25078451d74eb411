//! Download jobs.
//!
//! # Jobs
//!
//! - [`DownloadManager`] - accepts batches and drives them through the
//!   transfer worker
//! - [`JobTable`] - concurrent in-memory job records
//! - [`JobView`] - the serialized job record returned by the API
//!
//! # Example
//!
//! ```ignore
//! use mediamesh::jobs::{DownloadItem, DownloadRequest};
//!
//! let ids = manager.enqueue(
//!     DownloadRequest::new("Josh", vec![DownloadItem::new("Movies/Heat.mkv", "Heat.mkv")]),
//! )?;
//! ```

mod error;
mod manager;
mod model;
mod table;

pub use error::DownloadError;
pub use manager::{sanitize_component, DownloadItem, DownloadManager, DownloadRequest};
pub use model::{DownloadJob, JobState, JobStatus, JobView};
pub use table::{JobObserver, JobTable, JobTicket, JOB_ID_LEN};
