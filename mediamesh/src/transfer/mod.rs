//! File transfer between nodes.
//!
//! - [`TransferWorker`] - resumable fetch with stall detection and retry
//! - [`RetryPolicy`] - attempt limit and backoff schedule
//! - [`TransferObserver`] - progress reporting seam

mod error;
mod policy;
mod progress;
mod worker;

pub use error::{TransferError, TransferResult};
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use progress::{NoopObserver, SpeedMeter, TransferObserver, TransferProgress};
pub use worker::{
    partial_path_for, TransferConfig, TransferOutcome, TransferRequest, TransferWorker,
    DEFAULT_STALL_TIMEOUT, PARTIAL_SUFFIX,
};
