//! Route handlers, grouped by resource.

pub mod downloads;
pub mod files;
pub mod ping;
pub mod scan;
pub mod serve;
pub mod sync;
