//! Progress reporting for transfers.
//!
//! The worker reports through a [`TransferObserver`] so it stays independent
//! of where progress ends up (the job table, a CLI, a test recorder).

use std::time::{Duration, Instant};

use super::error::TransferError;

/// Minimum time between two speed samples.
pub const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Byte-level progress of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferProgress {
    /// Bytes present in the partial file, including resumed bytes.
    pub downloaded_bytes: u64,
    /// Expected final size (0 while unknown).
    pub total_bytes: u64,
    /// Most recent speed sample in bytes per second.
    pub speed: f64,
}

impl TransferProgress {
    /// Progress as a fraction from 0.0 to 1.0 (0.0 while the total is unknown).
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.downloaded_bytes as f64 / self.total_bytes as f64).min(1.0)
        }
    }
}

/// Receives progress events from the transfer worker.
pub trait TransferObserver: Send + Sync {
    /// An attempt is about to issue its request.
    fn on_attempt(&self, _attempt: u32) {}

    /// Bytes arrived or the expected total became known.
    fn on_progress(&self, progress: TransferProgress);

    /// An attempt failed and another one will start after `delay`.
    fn on_retry_scheduled(&self, _attempt: u32, _delay: Duration, _error: &TransferError) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_progress(&self, _progress: TransferProgress) {}
}

/// Instantaneous speed computed at most once per sample interval.
#[derive(Debug)]
pub struct SpeedMeter {
    interval: Duration,
    last_sample_at: Instant,
    last_sample_bytes: u64,
    speed: f64,
}

impl SpeedMeter {
    /// Start measuring from `bytes` already transferred.
    pub fn new(bytes: u64) -> Self {
        Self::with_interval(bytes, SPEED_SAMPLE_INTERVAL)
    }

    pub fn with_interval(bytes: u64, interval: Duration) -> Self {
        Self {
            interval,
            last_sample_at: Instant::now(),
            last_sample_bytes: bytes,
            speed: 0.0,
        }
    }

    /// Record the running byte count; returns a new speed when a sample was taken.
    pub fn record(&mut self, bytes: u64) -> Option<f64> {
        self.record_at(bytes, Instant::now())
    }

    fn record_at(&mut self, bytes: u64, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_sample_at);
        if elapsed < self.interval {
            return None;
        }
        let delta = bytes.saturating_sub(self.last_sample_bytes);
        self.speed = delta as f64 / elapsed.as_secs_f64();
        self.last_sample_at = now;
        self.last_sample_bytes = bytes;
        Some(self.speed)
    }

    /// The last computed speed in bytes per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}
