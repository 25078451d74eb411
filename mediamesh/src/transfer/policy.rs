//! Retry policy for transfer attempts.
//!
//! The worker retries failed attempts with exponential backoff:
//! `min(2000ms * 2.5^(attempt-1), 30s)`, i.e. 2s, 5s, 12.5s, 30s for the
//! default five attempts.
//!
//! # Example
//!
//! ```ignore
//! use mediamesh::transfer::RetryPolicy;
//!
//! let policy = RetryPolicy::transfer_default();
//! assert_eq!(policy.max_attempts(), 5);
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(5)));
//! ```

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default number of attempts per transfer (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Delay after the first failed attempt (2 seconds).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 2000;

/// Cap on any single backoff delay (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Growth factor between consecutive delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.5;

/// How a transfer handles failed attempts.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail after the first attempt.
    None,

    /// Exponential backoff with configurable parameters.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Maximum delay cap (delay won't exceed this).
        max_delay: Duration,
        /// Multiplier applied to the delay after each failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::transfer_default()
    }
}

impl RetryPolicy {
    /// Five attempts, 2s initial delay growing by 2.5x, capped at 30s.
    pub fn transfer_default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS)
    }

    /// Exponential backoff with the default delays and `max_attempts` attempts.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Calculates the delay to wait after a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-based)
    ///
    /// # Returns
    ///
    /// The delay before the next attempt, or `None` if no attempts remain.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt == 0 || attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi((attempt - 1) as i32);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let delay =
                    Duration::from_millis(delay_ms.min(max_delay.as_millis() as f64) as u64);
                Some(delay.min(*max_delay))
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}
