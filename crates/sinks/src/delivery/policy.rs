//! Retry policy
//!
//! A failed attempt with retry counter `n` is either deferred by
//! `retry_delay * 2^n` or escalated to fallback:
//!
//! ```text
//! retry_count = 3, retry_delay = 1s
//!
//! attempt 1 fails (n=0) -> retry in 1s
//! attempt 2 fails (n=1) -> retry in 2s
//! attempt 3 fails (n=2) -> retry in 4s
//! attempt 4 fails (n=3) -> fallback
//! ```
//!
//! A queue at or above `queue_fullness_threshold` (when non-zero) sends every
//! failure straight to fallback so a dead endpoint cannot grow the queue
//! without bound.

use std::time::Duration;

use courier_config::StreamingConfig;

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the delay
    Retry(Duration),
    /// Terminal failure
    Fallback,
}

/// Backoff and escalation settings of one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub retry_delay: Duration,
    /// 0 disables the check
    pub queue_fullness_threshold: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 5,
            retry_delay: Duration::from_secs(1),
            queue_fullness_threshold: 0,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_count: u32, retry_delay: Duration) -> Self {
        Self {
            retry_count,
            retry_delay,
            queue_fullness_threshold: 0,
        }
    }

    #[must_use]
    pub fn with_queue_fullness_threshold(mut self, threshold: u64) -> Self {
        self.queue_fullness_threshold = threshold;
        self
    }

    /// Delay before the attempt following failure number `retry`
    pub fn delay(&self, retry: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// Decide what happens to a request that failed with counter `retry`
    pub fn decide(&self, retry: u32, queue_size: u64) -> RetryDecision {
        let saturated =
            self.queue_fullness_threshold > 0 && queue_size >= self.queue_fullness_threshold;
        if saturated || retry >= self.retry_count {
            RetryDecision::Fallback
        } else {
            RetryDecision::Retry(self.delay(retry))
        }
    }
}

impl From<&StreamingConfig> for RetryPolicy {
    fn from(config: &StreamingConfig) -> Self {
        Self::new(config.retry_count, config.retry_delay())
            .with_queue_fullness_threshold(config.queue_fullness_threshold)
    }
}
