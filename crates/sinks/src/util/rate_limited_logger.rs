//! Rate-limited error logging
//!
//! A failing disk turns every event into an error. This logs at most once per
//! interval and reports how many errors were suppressed in between.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between logged errors
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logs an error at most once per interval, counting the rest
#[derive(Debug)]
pub struct RateLimitedLogger {
    /// Component the errors belong to (destination id, token)
    scope: String,
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Errors since the last logged one
    error_count: AtomicU64,
    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(scope: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            scope: scope.into(),
            min_interval,
            last_log_time: Mutex::new(None),
            error_count: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    pub fn default_interval(scope: impl Into<String>) -> Self {
        Self::new(scope, DEFAULT_LOG_INTERVAL)
    }

    /// Record an error and log it if the interval has passed
    ///
    /// Returns true if the error was logged, false if it was suppressed.
    pub fn error(&self, message: &str, error: &dyn std::fmt::Display) -> bool {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);

        let should_log = {
            let mut last_time = self.last_log_time.lock();
            let now = Instant::now();
            match *last_time {
                Some(last) if now.duration_since(last) < self.min_interval => false,
                _ => {
                    *last_time = Some(now);
                    true
                }
            }
        };
        if !should_log {
            return false;
        }

        let count = self.error_count.swap(0, Ordering::Relaxed);
        let total = self.total_errors.load(Ordering::Relaxed);
        tracing::error!(
            scope = %self.scope,
            error = %error,
            suppressed_count = count.saturating_sub(1),
            total_errors = total,
            "{message}"
        );
        true
    }

    /// Errors since the last logged one
    pub fn pending_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}
