//! Streaming delivery and events cache settings

use std::time::Duration;

use serde::Deserialize;

/// Defaults for stream-mode destinations
///
/// # Example
///
/// ```toml
/// [streaming]
/// threads_count = 10
/// retry_count = 5
/// retry_delay_sec = 1
/// queue_fullness_threshold = 100000
/// queue_dir = "/var/lib/courier/queues"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Concurrent deliveries per destination
    /// Default: 10
    pub threads_count: usize,

    /// Retries before a failed event goes to fallback
    /// Default: 5
    pub retry_count: u32,

    /// Base retry delay in seconds, doubled on every retry
    /// Default: 1
    pub retry_delay_sec: u64,

    /// Queue depth at which failures skip retries and go to fallback
    /// Default: 0 (disabled)
    pub queue_fullness_threshold: u64,

    /// Directory for persistent queues (in-memory when unset)
    pub queue_dir: Option<String>,

    /// Hard cap on queued requests per destination (unbounded when unset)
    pub queue_capacity: Option<usize>,

    /// HTTP request timeout in seconds
    /// Default: 60
    pub http_timeout_sec: u64,

    /// Idle HTTP connections kept per host
    /// Default: 100
    pub max_idle_conns: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            threads_count: 10,
            retry_count: 5,
            retry_delay_sec: 1,
            queue_fullness_threshold: 0,
            queue_dir: None,
            queue_capacity: None,
            http_timeout_sec: 60,
            max_idle_conns: 100,
        }
    }
}

impl StreamingConfig {
    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_sec)
    }

    #[inline]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_sec)
    }
}

/// Events cache settings
///
/// ```toml
/// [cache]
/// enabled = true
/// capacity_per_destination = 100
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default: true
    pub enabled: bool,

    /// Recent events kept per destination
    /// Default: 100
    pub capacity_per_destination: usize,

    /// Buffer of each cache channel; records beyond it are dropped
    /// Default: 10000
    pub channel_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity_per_destination: 100,
            channel_size: 10_000,
        }
    }
}
