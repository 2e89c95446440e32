//! Shared helpers for file-backed logs
//!
//! - **json_lines**: lazily opened append-only JSON lines file
//! - **rate_limited_logger**: error logging that stays quiet under a failing disk

mod json_lines;
mod rate_limited_logger;

pub use json_lines::JsonLinesWriter;
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
