//! Courier - Queue
//!
//! Queue primitives for the delivery subsystem.
//!
//! # Architecture
//!
//! ```text
//! [Storage::consume] --add()--> [RetryQueue] --dequeue_block()--> [Observer] --> [Worker pool]
//!                                    ^                                               |
//!                                    +------------- add_request(retry+1) ------------+
//! ```
//!
//! - [`ConcurrentQueue`]: closeable FIFO with optional capacity and async
//!   blocking pop. Closing wakes every blocked consumer with
//!   [`QueueError::Closed`].
//! - [`RetryQueue`]: per-destination queue of [`RetryableRequest`] values,
//!   either in memory or journaled to disk so pending requests survive a
//!   restart.
//!
//! Ordering is FIFO, except that the observer cycles not-yet-due retries to
//! the back of the queue instead of holding up the head.

mod concurrent;
mod error;
mod journal;
mod retry;

pub use concurrent::ConcurrentQueue;
pub use error::{QueueError, Result};
pub use retry::{RetryQueue, RetryableRequest, sanitize_file_name};
