//! Closeable concurrent FIFO
//!
//! `ConcurrentQueue` is a mutex-protected `VecDeque` paired with a
//! `tokio::sync::Notify`. Producers never block: a push either succeeds,
//! fails with `Full` (bounded queues), or fails with `Closed`. Consumers can
//! poll with [`ConcurrentQueue::try_pop`] or suspend in
//! [`ConcurrentQueue::pop`] until an item arrives or the queue closes.
//!
//! # Wakeups
//!
//! Each push wakes one waiter (or leaves a permit if nobody is waiting).
//! Close wakes every waiter. Waiters register interest before checking the
//! deque, so a push or close between the check and the await is never lost.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{QueueError, Result};

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Closeable FIFO with optional capacity and async blocking pop
#[derive(Debug)]
pub struct ConcurrentQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    capacity: Option<usize>,
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> ConcurrentQueue<T> {
    /// Create a queue without a capacity limit
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity_limit(None)
    }

    /// Create a queue that rejects pushes beyond `capacity` items
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity_limit(Some(capacity))
    }

    fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append an item
    ///
    /// # Errors
    ///
    /// `Closed` after [`close`](Self::close), `Full` when a bounded queue is
    /// at capacity. The item is dropped in both cases.
    pub fn push(&self, item: T) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueError::Closed);
            }
            if let Some(capacity) = self.capacity {
                if inner.items.len() >= capacity {
                    return Err(QueueError::Full { capacity });
                }
            }
            inner.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Append items ignoring the capacity limit (restoring persisted state)
    pub(crate) fn restore(&self, items: impl IntoIterator<Item = T>) {
        let mut count = 0;
        {
            let mut inner = self.inner.lock();
            for item in items {
                inner.items.push_back(item);
                count += 1;
            }
        }
        for _ in 0..count {
            self.notify.notify_one();
        }
    }

    /// Take the head item without waiting
    ///
    /// # Errors
    ///
    /// `Closed` once the queue is closed.
    pub fn try_pop(&self) -> Result<Option<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed);
        }
        Ok(inner.items.pop_front())
    }

    /// Take the head item, waiting until one is available
    ///
    /// # Errors
    ///
    /// `Closed` once the queue is closed, including for callers that were
    /// already waiting.
    pub async fn pop(&self) -> Result<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(QueueError::Closed);
                }
                if let Some(item) = inner.items.pop_front() {
                    return Ok(item);
                }
            }

            notified.await;
        }
    }

    /// Close the queue and wake all waiters
    ///
    /// Items still in the queue stay there (see [`snapshot`](Self::snapshot)).
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        let was_open = {
            let mut inner = self.inner.lock();
            !std::mem::replace(&mut inner.closed, true)
        };
        self.notify.notify_waiters();
        was_open
    }

    /// Remove and return every queued item, head first
    ///
    /// Works on closed queues too.
    pub fn drain(&self) -> Vec<T> {
        self.inner.lock().items.drain(..).collect()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Current number of queued items
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity limit, if bounded
    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl<T: Clone> ConcurrentQueue<T> {
    /// Copy of the queued items, head first
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().items.iter().cloned().collect()
    }
}
