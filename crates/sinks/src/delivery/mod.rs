//! Retrying delivery
//!
//! A [`DeliveryAdapter`] owns one destination's [`RetryQueue`] and drives it
//! with a single observer task and a bounded worker pool:
//!
//! ```text
//! send_async ──add──> [RetryQueue] ──dequeue_block──> [Observer]
//!                          ^                           │ not due: add_request (to the back)
//!                          │                           │ due: take a pool permit
//!                          │                           v
//!                          │                     [Worker] ── Delivery::deliver
//!                          │                           │
//!                          └── retry (n+1, +delay) ────┤ failure, RetryPolicy::decide
//!                                                      │
//!                          hooks.on_success / on_error(fallback)
//! ```
//!
//! What is sent is pluggable through [`Delivery`]: HTTP requests for
//! webhooks, table rows for SQL destinations.
//!
//! [`RetryQueue`]: courier_queue::RetryQueue

mod adapter;
mod policy;

use async_trait::async_trait;
use courier_protocol::EventContext;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::SinkError;

pub use adapter::{AdapterConfig, DeliveryAdapter};
pub use policy::{RetryDecision, RetryPolicy};

/// One attempt at writing a payload to a destination
#[async_trait]
pub trait Delivery: Send + Sync + 'static {
    /// What the retry queue stores
    type Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Perform one attempt
    ///
    /// May enrich `context` (sent request, resolved table) for the hooks.
    async fn deliver(
        &self,
        payload: &Self::Payload,
        context: &mut EventContext,
    ) -> Result<(), SinkError>;

    /// Release connections
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Outcome callbacks of a delivery adapter
///
/// Every accepted request ends in exactly one `on_success` or one
/// `on_error(fallback = true)`; each retried failure additionally reports
/// `on_error(fallback = false)`.
pub trait DeliveryHooks: Send + Sync {
    fn on_success(&self, context: &EventContext);

    fn on_error(&self, fallback: bool, context: &EventContext, error: &SinkError);
}


#[cfg(test)]
#[path = "adapter_test.rs"]
mod adapter_test;
