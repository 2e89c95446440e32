//! Courier - Protocol
//!
//! Shared data model for everything that flows through the delivery subsystem.
//!
//! # Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Value`] | Tagged union for a single field value |
//! | [`Event`] | Insertion-ordered open-schema event envelope |
//! | [`EventContext`] | Correlation record for one event's journey through one destination |
//! | [`Request`] | Outbound request (method, URL, headers, body) |
//! | [`Table`] / [`Column`] | Inferred or stored table schema |
//! | [`Template`] | `{{ .field }}` templates over events (table names, URLs, bodies) |
//!
//! Events keep unknown fields untouched: nothing in this crate interprets
//! payload structure beyond path lookups.

mod context;
mod error;
mod event;
mod request;
mod table;
mod template;
mod value;

pub use context::EventContext;
pub use error::{ProtocolError, Result, TemplateError};
pub use event::{EVENT_ID_KEY, Event, NESTED_EVENT_ID_PATH};
pub use request::Request;
pub use table::{Column, Columns, Table};
pub use template::Template;
pub use value::{Map, Value};



#[cfg(test)]
#[path = "template_test.rs"]
mod template_test;
