//! Courier - Routing
//!
//! Token-keyed projection tables for the destination registry.
//!
//! # Design
//!
//! Ingestion looks up handles by the token an event arrived with. The
//! registry keeps those lookups in [`TokenTable`]s and rebuilds them when
//! the destination config changes; readers take cloned snapshots, so a
//! lookup never observes a half-applied change.
//!
//! ```text
//! token ──> { destination name ──> handle }
//! ```
//!
//! [`resolve_tokens`] decides which tokens a destination is registered
//! under.

mod error;
mod table;
mod tokens;


pub use error::{Result, RoutingError};
pub use table::TokenTable;
pub use tokens::resolve_tokens;
