//! Courier - Schema
//!
//! Schema reconciliation for SQL-backed destinations.
//!
//! # Pipeline
//!
//! ```text
//! Event --flatten--> flat Event --infer--> FieldTypes --map--> Table (wanted)
//!                                                               |
//!                        TableHelper: last known Table <--diff--+
//!                                         |
//!                                 create / patch (DDL) --> insert
//! ```
//!
//! - [`flatten`]: nested objects become `parent_child` columns, arrays become
//!   JSON strings.
//! - [`FieldTypes`] / [`DataType`]: per-field type inference with
//!   lowest-common-type merging across a batch.
//! - [`TypeMapping`]: logical type to destination SQL type.
//! - [`diff`]: what must change in the stored table for the data to fit.
//! - [`TableHelper`]: caches the last known table per destination and only
//!   issues DDL for the diff, serialized per table.
//! - [`SqlAdapter`]: the dialect boundary. Concrete adapters live outside this
//!   workspace.

mod adapter;
mod diff;
mod error;
mod flatten;
mod helper;
mod naming;
mod typing;

pub use adapter::SqlAdapter;
pub use diff::diff;
pub use error::{Result, SchemaError};
pub use flatten::{flatten, sanitize_column_name};
pub use helper::TableHelper;
pub use naming::{DEFAULT_TABLE_NAME, TableNameExtractor};
pub use typing::{DataType, FieldTypes, TypeMapping};



#[cfg(test)]
#[path = "typing_test.rs"]
mod typing_test;
