//! SQL dialect boundary
//!
//! Everything dialect-specific (DDL syntax, type names, drivers, connection
//! pools) lives behind `SqlAdapter`. Implementations report driver failures
//! through [`SchemaError::from_driver`](crate::SchemaError::from_driver) so a
//! dropped table is recognised whatever the dialect.

use async_trait::async_trait;
use courier_protocol::{Event, Table};

use crate::error::Result;

/// Dialect adapter for a SQL destination
#[async_trait]
pub trait SqlAdapter: Send + Sync {
    /// Destination type this adapter serves (`postgres`, `clickhouse`, ...)
    fn kind(&self) -> &str;

    /// Check the connection
    async fn ping(&self) -> Result<()>;

    /// Stored schema of a table; a table without columns means it does not exist
    async fn get_table_schema(&self, name: &str) -> Result<Table>;

    /// Create a table with all its columns and primary key
    async fn create_table(&self, table: &Table) -> Result<()>;

    /// Apply a diff produced by [`diff`](crate::diff)
    ///
    /// Drops the primary key first when `delete_pk_fields` is set, then adds
    /// or retypes columns, then creates the key named `primary_key_name`.
    async fn patch_table_schema(&self, diff: &Table) -> Result<()>;

    /// Insert flat rows into a table
    async fn insert(&self, table: &Table, rows: &[Event]) -> Result<()>;

    /// Release connections
    async fn close(&self) -> Result<()>;
}
