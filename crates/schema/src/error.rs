//! Schema error types
//!
//! Drivers report a missing table in their own words. [`SchemaError::from_driver`]
//! turns that text into the typed [`SchemaError::TableNotExist`] so callers
//! can re-create the table instead of failing the write.

use courier_protocol::TemplateError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Driver messages that mean the target table is gone
static TABLE_NOT_EXIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(relation|table)\s+"?[^\s"]*"?\s+does\s*n[o']t\s+exist|unknown\s+table|no\s+such\s+table|table\s+\S+\s+not\s+found"#,
    )
    .unwrap()
});

/// Errors raised while inferring, reconciling or writing tables
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Target table does not exist in the destination
    #[error("table '{table}' does not exist")]
    TableNotExist {
        /// Table name
        table: String,
    },

    /// Driver reported an error
    #[error("{operation} failed for table '{table}': {message}")]
    Driver {
        /// What was being done (create, patch, insert, ...)
        operation: &'static str,
        /// Table name
        table: String,
        /// Driver message
        message: String,
    },

    /// Table name could not be resolved for an event
    #[error("table name: {0}")]
    TableName(#[from] TemplateError),

    /// Resolved table name is empty
    #[error("table name template '{template}' rendered an empty name")]
    EmptyTableName {
        /// Template source
        template: String,
    },

    /// Adapter was closed
    #[error("sql adapter is closed")]
    Closed,
}

impl SchemaError {
    /// Classify a driver error message
    ///
    /// Messages that mean the table is missing become `TableNotExist`,
    /// everything else `Driver`.
    pub fn from_driver(
        operation: &'static str,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let message = message.into();
        if TABLE_NOT_EXIST.is_match(&message) {
            Self::TableNotExist { table }
        } else {
            Self::Driver {
                operation,
                table,
                message,
            }
        }
    }

    /// Create a TableNotExist error
    #[inline]
    pub fn table_not_exist(table: impl Into<String>) -> Self {
        Self::TableNotExist {
            table: table.into(),
        }
    }

    #[inline]
    pub fn is_table_not_exist(&self) -> bool {
        matches!(self, Self::TableNotExist { .. })
    }
}
