//! Table schema model
//!
//! `Table` describes either a stored table (what the destination has) or an
//! inferred one (what a batch of events needs). The same type also carries a
//! schema diff: in that role `columns` lists what must be added or altered and
//! `pk_fields`/`delete_pk_fields`/`primary_key_name` drive primary key DDL.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Column definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Destination SQL type
    pub sql_type: String,
}

impl Column {
    #[inline]
    pub fn new(sql_type: impl Into<String>) -> Self {
        Self {
            sql_type: sql_type.into(),
        }
    }
}

/// Column name to definition, sorted by name
pub type Columns = BTreeMap<String, Column>;

/// Table schema (or schema diff)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,

    /// Columns
    #[serde(default)]
    pub columns: Columns,

    /// Primary key fields
    #[serde(default)]
    pub pk_fields: BTreeSet<String>,

    /// Existing primary key must be dropped before anything else
    #[serde(default)]
    pub delete_pk_fields: bool,

    /// Constraint name for a primary key to create
    #[serde(default)]
    pub primary_key_name: String,
}

impl Table {
    /// Create a table without columns
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a column
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        self.columns.insert(name.into(), Column::new(sql_type));
        self
    }

    /// Set primary key fields
    #[must_use]
    pub fn with_pk_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pk_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// A table with no columns does not exist in the destination
    #[inline]
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Whether this table, read as a diff, requires any DDL
    #[inline]
    pub fn has_changes(&self) -> bool {
        !self.columns.is_empty() || !self.pk_fields.is_empty() || self.delete_pk_fields
    }

    /// SQL type of a column
    #[inline]
    pub fn column_type(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(|c| c.sql_type.as_str())
    }
}
