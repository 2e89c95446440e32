//! Type inference and SQL type mapping
//!
//! Each scalar value maps to a [`DataType`]. When a batch disagrees about a
//! field, the field takes the lowest common type that holds every value:
//!
//! ```text
//! Bool < Int64 < Float64 < String
//!        Timestamp ---------^
//! ```
//!
//! Timestamps are RFC 3339 strings; mixing them with anything other than
//! another timestamp widens to `String`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::DateTime;
use courier_protocol::{Column, Event, Table, Value};
use serde::{Deserialize, Serialize};

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int64,
    Float64,
    Timestamp,
    String,
}

impl DataType {
    /// Type of a single value (`None` for null)
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Int(_) => Some(Self::Int64),
            Value::Float(_) => Some(Self::Float64),
            Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => Some(Self::Timestamp),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(Self::String),
        }
    }

    /// Lowest type that holds values of both types
    pub fn common(self, other: Self) -> Self {
        use DataType::{Bool, Float64, Int64, String, Timestamp};
        match (self, other) {
            (a, b) if a == b => a,
            (Timestamp, _) | (_, Timestamp) | (String, _) | (_, String) => String,
            (Float64, _) | (_, Float64) => Float64,
            (Int64, Bool) | (Bool, Int64) => Int64,
            _ => String,
        }
    }
}

/// Inferred field types for an event or a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTypes(BTreeMap<String, DataType>);

impl FieldTypes {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Infer types of a flat event's fields (null fields are skipped)
    pub fn from_event(event: &Event) -> Self {
        let mut types = Self::new();
        types.merge_event(event);
        types
    }

    /// Widen with another event's fields
    pub fn merge_event(&mut self, event: &Event) {
        for (field, value) in event.iter() {
            if let Some(data_type) = DataType::infer(value) {
                self.merge_field(field, data_type);
            }
        }
    }

    /// Widen with another type set
    pub fn merge(&mut self, other: &FieldTypes) {
        for (field, data_type) in &other.0 {
            self.merge_field(field, *data_type);
        }
    }

    fn merge_field(&mut self, field: &str, data_type: DataType) {
        self.0
            .entry(field.to_string())
            .and_modify(|existing| *existing = existing.common(data_type))
            .or_insert(data_type);
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<DataType> {
        self.0.get(field).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataType)> {
        self.0.iter()
    }
}

/// Logical type to destination SQL type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    types: HashMap<DataType, String>,
}

impl Default for TypeMapping {
    fn default() -> Self {
        Self::new([
            (DataType::Bool, "boolean"),
            (DataType::Int64, "bigint"),
            (DataType::Float64, "double precision"),
            (DataType::Timestamp, "timestamp"),
            (DataType::String, "text"),
        ])
    }
}

impl TypeMapping {
    /// Build a mapping; types without an entry fall back to the `String` type
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = (DataType, S)>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(|(t, s)| (t, s.into())).collect(),
        }
    }

    /// Override the SQL type for one logical type
    #[must_use]
    pub fn with_type(mut self, data_type: DataType, sql_type: impl Into<String>) -> Self {
        self.types.insert(data_type, sql_type.into());
        self
    }

    /// SQL type for a logical type
    pub fn sql_type(&self, data_type: DataType) -> &str {
        self.types
            .get(&data_type)
            .or_else(|| self.types.get(&DataType::String))
            .map_or("text", String::as_str)
    }

    /// Logical type a SQL type was mapped from, if any
    pub fn data_type(&self, sql_type: &str) -> Option<DataType> {
        self.types
            .iter()
            .filter(|(_, s)| s.eq_ignore_ascii_case(sql_type))
            .map(|(t, _)| *t)
            .min()
    }

    /// Table definition for inferred fields
    pub fn table(
        &self,
        name: impl Into<String>,
        fields: &FieldTypes,
        pk_fields: &BTreeSet<String>,
    ) -> Table {
        let mut table = Table::new(name);
        for (field, data_type) in fields.iter() {
            table
                .columns
                .insert(field.clone(), Column::new(self.sql_type(*data_type)));
        }
        table.pk_fields = pk_fields.clone();
        table
    }
}
