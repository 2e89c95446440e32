//! Table schema diff
//!
//! `diff(current, data)` answers "what DDL makes `current` accept `data`".
//! The result is itself a [`Table`]: its columns are the ones to add or
//! retype, and its key fields describe the primary key change.
//!
//! | current PK | data PK | result |
//! |------------|---------|--------|
//! | equal sets (incl. both empty) | | no key change |
//! | non-empty | empty | `delete_pk_fields` |
//! | any | non-empty, different | new key, named `_<table>_pk`, `delete_pk_fields` if current had one |
//!
//! Columns are never dropped: a column present in `current` but absent from
//! `data` is simply not mentioned.

use courier_protocol::Table;

/// Compute the changes `current` needs to hold `data`
///
/// `None` data yields an empty diff.
pub fn diff(current: &Table, data: Option<&Table>) -> Table {
    let name = if current.name.is_empty() {
        data.map(|d| d.name.clone()).unwrap_or_default()
    } else {
        current.name.clone()
    };
    let mut result = Table::new(name);

    let Some(data) = data else {
        return result;
    };

    for (column, definition) in &data.columns {
        match current.columns.get(column) {
            Some(existing) if existing.sql_type == definition.sql_type => {}
            _ => {
                result.columns.insert(column.clone(), definition.clone());
            }
        }
    }

    if current.pk_fields != data.pk_fields {
        if data.pk_fields.is_empty() {
            result.delete_pk_fields = true;
        } else {
            result.pk_fields = data.pk_fields.clone();
            result.primary_key_name = primary_key_name(&result.name);
            result.delete_pk_fields = !current.pk_fields.is_empty();
        }
    }

    result
}

/// Constraint name for a table's primary key
///
/// Assumes a single writer per table: concurrent writers with different key
/// sets would fight over the same constraint name.
pub(crate) fn primary_key_name(table: &str) -> String {
    format!("_{table}_pk")
}

/// Apply a diff to a known table
pub(crate) fn apply(known: &mut Table, diff: &Table) {
    for (column, definition) in &diff.columns {
        known.columns.insert(column.clone(), definition.clone());
    }
    if diff.delete_pk_fields {
        known.pk_fields.clear();
        known.primary_key_name.clear();
    }
    if !diff.pk_fields.is_empty() {
        known.pk_fields = diff.pk_fields.clone();
        known.primary_key_name = diff.primary_key_name.clone();
    }
}
