//! Event flattening
//!
//! SQL tables are flat, events are not. Nested objects are folded into
//! `parent_child` columns, arrays are stored as their JSON text, and every
//! key is reduced to a portable column name.
//!
//! ```text
//! {"a": {"b": 1, "c": {"d": true}}, "tags": [1, 2]}
//!   -> {"a_b": 1, "a_c_d": true, "tags": "[1,2]"}
//! ```
//!
//! Nulls are kept so the column still appears in the batch schema only when
//! some event gives it a type.

use courier_protocol::{Event, Map, Value};

/// Flatten nested objects into underscore-joined columns
pub fn flatten(event: &Event) -> Event {
    let mut out = Map::with_capacity(event.len());
    for (key, value) in event.iter() {
        flatten_into(&mut out, sanitize_column_name(key), value);
    }
    Event::from(out)
}

fn flatten_into(out: &mut Map, prefix: String, value: &Value) {
    match value {
        Value::Object(fields) if !fields.is_empty() => {
            for (key, nested) in fields {
                let column = format!("{prefix}_{}", sanitize_column_name(key));
                flatten_into(out, column, nested);
            }
        }
        Value::Object(_) => {
            out.insert(prefix, Value::Null);
        }
        Value::Array(_) => {
            out.insert(prefix, Value::String(value.to_json_string()));
        }
        scalar => {
            out.insert(prefix, scalar.clone());
        }
    }
}

/// Lowercase a key and replace anything outside `[a-z0-9_]` with `_`
pub fn sanitize_column_name(key: &str) -> String {
    let name: String = key
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() { "_".to_string() } else { name }
}
