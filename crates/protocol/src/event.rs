//! Event envelope
//!
//! An `Event` is an insertion-ordered map of field name to [`Value`]. The
//! envelope is open-schema: enrichment adds fields, mappings move or remove
//! them, and everything else passes through untouched.
//!
//! # Paths
//!
//! Nested fields are addressed with `/`-separated paths (`/eventn_ctx/event_id`,
//! a leading slash is optional). Templates use the dotted form and resolve
//! through [`Event::get_nested`].

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::value::{Map, Value};

/// Top-level event id field
pub const EVENT_ID_KEY: &str = "event_id";

/// Event id set by the enrichment step
pub const NESTED_EVENT_ID_PATH: &str = "eventn_ctx/event_id";

/// Open-schema event envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map);

impl Event {
    /// Create an empty event
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Decode an event from JSON bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not JSON or not a JSON object.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(ProtocolError::NotAnObject(other.type_name())),
        }
    }

    /// Encode as compact JSON bytes
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Event id from the enrichment context, falling back to `event_id`
    pub fn event_id(&self) -> Option<&str> {
        self.get_path(NESTED_EVENT_ID_PATH)
            .or_else(|| self.get(EVENT_ID_KEY))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Top-level field lookup
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Nested lookup by `/`-separated path
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = split_path(path).collect();
        self.get_nested(&parts)
    }

    /// Nested lookup by path segments
    pub fn get_nested(&self, parts: &[&str]) -> Option<&Value> {
        let (first, rest) = parts.split_first()?;
        let mut current = self.0.get(*first)?;
        for part in rest {
            current = current.as_object()?.get(*part)?;
        }
        Some(current)
    }

    /// Insert a top-level field, returning the previous value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Set a nested field, creating intermediate objects
    ///
    /// A non-object value in the middle of the path is replaced by an object.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) {
        let parts: Vec<&str> = split_path(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.0;
        for part in parents {
            let entry = current
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert((*last).to_string(), value.into());
    }

    /// Remove a top-level field, keeping the order of the others
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Remove a nested field by path
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = split_path(path).collect();
        let (last, parents) = parts.split_last()?;

        let mut current = &mut self.0;
        for part in parents {
            current = current.get_mut(*part)?.as_object_mut()?;
        }
        current.shift_remove(*last)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over top-level fields in insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[inline]
    pub fn fields(&self) -> &Map {
        &self.0
    }

    #[inline]
    pub fn into_fields(self) -> Map {
        self.0
    }
}

impl From<Map> for Event {
    fn from(fields: Map) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for Event {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty())
}
