//! Token projection table
//!
//! Two-level map `token → key → handle`. The registry keeps one table for
//! storages (keyed by destination name) and one for consumers (keyed by
//! destination name, or by token for the shared logger consumer).
//!
//! Removing the last key of a token removes the token itself, so an empty
//! lookup always means "no entry for this token".

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Per-token map of handles
///
/// # Example
///
/// ```
/// use courier_routing::TokenTable;
///
/// let mut table = TokenTable::new();
/// table.insert("t1", "pg", 1);
/// table.insert("t1", "hook", 2);
/// table.insert("t2", "pg", 1);
///
/// assert_eq!(table.get("t1"), vec![2, 1]);
///
/// table.remove("t2", "pg");
/// assert!(!table.contains_token("t2"));
/// ```
#[derive(Debug, Clone)]
pub struct TokenTable<H> {
    tokens: BTreeMap<String, BTreeMap<String, H>>,
}

impl<H> Default for TokenTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TokenTable<H> {
    /// Create a new empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: BTreeMap::new(),
        }
    }

    /// Register a handle, returning the one it replaced
    pub fn insert(
        &mut self,
        token: impl Into<String>,
        key: impl Into<String>,
        handle: H,
    ) -> Option<H> {
        self.tokens
            .entry(token.into())
            .or_default()
            .insert(key.into(), handle)
    }

    /// Unregister a handle; drops the token when it was its last key
    pub fn remove(&mut self, token: &str, key: &str) -> Option<H> {
        let Entry::Occupied(mut entry) = self.tokens.entry(token.to_string()) else {
            return None;
        };
        let removed = entry.get_mut().remove(key);
        if entry.get().is_empty() {
            entry.remove();
        }
        removed
    }

    /// Handle registered for `(token, key)`
    #[inline]
    pub fn get_one(&self, token: &str, key: &str) -> Option<&H> {
        self.tokens.get(token).and_then(|keys| keys.get(key))
    }

    /// Mutable handle registered for `(token, key)`
    #[inline]
    pub fn get_one_mut(&mut self, token: &str, key: &str) -> Option<&mut H> {
        self.tokens.get_mut(token).and_then(|keys| keys.get_mut(key))
    }

    #[inline]
    pub fn contains(&self, token: &str, key: &str) -> bool {
        self.get_one(token, key).is_some()
    }

    #[inline]
    pub fn contains_token(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Tokens with at least one handle
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Keys registered under a token
    pub fn keys<'a>(&'a self, token: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.tokens
            .get(token)
            .into_iter()
            .flat_map(|keys| keys.keys().map(String::as_str))
    }

    /// Number of tokens with at least one handle
    #[inline]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Number of `(token, key)` entries
    pub fn len(&self) -> usize {
        self.tokens.values().map(BTreeMap::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate over all `(token, key, handle)` entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &H)> {
        self.tokens.iter().flat_map(|(token, keys)| {
            keys.iter()
                .map(move |(key, handle)| (token.as_str(), key.as_str(), handle))
        })
    }
}

impl<H: Clone> TokenTable<H> {
    /// Snapshot of the handles of a token, ordered by key
    pub fn get(&self, token: &str) -> Vec<H> {
        self.tokens
            .get(token)
            .map(|keys| keys.values().cloned().collect())
            .unwrap_or_default()
    }
}
