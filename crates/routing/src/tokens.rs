//! Token resolution for a destination

use std::collections::BTreeSet;

use crate::error::{Result, RoutingError};

/// Tokens a destination serves
///
/// An empty `only_tokens` list means every known token. Blank entries are
/// ignored and duplicates collapse, first occurrence wins. Tokens missing from
/// `known_tokens` are kept with a warning, since token management lives
/// outside this server.
///
/// # Errors
///
/// Returns `NoTokens` if nothing remains to route.
pub fn resolve_tokens<S: AsRef<str>>(
    destination: &str,
    only_tokens: &[S],
    known_tokens: &[S],
) -> Result<Vec<String>> {
    let explicit: Vec<&str> = only_tokens
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect();

    let source: Vec<&str> = if explicit.is_empty() {
        tracing::warn!(
            destination = %destination,
            tokens = known_tokens.len(),
            "destination has no only_tokens, routing every known token to it"
        );
        known_tokens
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect()
    } else {
        let known: BTreeSet<&str> = known_tokens.iter().map(|t| t.as_ref().trim()).collect();
        for token in explicit.iter().filter(|t| !known.contains(*t)) {
            tracing::warn!(destination = %destination, token = %token, "token is not a known token");
        }
        explicit
    };

    let mut seen = BTreeSet::new();
    let tokens: Vec<String> = source
        .into_iter()
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return Err(RoutingError::no_tokens(destination));
    }
    Ok(tokens)
}
