//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur while resolving destination routes
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Destination resolves to no token at all
    #[error("destination '{destination}' has no tokens to serve")]
    NoTokens {
        /// Destination without tokens
        destination: String,
    },
}

impl RoutingError {
    /// Create a NoTokens error
    #[inline]
    pub fn no_tokens(destination: impl Into<String>) -> Self {
        Self::NoTokens {
            destination: destination.into(),
        }
    }
}
