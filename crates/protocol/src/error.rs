//! Protocol error types

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding or encoding events
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not valid JSON
    #[error("invalid event json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object
    #[error("event payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Errors raised while parsing or rendering a [`crate::Template`]
///
/// Rendering never panics: a missing field is reported as a value, so callers
/// decide whether the event is skipped, retried or sent to fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{{` without a matching `}}`
    #[error("unclosed template expression at byte {position}")]
    Unclosed {
        /// Byte offset of the opening braces
        position: usize,
    },

    /// Expression that is not a `.field.path` reference
    #[error("invalid template expression '{expression}'")]
    InvalidExpression {
        /// The offending expression text
        expression: String,
    },

    /// Referenced field is missing or null in the event
    #[error("template field '{field}' is missing in event")]
    MissingField {
        /// Dotted field path
        field: String,
    },
}

impl TemplateError {
    /// Create an InvalidExpression error
    #[inline]
    pub fn invalid_expression(expression: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
        }
    }

    /// Create a MissingField error
    #[inline]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}
