//! Pipeline error types
//!
//! Error types for destination construction, reconciliation and shutdown.

use std::fmt;

use courier_config::ConfigError;
use courier_routing::RoutingError;
use courier_schema::SchemaError;
use courier_sinks::SinkError;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No storage is registered for the destination type
    #[error("unknown destination type '{kind}' for '{destination}'")]
    UnknownKind { destination: String, kind: String },

    /// Destination config or destinations payload is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Token resolution failed
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Storage construction or operation failed
    #[error(transparent)]
    Storage(#[from] SinkError),

    /// Database adapter could not connect or answer
    #[error("destination '{destination}': {source}")]
    Adapter {
        destination: String,
        #[source]
        source: SchemaError,
    },

    /// Registry is shutting down
    #[error("destination registry is closed")]
    Closed,
}

impl PipelineError {
    /// Create an UnknownKind error
    pub fn unknown_kind(destination: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnknownKind {
            destination: destination.into(),
            kind: kind.into(),
        }
    }

    /// Create an Adapter error
    pub fn adapter(destination: impl Into<String>, source: SchemaError) -> Self {
        Self::Adapter {
            destination: destination.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure of an aggregate close
#[derive(Debug, Default)]
pub struct CloseErrors {
    errors: Vec<(String, SinkError)>,
}

impl CloseErrors {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the failure of one component
    pub fn push(&mut self, component: impl Into<String>, error: SinkError) {
        self.errors.push((component.into(), error));
    }

    /// Record the result of one close
    pub fn record(&mut self, component: &str, result: std::result::Result<(), SinkError>) {
        if let Err(e) = result {
            tracing::error!(component = %component, error = %e, "close failed");
            self.push(component, e);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SinkError)> {
        self.errors.iter().map(|(c, e)| (c.as_str(), e))
    }

    /// `Ok` when nothing failed
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one close failed.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} close error(s)", self.errors.len())?;
        for (i, (component, error)) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{component}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseErrors {}
