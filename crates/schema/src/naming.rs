//! Table name resolution

use courier_protocol::{Event, Template};

use crate::error::{Result, SchemaError};

/// Table used when a destination does not configure a template
pub const DEFAULT_TABLE_NAME: &str = "events";

/// Resolves the target table of an event from a name template
#[derive(Debug, Clone)]
pub struct TableNameExtractor {
    template: Template,
}

impl Default for TableNameExtractor {
    fn default() -> Self {
        Self {
            template: Template::constant(DEFAULT_TABLE_NAME),
        }
    }
}

impl TableNameExtractor {
    /// Parse a table name template; blank means [`DEFAULT_TABLE_NAME`]
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not parse.
    pub fn new(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            template: Template::parse(template.trim())?,
        })
    }

    /// Table name for an event
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced field is missing or the name renders
    /// empty.
    pub fn extract(&self, event: &Event) -> Result<String> {
        let rendered = self.template.render(event)?;
        let name: String = rendered
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name.is_empty() {
            return Err(SchemaError::EmptyTableName {
                template: self.template.as_str().to_string(),
            });
        }
        Ok(name)
    }

    /// Whether every event resolves to the same table
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.template.is_constant()
    }
}
