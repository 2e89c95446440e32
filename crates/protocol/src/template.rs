//! Field templates over events
//!
//! Minimal `{{ .field.path }}` templating used for table names, webhook URLs
//! and request bodies. Literal text is copied verbatim; each expression is
//! replaced by the referenced field rendered with [`Value`]'s `Display`.
//!
//! Rendering returns a typed error for a missing field instead of producing
//! an empty string, so a bad template shows up as a per-event failure.

use crate::error::TemplateError;
use crate::event::Event;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field(Vec<String>),
}

/// Parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    /// Parse a template string
    ///
    /// # Errors
    ///
    /// Returns an error for unclosed `{{` or expressions that are not
    /// `.`-prefixed field paths.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(TemplateError::Unclosed {
                position: offset + start,
            })?;
            parts.push(Part::Field(parse_expression(&after[..end])?));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Template that always renders `text` verbatim
    pub fn constant(text: &str) -> Self {
        let parts = if text.is_empty() {
            Vec::new()
        } else {
            vec![Part::Literal(text.to_string())]
        };
        Self {
            source: text.to_string(),
            parts,
        }
    }

    /// Render against an event
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if a referenced field is absent or null.
    pub fn render(&self, event: &Event) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field(path) => {
                    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
                    match event.get_nested(&segments) {
                        Some(Value::Null) | None => {
                            return Err(TemplateError::missing_field(path.join(".")));
                        }
                        Some(value) => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }

    /// Template has no expressions
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Literal(_)))
    }

    /// Original template text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_expression(raw: &str) -> Result<Vec<String>, TemplateError> {
    let expr = raw.trim();
    let Some(path) = expr.strip_prefix('.') else {
        return Err(TemplateError::invalid_expression(expr));
    };

    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
        return Err(TemplateError::invalid_expression(expr));
    }
    Ok(segments)
}
