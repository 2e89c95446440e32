//! Event processing for SQL destinations
//!
//! ```text
//! Event --mappings--> mapped --table name template--> "events_click"
//!                       |
//!                       +--flatten--> row --infer--> FieldTypes
//! ```
//!
//! Mapping paths are `/`-separated (`/user/id`). The table name is rendered
//! from the mapped event before flattening, so templates address nested
//! fields with dots (`{{ .user.type }}`).

use std::collections::BTreeSet;

use courier_config::{DataLayout, MappingAction, Mappings};
use courier_protocol::{Event, Table, Value};
use courier_schema::{FieldTypes, TableNameExtractor, TypeMapping, flatten};

use crate::common::SinkError;

/// A processed event ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEvent {
    pub table_name: String,
    pub row: Event,
    pub types: FieldTypes,
}

/// Turns raw events into flat rows and table definitions
#[derive(Debug)]
pub struct Processor {
    destination_id: String,
    mappings: Option<Mappings>,
    table_name: TableNameExtractor,
    pk_fields: BTreeSet<String>,
    type_mapping: TypeMapping,
}

impl Processor {
    /// # Errors
    ///
    /// Returns `Config` if the table name template does not parse.
    pub fn new(
        destination_id: impl Into<String>,
        layout: &DataLayout,
        type_mapping: TypeMapping,
    ) -> Result<Self, SinkError> {
        let destination_id = destination_id.into();
        let table_name = TableNameExtractor::new(&layout.table_name_template).map_err(|e| {
            SinkError::config(format!("destination '{destination_id}' table name: {e}"))
        })?;
        let pk_fields = layout
            .primary_key_fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            destination_id,
            mappings: layout.mappings.clone(),
            table_name,
            pk_fields,
            type_mapping,
        })
    }

    #[inline]
    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    #[inline]
    pub fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    /// Apply the field mapping rules
    pub fn map_fields(&self, event: &Event) -> Event {
        let Some(mappings) = &self.mappings else {
            return event.clone();
        };

        let keep = mappings.keep_unmapped;
        let mut out = if keep { event.clone() } else { Event::new() };

        for rule in &mappings.rules {
            match rule.action {
                MappingAction::Move => {
                    let value = if keep {
                        out.remove_path(&rule.src)
                    } else {
                        event.get_path(&rule.src).cloned()
                    };
                    if let Some(value) = value {
                        out.set_path(&rule.dst, value);
                    }
                }
                MappingAction::Remove => {
                    if keep {
                        out.remove_path(&rule.src);
                    }
                }
                MappingAction::Constant => {
                    if let Some(value) = &rule.value {
                        out.set_path(&rule.dst, Value::from(value.clone()));
                    }
                }
            }
        }
        out
    }

    /// Map, resolve the table and flatten one event
    ///
    /// # Errors
    ///
    /// Returns `Schema` if the table name cannot be rendered for this event.
    pub fn process(&self, event: &Event) -> Result<ProcessedEvent, SinkError> {
        let mapped = self.map_fields(event);
        let table_name = self.table_name.extract(&mapped)?;
        let row = flatten(&mapped);
        let types = FieldTypes::from_event(&row);

        Ok(ProcessedEvent {
            table_name,
            row,
            types,
        })
    }

    /// Table definition for rows of the given types
    pub fn table(&self, name: impl Into<String>, types: &FieldTypes) -> Table {
        self.type_mapping.table(name, types, &self.pk_fields)
    }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
