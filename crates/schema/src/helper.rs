//! Table reconciliation against a SQL adapter
//!
//! `TableHelper` keeps the last known definition of every table a destination
//! writes to. A write first checks the wanted table against that cache; only
//! when the diff is non-empty does it take the per-table DDL lock, refresh the
//! stored schema and issue `create_table` or `patch_table_schema`.
//!
//! Under high-frequency streaming the common case is a cache hit with an empty
//! diff, so no DDL and no lock.
//!
//! An insert that fails with [`SchemaError::TableNotExist`] (table dropped
//! behind our back) forgets the cached table and retries once, which
//! re-creates it.

use std::collections::HashMap;
use std::sync::Arc;

use courier_protocol::{Event, Table};
use parking_lot::{Mutex, RwLock};

use crate::adapter::SqlAdapter;
use crate::diff::{apply, diff, primary_key_name};
use crate::error::{Result, SchemaError};

/// Per-destination table cache and DDL driver
pub struct TableHelper {
    destination_id: String,
    adapter: Arc<dyn SqlAdapter>,
    known: RwLock<HashMap<String, Table>>,
    ddl_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for TableHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHelper")
            .field("destination_id", &self.destination_id)
            .field("adapter", &self.adapter.kind())
            .field("known_tables", &self.known.read().len())
            .finish()
    }
}

impl TableHelper {
    pub fn new(destination_id: impl Into<String>, adapter: Arc<dyn SqlAdapter>) -> Self {
        Self {
            destination_id: destination_id.into(),
            adapter,
            known: RwLock::new(HashMap::new()),
            ddl_locks: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn adapter(&self) -> &Arc<dyn SqlAdapter> {
        &self.adapter
    }

    /// Last known definition of a table
    pub fn known_table(&self, name: &str) -> Option<Table> {
        self.known.read().get(name).cloned()
    }

    /// Drop a table from the cache so the next write re-reads it
    pub fn forget(&self, name: &str) {
        self.known.write().remove(name);
    }

    /// Make sure the stored table can hold `wanted`, returning its definition
    ///
    /// # Errors
    ///
    /// Returns the adapter error if reading the schema or DDL fails.
    pub async fn ensure_table(&self, wanted: &Table) -> Result<Table> {
        {
            let known = self.known.read();
            if let Some(table) = known.get(&wanted.name) {
                if !diff(table, Some(wanted)).has_changes() {
                    return Ok(table.clone());
                }
            }
        }

        let lock = self.ddl_lock(&wanted.name);
        let _guard = lock.lock().await;

        // Another writer may have patched the table while we waited.
        let mut known = match self.known_table(&wanted.name) {
            Some(known) => known,
            None => {
                let mut stored = self.adapter.get_table_schema(&wanted.name).await?;
                stored.name.clone_from(&wanted.name);
                stored
            }
        };

        if !known.exists() {
            self.adapter.create_table(wanted).await?;
            let mut created = wanted.clone();
            if !created.pk_fields.is_empty() {
                created.primary_key_name = primary_key_name(&created.name);
            }
            tracing::info!(
                destination = %self.destination_id,
                table = %created.name,
                columns = created.columns.len(),
                "created table"
            );
            self.known
                .write()
                .insert(created.name.clone(), created.clone());
            return Ok(created);
        }

        let changes = diff(&known, Some(wanted));
        if changes.has_changes() {
            self.adapter.patch_table_schema(&changes).await?;
            apply(&mut known, &changes);
            tracing::info!(
                destination = %self.destination_id,
                table = %known.name,
                columns = changes.columns.len(),
                pk_changed = !changes.pk_fields.is_empty() || changes.delete_pk_fields,
                "patched table schema"
            );
        }

        self.known.write().insert(known.name.clone(), known.clone());
        Ok(known)
    }

    /// Reconcile and insert rows, re-creating a vanished table once
    ///
    /// Returns the table definition the rows were written with.
    ///
    /// # Errors
    ///
    /// Returns the adapter error; `TableNotExist` only if the retry also
    /// failed that way.
    pub async fn insert(&self, wanted: &Table, rows: &[Event]) -> Result<Table> {
        match self.try_insert(wanted, rows).await {
            Err(SchemaError::TableNotExist { table }) => {
                tracing::warn!(
                    destination = %self.destination_id,
                    table = %table,
                    "table vanished, re-creating"
                );
                self.forget(&wanted.name);
                self.try_insert(wanted, rows).await
            }
            other => other,
        }
    }

    async fn try_insert(&self, wanted: &Table, rows: &[Event]) -> Result<Table> {
        let table = self.ensure_table(wanted).await?;
        self.adapter.insert(&table, rows).await?;
        Ok(table)
    }

    fn ddl_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.ddl_locks
                .lock()
                .entry(table.to_string())
                .or_default(),
        )
    }
}
