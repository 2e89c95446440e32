//! SQL storage
//!
//! Dialect-independent destination for SQL warehouses. Events are processed
//! into flat rows, the target table is reconciled through a [`TableHelper`]
//! and rows are written with the destination's [`SqlAdapter`].
//!
//! ```text
//! stream:      consume ──> Processor ──> RetryQueue<TableRow> ──> TableDelivery
//! batch:       store_batch(file) ──> group by table ──> insert per table
//! synchronous: sync_store ──> Processor ──> insert ──> row as result
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use courier_config::{DestinationConfig, DestinationMode};
use courier_protocol::{Event, EventContext, Table, Value};
use courier_schema::{FieldTypes, SqlAdapter, TableHelper, TypeMapping};
use serde::{Deserialize, Serialize};

use crate::common::{MetricsSnapshot, SinkError, SinkMetrics};
use crate::delivery::Delivery;
use crate::hooks::{self, StorageHooks};
use crate::processor::Processor;
use crate::storage::{BatchResult, Storage, StorageOptions, Transport};

/// Queued payload: one row and the table it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub table: Table,
    pub row: Event,
}

/// Writes single rows, reconciling the table first
#[derive(Debug)]
pub struct TableDelivery {
    helper: Arc<TableHelper>,
}

impl TableDelivery {
    pub fn new(helper: Arc<TableHelper>) -> Self {
        Self { helper }
    }
}

#[async_trait]
impl Delivery for TableDelivery {
    type Payload = TableRow;

    async fn deliver(&self, payload: &TableRow, context: &mut EventContext) -> Result<(), SinkError> {
        let written = self
            .helper
            .insert(&payload.table, std::slice::from_ref(&payload.row))
            .await?;
        context.table = Some(written);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.helper.adapter().close().await?;
        Ok(())
    }
}

/// Destination writing to a SQL database
pub struct SqlStorage {
    id: String,
    kind: String,
    mode: DestinationMode,
    cache_disabled: bool,
    processor: Processor,
    helper: Arc<TableHelper>,
    hooks: Arc<StorageHooks>,
    transport: Transport<TableDelivery>,
    metrics: SinkMetrics,
    closed: AtomicBool,
}

impl SqlStorage {
    /// # Errors
    ///
    /// Returns `Config` if the data layout is invalid, `Init` if the retry
    /// queue cannot be opened.
    pub fn new(
        id: impl Into<String>,
        config: &DestinationConfig,
        adapter: Arc<dyn SqlAdapter>,
        type_mapping: TypeMapping,
        hooks: Arc<StorageHooks>,
        options: &StorageOptions,
    ) -> Result<Self, SinkError> {
        let id = id.into();
        let processor = Processor::new(id.clone(), &config.data_layout, type_mapping)?;
        let helper = Arc::new(TableHelper::new(id.clone(), adapter));
        let transport = Transport::open(
            &id,
            config.mode,
            TableDelivery::new(Arc::clone(&helper)),
            hooks::shared(&hooks),
            options,
        )?;

        tracing::info!(
            destination = %id,
            kind = %config.kind,
            mode = config.mode.as_str(),
            "sql storage started"
        );

        Ok(Self {
            kind: config.kind.clone(),
            mode: config.mode,
            cache_disabled: config.caching.disabled,
            processor,
            helper,
            hooks,
            transport,
            metrics: SinkMetrics::new(),
            closed: AtomicBool::new(false),
            id,
        })
    }

    #[inline]
    pub fn helper(&self) -> &TableHelper {
        &self.helper
    }

    fn check_open(&self) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::closed(&self.id));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for SqlStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn mode(&self) -> DestinationMode {
        self.mode
    }

    fn consume(&self, token_id: &str, event: Event) -> Result<(), SinkError> {
        if let Err(e) = self.check_open() {
            self.metrics.dropped();
            return Err(e);
        }

        let context =
            EventContext::new(&self.id, token_id, event).with_cache_disabled(self.cache_disabled);
        self.hooks.on_consume(&context);

        let processed = match self.processor.process(&context.raw_event) {
            Ok(processed) => processed,
            Err(e) => {
                self.hooks
                    .on_rejected(context.cache_disabled, &context.event_id, &e);
                self.metrics.dropped();
                return Err(e);
            }
        };

        let table = self.processor.table(processed.table_name, &processed.types);
        let context = context.with_processed(processed.row.clone(), Some(table.clone()));
        let (cache_disabled, event_id) = (context.cache_disabled, context.event_id.clone());

        let payload = TableRow {
            table,
            row: processed.row,
        };
        self.transport
            .send_async(&self.kind, payload, context)
            .inspect_err(|e| {
                self.hooks.on_rejected(cache_disabled, &event_id, e);
            })
    }

    async fn store_batch(
        &self,
        file_name: &str,
        events: Vec<Event>,
    ) -> Result<BatchResult, SinkError> {
        self.check_open()?;

        let mut result = BatchResult::default();
        let mut tables: BTreeMap<String, (FieldTypes, Vec<Event>)> = BTreeMap::new();

        for event in &events {
            match self.processor.process(event) {
                Ok(processed) => {
                    let (types, rows) = tables.entry(processed.table_name).or_default();
                    types.merge(&processed.types);
                    rows.push(processed.row);
                }
                Err(e) => {
                    tracing::warn!(
                        destination = %self.id,
                        file = %file_name,
                        event_id = event.event_id().unwrap_or_default(),
                        error = %e,
                        "skipping unprocessable event"
                    );
                    result.skipped += 1;
                }
            }
        }

        let mut failures = Vec::new();
        for (name, (types, rows)) in tables {
            let wanted = self.processor.table(name.as_str(), &types);
            match self.helper.insert(&wanted, &rows).await {
                Ok(_) => {
                    result.stored += rows.len();
                    result.tables += 1;
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        if !failures.is_empty() {
            return Err(SinkError::write(format!(
                "batch '{file_name}' to '{}': {}",
                self.id,
                failures.join("; ")
            )));
        }

        self.metrics.delivered(result.stored as u64);
        tracing::info!(
            destination = %self.id,
            file = %file_name,
            stored = result.stored,
            skipped = result.skipped,
            tables = result.tables,
            "batch stored"
        );
        Ok(result)
    }

    async fn sync_store(&self, token_id: &str, event: Event) -> Result<EventContext, SinkError> {
        self.check_open()?;

        let context =
            EventContext::new(&self.id, token_id, event).with_cache_disabled(self.cache_disabled);
        let processed = self.processor.process(&context.raw_event)?;
        let wanted = self.processor.table(processed.table_name, &processed.types);
        let written = self
            .helper
            .insert(&wanted, std::slice::from_ref(&processed.row))
            .await?;
        self.metrics.delivered(1);

        let result = Value::Object(processed.row.clone().into_fields());
        let mut context = context.with_processed(processed.row, Some(written));
        context.synchronous_result = Some(result);
        Ok(context)
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.transport.metrics().merge(self.metrics.snapshot())
    }

    fn queue_size(&self) -> u64 {
        self.transport.queue_size()
    }

    async fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let transport = self.transport.close().await;
        let hooks = self.hooks.close();

        tracing::info!(destination = %self.id, "sql storage closed");
        transport.and(hooks)
    }
}

impl std::fmt::Debug for SqlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStorage")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("helper", &self.helper)
            .finish_non_exhaustive()
    }
}
