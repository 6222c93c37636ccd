use super::{ensure_compatible, validate_table_name, TableStore, WriteMode};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Tables held in memory; cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryTableStore {
    tables: Arc<DashMap<String, RecordBatch>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (String, RecordBatch)>,
    {
        let store = Self::new();
        for (name, batch) in tables {
            store.tables.insert(name, batch);
        }
        store
    }

    pub fn insert(&self, name: &str, batch: RecordBatch) {
        self.tables.insert(name.to_string(), batch);
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn list_tables_with_column(&self, column: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|entry| entry.value().schema().column_with_name(column).is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn read_table(&self, name: &str) -> Result<Option<RecordBatch>> {
        Ok(self.tables.get(name).map(|entry| entry.value().clone()))
    }

    async fn write_table(&self, batch: &RecordBatch, name: &str, mode: WriteMode) -> Result<bool> {
        validate_table_name(name)?;

        let merged = match (mode, self.tables.get(name)) {
            (WriteMode::Append, Some(existing)) => {
                let existing = existing.value().clone();
                ensure_compatible(name, &existing.schema(), &batch.schema())?;
                concat_batches(&existing.schema(), [&existing, batch])?
            }
            _ => batch.clone(),
        };

        debug!(table = name, rows = merged.num_rows(), ?mode, "Stored table in memory");
        self.tables.insert(name.to_string(), merged);
        Ok(true)
    }
}
