mod memory;
mod parquet_dir;

pub use memory::MemoryTableStore;
pub use parquet_dir::ParquetTableStore;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::config::StorageSettings;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Replace,
    Append,
}

/// Where source tables come from and derived tables go.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Names of tables that have `column`, sorted.
    async fn list_tables_with_column(&self, column: &str) -> Result<Vec<String>>;
    /// `None` when the table does not exist.
    async fn read_table(&self, name: &str) -> Result<Option<RecordBatch>>;
    async fn write_table(&self, batch: &RecordBatch, name: &str, mode: WriteMode) -> Result<bool>;
}

/// Parquet directory when `data_dir` is set, an empty memory store otherwise.
pub fn from_settings(settings: &StorageSettings) -> Result<Arc<dyn TableStore>> {
    match &settings.data_dir {
        Some(dir) => Ok(Arc::new(ParquetTableStore::new(dir)?)),
        None => {
            warn!("No data_dir configured, using an empty in-memory store");
            Ok(Arc::new(MemoryTableStore::new()))
        }
    }
}

/// Same column names and types in the same order; nullability is ignored.
pub(crate) fn ensure_compatible(table: &str, existing: &Schema, incoming: &Schema) -> Result<()> {
    let same = existing.fields().len() == incoming.fields().len()
        && existing
            .fields()
            .iter()
            .zip(incoming.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());

    if same {
        Ok(())
    } else {
        Err(Error::Storage(format!(
            "Cannot append to '{}': schema does not match the stored table",
            table
        )))
    }
}

pub(crate) fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::InvalidInput(format!("Invalid table name '{}'", name)));
    }
    Ok(())
}
