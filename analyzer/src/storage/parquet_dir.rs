use super::{ensure_compatible, validate_table_name, TableStore, WriteMode};
use crate::utils::arrow::normalize_view_types;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::{Error, Result};
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EXTENSION: &str = "parquet";

/// One `<table>.parquet` file per table inside a directory.
pub struct ParquetTableStore {
    root: PathBuf,
    ctx: SessionContext,
}

impl ParquetTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Using parquet table store");
        Ok(Self {
            root,
            ctx: SessionContext::new(),
        })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, EXTENSION))
    }

    fn path_str(path: &Path) -> Result<&str> {
        path.to_str()
            .ok_or_else(|| Error::Storage(format!("Non UTF-8 path {}", path.display())))
    }

    fn write_file(&self, batch: &RecordBatch, path: &Path) -> Result<()> {
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn file_has_column(path: &Path, column: &str) -> Result<bool> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        Ok(builder.schema().column_with_name(column).is_some())
    }
}

#[async_trait]
impl TableStore for ParquetTableStore {
    async fn list_tables_with_column(&self, column: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match Self::file_has_column(&path, column) {
                Ok(true) => names.push(name.to_string()),
                Ok(false) => {}
                Err(e) => warn!(table = name, error = %e, "Skipping unreadable parquet file"),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read_table(&self, name: &str) -> Result<Option<RecordBatch>> {
        validate_table_name(name)?;
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let df = self
            .ctx
            .read_parquet(Self::path_str(&path)?, ParquetReadOptions::default())
            .await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let batch = concat_batches(&schema, &batches)?;

        debug!(table = name, rows = batch.num_rows(), "Read parquet table");
        Ok(Some(normalize_view_types(&batch)?))
    }

    async fn write_table(&self, batch: &RecordBatch, name: &str, mode: WriteMode) -> Result<bool> {
        validate_table_name(name)?;
        let path = self.table_path(name);

        let to_write = match mode {
            WriteMode::Append => match self.read_table(name).await? {
                Some(existing) => {
                    ensure_compatible(name, &existing.schema(), &batch.schema())?;
                    concat_batches(&existing.schema(), [&existing, batch])?
                }
                None => batch.clone(),
            },
            WriteMode::Replace => batch.clone(),
        };

        self.write_file(&to_write, &path)?;
        info!(table = name, rows = to_write.num_rows(), ?mode, "Wrote parquet table");
        Ok(true)
    }
}
