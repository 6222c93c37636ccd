use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use parquet::errors::ParquetError;
use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Table '{0}' is empty")]
    EmptyTable(String),

    #[error("No valid timestamps found for reference")]
    NoReferenceData,

    #[error("Need at least 2 valid tables for comparison, found {0}")]
    InsufficientTables(usize),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures that belong to one table's data rather than to the
    /// surrounding infrastructure.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::MissingColumn(_)
                | Error::EmptyTable(_)
                | Error::NoReferenceData
                | Error::InsufficientTables(_)
                | Error::Analysis(_)
        )
    }
}
