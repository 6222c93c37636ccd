use config::{Config, ConfigError};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisSettings {
    #[serde(default = "default_time_threshold_minutes")]
    pub time_threshold_minutes: i64,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    #[serde(default = "default_recovery_strategy")]
    pub recovery_strategy: String,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_invalid_examples")]
    pub max_invalid_examples: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Directory of `<table>.parquet` files. Absent means an in-memory store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_load_concurrency")]
    pub load_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_summary_table")]
    pub summary_table: String,
    #[serde(default = "default_detail_table")]
    pub detail_table: String,
    #[serde(default = "default_fact_table")]
    pub fact_table: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            time_threshold_minutes: default_time_threshold_minutes(),
            time_column: default_time_column(),
            recovery_strategy: default_recovery_strategy(),
            confidence_threshold: default_confidence_threshold(),
            max_invalid_examples: default_max_invalid_examples(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            load_concurrency: default_load_concurrency(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            summary_table: default_summary_table(),
            detail_table: default_detail_table(),
            fact_table: default_fact_table(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            analysis: AnalysisSettings::default(),
            storage: StorageSettings::default(),
            output: OutputSettings::default(),
            api_port: default_api_port(),
        }
    }
}

fn default_time_threshold_minutes() -> i64 {
    10
}

fn default_time_column() -> String {
    "TimeString".to_string()
}

fn default_recovery_strategy() -> String {
    "auto".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_max_invalid_examples() -> usize {
    100
}

fn default_load_concurrency() -> usize {
    4
}

fn default_summary_table() -> String {
    "LOTE_SUMMARY".to_string()
}

fn default_detail_table() -> String {
    "LOTE_DATA".to_string()
}

fn default_fact_table() -> String {
    "FactSamples".to_string()
}

fn default_api_port() -> u16 {
    3000
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            time_column = %settings.analysis.time_column,
            threshold_minutes = settings.analysis.time_threshold_minutes,
            data_dir = ?settings.storage.data_dir,
            "Loaded settings"
        );

        Ok(settings)
    }
}
