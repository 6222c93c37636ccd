//! Batch orchestration: load tables, assess and repair their time column,
//! cross-check them, segment each one, and derive the LOTE tables.

use super::reports::{
    cycle_summary_batch, generate_cycle_summary, generate_detailed_mapping,
};
use crate::models::{
    AnalysisConfig, QualityReport, ReconciliationReport, RecoveryReport, RecoveryStrategy,
    TableResult,
};
use crate::processor::{analyze_table, reconcile, recover};
use crate::storage::{self, TableStore, WriteMode};
use crate::utils::arrow::{replace_column, string_column};
use arrow::record_batch::RecordBatch;
use common::config::{OutputSettings, Settings};
use common::{Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Tables never analyzed as sources.
pub const EXCLUDED_TABLES: &[&str] = &["FactSamples", "Cycle_Events"];

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub results: BTreeMap<String, TableResult>,
    pub time_matched: bool,
    pub reconciliation: ReconciliationReport,
    pub quality_reports: BTreeMap<String, QualityReport>,
    pub recovery_reports: BTreeMap<String, RecoveryReport>,
    pub recovery_failures: BTreeMap<String, String>,
    /// Input tables with the time column replaced where recovery ran.
    #[serde(skip)]
    pub tables: BTreeMap<String, RecordBatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub cycles_found: usize,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub time_matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub total_tables: usize,
    pub tables_with_errors: usize,
    pub tables_with_cycles: usize,
    pub total_cycles: usize,
    pub time_matched: bool,
    pub table_details: BTreeMap<String, TableSummary>,
}

/// LOTE_SUMMARY and LOTE_DATA for one reference table.
#[derive(Debug, Clone)]
pub struct LoteTables {
    pub reference_table: String,
    pub summary: RecordBatch,
    pub detail: RecordBatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoteWriteResult {
    pub reference_table: String,
    pub summary_table: String,
    pub summary_rows: usize,
    pub detail_table: String,
    pub detail_rows: usize,
}

/// Runs quality analysis, recovery, reconciliation and segmentation over
/// `tables`. One result per input table, always.
pub fn analyze_tables(
    tables: BTreeMap<String, RecordBatch>,
    strategy: RecoveryStrategy,
    config: &AnalysisConfig,
) -> AnalysisOutcome {
    let time_column = config.time_column.as_str();
    let mut quality_reports = BTreeMap::new();
    let mut recovery_reports = BTreeMap::new();
    let mut recovery_failures = BTreeMap::new();
    let mut repaired: BTreeMap<String, RecordBatch> = BTreeMap::new();
    let mut columns: BTreeMap<String, Option<Vec<Option<String>>>> = BTreeMap::new();

    for (name, batch) in tables {
        let column = match string_column(&batch, time_column) {
            Ok(column) => column,
            Err(e) => {
                warn!(table = %name, error = %e, "Time column unreadable");
                Some(Vec::new())
            }
        };

        let Some(values) = column else {
            columns.insert(name.clone(), None);
            repaired.insert(name, batch);
            continue;
        };

        let quality = QualityReport::analyze(&values, config.max_invalid_examples);
        info!(
            table = %name,
            valid = quality.valid_count,
            invalid = quality.invalid_count,
            nulls = quality.null_count,
            loss = quality.data_loss_percentage,
            "Timestamp quality"
        );

        let mut values = values;
        let mut batch = batch;
        if quality.needs_recovery() && strategy != RecoveryStrategy::None {
            match recover(&values, &quality, strategy, config.confidence_threshold) {
                Ok(outcome) => match replace_column(&batch, time_column, outcome.repaired_column.clone()) {
                    Ok(updated) => {
                        batch = updated;
                        values = outcome.repaired_column;
                        recovery_reports.insert(name.clone(), outcome.report);
                    }
                    Err(e) => {
                        warn!(table = %name, error = %e, "Could not apply recovered column");
                        recovery_failures.insert(name.clone(), e.to_string());
                    }
                },
                Err(e) => {
                    warn!(table = %name, error = %e, "Recovery failed, keeping original column");
                    recovery_failures.insert(name.clone(), e.to_string());
                }
            }
        }

        quality_reports.insert(name.clone(), quality);
        columns.insert(name.clone(), Some(values));
        repaired.insert(name, batch);
    }

    let reconciliation = reconcile(
        columns
            .iter()
            .map(|(name, column)| (name.as_str(), column.as_deref())),
        time_column,
    );
    let time_matched = reconciliation.all_matching;

    let results: BTreeMap<String, TableResult> = repaired
        .iter()
        .map(|(name, batch)| {
            let mut result = analyze_table(name, batch, config);
            result.time_matched = time_matched;
            (name.clone(), result)
        })
        .collect();

    info!(
        tables = results.len(),
        time_matched,
        recovered_tables = recovery_reports.len(),
        "Analysis finished"
    );

    AnalysisOutcome {
        results,
        time_matched,
        reconciliation,
        quality_reports,
        recovery_reports,
        recovery_failures,
        tables: repaired,
    }
}

/// Counts over an outcome; failed tables count only as errors.
pub fn analysis_summary(outcome: &AnalysisOutcome) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        total_tables: outcome.results.len(),
        tables_with_errors: 0,
        tables_with_cycles: 0,
        total_cycles: 0,
        time_matched: outcome.time_matched,
        table_details: BTreeMap::new(),
    };

    for (name, result) in &outcome.results {
        if result.is_error() {
            summary.tables_with_errors += 1;
        } else if result.total_cycles > 0 {
            summary.tables_with_cycles += 1;
            summary.total_cycles += result.total_cycles;
        }

        summary.table_details.insert(
            name.clone(),
            TableSummary {
                cycles_found: result.total_cycles,
                has_error: result.is_error(),
                error_message: result.error_message.clone(),
                time_matched: result.time_matched,
            },
        );
    }

    summary
}

pub fn generate_lote_tables(
    outcome: &AnalysisOutcome,
    reference_table: &str,
    config: &AnalysisConfig,
) -> Result<LoteTables> {
    let result = outcome.results.get(reference_table).ok_or_else(|| {
        Error::InvalidInput(format!("Reference table '{}' was not analyzed", reference_table))
    })?;
    let data = outcome.tables.get(reference_table).ok_or_else(|| {
        Error::InvalidInput(format!("No data loaded for reference table '{}'", reference_table))
    })?;

    let rows = generate_cycle_summary(result)?;
    let summary = cycle_summary_batch(&rows)?;
    let detail = generate_detailed_mapping(result, data, &config.time_column)?;

    info!(
        reference = reference_table,
        cycles = summary.num_rows(),
        samples = detail.num_rows(),
        "Generated LOTE tables"
    );

    Ok(LoteTables {
        reference_table: reference_table.to_string(),
        summary,
        detail,
    })
}

pub struct AnalysisService {
    store: Arc<dyn TableStore>,
    config: AnalysisConfig,
    output: OutputSettings,
    load_concurrency: usize,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn TableStore>, settings: &Settings) -> Result<Self> {
        Ok(Self {
            store,
            config: AnalysisConfig::from_settings(&settings.analysis)?,
            output: settings.output.clone(),
            load_concurrency: settings.storage.load_concurrency.max(1),
        })
    }

    /// Store picked from `storage` settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(storage::from_settings(&settings.storage)?, settings)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn is_excluded(&self, name: &str) -> bool {
        EXCLUDED_TABLES.contains(&name)
            || name == self.output.summary_table
            || name == self.output.detail_table
            || name == self.output.fact_table
    }

    /// Source tables carrying `column`, without ETL inputs and outputs.
    pub async fn discover_tables(&self, column: &str) -> Result<Vec<String>> {
        let names = self.store.list_tables_with_column(column).await?;
        Ok(names.into_iter().filter(|n| !self.is_excluded(n)).collect())
    }

    /// Reads `names` concurrently. Missing or unreadable tables are left out.
    pub async fn load_tables(&self, names: &[String]) -> BTreeMap<String, RecordBatch> {
        let store = &self.store;
        let loaded: Vec<(String, Option<RecordBatch>)> = stream::iter(names.iter().cloned())
            .map(|name| async move {
                match store.read_table(&name).await {
                    Ok(Some(batch)) => (name, Some(batch)),
                    Ok(None) => {
                        warn!(table = %name, "Table not found");
                        (name, None)
                    }
                    Err(e) => {
                        warn!(table = %name, error = %e, "Failed to read table");
                        (name, None)
                    }
                }
            })
            .buffer_unordered(self.load_concurrency)
            .collect()
            .await;

        loaded
            .into_iter()
            .filter_map(|(name, batch)| batch.map(|b| (name, b)))
            .collect()
    }

    /// Loads the named tables (or every discovered one) and analyzes them.
    pub async fn run_analysis(
        &self,
        tables: Option<Vec<String>>,
        strategy: Option<RecoveryStrategy>,
    ) -> Result<AnalysisOutcome> {
        let names = match tables {
            Some(names) if !names.is_empty() => names,
            _ => self.discover_tables(&self.config.time_column).await?,
        };
        if names.is_empty() {
            return Err(Error::InvalidInput(format!(
                "No tables with a '{}' column to analyze",
                self.config.time_column
            )));
        }

        let loaded = self.load_tables(&names).await;
        let strategy = strategy.unwrap_or(self.config.recovery_strategy);
        info!(requested = names.len(), loaded = loaded.len(), %strategy, "Starting analysis");

        Ok(analyze_tables(loaded, strategy, &self.config))
    }

    pub fn lote_tables(&self, outcome: &AnalysisOutcome, reference_table: &str) -> Result<LoteTables> {
        generate_lote_tables(outcome, reference_table, &self.config)
    }

    /// Replaces the LOTE tables in the store.
    pub async fn persist_lote_tables(&self, lote: &LoteTables) -> Result<LoteWriteResult> {
        for (batch, name) in [
            (&lote.summary, &self.output.summary_table),
            (&lote.detail, &self.output.detail_table),
        ] {
            if !self.store.write_table(batch, name, WriteMode::Replace).await? {
                return Err(Error::Storage(format!("Failed to write table '{}'", name)));
            }
        }

        Ok(LoteWriteResult {
            reference_table: lote.reference_table.clone(),
            summary_table: self.output.summary_table.clone(),
            summary_rows: lote.summary.num_rows(),
            detail_table: self.output.detail_table.clone(),
            detail_rows: lote.detail.num_rows(),
        })
    }
}
