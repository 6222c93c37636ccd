//! Builds the `FactSamples` table: every sample of every source table in
//! one long table, tagged with the cycle it belongs to.

use crate::utils::retry::retry_with_backoff;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray, TimestampSecondArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use common::config::Settings;
use common::{Error, Result};
use cycle_analyzer::models::Timestamp;
use cycle_analyzer::processor::parse;
use cycle_analyzer::services::analysis::EXCLUDED_TABLES;
use cycle_analyzer::storage::{TableStore, WriteMode};
use cycle_analyzer::utils::arrow::string_column;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Value columns in order of preference.
pub const VALUE_COLUMNS: &[&str] = &["VarValue", "Value", "VALOR", "Medicion"];

const SAVE_RETRIES: u32 = 3;
const SAVE_BASE_DELAY_MS: u64 = 500;

pub fn fact_samples_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("TimeString", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("VariableName", DataType::Utf8, false),
        Field::new("Value", DataType::Float64, true),
        Field::new("CycleID", DataType::Int64, true),
        Field::new("MachineName", DataType::Utf8, false),
    ]))
}

#[derive(Debug, Clone, Copy)]
struct CycleWindow {
    cycle_id: i64,
    start: Timestamp,
    end: Timestamp,
}

/// Cycle ids by exact sample time, with cycle windows as a fallback.
#[derive(Debug, Default)]
pub struct CycleAssignments {
    exact: HashMap<Timestamp, i64>,
    windows: Vec<CycleWindow>,
}

fn cycle_ids(batch: &RecordBatch, column: &str) -> Result<Option<Vec<Option<i64>>>> {
    let Some(array) = batch.column_by_name(column) else {
        return Ok(None);
    };
    let ids = cast(array, &DataType::Int64)?;
    Ok(Some(ids.as_primitive::<Int64Type>().iter().collect()))
}

fn parsed_column(batch: &RecordBatch, column: &str) -> Result<Option<Vec<Option<Timestamp>>>> {
    Ok(string_column(batch, column)?.map(|values| parse::parse_column(&values)))
}

impl CycleAssignments {
    /// Builds the lookup from LOTE_DATA (`detail`) and LOTE_SUMMARY
    /// (`summary`). Rows with an unparseable time or id are skipped.
    pub fn from_tables(
        detail: Option<&RecordBatch>,
        summary: Option<&RecordBatch>,
        time_column: &str,
    ) -> Result<Self> {
        let mut assignments = Self::default();

        if let Some(detail) = detail {
            if let (Some(times), Some(ids)) = (parsed_column(detail, time_column)?, cycle_ids(detail, "CycleID")?) {
                for (ts, id) in times.into_iter().zip(ids) {
                    if let (Some(ts), Some(id)) = (ts, id) {
                        assignments.exact.entry(ts).or_insert(id);
                    }
                }
            } else {
                warn!("Cycle detail table lacks time or CycleID column");
            }
        }

        if let Some(summary) = summary {
            match (
                cycle_ids(summary, "CycleID")?,
                parsed_column(summary, "StartTime")?,
                parsed_column(summary, "EndTime")?,
            ) {
                (Some(ids), Some(starts), Some(ends)) => {
                    assignments.windows = ids
                        .into_iter()
                        .zip(starts)
                        .zip(ends)
                        .filter_map(|((id, start), end)| {
                            Some(CycleWindow {
                                cycle_id: id?,
                                start: start?,
                                end: end?,
                            })
                        })
                        .collect();
                    assignments.windows.sort_by_key(|w| w.start);
                }
                _ => warn!("Cycle summary table lacks CycleID, StartTime or EndTime"),
            }
        }

        Ok(assignments)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.windows.is_empty()
    }

    /// Exact match first, then the latest window starting at or before `ts`
    /// as long as `ts` is not past its end.
    pub fn cycle_for(&self, ts: &Timestamp) -> Option<i64> {
        self.exact.get(ts).copied().or_else(|| {
            let pos = self.windows.partition_point(|w| w.start <= *ts);
            pos.checked_sub(1)
                .map(|i| self.windows[i])
                .filter(|w| *ts <= w.end)
                .map(|w| w.cycle_id)
        })
    }
}

pub struct FactSamplesEtl {
    store: Arc<dyn TableStore>,
    source_tables: Option<Vec<String>>,
    time_column: String,
    detail_table: String,
    summary_table: String,
    fact_table: String,
    cycles: CycleAssignments,
}

impl FactSamplesEtl {
    pub fn new(store: Arc<dyn TableStore>, source_tables: Option<Vec<String>>) -> Self {
        Self::with_settings(store, source_tables, &Settings::default())
    }

    pub fn with_settings(
        store: Arc<dyn TableStore>,
        source_tables: Option<Vec<String>>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            source_tables,
            time_column: settings.analysis.time_column.clone(),
            detail_table: settings.output.detail_table.clone(),
            summary_table: settings.output.summary_table.clone(),
            fact_table: settings.output.fact_table.clone(),
            cycles: CycleAssignments::default(),
        }
    }

    pub fn cycles(&self) -> &CycleAssignments {
        &self.cycles
    }

    /// Explicit source tables, or every table with the time column apart
    /// from the fact, event and LOTE tables.
    pub async fn source_tables(&self) -> Result<Vec<String>> {
        if let Some(tables) = &self.source_tables {
            return Ok(tables.clone());
        }

        let names = self.store.list_tables_with_column(&self.time_column).await?;
        Ok(names
            .into_iter()
            .filter(|n| {
                !EXCLUDED_TABLES.contains(&n.as_str())
                    && *n != self.detail_table
                    && *n != self.summary_table
                    && *n != self.fact_table
            })
            .collect())
    }

    async fn read_optional(&self, name: &str) -> Option<RecordBatch> {
        match self.store.read_table(name).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(table = name, error = %e, "Could not read cycle table");
                None
            }
        }
    }

    /// Loads cycle assignments from the LOTE tables. Missing tables give an
    /// empty lookup, so every CycleID ends up null.
    pub async fn load_cycles(&mut self) -> Result<()> {
        let detail = self.read_optional(&self.detail_table).await;
        let summary = self.read_optional(&self.summary_table).await;

        self.cycles = CycleAssignments::from_tables(detail.as_ref(), summary.as_ref(), &self.time_column)?;
        info!(
            exact = self.cycles.exact.len(),
            windows = self.cycles.windows.len(),
            "Loaded cycle assignments"
        );
        Ok(())
    }

    /// One source table in fact layout; `None` when the table is missing or
    /// has no time or value column.
    pub async fn process_table(&self, table_name: &str) -> Result<Option<RecordBatch>> {
        let Some(batch) = self.store.read_table(table_name).await? else {
            warn!(table = table_name, "Source table not found");
            return Ok(None);
        };

        let Some(times) = parsed_column(&batch, &self.time_column)? else {
            warn!(table = table_name, column = %self.time_column, "Time column missing");
            return Ok(None);
        };

        let Some(value_column) = VALUE_COLUMNS.iter().find_map(|c| batch.column_by_name(c)) else {
            warn!(table = table_name, "No value column found, skipping");
            return Ok(None);
        };
        let values = cast(value_column, &DataType::Float64)?;
        let values = values.as_primitive::<Float64Type>();

        let rows: Vec<(usize, Timestamp)> = times
            .into_iter()
            .enumerate()
            .filter_map(|(i, ts)| ts.map(|ts| (i, ts)))
            .collect();

        let time_array = TimestampSecondArray::from_iter_values(
            rows.iter().map(|(_, ts)| parse::truncate_to_second(*ts).and_utc().timestamp()),
        );
        let value_array: Float64Array = rows
            .iter()
            .map(|(i, _)| if values.is_null(*i) { None } else { Some(values.value(*i)) })
            .collect();
        let cycle_array: Int64Array = rows.iter().map(|(_, ts)| self.cycles.cycle_for(ts)).collect();
        let names = StringArray::from_iter_values(rows.iter().map(|_| table_name));

        let columns: Vec<ArrayRef> = vec![
            Arc::new(time_array),
            Arc::new(names.clone()),
            Arc::new(value_array),
            Arc::new(cycle_array),
            Arc::new(names),
        ];
        let processed = RecordBatch::try_new(fact_samples_schema(), columns)?;

        debug!(
            table = table_name,
            rows = processed.num_rows(),
            dropped = batch.num_rows() - processed.num_rows(),
            "Processed source table"
        );
        Ok(Some(processed))
    }

    /// Every source table concatenated; tables that fail are logged and
    /// left out. `None` when nothing was produced.
    pub async fn process_all_tables(&self) -> Result<Option<RecordBatch>> {
        let mut batches = Vec::new();

        for table in self.source_tables().await? {
            match self.process_table(&table).await {
                Ok(Some(batch)) => batches.push(batch),
                Ok(None) => {}
                Err(e) => error!(table = %table, error = %e, "Failed to process table"),
            }
        }

        let combined = concat_batches(&fact_samples_schema(), &batches)?;
        if combined.num_rows() == 0 {
            return Ok(None);
        }
        Ok(Some(combined))
    }

    /// Replaces the fact table, retrying transient store failures.
    pub async fn save(&self, batch: &RecordBatch) -> Result<()> {
        let store = &self.store;
        let name = self.fact_table.as_str();

        retry_with_backoff(SAVE_RETRIES, SAVE_BASE_DELAY_MS, || async move {
            if store.write_table(batch, name, WriteMode::Replace).await? {
                Ok(())
            } else {
                Err(Error::Storage(format!("Store refused to write '{}'", name)))
            }
        })
        .await?;

        info!(table = name, rows = batch.num_rows(), "Saved fact samples");
        Ok(())
    }

    /// Full run. `false` when nothing was processed or saving failed.
    pub async fn run(&mut self) -> bool {
        if let Err(e) = self.load_cycles().await {
            warn!(error = %e, "Continuing without cycle assignments");
            self.cycles = CycleAssignments::default();
        }

        let batch = match self.process_all_tables().await {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                warn!("No data processed");
                return false;
            }
            Err(e) => {
                error!(error = %e, "Processing source tables failed");
                return false;
            }
        };

        match self.save(&batch).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Saving fact samples failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn summary() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("CycleID", DataType::Int64, false),
            Field::new("StartTime", DataType::Utf8, false),
            Field::new("EndTime", DataType::Utf8, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![2, 1])),
                Arc::new(StringArray::from(vec!["15/01/2024 11:00:00", "15/01/2024 10:00:00"])),
                Arc::new(StringArray::from(vec!["15/01/2024 11:30:00", "15/01/2024 10:05:00"])),
            ],
        )
        .unwrap()
    }

    fn detail() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("TimeString", DataType::Utf8, true),
            Field::new("CycleID", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["15/01/2024 10:07:00"])),
                Arc::new(Int64Array::from(vec![9])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn exact_match_wins_over_windows() {
        let cycles = CycleAssignments::from_tables(Some(&detail()), Some(&summary()), "TimeString").unwrap();
        assert_eq!(cycles.cycle_for(&at(10, 7)), Some(9));
    }

    #[test]
    fn window_lookup_is_bounded_by_end_time() {
        let cycles = CycleAssignments::from_tables(None, Some(&summary()), "TimeString").unwrap();
        assert_eq!(cycles.cycle_for(&at(10, 0)), Some(1));
        assert_eq!(cycles.cycle_for(&at(10, 5)), Some(1));
        assert_eq!(cycles.cycle_for(&at(10, 6)), None);
        assert_eq!(cycles.cycle_for(&at(11, 15)), Some(2));
        assert_eq!(cycles.cycle_for(&at(9, 59)), None);
    }

    #[test]
    fn tables_without_expected_columns_give_no_assignments() {
        let cycles = CycleAssignments::from_tables(Some(&summary()), Some(&detail()), "TimeString").unwrap();
        assert!(cycles.is_empty());
    }
}
