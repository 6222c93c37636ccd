use super::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Outcome of preparing one table for comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCheck {
    pub table: String,
    pub status: CheckStatus,
    pub count: usize,
    pub time_range: Option<(Timestamp, Timestamp)>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMismatch {
    pub row_index: usize,
    pub reference_value: Timestamp,
    pub test_value: Timestamp,
    pub difference_seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub length_difference: Option<usize>,
    pub extra_rows_in_reference: Option<usize>,
    pub extra_rows_in_test: Option<usize>,
    pub mismatch_count: usize,
    pub mismatch_percentage: f64,
    pub avg_time_diff_seconds: Option<f64>,
    pub min_time_diff_seconds: Option<i64>,
    pub max_time_diff_seconds: Option<i64>,
}

/// Reference vs one other table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableComparison {
    pub matches: bool,
    pub reasons: Vec<String>,
    pub stats: ComparisonStats,
    pub mismatch_details: Vec<RowMismatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub all_matching: bool,
    pub tables_checked: Vec<TableCheck>,
    pub reference_table: Option<String>,
    pub reference_count: usize,
    pub reference_range: Option<(Timestamp, Timestamp)>,
    pub mismatch_reasons: Vec<String>,
    pub summary: BTreeMap<String, TableComparison>,
}
