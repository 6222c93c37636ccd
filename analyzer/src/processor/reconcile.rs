//! Cross-table check that several tables carry the same time sequence.

use super::parse;
use crate::models::{
    CheckStatus, ComparisonStats, ReconciliationReport, RowMismatch, TableCheck, TableComparison,
    Timestamp,
};
use tracing::{info, warn};

/// Tolerance under which mismatches are called out as near-misses.
const NEAR_MISS_SECONDS: i64 = 1;

fn range_of(series: &[Timestamp]) -> Option<(Timestamp, Timestamp)> {
    let min = series.iter().min()?;
    let max = series.iter().max()?;
    Some((*min, *max))
}

/// Compares `tables` (name, time column or `None` when the table lacks it)
/// against the table with the most valid timestamps. Ties go to the table
/// seen first. Never fails; every problem lands in the report.
pub fn reconcile<'a, I>(tables: I, time_column: &str) -> ReconciliationReport
where
    I: IntoIterator<Item = (&'a str, Option<&'a [Option<String>]>)>,
{
    let mut report = ReconciliationReport::default();
    let mut parsed: Vec<(&str, Vec<Timestamp>)> = Vec::new();
    let mut seen = 0usize;

    for (name, column) in tables {
        seen += 1;
        let reason = match column {
            None => Some(format!("Table '{}' missing '{}' column", name, time_column)),
            Some(values) => {
                // Row order is kept as stored.
                let series = parse::parse_valid(values);
                if series.is_empty() {
                    Some(format!("Table '{}' has no valid timestamps after parsing", name))
                } else {
                    report.tables_checked.push(TableCheck {
                        table: name.to_string(),
                        status: CheckStatus::Ok,
                        count: series.len(),
                        time_range: range_of(&series),
                        reason: None,
                    });
                    parsed.push((name, series));
                    None
                }
            }
        };

        if let Some(reason) = reason {
            warn!(table = name, %reason, "Table excluded from time matching");
            report.tables_checked.push(TableCheck {
                table: name.to_string(),
                status: CheckStatus::Error,
                count: 0,
                time_range: None,
                reason: Some(reason.clone()),
            });
            report.mismatch_reasons.push(reason);
        }
    }

    if seen == 0 {
        report.mismatch_reasons.push("No tables provided".to_string());
        return report;
    }
    if parsed.len() < 2 {
        report
            .mismatch_reasons
            .push("Need at least 2 valid tables for comparison".to_string());
        return report;
    }

    let reference_pos = parsed
        .iter()
        .enumerate()
        .fold(0, |best, (i, (_, s))| if s.len() > parsed[best].1.len() { i } else { best });
    let (reference_name, reference) = &parsed[reference_pos];

    report.reference_table = Some(reference_name.to_string());
    report.reference_count = reference.len();
    report.reference_range = range_of(reference);
    report.all_matching = true;

    for (name, series) in parsed.iter().filter(|(n, _)| n != reference_name) {
        let comparison = compare_series(reference, series, reference_name, name);
        if !comparison.matches {
            report.all_matching = false;
            report.mismatch_reasons.extend(comparison.reasons.iter().cloned());
        }
        report.summary.insert(name.to_string(), comparison);
    }

    info!(
        reference = %reference_name,
        tables = parsed.len(),
        all_matching = report.all_matching,
        "Time sequence reconciliation finished"
    );

    report
}

/// Row-by-row comparison of two parsed series.
pub fn compare_series(
    reference: &[Timestamp],
    test: &[Timestamp],
    reference_name: &str,
    test_name: &str,
) -> TableComparison {
    let mut reasons = Vec::new();
    let mut stats = ComparisonStats::default();
    let compared = reference.len().min(test.len());

    if reference.len() != test.len() {
        reasons.push(format!(
            "Different row counts: {}({}) vs {}({})",
            reference_name,
            reference.len(),
            test_name,
            test.len()
        ));
        stats.length_difference = Some(reference.len().abs_diff(test.len()));
    }

    let mismatch_details: Vec<RowMismatch> = reference
        .iter()
        .zip(test)
        .enumerate()
        .filter(|(_, (r, t))| r != t)
        .map(|(row_index, (r, t))| RowMismatch {
            row_index,
            reference_value: *r,
            test_value: *t,
            difference_seconds: (*r - *t).num_seconds().abs(),
        })
        .collect();

    if reference.len() > test.len() {
        let extra = reference.len() - test.len();
        reasons.push(format!("{} has {} extra rows at the end", reference_name, extra));
        stats.extra_rows_in_reference = Some(extra);
    } else if test.len() > reference.len() {
        let extra = test.len() - reference.len();
        reasons.push(format!("{} has {} extra rows at the end", test_name, extra));
        stats.extra_rows_in_test = Some(extra);
    }

    if !mismatch_details.is_empty() {
        let diffs: Vec<i64> = mismatch_details.iter().map(|m| m.difference_seconds).collect();
        let avg = diffs.iter().sum::<i64>() as f64 / diffs.len() as f64;
        let max = diffs.iter().copied().max().unwrap_or_default();

        stats.mismatch_count = diffs.len();
        stats.mismatch_percentage = diffs.len() as f64 / compared as f64 * 100.0;
        stats.avg_time_diff_seconds = Some(avg);
        stats.min_time_diff_seconds = diffs.iter().copied().min();
        stats.max_time_diff_seconds = Some(max);

        reasons.push(format!("{} rows have timestamp mismatches", diffs.len()));
        reasons.push(format!("Average time difference: {:.6} seconds", avg));
        reasons.push(format!("Maximum time difference: {:.6} seconds", max as f64));
        if max <= NEAR_MISS_SECONDS {
            reasons.push("All differences are within 1 second tolerance".to_string());
        }
    }

    TableComparison {
        matches: reference.len() == test.len() && mismatch_details.is_empty(),
        reasons,
        stats,
        mismatch_details,
    }
}
