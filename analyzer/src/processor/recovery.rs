//! Repair of malformed or missing timestamps.
//!
//! The engine never edits its input. It collects `index -> (value, confidence)`
//! overrides and renders a fresh column from the input plus those overrides.
//! Overflowed text (`25:00:00`, `31/04`) is corrected exactly before any
//! estimation runs; corrected cells then act as anchors like valid ones.

use super::parse;
use crate::models::{
    QualityReport, RecoveryDetail, RecoveryReport, RecoveryStrategy, ResolvedStrategy, Timestamp,
};
use chrono::Duration;
use common::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

const INTERPOLATE_CONFIDENCE: f64 = 0.85;
const BRACKETED_BASE_CONFIDENCE: f64 = 0.9;
const BRACKETED_GAP_PENALTY: f64 = 0.2;
const PATTERN_CONFIDENCE: f64 = 0.7;
const FIXED_INTERVAL_CONFIDENCE: f64 = 0.6;
const OVERFLOW_CONFIDENCE: f64 = 1.0;
const PATTERN_WINDOW: usize = 3;

/// Result of a successful recovery run.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Same length as the input. Parsed and recovered cells are rendered as
    /// `dd/mm/yyyy HH:MM:SS`; unrecovered cells keep their original value.
    pub repaired_column: Vec<Option<String>>,
    pub report: RecoveryReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Estimate {
    value: Timestamp,
    confidence: f64,
}

/// Known-good points ordered by row index.
struct Anchors {
    points: Vec<(usize, Timestamp)>,
    total_rows: usize,
}

impl Anchors {
    fn previous(&self, index: usize) -> Option<(usize, &[(usize, Timestamp)])> {
        let pos = self.points.partition_point(|(i, _)| *i < index);
        pos.checked_sub(1).map(|p| (p, &self.points[..=p]))
    }

    fn next(&self, index: usize) -> Option<(usize, Timestamp)> {
        let pos = self.points.partition_point(|(i, _)| *i <= index);
        self.points.get(pos).copied()
    }
}

type Estimator = fn(&Anchors, usize) -> Option<Estimate>;

fn estimator_for(strategy: ResolvedStrategy) -> Estimator {
    match strategy {
        ResolvedStrategy::Interpolate => estimate_interpolate,
        ResolvedStrategy::Reconstruct => estimate_reconstruct,
        ResolvedStrategy::Pattern => estimate_pattern,
    }
}

/// `None` when the result falls outside the representable date range.
fn shift(ts: Timestamp, millis: i64) -> Option<Timestamp> {
    ts.checked_add_signed(Duration::try_milliseconds(millis)?)
        .map(parse::truncate_to_second)
}

fn shift_minutes(ts: Timestamp, minutes: i64) -> Option<Timestamp> {
    ts.checked_add_signed(Duration::try_minutes(minutes)?)
}

/// Linear position between two anchors by row index.
fn between(prev: (usize, Timestamp), next: (usize, Timestamp), index: usize) -> Option<Timestamp> {
    let span_ms = i128::from((next.1 - prev.1).num_milliseconds());
    let offset = (index - prev.0) as i128;
    let width = (next.0 - prev.0) as i128;
    let millis = i64::try_from(span_ms.checked_mul(offset)? / width).ok()?;
    shift(prev.1, millis)
}

fn estimate_interpolate(anchors: &Anchors, index: usize) -> Option<Estimate> {
    let (p, _) = anchors.previous(index)?;
    let next = anchors.next(index)?;
    Some(Estimate {
        value: between(anchors.points[p], next, index)?,
        confidence: INTERPOLATE_CONFIDENCE,
    })
}

fn estimate_bracketed(anchors: &Anchors, index: usize, pattern: bool) -> Option<Estimate> {
    let prev = anchors.previous(index);
    let next = anchors.next(index);

    match (prev, next) {
        (Some((p, _)), Some(next)) => {
            let prev = anchors.points[p];
            let missing_in_gap = (next.0 - prev.0 - 1) as f64;
            Some(Estimate {
                value: between(prev, next, index)?,
                confidence: BRACKETED_BASE_CONFIDENCE
                    - BRACKETED_GAP_PENALTY * missing_in_gap / anchors.total_rows as f64,
            })
        }
        (Some((_, history)), None) => {
            let (prev_idx, prev_time) = history[history.len() - 1];
            let steps = (index - prev_idx) as i64;

            if pattern && history.len() > 1 {
                let window = &history[history.len().saturating_sub(PATTERN_WINDOW + 1)..];
                let per_row: Vec<i64> = window
                    .windows(2)
                    .map(|w| (w[1].1 - w[0].1).num_milliseconds() / (w[1].0 - w[0].0) as i64)
                    .collect();
                let avg = per_row.iter().sum::<i64>() / per_row.len() as i64;
                return Some(Estimate {
                    value: shift(prev_time, avg.checked_mul(steps)?)?,
                    confidence: PATTERN_CONFIDENCE,
                });
            }

            Some(Estimate {
                value: shift_minutes(prev_time, steps)?,
                confidence: FIXED_INTERVAL_CONFIDENCE,
            })
        }
        (None, Some((next_idx, next_time))) => {
            let steps = (next_idx - index) as i64;
            Some(Estimate {
                value: shift_minutes(next_time, -steps)?,
                confidence: FIXED_INTERVAL_CONFIDENCE,
            })
        }
        // Nothing to anchor to: treated as unrecoverable.
        (None, None) => None,
    }
}

fn estimate_reconstruct(anchors: &Anchors, index: usize) -> Option<Estimate> {
    estimate_bracketed(anchors, index, false)
}

fn estimate_pattern(anchors: &Anchors, index: usize) -> Option<Estimate> {
    estimate_bracketed(anchors, index, true)
}

/// Repairs a timestamp column.
///
/// Fails with [`Error::NoReferenceData`] when the column has no valid
/// timestamp, and with [`Error::InvalidInput`] for [`RecoveryStrategy::None`].
/// Estimates below `confidence_threshold` are discarded.
pub fn recover(
    column: &[Option<String>],
    quality: &QualityReport,
    strategy: RecoveryStrategy,
    confidence_threshold: f64,
) -> Result<RecoveryOutcome> {
    if quality.valid_count == 0 {
        return Err(Error::NoReferenceData);
    }

    let resolved = strategy
        .resolve(quality.data_loss_percentage)
        .ok_or_else(|| Error::InvalidInput("Recovery strategy 'none' recovers nothing".into()))?;

    let parsed = parse::parse_column(column);
    let mut overrides: BTreeMap<usize, Estimate> = BTreeMap::new();

    for (index, (raw, ts)) in column.iter().zip(&parsed).enumerate() {
        if ts.is_some() {
            continue;
        }
        if let Some((value, issue)) = raw.as_deref().and_then(parse::repair_overflow) {
            debug!(index, %issue, "Corrected overflowed timestamp");
            overrides.insert(
                index,
                Estimate {
                    value,
                    confidence: OVERFLOW_CONFIDENCE,
                },
            );
        }
    }

    let anchors = Anchors {
        points: parsed
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| ts.or_else(|| overrides.get(&i).map(|e| e.value)).map(|t| (i, t)))
            .collect(),
        total_rows: column.len(),
    };

    let estimate = estimator_for(resolved);
    for index in 0..column.len() {
        if parsed[index].is_some() || overrides.contains_key(&index) {
            continue;
        }
        if let Some(mut e) = estimate(&anchors, index) {
            e.confidence = e.confidence.clamp(0.0, 1.0);
            if e.confidence >= confidence_threshold {
                overrides.insert(index, e);
            }
        }
    }

    let repaired_column = column
        .iter()
        .zip(&parsed)
        .enumerate()
        .map(|(i, (raw, ts))| match (overrides.get(&i), ts) {
            (Some(e), _) => Some(parse::format_timestamp(&e.value)),
            (None, Some(ts)) => Some(parse::format_timestamp(ts)),
            (None, None) => raw.clone(),
        })
        .collect();

    let recovery_details: Vec<RecoveryDetail> = overrides
        .iter()
        .map(|(&index, e)| RecoveryDetail {
            index,
            original_value: column[index].clone(),
            recovered_value: parse::format_timestamp(&e.value),
            confidence: e.confidence,
        })
        .collect();

    let average_confidence = if recovery_details.is_empty() {
        0.0
    } else {
        recovery_details.iter().map(|d| d.confidence).sum::<f64>() / recovery_details.len() as f64
    };

    info!(
        strategy = %resolved,
        recovered = recovery_details.len(),
        missing = quality.invalid_count + quality.null_count,
        average_confidence,
        "Timestamp recovery finished"
    );

    Ok(RecoveryOutcome {
        repaired_column,
        report: RecoveryReport {
            strategy_used: resolved,
            total_recovered: recovery_details.len(),
            recovery_details,
            average_confidence,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn run(values: &[Option<&str>], strategy: RecoveryStrategy, threshold: f64) -> Result<RecoveryOutcome> {
        let col = column(values);
        let quality = QualityReport::analyze(&col, 100);
        recover(&col, &quality, strategy, threshold)
    }

    fn cell(outcome: &RecoveryOutcome, i: usize) -> Option<&str> {
        outcome.repaired_column[i].as_deref()
    }

    #[test]
    fn no_valid_anchor_is_an_explicit_failure() {
        let err = run(&[None, Some("junk")], RecoveryStrategy::Auto, 0.7).unwrap_err();
        assert!(matches!(err, Error::NoReferenceData));
    }

    #[test]
    fn none_strategy_is_rejected() {
        let err = run(&[Some("15/01/2024 10:00:00"), None], RecoveryStrategy::None, 0.7).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn clean_column_is_only_normalized() {
        let outcome = run(
            &[Some("2024-01-15 10:00:00.250"), Some("15/01/2024 10:01:00")],
            RecoveryStrategy::Auto,
            0.7,
        )
        .unwrap();
        assert_eq!(outcome.report.total_recovered, 0);
        assert_eq!(outcome.report.strategy_used, ResolvedStrategy::Interpolate);
        assert_eq!(cell(&outcome, 0), Some("15/01/2024 10:00:00"));
        assert_eq!(cell(&outcome, 1), Some("15/01/2024 10:01:00"));
    }

    #[test]
    fn interpolate_fills_interior_gaps_only() {
        let outcome = run(
            &[
                None,
                Some("15/01/2024 10:00:00"),
                None,
                Some("15/01/2024 10:04:00"),
                Some("bad"),
            ],
            RecoveryStrategy::Interpolate,
            0.7,
        )
        .unwrap();
        assert_eq!(outcome.report.total_recovered, 1);
        assert_eq!(cell(&outcome, 0), None);
        assert_eq!(cell(&outcome, 2), Some("15/01/2024 10:02:00"));
        assert_eq!(cell(&outcome, 4), Some("bad"));
        assert!((outcome.report.average_confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn reconstruct_confidence_drops_with_gap_size() {
        let outcome = run(
            &[
                Some("15/01/2024 10:00:00"),
                None,
                None,
                Some("15/01/2024 10:03:00"),
            ],
            RecoveryStrategy::Reconstruct,
            0.7,
        )
        .unwrap();
        assert_eq!(cell(&outcome, 1), Some("15/01/2024 10:01:00"));
        assert_eq!(cell(&outcome, 2), Some("15/01/2024 10:02:00"));
        let confidence = outcome.report.recovery_details[0].confidence;
        assert!((confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn estimates_below_threshold_are_not_applied() {
        let mut values = vec![Some("15/01/2024 10:00:00")];
        values.extend(vec![None; 8]);
        values.push(Some("15/01/2024 10:09:00"));

        // 0.9 - 0.2 * 8 / 10 = 0.74
        let gated = run(&values, RecoveryStrategy::Reconstruct, 0.75).unwrap();
        assert_eq!(gated.report.total_recovered, 0);
        assert!(gated.repaired_column[1..9].iter().all(Option::is_none));

        let accepted = run(&values, RecoveryStrategy::Reconstruct, 0.7).unwrap();
        assert_eq!(accepted.report.total_recovered, 8);
        assert_eq!(cell(&accepted, 5), Some("15/01/2024 10:05:00"));
    }

    #[test]
    fn pattern_extrapolates_with_recent_average_interval() {
        let values = [
            Some("15/01/2024 10:00:00"),
            Some("15/01/2024 10:02:00"),
            Some("15/01/2024 10:04:00"),
            None,
            Some("lost"),
        ];
        let outcome = run(&values, RecoveryStrategy::Pattern, 0.7).unwrap();
        assert_eq!(cell(&outcome, 3), Some("15/01/2024 10:06:00"));
        assert_eq!(cell(&outcome, 4), Some("15/01/2024 10:08:00"));
        assert!((outcome.report.average_confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn reconstruct_extrapolates_one_minute_steps_at_lower_confidence() {
        let values = [
            None,
            Some("15/01/2024 10:00:00"),
            Some("15/01/2024 10:02:00"),
            None,
        ];
        let strict = run(&values, RecoveryStrategy::Reconstruct, 0.7).unwrap();
        assert_eq!(strict.report.total_recovered, 0);

        let lenient = run(&values, RecoveryStrategy::Reconstruct, 0.5).unwrap();
        assert_eq!(cell(&lenient, 0), Some("15/01/2024 09:59:00"));
        assert_eq!(cell(&lenient, 3), Some("15/01/2024 10:03:00"));
        assert!((lenient.report.average_confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn overflow_is_corrected_exactly_and_anchors_interpolation() {
        let outcome = run(
            &[
                Some("15/01/2024 23:58:00"),
                Some("15/01/2024 24:00:00"),
                None,
                Some("16/01/2024 00:04:00"),
            ],
            RecoveryStrategy::Interpolate,
            0.9,
        )
        .unwrap();
        assert_eq!(cell(&outcome, 1), Some("16/01/2024 00:00:00"));
        // interpolation confidence 0.85 is below the 0.9 threshold
        assert_eq!(cell(&outcome, 2), None);
        assert_eq!(outcome.report.recovery_details.len(), 1);
        assert_eq!(outcome.report.recovery_details[0].confidence, 1.0);
    }

    #[test]
    fn auto_picks_pattern_for_heavy_loss() {
        let outcome = run(
            &[Some("15/01/2024 10:00:00"), None, None],
            RecoveryStrategy::Auto,
            0.7,
        )
        .unwrap();
        assert_eq!(outcome.report.strategy_used, ResolvedStrategy::Pattern);
    }

    #[test]
    fn extrapolation_past_the_calendar_is_left_unrecovered() {
        let mut values = vec![Some("01/01/2000 00:00:00"), Some("01/01/9999 00:00:00")];
        values.extend(vec![None; 40]);

        let outcome = run(&values, RecoveryStrategy::Auto, 0.0).unwrap();

        assert_eq!(outcome.report.strategy_used, ResolvedStrategy::Pattern);
        assert_eq!(outcome.repaired_column.len(), 42);
        assert_eq!(cell(&outcome, 1), Some("01/01/9999 00:00:00"));
        assert!(outcome.repaired_column[2..].iter().all(Option::is_none));
        assert_eq!(outcome.report.total_recovered, 0);
    }

    #[test]
    fn shifts_outside_the_calendar_yield_nothing() {
        let max = Timestamp::MAX;
        let min = Timestamp::MIN;

        assert_eq!(shift_minutes(max, 1), None);
        assert_eq!(shift_minutes(min, -1), None);
        assert_eq!(shift(max, i64::MAX), None);
        assert!(between((0, min), (2, max), 1).is_some());

        let anchors = Anchors {
            points: vec![(3, min)],
            total_rows: 4,
        };
        assert_eq!(estimate_reconstruct(&anchors, 0), None);
    }
}
