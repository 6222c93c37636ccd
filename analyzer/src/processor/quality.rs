// quality.rs
use super::parse;
use crate::models::{InvalidExample, IssueKind, QualityReport, Timestamp};
use std::collections::BTreeMap;
use tracing::debug;

impl QualityReport {
    /// Classifies every cell of a timestamp column as valid, null or invalid.
    /// At most `max_examples` offending cells are kept as examples; the
    /// counters always cover the whole column.
    pub fn analyze(column: &[Option<String>], max_examples: usize) -> Self {
        let mut valid_count = 0usize;
        let mut invalid_count = 0usize;
        let mut null_count = 0usize;
        let mut invalid_examples = Vec::new();
        let mut common_issues: BTreeMap<IssueKind, usize> = BTreeMap::new();
        let mut min_valid = None;
        let mut max_valid = None;

        for (index, value) in column.iter().enumerate() {
            let text = value
                .as_deref()
                .filter(|t| !parse::is_null_like(Some(*t)));

            let issue = match text {
                None => {
                    null_count += 1;
                    IssueKind::NullValue
                }
                Some(text) => match parse::parse(text) {
                    Some(ts) => {
                        valid_count += 1;
                        min_valid = Some(min_valid.map_or(ts, |m: Timestamp| m.min(ts)));
                        max_valid = Some(max_valid.map_or(ts, |m: Timestamp| m.max(ts)));
                        continue;
                    }
                    None => {
                        invalid_count += 1;
                        parse::classify_failure(text)
                    }
                },
            };

            *common_issues.entry(issue).or_insert(0) += 1;
            if invalid_examples.len() < max_examples {
                invalid_examples.push(InvalidExample {
                    index,
                    value: value.clone(),
                    issue,
                });
            }
        }

        let total_rows = column.len();

        let mut report = Self {
            total_rows,
            valid_count,
            invalid_count,
            null_count,
            invalid_examples,
            date_range_valid: min_valid.zip(max_valid),
            common_issues,
            data_loss_percentage: 0.0,
        };
        report.data_loss_percentage = report.percentage_of(invalid_count + null_count);

        debug!(
            total_rows,
            valid_count,
            invalid_count,
            null_count,
            data_loss_percentage = report.data_loss_percentage,
            "Analyzed timestamp quality"
        );
        report
    }
}
