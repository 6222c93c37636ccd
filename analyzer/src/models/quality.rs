use super::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a cell did not yield a usable timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NullValue,
    WrongFormat,
    TimeOverflow,
    DateOverflow,
    Unparseable,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullValue => "null_value",
            Self::WrongFormat => "wrong_format",
            Self::TimeOverflow => "time_overflow",
            Self::DateOverflow => "date_overflow",
            Self::Unparseable => "unparseable",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidExample {
    pub index: usize,
    pub value: Option<String>,
    pub issue: IssueKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub null_count: usize,
    pub invalid_examples: Vec<InvalidExample>,
    pub date_range_valid: Option<(Timestamp, Timestamp)>,
    pub common_issues: BTreeMap<IssueKind, usize>,
    pub data_loss_percentage: f64,
}

impl QualityReport {
    pub fn needs_recovery(&self) -> bool {
        self.invalid_count + self.null_count > 0
    }

    pub fn percentage_of(&self, count: usize) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            count as f64 / self.total_rows as f64 * 100.0
        }
    }
}
