mod config;
mod cycle;
mod quality;
mod reconciliation;
mod recovery;

pub use config::AnalysisConfig;
pub use cycle::{Cycle, TableResult};
pub use quality::{InvalidExample, IssueKind, QualityReport};
pub use reconciliation::{
    CheckStatus, ComparisonStats, ReconciliationReport, RowMismatch, TableCheck, TableComparison,
};
pub use recovery::{RecoveryDetail, RecoveryReport, RecoveryStrategy, ResolvedStrategy};

/// Second-precision wall-clock time as stored in the source tables.
pub type Timestamp = chrono::NaiveDateTime;

/// Layout used for every human-readable timestamp the analyzer emits.
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
