//! The analysis engine. Everything here is synchronous and works on plain
//! in-memory columns; loading and persisting tables is the caller's job.

pub mod parse;
mod quality;
pub mod reconcile;
pub mod recovery;
pub mod segment;
mod table;

pub use reconcile::{compare_series, reconcile};
pub use recovery::{recover, RecoveryOutcome};
pub use segment::segment;
pub use table::analyze_table;
