use super::Timestamp;
use serde::{Deserialize, Serialize};

/// A maximal run of samples with no internal gap above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: u32,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub sample_count: usize,
    pub duration_minutes: f64,
}

impl Cycle {
    /// Inclusive on both ends.
    pub fn contains(&self, ts: &Timestamp) -> bool {
        *ts >= self.start_time && *ts <= self.end_time
    }

    /// `HH:MM:SS` of the whole seconds covered; hours do not wrap at 24.
    pub fn total_time(&self) -> String {
        let total_seconds = (self.end_time - self.start_time).num_seconds();
        let (hours, remainder) = (total_seconds / 3600, total_seconds % 3600);
        let (minutes, seconds) = (remainder / 60, remainder % 60);
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub table_name: String,
    pub cycles: Vec<Cycle>,
    pub total_cycles: usize,
    pub time_matched: bool,
    pub error_message: Option<String>,
}

impl TableResult {
    pub fn success(table_name: &str, cycles: Vec<Cycle>) -> Self {
        Self {
            table_name: table_name.to_string(),
            total_cycles: cycles.len(),
            cycles,
            time_matched: false,
            error_message: None,
        }
    }

    pub fn failure(table_name: &str, message: impl Into<String>) -> Self {
        Self {
            table_name: table_name.to_string(),
            cycles: Vec::new(),
            total_cycles: 0,
            time_matched: false,
            error_message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Id of the cycle whose inclusive interval holds `ts`, 0 when none does.
    pub fn cycle_id_for(&self, ts: &Timestamp) -> u32 {
        let idx = self.cycles.partition_point(|c| c.start_time <= *ts);
        match idx.checked_sub(1).map(|i| &self.cycles[i]) {
            Some(cycle) if cycle.contains(ts) => cycle.cycle_id,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn cycle(id: u32, start: Timestamp, end: Timestamp) -> Cycle {
        Cycle {
            cycle_id: id,
            start_time: start,
            end_time: end,
            sample_count: 2,
            duration_minutes: (end - start).num_seconds() as f64 / 60.0,
        }
    }

    #[test]
    fn total_time_keeps_hours_past_a_day() {
        let start = at(0, 0, 0);
        let c = cycle(1, start, start + chrono::Duration::seconds(26 * 3600 + 5 * 60 + 30));
        assert_eq!(c.total_time(), "26:05:30");
    }

    #[test]
    fn total_time_counts_exact_seconds() {
        let c = cycle(1, at(10, 0, 0), at(10, 2, 3));
        assert_eq!(c.total_time(), "00:02:03");
    }

    #[test]
    fn cycle_lookup_is_inclusive_and_zero_outside() {
        let result = TableResult::success(
            "T",
            vec![
                cycle(1, at(10, 0, 0), at(10, 5, 0)),
                cycle(2, at(11, 0, 0), at(11, 30, 0)),
            ],
        );
        assert_eq!(result.cycle_id_for(&at(10, 0, 0)), 1);
        assert_eq!(result.cycle_id_for(&at(10, 5, 0)), 1);
        assert_eq!(result.cycle_id_for(&at(10, 30, 0)), 0);
        assert_eq!(result.cycle_id_for(&at(11, 30, 0)), 2);
        assert_eq!(result.cycle_id_for(&at(9, 59, 59)), 0);
    }
}
