use crate::models::{Cycle, Timestamp};
use chrono::Duration;

/// Splits timestamps into cycles. The input is sorted first; a new cycle
/// starts wherever consecutive samples are strictly more than `gap` apart.
/// Equal timestamps never split. Ids are 1-based and chronological.
pub fn segment(timestamps: &[Timestamp], gap: Duration) -> Vec<Cycle> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let mut cycles: Vec<Cycle> = Vec::new();
    let mut start = 0usize;

    for i in 1..=sorted.len() {
        let boundary = i == sorted.len() || sorted[i] - sorted[i - 1] > gap;
        if !boundary {
            continue;
        }

        let (first, last) = (sorted[start], sorted[i - 1]);
        cycles.push(Cycle {
            cycle_id: cycles.len() as u32 + 1,
            start_time: first,
            end_time: last,
            sample_count: i - start,
            duration_minutes: (last - first).num_seconds() as f64 / 60.0,
        });
        start = i;
    }

    cycles
}
