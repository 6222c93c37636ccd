use chrono::{Duration, NaiveDate};
use cycle_analyzer::models::{QualityReport, RecoveryStrategy, Timestamp};
use cycle_analyzer::processor::{parse, recover, segment};
use proptest::prelude::*;

fn base() -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
}

proptest! {
    #[test]
    fn display_format_round_trips(seconds in 0i64..400_000_000) {
        let ts = base() + Duration::seconds(seconds);
        prop_assert_eq!(parse::parse(&parse::format_timestamp(&ts)), Some(ts));
    }

    #[test]
    fn interpolation_keeps_valid_cells_and_fills_bracketed_gaps(
        steps in prop::collection::vec(1i64..600, 3..60),
        holes in prop::collection::vec(any::<bool>(), 3..60),
    ) {
        let mut ts = base();
        let mut column = Vec::with_capacity(steps.len());
        let mut originals = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            ts += Duration::seconds(*step);
            originals.push(ts);
            let interior = i > 0 && i + 1 < steps.len();
            let hole = interior && holes.get(i).copied().unwrap_or(false);
            column.push(if hole { None } else { Some(parse::format_timestamp(&ts)) });
        }

        let quality = QualityReport::analyze(&column, 10);
        let outcome = recover(&column, &quality, RecoveryStrategy::Interpolate, 0.0).unwrap();

        prop_assert_eq!(outcome.repaired_column.len(), column.len());
        let repaired = parse::parse_column(&outcome.repaired_column);
        for (i, value) in repaired.iter().enumerate() {
            prop_assert!(value.is_some());
            if column[i].is_some() {
                prop_assert_eq!(*value, Some(originals[i]));
            }
        }
        prop_assert_eq!(outcome.report.total_recovered, quality.null_count);

        // Every filled cell lies between its nearest valid neighbours.
        for window in repaired.windows(2) {
            prop_assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn segment_splits_only_on_gaps_above_threshold(
        offsets in prop::collection::vec(0i64..5_000, 1..100),
        threshold in 1i64..120,
    ) {
        let times: Vec<Timestamp> = offsets.iter().map(|m| base() + Duration::minutes(*m)).collect();
        let cycles = segment(&times, Duration::minutes(threshold));

        let mut sorted = times.clone();
        sorted.sort();
        let splits = sorted
            .windows(2)
            .filter(|w| w[1] - w[0] > Duration::minutes(threshold))
            .count();
        prop_assert_eq!(cycles.len(), splits + 1);
        prop_assert_eq!(cycles[0].start_time, sorted[0]);
        prop_assert_eq!(cycles[cycles.len() - 1].end_time, sorted[sorted.len() - 1]);
    }
}
