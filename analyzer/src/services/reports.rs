use crate::models::{TableResult, Timestamp};
use crate::processor::parse;
use crate::utils::arrow::{append_column, drop_column, string_column, take_rows};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;

/// Payload column left out of the detailed mapping.
pub const VALUE_COLUMN: &str = "VarValue";
pub const CYCLE_ID_COLUMN: &str = "CycleID";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CycleSummaryRow {
    #[serde(rename = "CycleID")]
    pub cycle_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub total_time: String,
    pub samples_count: i64,
}

/// One row per cycle of `result`.
pub fn generate_cycle_summary(result: &TableResult) -> Result<Vec<CycleSummaryRow>> {
    if let Some(message) = &result.error_message {
        return Err(Error::InvalidInput(format!(
            "Table '{}' has an analysis error: {}",
            result.table_name, message
        )));
    }
    if result.cycles.is_empty() {
        return Err(Error::InvalidInput(format!(
            "No cycles detected in table '{}'",
            result.table_name
        )));
    }

    Ok(result
        .cycles
        .iter()
        .map(|cycle| CycleSummaryRow {
            cycle_id: i64::from(cycle.cycle_id),
            start_time: parse::format_timestamp(&cycle.start_time),
            end_time: parse::format_timestamp(&cycle.end_time),
            total_time: cycle.total_time(),
            samples_count: cycle.sample_count as i64,
        })
        .collect())
}

pub fn cycle_summary_schema() -> Schema {
    Schema::new(vec![
        Field::new(CYCLE_ID_COLUMN, DataType::Int64, false),
        Field::new("StartTime", DataType::Utf8, false),
        Field::new("EndTime", DataType::Utf8, false),
        Field::new("TotalTime", DataType::Utf8, false),
        Field::new("SamplesCount", DataType::Int64, false),
    ])
}

pub fn cycle_summary_batch(rows: &[CycleSummaryRow]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.cycle_id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.start_time.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.end_time.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.total_time.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.samples_count))),
    ];
    Ok(RecordBatch::try_new(Arc::new(cycle_summary_schema()), columns)?)
}

/// Every parseable row of `reference_data`, sorted by time, tagged with the
/// id of the cycle that contains it (0 when none does).
pub fn generate_detailed_mapping(
    result: &TableResult,
    reference_data: &RecordBatch,
    time_column: &str,
) -> Result<RecordBatch> {
    if let Some(message) = &result.error_message {
        return Err(Error::InvalidInput(format!(
            "Table '{}' has an analysis error: {}",
            result.table_name, message
        )));
    }

    let values = string_column(reference_data, time_column)?.ok_or_else(|| {
        Error::InvalidInput(format!(
            "Reference data for '{}' has no '{}' column",
            result.table_name, time_column
        ))
    })?;

    let mut rows: Vec<(usize, Timestamp)> = parse::parse_column(&values)
        .into_iter()
        .enumerate()
        .filter_map(|(i, ts)| ts.map(|ts| (i, ts)))
        .collect();
    rows.sort_by_key(|(_, ts)| *ts);

    let indices: Vec<usize> = rows.iter().map(|(i, _)| *i).collect();
    let cycle_ids = Int64Array::from_iter_values(
        rows.iter().map(|(_, ts)| i64::from(result.cycle_id_for(ts))),
    );

    let kept = take_rows(reference_data, &indices)?;
    let kept = drop_column(&kept, VALUE_COLUMN)?;
    append_column(
        &kept,
        Field::new(CYCLE_ID_COLUMN, DataType::Int64, false),
        Arc::new(cycle_ids),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cycle;
    use arrow::array::{Array, Float64Array};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn result() -> TableResult {
        TableResult::success(
            "Line1",
            vec![
                Cycle {
                    cycle_id: 1,
                    start_time: at(10, 0),
                    end_time: at(10, 2),
                    sample_count: 3,
                    duration_minutes: 2.0,
                },
                Cycle {
                    cycle_id: 2,
                    start_time: at(11, 0),
                    end_time: at(11, 0),
                    sample_count: 1,
                    duration_minutes: 0.0,
                },
            ],
        )
    }

    #[test]
    fn summary_rows_use_display_formats() {
        let rows = generate_cycle_summary(&result()).unwrap();
        assert_eq!(
            rows[0],
            CycleSummaryRow {
                cycle_id: 1,
                start_time: "15/01/2024 10:00:00".into(),
                end_time: "15/01/2024 10:02:00".into(),
                total_time: "00:02:00".into(),
                samples_count: 3,
            }
        );

        let batch = cycle_summary_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "CycleID");
        assert_eq!(batch.schema().field(3).name(), "TotalTime");
    }

    #[test]
    fn summary_rejects_failed_or_empty_results() {
        assert!(generate_cycle_summary(&TableResult::failure("T", "Table is empty")).is_err());
        assert!(generate_cycle_summary(&TableResult::success("T", vec![])).is_err());
    }

    #[test]
    fn summary_row_serializes_with_table_column_names() {
        let rows = generate_cycle_summary(&result()).unwrap();
        let json = serde_json::to_value(&rows[1]).unwrap();
        assert_eq!(json["CycleID"], 2);
        assert_eq!(json["SamplesCount"], 1);
        assert_eq!(json["TotalTime"], "00:00:00");
    }

    #[test]
    fn detailed_mapping_sorts_drops_and_tags() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("TimeString", DataType::Utf8, true),
            Field::new("VarName", DataType::Utf8, true),
            Field::new("VarValue", DataType::Float64, true),
        ]));
        let data = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    Some("15/01/2024 11:00:00"),
                    Some("bad"),
                    Some("15/01/2024 10:01:00"),
                    Some("15/01/2024 10:30:00"),
                ])),
                Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
                Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])),
            ],
        )
        .unwrap();

        let mapped = generate_detailed_mapping(&result(), &data, "TimeString").unwrap();

        assert_eq!(mapped.num_rows(), 3);
        assert!(mapped.column_by_name("VarValue").is_none());
        let names = mapped.column_by_name("VarName").unwrap();
        let names = names.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "c");
        assert_eq!(names.value(1), "d");
        assert_eq!(names.value(2), "a");

        let ids = mapped.column_by_name("CycleID").unwrap();
        let ids = ids.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 0, 2]);
        assert_eq!(ids.null_count(), 0);
    }

    #[test]
    fn detailed_mapping_requires_the_time_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("Other", DataType::Utf8, true)]));
        let data =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["x"]))]).unwrap();
        assert!(matches!(
            generate_detailed_mapping(&result(), &data, "TimeString"),
            Err(Error::InvalidInput(_))
        ));
    }
}
