use super::{parse, segment};
use crate::models::{AnalysisConfig, Cycle, TableResult};
use crate::utils::arrow::{has_column, string_column};
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use tracing::{debug, warn};

/// Segments one table into cycles. Never fails: a missing column, an empty
/// table or anything going wrong while parsing ends up in
/// `TableResult::error_message`.
pub fn analyze_table(table_name: &str, batch: &RecordBatch, config: &AnalysisConfig) -> TableResult {
    let column = &config.time_column;

    if !has_column(batch, column) {
        warn!(table = table_name, column = %column, "Time column not found");
        return TableResult::failure(table_name, Error::MissingColumn(column.clone()).to_string());
    }
    if batch.num_rows() == 0 {
        warn!(table = table_name, "Table is empty");
        return TableResult::failure(table_name, "Table is empty");
    }

    match detect_cycles(batch, config) {
        Ok(cycles) => {
            debug!(table = table_name, cycles = cycles.len(), "Cycles detected");
            TableResult::success(table_name, cycles)
        }
        Err(e) => {
            warn!(table = table_name, error = %e, "Table analysis failed");
            let message = match e {
                Error::Analysis(_) => e.to_string(),
                other => format!("Analysis error: {}", other),
            };
            TableResult::failure(table_name, message)
        }
    }
}

fn detect_cycles(batch: &RecordBatch, config: &AnalysisConfig) -> Result<Vec<Cycle>> {
    let values = string_column(batch, &config.time_column)?
        .ok_or_else(|| Error::MissingColumn(config.time_column.clone()))?;
    let timestamps = parse::parse_valid(&values);
    Ok(segment::segment(&timestamps, config.gap_threshold()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn text_batch(values: Vec<Option<&str>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("TimeString", DataType::Utf8, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values))]).unwrap()
    }

    #[test]
    fn segments_parsed_rows() {
        let batch = text_batch(vec![
            Some("15/01/2024 10:00:00"),
            Some("15/01/2024 10:10:00"),
            Some("garbage"),
            Some("15/01/2024 10:20:01"),
        ]);
        let result = analyze_table("T", &batch, &AnalysisConfig::default());

        assert!(!result.is_error());
        assert_eq!(result.total_cycles, 2);
        assert_eq!(result.cycles[0].sample_count, 2);
        assert_eq!(result.cycles[1].sample_count, 1);
    }

    #[test]
    fn wider_threshold_merges_cycles() {
        let batch = text_batch(vec![
            Some("15/01/2024 10:00:00"),
            Some("15/01/2024 10:25:00"),
        ]);
        let narrow = analyze_table("T", &batch, &AnalysisConfig::default());
        let wide = analyze_table("T", &batch, &AnalysisConfig::default().with_threshold_minutes(30));
        assert_eq!(narrow.total_cycles, 2);
        assert_eq!(wide.total_cycles, 1);
    }

    #[test]
    fn missing_column_is_reported() {
        let batch = text_batch(vec![Some("15/01/2024 10:00:00")]);
        let config = AnalysisConfig::default().with_time_column("Fecha");
        let result = analyze_table("T", &batch, &config);
        assert_eq!(result.error_message.as_deref(), Some("Column 'Fecha' not found"));
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn empty_table_is_reported() {
        let result = analyze_table("T", &text_batch(vec![]), &AnalysisConfig::default());
        assert_eq!(result.error_message.as_deref(), Some("Table is empty"));
    }

    #[test]
    fn unsupported_column_type_becomes_an_analysis_error() {
        let schema = Arc::new(Schema::new(vec![Field::new("TimeString", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        let result = analyze_table("T", &batch, &AnalysisConfig::default());
        let message = result.error_message.unwrap();
        assert!(message.starts_with("Analysis error: "), "{message}");
        assert_eq!(result.total_cycles, 0);
    }

    #[test]
    fn unparseable_rows_give_zero_cycles_not_an_error() {
        let batch = text_batch(vec![Some("x"), None]);
        let result = analyze_table("T", &batch, &AnalysisConfig::default());
        assert!(!result.is_error());
        assert_eq!(result.total_cycles, 0);
    }
}
