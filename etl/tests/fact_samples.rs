use arrow::array::{Array, AsArray, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, TimestampSecondType};
use arrow::record_batch::RecordBatch;
use common::config::Settings;
use cycle_analyzer::services::AnalysisService;
use cycle_analyzer::storage::{MemoryTableStore, TableStore};
use etl::fact_samples::FactSamplesEtl;
use std::sync::Arc;

fn sensor(values_column: &str, times: &[&str], values: &[Option<&str>]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("TimeString", DataType::Utf8, true),
        Field::new(values_column, DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(times.to_vec())),
            Arc::new(StringArray::from(values.to_vec())),
        ],
    )
    .unwrap()
}

const TIMES: [&str; 4] = [
    "15/01/2024 10:00:00",
    "15/01/2024 10:01:00",
    "15/01/2024 11:00:00",
    "15/01/2024 11:02:00",
];

#[tokio::test]
async fn fact_table_carries_cycle_ids_from_lote_tables() {
    let store = Arc::new(MemoryTableStore::new());
    store.insert(
        "Temperature",
        sensor("VarValue", &TIMES, &[Some("20.5"), Some("21"), None, Some("n/a")]),
    );
    store.insert(
        "Pressure",
        sensor("Value", &TIMES[..3], &[Some("1.0"), Some("1.1"), Some("1.2")]),
    );

    let service = AnalysisService::new(store.clone(), &Settings::default()).unwrap();
    let outcome = service.run_analysis(Some(vec!["Temperature".into()]), None).await.unwrap();
    let lote = service.lote_tables(&outcome, "Temperature").unwrap();
    service.persist_lote_tables(&lote).await.unwrap();

    let mut etl = FactSamplesEtl::new(store.clone(), None);
    assert!(etl.run().await);

    let facts = store.read_table("FactSamples").await.unwrap().unwrap();
    assert_eq!(facts.num_rows(), 7);

    let names = facts.column_by_name("MachineName").unwrap().as_string::<i32>();
    let cycles = facts.column_by_name("CycleID").unwrap().as_primitive::<Int64Type>();
    let values = facts.column_by_name("Value").unwrap().as_primitive::<Float64Type>();
    let times = facts
        .column_by_name("TimeString")
        .unwrap()
        .as_primitive::<TimestampSecondType>();

    // Pressure is listed before Temperature.
    assert_eq!(names.value(0), "Pressure");
    assert_eq!(names.value(3), "Temperature");
    assert_eq!(cycles.value(0), 1);
    assert_eq!(cycles.value(2), 2);
    assert_eq!(cycles.null_count(), 0);
    assert_eq!(values.value(3), 20.5);
    assert!(values.is_null(5));
    assert!(values.is_null(6));
    assert_eq!(times.value(1) - times.value(0), 60);
}

#[tokio::test]
async fn samples_outside_known_cycles_have_no_cycle_id() {
    let store = Arc::new(MemoryTableStore::new());
    store.insert("Flow", sensor("Medicion", &TIMES[..2], &[Some("3"), Some("4")]));

    let summary_schema = Arc::new(Schema::new(vec![
        Field::new("CycleID", DataType::Int64, false),
        Field::new("StartTime", DataType::Utf8, false),
        Field::new("EndTime", DataType::Utf8, false),
    ]));
    store.insert(
        "LOTE_SUMMARY",
        RecordBatch::try_new(
            summary_schema,
            vec![
                Arc::new(Int64Array::from(vec![7])),
                Arc::new(StringArray::from(vec!["15/01/2024 09:59:00"])),
                Arc::new(StringArray::from(vec!["15/01/2024 10:00:30"])),
            ],
        )
        .unwrap(),
    );

    let mut etl = FactSamplesEtl::new(store.clone(), None);
    assert!(etl.run().await);

    let facts = store.read_table("FactSamples").await.unwrap().unwrap();
    let cycles = facts.column_by_name("CycleID").unwrap().as_primitive::<Int64Type>();
    assert_eq!(cycles.value(0), 7);
    assert!(cycles.is_null(1));
}

#[tokio::test]
async fn tables_without_value_column_are_skipped() {
    let store = Arc::new(MemoryTableStore::new());
    store.insert("Labels", sensor("Comment", &TIMES[..1], &[Some("ok")]));

    let mut etl = FactSamplesEtl::new(store.clone(), None);
    assert!(!etl.run().await);
    assert!(store.read_table("FactSamples").await.unwrap().is_none());
}
