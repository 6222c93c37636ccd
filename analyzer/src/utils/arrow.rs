use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray, StringArray, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::{
    ArrowTemporalType, DataType, Date32Type, Date64Type, Field, Schema, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use std::sync::Arc;

/// Layout used when a temporal arrow column is handed to the text parser.
const TEMPORAL_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn temporal_to_strings<T>(array: &dyn Array) -> Vec<Option<String>>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let array: &PrimitiveArray<T> = array.as_primitive::<T>();
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                None
            } else {
                array
                    .value_as_datetime(i)
                    .map(|dt| dt.format(TEMPORAL_TEXT_FORMAT).to_string())
            }
        })
        .collect()
}

/// Renders a text or temporal column as optional strings; nulls stay `None`.
pub fn column_to_strings(array: &dyn Array) -> Result<Vec<Option<String>>> {
    let values = match array.data_type() {
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        DataType::Utf8View => array
            .as_string_view()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => temporal_to_strings::<TimestampSecondType>(array),
            TimeUnit::Millisecond => temporal_to_strings::<TimestampMillisecondType>(array),
            TimeUnit::Microsecond => temporal_to_strings::<TimestampMicrosecondType>(array),
            TimeUnit::Nanosecond => temporal_to_strings::<TimestampNanosecondType>(array),
        },
        DataType::Date32 => temporal_to_strings::<Date32Type>(array),
        DataType::Date64 => temporal_to_strings::<Date64Type>(array),
        other => {
            return Err(Error::Analysis(format!(
                "unsupported column type {} for a time column",
                other
            )))
        }
    };
    Ok(values)
}

/// The named column as strings, or `None` when the batch does not have it.
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<String>>>> {
    match batch.column_by_name(name) {
        Some(array) => column_to_strings(array.as_ref()).map(Some),
        None => Ok(None),
    }
}

pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().column_with_name(name).is_some()
}

/// Swaps the named column for a nullable `Utf8` column holding `values`.
pub fn replace_column(
    batch: &RecordBatch,
    name: &str,
    values: Vec<Option<String>>,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = schema.index_of(name)?;

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i == idx {
                Field::new(name, DataType::Utf8, true)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns[idx] = Arc::new(StringArray::from(values));

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

/// Removes the named column if present.
pub fn drop_column(batch: &RecordBatch, name: &str) -> Result<RecordBatch> {
    match batch.schema().index_of(name) {
        Ok(idx) => {
            let mut batch = batch.clone();
            batch.remove_column(idx);
            Ok(batch)
        }
        Err(_) => Ok(batch.clone()),
    }
}

pub fn append_column(batch: &RecordBatch, field: Field, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(field);

    let mut columns = batch.columns().to_vec();
    columns.push(array);

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

/// Casts `Utf8View`/`BinaryView` columns (what datafusion hands back from
/// parquet) to their plain counterparts.
pub fn normalize_view_types(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| matches!(f.data_type(), DataType::Utf8View | DataType::BinaryView))
    {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let target = match field.data_type() {
            DataType::Utf8View => DataType::Utf8,
            DataType::BinaryView => DataType::Binary,
            other => other.clone(),
        };
        columns.push(if &target == field.data_type() {
            column.clone()
        } else {
            cast(column, &target)?
        });
        fields.push(field.as_ref().clone().with_data_type(target));
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

/// Rows at `indices`, in that order.
pub fn take_rows(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch> {
    let indices = UInt32Array::from_iter_values(indices.iter().map(|i| *i as u32));
    Ok(take_record_batch(batch, &indices)?)
}
