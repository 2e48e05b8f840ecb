//! Flat exports of a result table
//!
//! CSV cannot hold the nested `labels` map, so exports render it as a JSON
//! object string.

use crate::schema::{
    ResultTable, API_PROXY_FIELD, DATE_FIELD, LABELS_FIELD, METRIC_NAME_FIELD, TIMESTAMP_FIELD,
    VALUE_FIELD,
};
use crate::Result;

use arrow::csv::WriterBuilder;
use arrow::util::pretty::pretty_format_batches;
use arrow_array::{ArrayRef, Float64Array, RecordBatch, StringArray, TimestampMillisecondArray};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::io::Write;
use std::sync::Arc;

/// Convert rows into a flat batch with `labels` as JSON text
pub fn to_flat_batch(table: &ResultTable) -> Result<RecordBatch> {
    let rows = table.rows();

    let timestamps = TimestampMillisecondArray::from(
        rows.iter()
            .map(|r| r.timestamp.timestamp_millis())
            .collect::<Vec<_>>(),
    )
    .with_timezone("UTC");
    let labels = rows
        .iter()
        .map(|r| serde_json::to_string(&r.labels))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            TIMESTAMP_FIELD,
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new(METRIC_NAME_FIELD, DataType::Utf8, false),
        Field::new(VALUE_FIELD, DataType::Float64, false),
        Field::new(API_PROXY_FIELD, DataType::Utf8, false),
        Field::new(DATE_FIELD, DataType::Utf8, false),
        Field::new(LABELS_FIELD, DataType::Utf8, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(timestamps),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.metric_name.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.value))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.api_proxy.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.date.as_str()))),
        Arc::new(StringArray::from(labels)),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write the table as CSV with a header row
pub fn write_csv<W: Write>(table: &ResultTable, writer: W) -> Result<()> {
    let batch = to_flat_batch(table)?;
    let mut csv = WriterBuilder::new().with_header(true).build(writer);
    csv.write(&batch)?;
    Ok(())
}

/// Render the first `limit` rows as a text table
pub fn format_head(table: &ResultTable, limit: usize) -> Result<String> {
    let batch = to_flat_batch(table)?;
    let head = batch.slice(0, limit.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}
