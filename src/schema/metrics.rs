//! Metric row shape and Arrow schema
//!
//! Every metrics file carries the same six columns. `labels` is an open-ended
//! `map<utf8, utf8>`; everything else is a fixed scalar column.

use crate::Result;

use arrow_array::builder::{
    ArrayBuilder, Float64Builder, MapBuilder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{Field, Schema, SchemaRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Standard field names
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const METRIC_NAME_FIELD: &str = "metric_name";
pub const VALUE_FIELD: &str = "value";
pub const API_PROXY_FIELD: &str = "api_proxy";
pub const DATE_FIELD: &str = "date";
pub const LABELS_FIELD: &str = "labels";

/// Projected columns, in result order
pub const RESULT_COLUMNS: [&str; 6] = [
    TIMESTAMP_FIELD,
    METRIC_NAME_FIELD,
    VALUE_FIELD,
    API_PROXY_FIELD,
    DATE_FIELD,
    LABELS_FIELD,
];

/// One metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    pub api_proxy: String,
    pub date: String,
    pub labels: BTreeMap<String, String>,
}

impl MetricRow {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Arrow schema of a metrics file as written by [`MetricBatchBuilder`]
pub fn metrics_schema() -> SchemaRef {
    MetricBatchBuilder::new().schema()
}

/// Builds record batches in the on-disk metrics layout
pub struct MetricBatchBuilder {
    timestamps: TimestampMillisecondBuilder,
    metric_names: StringBuilder,
    values: Float64Builder,
    api_proxies: StringBuilder,
    dates: StringBuilder,
    labels: MapBuilder<StringBuilder, StringBuilder>,
}

impl Default for MetricBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricBatchBuilder {
    pub fn new() -> Self {
        Self {
            timestamps: TimestampMillisecondBuilder::new().with_timezone("UTC"),
            metric_names: StringBuilder::new(),
            values: Float64Builder::new(),
            api_proxies: StringBuilder::new(),
            dates: StringBuilder::new(),
            labels: MapBuilder::new(None, StringBuilder::new(), StringBuilder::new()),
        }
    }

    pub fn append(&mut self, row: &MetricRow) -> Result<()> {
        self.timestamps.append_value(row.timestamp.timestamp_millis());
        self.metric_names.append_value(&row.metric_name);
        self.values.append_value(row.value);
        self.api_proxies.append_value(&row.api_proxy);
        self.dates.append_value(&row.date);
        for (key, value) in &row.labels {
            self.labels.keys().append_value(key);
            self.labels.values().append_value(value);
        }
        self.labels.append(true)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.metric_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the buffered rows into a batch and reset the builder
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let columns = self.finish_columns();
        let schema = schema_for(&columns);
        Ok(RecordBatch::try_new(schema, columns)?)
    }

    fn schema(mut self) -> SchemaRef {
        schema_for(&self.finish_columns())
    }

    fn finish_columns(&mut self) -> Vec<ArrayRef> {
        vec![
            Arc::new(self.timestamps.finish()),
            Arc::new(self.metric_names.finish()),
            Arc::new(self.values.finish()),
            Arc::new(self.api_proxies.finish()),
            Arc::new(self.dates.finish()),
            Arc::new(self.labels.finish()),
        ]
    }
}

/// Derive the schema from finished arrays so nested map field names always
/// match what the builders produce.
fn schema_for(columns: &[ArrayRef]) -> SchemaRef {
    let fields = RESULT_COLUMNS
        .iter()
        .zip(columns)
        .map(|(name, array)| {
            Field::new(*name, array.data_type().clone(), *name != TIMESTAMP_FIELD)
        })
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}
