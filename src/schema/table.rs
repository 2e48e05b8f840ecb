//! Materialized query results

use super::metrics::{
    MetricRow, API_PROXY_FIELD, DATE_FIELD, LABELS_FIELD, METRIC_NAME_FIELD, TIMESTAMP_FIELD,
    VALUE_FIELD,
};
use crate::{Error, Result};

use arrow::compute::cast;
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, TimestampMillisecondType};
use arrow_array::{Array, ArrayRef, MapArray, RecordBatch, StringArray};
use arrow_schema::{DataType, TimeUnit};
use chrono::DateTime;
use std::collections::BTreeMap;

/// Rows returned by one query, in engine order (ascending timestamp).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<MetricRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }

    /// Decode record batches into typed rows.
    ///
    /// `timestamp` may be any Arrow timestamp unit or an `Int64` of epoch
    /// milliseconds. String columns may be plain, view or dictionary encoded.
    /// A null `value` decodes as NaN, null strings as empty, null labels as an
    /// empty mapping.
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let capacity = batches.iter().map(|b| b.num_rows()).sum();
        let mut rows = Vec::with_capacity(capacity);
        for batch in batches {
            decode_batch(batch, &mut rows)?;
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<MetricRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricRow> {
        self.rows.iter()
    }

    /// Whether any row carries the given metric name
    pub fn contains_metric(&self, metric_name: &str) -> bool {
        self.rows.iter().any(|row| row.metric_name == metric_name)
    }
}

impl IntoIterator for ResultTable {
    type Item = MetricRow;
    type IntoIter = std::vec::IntoIter<MetricRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

fn decode_batch(batch: &RecordBatch, rows: &mut Vec<MetricRow>) -> Result<()> {
    let timestamps = cast(
        required(batch, TIMESTAMP_FIELD)?,
        &DataType::Timestamp(TimeUnit::Millisecond, None),
    )?;
    let timestamps = timestamps.as_primitive::<TimestampMillisecondType>();
    let values = cast(required(batch, VALUE_FIELD)?, &DataType::Float64)?;
    let values = values.as_primitive::<Float64Type>();
    let metric_names = utf8(required(batch, METRIC_NAME_FIELD)?)?;
    let api_proxies = utf8(required(batch, API_PROXY_FIELD)?)?;
    let dates = utf8(required(batch, DATE_FIELD)?)?;
    let labels = required(batch, LABELS_FIELD)?;
    let labels = labels.as_map_opt().ok_or_else(|| {
        Error::InvalidSchema(format!(
            "column '{}' must be a map, found {}",
            LABELS_FIELD,
            labels.data_type()
        ))
    })?;
    let label_keys = utf8(labels.keys())?;
    let label_values = utf8(labels.values())?;

    for i in 0..batch.num_rows() {
        if timestamps.is_null(i) {
            return Err(Error::InvalidSchema(format!(
                "null '{}' at row {}",
                TIMESTAMP_FIELD, i
            )));
        }
        let millis = timestamps.value(i);
        let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            Error::InvalidSchema(format!("timestamp {} ms is out of range", millis))
        })?;

        rows.push(MetricRow {
            timestamp,
            metric_name: string_at(&metric_names, i),
            value: if values.is_null(i) {
                f64::NAN
            } else {
                values.value(i)
            },
            api_proxy: string_at(&api_proxies, i),
            date: string_at(&dates, i),
            labels: labels_at(labels, &label_keys, &label_values, i),
        });
    }

    Ok(())
}

fn required<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::InvalidSchema(format!("missing column '{}'", name)))
}

fn utf8(array: &ArrayRef) -> Result<StringArray> {
    let array = cast(array, &DataType::Utf8)?;
    Ok(array.as_string::<i32>().clone())
}

fn string_at(array: &StringArray, i: usize) -> String {
    if array.is_null(i) {
        String::new()
    } else {
        array.value(i).to_string()
    }
}

fn labels_at(
    map: &MapArray,
    keys: &StringArray,
    values: &StringArray,
    i: usize,
) -> BTreeMap<String, String> {
    if map.is_null(i) {
        return BTreeMap::new();
    }
    let offsets = map.value_offsets();
    let start = offsets[i] as usize;
    let end = offsets[i + 1] as usize;

    (start..end)
        .filter(|&j| !keys.is_null(j) && !values.is_null(j))
        .map(|j| (keys.value(j).to_string(), values.value(j).to_string()))
        .collect()
}
