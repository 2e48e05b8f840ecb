//! Schema definitions for API metrics
//!
//! Metrics files share one fixed row shape: a millisecond timestamp, the
//! metric name, a float value, the API proxy, the partition date and a map of
//! Prometheus labels.

mod metrics;
mod table;

pub use metrics::{
    metrics_schema,
    MetricBatchBuilder,
    MetricRow,
    API_PROXY_FIELD,
    DATE_FIELD,
    LABELS_FIELD,
    METRIC_NAME_FIELD,
    RESULT_COLUMNS,
    TIMESTAMP_FIELD,
    VALUE_FIELD,
};
pub use table::ResultTable;
