//! Per-proxy aggregation views over a materialized result table

use crate::schema::{MetricRow, ResultTable};

use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const REQUEST_COUNT_METRIC: &str = "request_count";
pub const RESPONSE_TIME_METRIC: &str = "response_time";
pub const ERROR_COUNT_METRIC: &str = "error_count";

/// Label unpacked by [`errors_by_proxy_and_type`]
pub const ERROR_TYPE_LABEL: &str = "error_type";

/// One aggregated value for an API proxy
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyAggregate {
    pub api_proxy: String,
    pub value: f64,
}

/// Error total for an API proxy and error type
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAggregate {
    pub api_proxy: String,
    /// `None` when the row carried no `error_type` label
    pub error_type: Option<String>,
    pub value: f64,
}

/// SUM(value) of `request_count` by proxy, largest first
pub fn total_requests_by_proxy(table: &ResultTable) -> Vec<ProxyAggregate> {
    sum_by_proxy(table, REQUEST_COUNT_METRIC)
}

/// AVG(value) of `response_time` by proxy, largest first
pub fn average_response_time_by_proxy(table: &ResultTable) -> Vec<ProxyAggregate> {
    let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows_for(table, RESPONSE_TIME_METRIC) {
        let (sum, count) = groups.entry(row.api_proxy.as_str()).or_insert((0.0, 0));
        *sum += row.value;
        *count += 1;
    }

    let mut out: Vec<ProxyAggregate> = groups
        .into_iter()
        .map(|(api_proxy, (sum, count))| ProxyAggregate {
            api_proxy: api_proxy.to_string(),
            value: sum / count as f64,
        })
        .collect();
    out.sort_by(|a, b| descending(a.value, b.value));
    out
}

/// SUM(value) of `error_count` by proxy, largest first
pub fn total_errors_by_proxy(table: &ResultTable) -> Vec<ProxyAggregate> {
    sum_by_proxy(table, ERROR_COUNT_METRIC)
}

/// SUM(value) of `error_count` by proxy and `error_type` label, largest first
pub fn errors_by_proxy_and_type(table: &ResultTable) -> Vec<ErrorAggregate> {
    let mut groups: BTreeMap<(&str, Option<&str>), f64> = BTreeMap::new();
    for row in rows_for(table, ERROR_COUNT_METRIC) {
        let key = (row.api_proxy.as_str(), row.label(ERROR_TYPE_LABEL));
        *groups.entry(key).or_insert(0.0) += row.value;
    }

    let mut out: Vec<ErrorAggregate> = groups
        .into_iter()
        .map(|((api_proxy, error_type), value)| ErrorAggregate {
            api_proxy: api_proxy.to_string(),
            error_type: error_type.map(str::to_string),
            value,
        })
        .collect();
    out.sort_by(|a, b| descending(a.value, b.value));
    out
}

fn sum_by_proxy(table: &ResultTable, metric_name: &str) -> Vec<ProxyAggregate> {
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows_for(table, metric_name) {
        *groups.entry(row.api_proxy.as_str()).or_insert(0.0) += row.value;
    }

    let mut out: Vec<ProxyAggregate> = groups
        .into_iter()
        .map(|(api_proxy, value)| ProxyAggregate {
            api_proxy: api_proxy.to_string(),
            value,
        })
        .collect();
    out.sort_by(|a, b| descending(a.value, b.value));
    out
}

/// Rows of one metric with a non-null value. Null values decode as NaN and,
/// as in SQL SUM/AVG, take no part in the aggregate.
fn rows_for<'a>(table: &'a ResultTable, metric_name: &'a str) -> impl Iterator<Item = &'a MetricRow> {
    table
        .iter()
        .filter(move |row| row.metric_name == metric_name && !row.value.is_nan())
}

// Stable sort keeps the ascending key order among equal values.
fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
