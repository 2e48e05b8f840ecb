//! Query-path telemetry instruments and recording helpers.

use super::CacheStats;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct QueryInstruments {
    query_requests: Counter<u64>,
    query_duration_seconds: Histogram<f64>,
    query_files_resolved: Histogram<u64>,
    query_rows_returned: Histogram<u64>,
    cache_hits: Counter<u64>,
    cache_misses: Counter<u64>,
}

fn instruments() -> &'static QueryInstruments {
    static INSTRUMENTS: OnceLock<QueryInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("promparq.query");
        QueryInstruments {
            query_requests: meter
                .u64_counter("promparq.query.requests")
                .with_description("Total query requests by outcome")
                .init(),
            query_duration_seconds: meter
                .f64_histogram("promparq.query.duration")
                .with_description("Resolve plus execute latency")
                .with_unit("s")
                .init(),
            query_files_resolved: meter
                .u64_histogram("promparq.query.files_resolved")
                .with_description("Data files resolved from partitions per query")
                .init(),
            query_rows_returned: meter
                .u64_histogram("promparq.query.rows_returned")
                .with_description("Rows returned per query")
                .init(),
            cache_hits: meter
                .u64_counter("promparq.query.cache.hits")
                .with_description("Result cache hit delta observed per query")
                .init(),
            cache_misses: meter
                .u64_counter("promparq.query.cache.misses")
                .with_description("Result cache miss delta observed per query")
                .init(),
        }
    })
}

pub struct QueryMetrics {
    pub outcome: &'static str,
    pub error_class: Option<&'static str>,
    pub duration_seconds: f64,
    pub files_resolved: u64,
    pub rows_returned: u64,
}

pub fn record_query(metrics: QueryMetrics) {
    let i = instruments();
    let mut attrs = vec![KeyValue::new("outcome", metrics.outcome)];
    if let Some(error_class) = metrics.error_class {
        attrs.push(KeyValue::new("error.class", error_class));
    }

    i.query_requests.add(1, &attrs);
    i.query_duration_seconds.record(metrics.duration_seconds, &attrs);
    i.query_files_resolved.record(metrics.files_resolved, &attrs);
    i.query_rows_returned.record(metrics.rows_returned, &attrs);
}

pub fn record_cache_delta(before: &CacheStats, after: &CacheStats) {
    let i = instruments();

    let hit_delta = after.hits.saturating_sub(before.hits);
    let miss_delta = after.misses.saturating_sub(before.misses);

    if hit_delta > 0 {
        i.cache_hits.add(hit_delta, &[]);
    }
    if miss_delta > 0 {
        i.cache_misses.add(miss_delta, &[]);
    }
}
