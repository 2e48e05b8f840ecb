//! End-to-end query tests: resolve files, execute through DataFusion and
//! decode the result table.

use promparq::export;
use promparq::partition::{PartitionDate, PartitionKey, PartitionResolver, PartitionWriter};
use promparq::query::aggregate;
use promparq::query::{
    build_query, CacheConfig, MetricsQueryService, QueryConfig, QueryEngine, QueryOutcome,
    QueryRequest, ResultCache,
};
use promparq::schema::{MetricRow, ResultTable};
use promparq::Error;

use chrono::DateTime;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const BASE_MS: i64 = 1_744_000_000_000;

fn row(app: &str, date: &str, offset_s: i64, metric: &str, value: f64) -> MetricRow {
    MetricRow {
        timestamp: DateTime::from_timestamp_millis(BASE_MS + offset_s * 1000).unwrap(),
        metric_name: metric.to_string(),
        value,
        api_proxy: app.to_string(),
        date: date.to_string(),
        labels: BTreeMap::from([("job".to_string(), "apigee".to_string())]),
    }
}

fn error_row(app: &str, date: &str, offset_s: i64, error_type: &str, value: f64) -> MetricRow {
    let mut row = row(app, date, offset_s, aggregate::ERROR_COUNT_METRIC, value);
    row.labels
        .insert(aggregate::ERROR_TYPE_LABEL.to_string(), error_type.to_string());
    row
}

fn write(root: &Path, date: &str, app: &str, file_name: &str, rows: &[MetricRow]) {
    let key = PartitionKey::new(PartitionDate::parse(date).unwrap(), app);
    PartitionWriter::new(root).write(&key, file_name, rows).unwrap();
}

/// Two days, two apps, two files for checkout on the first day.
/// Every row has a distinct timestamp so ordering is total.
fn create_dataset() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "2025-04-07",
        "checkout",
        "metrics_000000_115959.parquet",
        &[
            row("checkout", "2025-04-07", 30, "request_count", 100.0),
            row("checkout", "2025-04-07", 10, "response_time", 120.0),
        ],
    );
    write(
        root,
        "2025-04-07",
        "checkout",
        "metrics_120000_235959.parquet",
        &[
            row("checkout", "2025-04-07", 50, "request_count", 50.0),
            row("checkout", "2025-04-07", 40, "response_time", 180.0),
            error_row("checkout", "2025-04-07", 45, "timeout", 3.0),
        ],
    );
    write(
        root,
        "2025-04-07",
        "billing",
        "metrics.parquet",
        &[
            row("billing", "2025-04-07", 20, "request_count", 400.0),
            row("billing", "2025-04-07", 25, "response_time", 90.0),
            error_row("billing", "2025-04-07", 26, "server_error", 7.0),
        ],
    );
    write(
        root,
        "2025-04-08",
        "checkout",
        "metrics.parquet",
        &[
            row("checkout", "2025-04-08", 86_400 + 5, "request_count", 25.0),
            error_row("checkout", "2025-04-08", 86_400 + 6, "timeout", 1.0),
        ],
    );

    dir
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn service(root: &Path) -> MetricsQueryService {
    MetricsQueryService::new(PartitionResolver::new(root), QueryConfig::default())
}

fn assert_ascending(table: &ResultTable) {
    assert!(table
        .rows()
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_unfiltered_query_returns_all_rows_ordered() {
    let dir = create_dataset();
    let resolver = PartitionResolver::new(dir.path());
    let files = resolver.resolve_files(&["2025-04-07", "2025-04-08"], &["checkout", "billing"]);
    assert_eq!(files.len(), 4);

    let descriptor = build_query(files, None::<Vec<String>>, None).unwrap();
    let batches = QueryEngine::new().execute(&descriptor).await.unwrap();
    let table = ResultTable::from_batches(&batches).unwrap();

    assert_eq!(table.len(), 10);
    assert_ascending(&table);
    assert!(table.iter().all(|r| descriptor.matches(r)));
    assert_eq!(table.rows()[0].metric_name, "response_time");
    assert_eq!(table.rows()[0].value, 120.0);
    assert_eq!(table.rows()[0].label("job"), Some("apigee"));
}

#[tokio::test]
async fn test_application_and_metric_filters_are_conjunctive() {
    let dir = create_dataset();
    let resolver = PartitionResolver::new(dir.path());

    // Billing files are in scope but excluded by the api_proxy filter
    let files = resolver.resolve_files(&["2025-04-07"], &["checkout", "billing"]);
    let descriptor = build_query(files, Some(["request_count"]), Some("checkout")).unwrap();
    let batches = QueryEngine::new().execute(&descriptor).await.unwrap();
    let table = ResultTable::from_batches(&batches).unwrap();

    let values: Vec<f64> = table.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![100.0, 50.0]);
    assert!(table
        .iter()
        .all(|r| r.api_proxy == "checkout" && r.metric_name == "request_count"));
}

#[tokio::test]
async fn test_metric_set_membership() {
    let dir = create_dataset();
    let resolver = PartitionResolver::new(dir.path());
    let files = resolver.resolve_files(&["2025-04-07"], &["billing"]);

    let descriptor =
        build_query(files, Some(["response_time", "error_count"]), None).unwrap();
    let batches = QueryEngine::new().execute(&descriptor).await.unwrap();
    let table = ResultTable::from_batches(&batches).unwrap();

    assert_eq!(table.len(), 2);
    assert!(!table.contains_metric("request_count"));
    assert_eq!(table.rows()[1].label("error_type"), Some("server_error"));
}

#[tokio::test]
async fn test_descriptor_sql_matches_dataframe_execution() {
    let dir = create_dataset();
    let resolver = PartitionResolver::new(dir.path());
    let files = resolver.resolve_files(&["2025-04-07", "2025-04-08"], &["checkout"]);
    let descriptor = build_query(files, Some(["request_count"]), Some("checkout")).unwrap();

    let engine = QueryEngine::new();
    let via_dataframe =
        ResultTable::from_batches(&engine.execute(&descriptor).await.unwrap()).unwrap();

    engine.register_files("metrics", &descriptor).await.unwrap();
    let via_sql = ResultTable::from_batches(
        &engine
            .execute_sql(&descriptor.to_sql("metrics"))
            .await
            .unwrap(),
    )
    .unwrap();

    assert_eq!(via_dataframe, via_sql);
    assert_eq!(via_sql.len(), 3);
}

#[test]
fn test_build_query_without_files_is_no_data() {
    let err = build_query(Vec::new(), Some(["request_count"]), Some("checkout")).unwrap_err();
    assert!(matches!(err, Error::NoData));
}

#[tokio::test]
async fn test_service_reports_no_data_for_empty_inputs() {
    let dir = create_dataset();
    let service = service(dir.path());

    let outcome = service
        .query(&QueryRequest::new(Vec::new(), strings(&["checkout"])))
        .await
        .unwrap();
    assert!(outcome.is_no_data());

    let outcome = service
        .query(&QueryRequest::new(strings(&["2025-04-07"]), Vec::new()))
        .await
        .unwrap();
    assert!(outcome.is_no_data());

    let outcome = service
        .query(&QueryRequest::new(strings(&["2025-05-01"]), strings(&["checkout"])))
        .await
        .unwrap();
    assert!(outcome.is_no_data());
}

#[tokio::test]
async fn test_service_missing_root_is_no_data() {
    let dir = tempdir().unwrap();
    let service = service(&dir.path().join("missing"));
    let outcome = service
        .query(&QueryRequest::new(strings(&["2025-04-07"]), strings(&["checkout"])))
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::NoData));
}

#[tokio::test]
async fn test_service_filters_single_application() {
    let dir = create_dataset();
    let service = service(dir.path());

    let request = QueryRequest::new(
        strings(&["2025-04-07", "2025-04-08"]),
        strings(&["checkout", "billing"]),
    )
    .with_metrics(strings(&["error_count"]))
    .with_application_filter("checkout");
    let outcome = service.query(&request).await.unwrap();
    let table = outcome.table().unwrap();

    assert_eq!(table.len(), 2);
    assert!(table.iter().all(|r| r.api_proxy == "checkout"));
    assert_eq!(table.rows()[1].date, "2025-04-08");
}

#[tokio::test]
async fn test_partition_scope_does_not_filter_api_proxy_column() {
    // Ingester-style files carry the file stem in api_proxy, not the app name
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "2025-04-07",
        "checkout",
        "metrics.parquet",
        &[
            row("metrics", "2025-04-07", 1, "request_count", 10.0),
            row("metrics", "2025-04-07", 2, "request_count", 20.0),
        ],
    );

    let service = service(dir.path());
    let dates = strings(&["2025-04-07"]);
    let applications = service.resolver().list_available_applications(&dates);
    assert_eq!(applications, vec!["checkout"]);

    let unfiltered = service
        .query(&QueryRequest::new(dates.clone(), applications.clone()))
        .await
        .unwrap();
    assert_eq!(unfiltered.table().unwrap().len(), 2);

    // Adding a second app partition must not change the checkout rows
    write(
        dir.path(),
        "2025-04-07",
        "billing",
        "metrics.parquet",
        &[row("billing", "2025-04-07", 3, "request_count", 5.0)],
    );
    let both = service
        .query(&QueryRequest::new(dates.clone(), strings(&["billing", "checkout"])))
        .await
        .unwrap();
    assert_eq!(both.table().unwrap().len(), 3);

    let filtered = service
        .query(&QueryRequest::new(dates, applications).with_application_filter("checkout"))
        .await
        .unwrap();
    assert!(filtered.table().unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_cache_separates_file_extensions() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "2025-04-07",
        "checkout",
        "a.parquet",
        &[row("checkout", "2025-04-07", 1, "request_count", 1.0)],
    );
    write(
        dir.path(),
        "2025-04-07",
        "checkout",
        "b.pq",
        &[
            row("checkout", "2025-04-07", 2, "request_count", 2.0),
            row("checkout", "2025-04-07", 3, "request_count", 3.0),
        ],
    );

    let cache = Arc::new(ResultCache::default());
    let parquet = service(dir.path()).with_cache(cache.clone());
    let pq = MetricsQueryService::new(
        PartitionResolver::new(dir.path()).with_file_extension("pq"),
        QueryConfig::default(),
    )
    .with_cache(cache.clone());
    let request = QueryRequest::new(strings(&["2025-04-07"]), strings(&["checkout"]));

    let from_parquet = parquet.query(&request).await.unwrap();
    let from_pq = pq.query(&request).await.unwrap();

    assert_eq!(from_parquet.table().unwrap().len(), 1);
    assert_eq!(from_pq.table().unwrap().len(), 2);
    assert_eq!(cache.stats().misses, 2);
}

#[tokio::test]
async fn test_service_filter_without_matches_is_empty_table() {
    let dir = create_dataset();
    let service = service(dir.path());

    let request = QueryRequest::new(strings(&["2025-04-08"]), strings(&["checkout"]))
        .with_metrics(strings(&["response_time"]));
    let outcome = service.query(&request).await.unwrap();

    assert!(!outcome.is_no_data());
    assert!(outcome.table().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_fails_the_whole_query() {
    let dir = create_dataset();
    let leaf = dir.path().join("year=2025/month=04/day=07/app=billing");
    std::fs::write(leaf.join("broken.parquet"), b"not parquet").unwrap();

    let service = service(dir.path());
    let result = service
        .query(&QueryRequest::new(strings(&["2025-04-07"]), strings(&["billing"])))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cached_service_reuses_results_until_refresh() {
    let dir = create_dataset();
    let cache = Arc::new(ResultCache::new(CacheConfig {
        ttl: Duration::from_secs(300),
        max_entries: 16,
    }));
    let service = service(dir.path()).with_cache(cache.clone());
    let request = QueryRequest::new(strings(&["2025-04-07"]), strings(&["billing"]));

    let first = service.query(&request).await.unwrap();
    assert_eq!(first.table().unwrap().len(), 3);

    // New data is invisible until the cache is refreshed
    write(
        dir.path(),
        "2025-04-07",
        "billing",
        "late.parquet",
        &[row("billing", "2025-04-07", 60, "request_count", 1.0)],
    );
    let second = service.query(&request).await.unwrap();
    assert_eq!(second.table().unwrap().len(), 3);
    assert_eq!(cache.stats().hits, 1);

    cache.refresh();
    let third = service.query(&request).await.unwrap();
    assert_eq!(third.table().unwrap().len(), 4);
    assert_eq!(cache.stats().misses, 2);
}

#[tokio::test]
async fn test_aggregations_and_csv_export() {
    let dir = create_dataset();
    let service = service(dir.path());
    let request = QueryRequest::new(strings(&["2025-04-07"]), strings(&["checkout", "billing"]));
    let outcome = service.query(&request).await.unwrap();
    let table = outcome.table().unwrap();

    let totals = aggregate::total_requests_by_proxy(table);
    assert_eq!(totals[0].api_proxy, "billing");
    assert_eq!(totals[0].value, 400.0);
    assert_eq!(totals[1].value, 150.0);

    let latency = aggregate::average_response_time_by_proxy(table);
    assert_eq!(latency[0].api_proxy, "checkout");
    assert_eq!(latency[0].value, 150.0);

    let errors = aggregate::errors_by_proxy_and_type(table);
    assert_eq!(errors[0].error_type.as_deref(), Some("server_error"));

    let mut out = Vec::new();
    export::write_csv(table, &mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,metric_name,value,api_proxy,date,labels")
    );
    assert_eq!(lines.count(), table.len());
}
