//! Partition resolution and query latency benchmark

use promparq::partition::{PartitionDate, PartitionKey, PartitionResolver, PartitionWriter};
use promparq::query::{MetricsQueryService, QueryConfig, QueryRequest};
use promparq::schema::MetricRow;

use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;
use tempfile::tempdir;

const APPS: [&str; 8] = [
    "checkout", "billing", "search", "catalog", "auth", "orders", "payments", "profile",
];
const DAYS: u32 = 14;

fn create_rows(app: &str, date: &str, rows: usize) -> Vec<MetricRow> {
    (0..rows)
        .map(|i| MetricRow {
            timestamp: DateTime::from_timestamp_millis(1_744_000_000_000 + i as i64 * 1000)
                .unwrap(),
            metric_name: if i % 2 == 0 { "request_count" } else { "response_time" }.to_string(),
            value: (i % 100) as f64,
            api_proxy: app.to_string(),
            date: date.to_string(),
            labels: BTreeMap::from([("status".to_string(), "200".to_string())]),
        })
        .collect()
}

fn create_dataset() -> (tempfile::TempDir, Vec<String>) {
    let dir = tempdir().unwrap();
    let writer = PartitionWriter::new(dir.path());
    let mut dates = Vec::new();

    for day in 1..=DAYS {
        let date = PartitionDate::new("2025", "04", format!("{day:02}"));
        for app in APPS {
            let key = PartitionKey::new(date.clone(), app);
            for file in 0..2 {
                writer
                    .write(
                        &key,
                        &format!("metrics_{file}.parquet"),
                        &create_rows(app, &date.to_string(), 500),
                    )
                    .unwrap();
            }
        }
        dates.push(date.to_string());
    }

    (dir, dates)
}

fn benchmark_resolve(c: &mut Criterion) {
    let (dir, dates) = create_dataset();
    let resolver = PartitionResolver::new(dir.path());

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(u64::from(DAYS) * APPS.len() as u64));

    group.bench_function("list_available_dates", |b| {
        b.iter(|| black_box(resolver.list_available_dates()));
    });

    group.bench_function("list_available_applications", |b| {
        b.iter(|| black_box(resolver.list_available_applications(&dates)));
    });

    group.bench_function("resolve_files", |b| {
        b.iter(|| black_box(resolver.resolve_files(&dates, &APPS)));
    });

    group.finish();
}

fn benchmark_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (dir, dates) = create_dataset();

    let mut group = c.benchmark_group("query");
    group.sample_size(20);

    let uncached = MetricsQueryService::new(PartitionResolver::new(dir.path()), QueryConfig::default());
    let request = QueryRequest::new(dates[..7].to_vec(), vec!["checkout".to_string()])
        .with_metrics(vec!["request_count".to_string()]);

    group.bench_function("single_app_week", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(uncached.query(&request).await.unwrap());
        });
    });

    let cached = MetricsQueryService::new(
        PartitionResolver::new(dir.path()),
        QueryConfig {
            cache: Some(Default::default()),
        },
    );
    rt.block_on(cached.query(&request)).unwrap();

    group.bench_function("single_app_week_cached", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(cached.query(&request).await.unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolve, benchmark_query);

criterion_main!(benches);
