//! Synthetic dataset generator
//!
//! Writes a partitioned metrics dataset in the layout the query tool reads,
//! for demos and local testing.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin promparq-generate -- \
//!   --output-dir data \
//!   --apps checkout,billing \
//!   --days 7 \
//!   --samples-per-day 288
//! ```
//!
//! Values are deterministic for a given set of arguments so repeated runs
//! produce identical files.

use promparq::partition::{PartitionDate, PartitionKey, PartitionWriter};
use promparq::query::aggregate::{
    ERROR_COUNT_METRIC, ERROR_TYPE_LABEL, REQUEST_COUNT_METRIC, RESPONSE_TIME_METRIC,
};
use promparq::schema::MetricRow;
use promparq::telemetry::Telemetry;
use promparq::{Error, Result};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

const SECONDS_PER_DAY: i64 = 86_400;
const ERROR_TYPES: [&str; 3] = ["timeout", "server_error", "bad_request"];

/// Generate a partitioned Parquet metrics dataset
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dataset root to write into
    #[arg(long, env = "PROMPARQ_DATA_DIR", default_value = "data")]
    output_dir: PathBuf,

    /// API proxies to generate, comma separated
    #[arg(long, value_delimiter = ',', default_value = "checkout,billing,search")]
    apps: Vec<String>,

    /// Number of days to generate, ending at --end-date
    #[arg(long, default_value_t = 3)]
    days: u32,

    /// Last day to generate (YYYY-MM-DD), defaults to today (UTC)
    #[arg(long)]
    end_date: Option<String>,

    /// Scrape points per metric per day
    #[arg(long, default_value_t = 288)]
    samples_per_day: u32,

    /// Files per app partition per day
    #[arg(long, default_value_t = 4)]
    files_per_day: u32,

    /// Parquet compression (snappy, gzip, lz4, zstd, none)
    #[arg(long, default_value = "snappy")]
    compression: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Shape of a generated series
#[derive(Clone, Copy)]
enum ValuePattern {
    /// Daily sine wave between `min` and `max`
    Diurnal { min: f64, max: f64 },
    /// Small values with occasional spikes
    Sparse { base: f64, spike: f64 },
}

impl ValuePattern {
    fn value(self, second_of_day: i64, seed: u64) -> f64 {
        let noise = unit_noise(seed);
        match self {
            ValuePattern::Diurnal { min, max } => {
                let phase = second_of_day as f64 / SECONDS_PER_DAY as f64 * std::f64::consts::TAU;
                let mid = min + (max - min) / 2.0;
                (mid + (max - min) / 2.0 * phase.sin() * 0.8 + (max - min) * 0.1 * noise).round()
            }
            ValuePattern::Sparse { base, spike } => {
                if noise > 0.9 {
                    (base + spike * noise).round()
                } else {
                    (base * noise).round()
                }
            }
        }
    }
}

/// Deterministic value in [0, 1) from a seed (splitmix64)
fn unit_noise(seed: u64) -> f64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

fn app_seed(app: &str) -> u64 {
    app.bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
}

struct DayGenerator<'a> {
    app: &'a str,
    day: NaiveDate,
    samples_per_day: u32,
}

impl DayGenerator<'_> {
    /// Rows for scrape points `[first, last)` of the day
    fn rows(&self, first: u32, last: u32) -> Result<Vec<MetricRow>> {
        let seed = app_seed(self.app) ^ (u64::from(self.day.num_days_from_ce() as u32) << 32);
        let step = SECONDS_PER_DAY / i64::from(self.samples_per_day.max(1));
        let midnight = self
            .day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::Internal(format!("invalid midnight for {}", self.day)))?
            .and_utc();
        let date = self.day.format("%Y-%m-%d").to_string();

        let requests = ValuePattern::Diurnal { min: 50.0, max: 1500.0 };
        let latency = ValuePattern::Diurnal { min: 80.0, max: 450.0 };
        let errors = ValuePattern::Sparse { base: 2.0, spike: 40.0 };

        let mut rows = Vec::with_capacity((last - first) as usize * (2 + ERROR_TYPES.len()));
        for point in first..last {
            let second = i64::from(point) * step;
            let timestamp = midnight + chrono::Duration::seconds(second);
            let point_seed = seed.wrapping_add(u64::from(point) * 16);

            rows.push(self.row(
                timestamp,
                &date,
                REQUEST_COUNT_METRIC,
                requests.value(second, point_seed),
                BTreeMap::new(),
            ));
            rows.push(self.row(
                timestamp,
                &date,
                RESPONSE_TIME_METRIC,
                latency.value(second, point_seed + 1),
                BTreeMap::new(),
            ));
            for (i, error_type) in ERROR_TYPES.iter().enumerate() {
                let labels = BTreeMap::from([(ERROR_TYPE_LABEL.to_string(), error_type.to_string())]);
                rows.push(self.row(
                    timestamp,
                    &date,
                    ERROR_COUNT_METRIC,
                    errors.value(second, point_seed + 2 + i as u64),
                    labels,
                ));
            }
        }
        Ok(rows)
    }

    fn row(
        &self,
        timestamp: DateTime<Utc>,
        date: &str,
        metric_name: &str,
        value: f64,
        mut labels: BTreeMap<String, String>,
    ) -> MetricRow {
        labels.insert("job".to_string(), "apigee".to_string());
        MetricRow {
            timestamp,
            metric_name: metric_name.to_string(),
            value,
            api_proxy: self.app.to_string(),
            date: date.to_string(),
            labels,
        }
    }
}

/// `metrics_HHMMSS_HHMMSS.parquet` for the window covered by a file
fn file_name(first_second: i64, end_second: i64) -> String {
    let hms = |s: i64| format!("{:02}{:02}{:02}", s / 3600, (s % 3600) / 60, s % 60);
    format!("metrics_{}_{}.parquet", hms(first_second), hms(end_second.min(SECONDS_PER_DAY - 1)))
}

fn validate(args: &Args) -> Result<()> {
    if args.apps.is_empty() || args.days == 0 || args.samples_per_day == 0 || args.files_per_day == 0 {
        return Err(Error::Config(
            "--apps must be non-empty and counts must be greater than zero".to_string(),
        ));
    }
    // One point per second at most; a zero step would stack every point at midnight
    if i64::from(args.samples_per_day) > SECONDS_PER_DAY {
        return Err(Error::Config(format!(
            "--samples-per-day must be at most {SECONDS_PER_DAY}, got {}",
            args.samples_per_day
        )));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("promparq-generate", &args.log_level)?;

    validate(&args)?;

    let end = match &args.end_date {
        Some(raw) => promparq::partition::parse_date(raw)?,
        None => Utc::now().date_naive(),
    };
    let writer = PartitionWriter::new(&args.output_dir).with_compression(&args.compression)?;

    info!(
        output_dir = %args.output_dir.display(),
        apps = ?args.apps,
        days = args.days,
        end_date = %end,
        samples_per_day = args.samples_per_day,
        files_per_day = args.files_per_day,
        "Generating dataset"
    );

    let started = Instant::now();
    let mut files = 0usize;
    let mut rows_written = 0usize;
    let step = SECONDS_PER_DAY / i64::from(args.samples_per_day);
    let files_per_day = args.files_per_day.min(args.samples_per_day);
    let points_per_file = args.samples_per_day.div_ceil(files_per_day);

    for offset in (0..args.days).rev() {
        let day = end
            .checked_sub_days(Days::new(u64::from(offset)))
            .ok_or_else(|| Error::Config(format!("date out of range: {end} - {offset} days")))?;
        let partition_date = PartitionDate::new(
            format!("{:04}", day.year()),
            format!("{:02}", day.month()),
            format!("{:02}", day.day()),
        );

        for app in &args.apps {
            let generator = DayGenerator {
                app,
                day,
                samples_per_day: args.samples_per_day,
            };
            let key = PartitionKey::new(partition_date.clone(), app.as_str());

            let mut first = 0;
            while first < args.samples_per_day {
                let last = (first + points_per_file).min(args.samples_per_day);
                let rows = generator.rows(first, last)?;
                let name = file_name(i64::from(first) * step, i64::from(last) * step - 1);
                writer.write(&key, &name, &rows)?;
                files += 1;
                rows_written += rows.len();
                first = last;
            }
        }
    }

    info!(
        files,
        rows = rows_written,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Dataset written"
    );
    println!(
        "Wrote {rows_written} rows in {files} files under {}",
        args.output_dir.display()
    );

    Ok(())
}
