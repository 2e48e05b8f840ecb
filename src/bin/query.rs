//! promparq query tool
//!
//! Resolves the partitions matching a date selection and API proxy filter,
//! runs the query through DataFusion and prints the result head, optional
//! CSV export and per-proxy aggregations.

use promparq::config::ResolverConfig;
use promparq::export;
use promparq::partition::{parse_date, DateSelection, PartitionResolver};
use promparq::query::aggregate;
use promparq::query::{MetricsQueryService, QueryConfig, QueryOutcome, QueryRequest};
use promparq::schema::ResultTable;
use promparq::telemetry::Telemetry;
use promparq::Result;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

/// Query API metrics stored as partitioned Parquet files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Args {
    /// Dataset root containing year=/month=/day=/app= directories
    #[arg(long, env = "PROMPARQ_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Data file extension
    #[arg(long, env = "PROMPARQ_FILE_EXTENSION", default_value = "parquet", global = true)]
    file_extension: String,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    query: QueryArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List dates present under the dataset root, newest first
    Dates,
    /// List API proxies with data on the selected dates
    Apps {
        #[command(flatten)]
        dates: DateArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct DateArgs {
    /// Date to query (YYYY-MM-DD), defaults to today
    #[arg(long, conflicts_with_all = ["last_days", "from"])]
    date: Option<String>,

    /// Query data from the last N days
    #[arg(long, conflicts_with = "from")]
    last_days: Option<u32>,

    /// First day of an inclusive range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Last day of an inclusive range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<String>,
}

impl DateArgs {
    /// The explicit selection, if any flag was given
    fn selection(&self) -> Result<Option<DateSelection>> {
        if let Some(days) = self.last_days {
            return Ok(Some(DateSelection::last_days(days)));
        }
        if let Some(date) = &self.date {
            return Ok(Some(DateSelection::Single(date.clone())));
        }
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            return Ok(Some(DateSelection::Range {
                start: parse_date(from)?,
                end: parse_date(to)?,
            }));
        }
        Ok(None)
    }
}

#[derive(ClapArgs, Debug)]
struct QueryArgs {
    #[command(flatten)]
    dates: DateArgs,

    /// Filter by API proxy (repeatable); all proxies when omitted
    #[arg(long = "api-proxy")]
    api_proxies: Vec<String>,

    /// Filter by metric name (repeatable)
    #[arg(long = "metric")]
    metrics: Vec<String>,

    /// Write the full result to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of result rows to print
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Print per-proxy aggregations after the result
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    aggregations: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _telemetry = match Telemetry::init_for_component("promparq-query", &args.log_level) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let resolver = ResolverConfig {
        data_dir: args.data_dir.clone(),
        file_extension: args.file_extension.trim_start_matches('.').to_string(),
    }
    .build();

    let result = match &args.command {
        Some(Command::Dates) => list_dates(&resolver),
        Some(Command::Apps { dates }) => list_apps(&resolver, dates),
        None => run_query(resolver, &args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Query tool failed");
            println!("Error executing query: {e}");
            ExitCode::FAILURE
        }
    }
}

fn list_dates(resolver: &PartitionResolver) -> Result<ExitCode> {
    for date in resolver.list_available_dates() {
        println!("{date}");
    }
    Ok(ExitCode::SUCCESS)
}

fn list_apps(resolver: &PartitionResolver, dates: &DateArgs) -> Result<ExitCode> {
    let dates = match dates.selection()? {
        Some(selection) => selection.resolve(),
        None => resolver.list_available_dates(),
    };
    for app in resolver.list_available_applications(&dates) {
        println!("{app}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_query(resolver: PartitionResolver, args: &Args) -> Result<ExitCode> {
    let query = &args.query;
    let dates = query
        .dates
        .selection()?
        .unwrap_or(DateSelection::Today)
        .resolve();

    let applications = if query.api_proxies.is_empty() {
        resolver.list_available_applications(&dates)
    } else {
        query.api_proxies.clone()
    };
    debug!(dates = ?dates, applications = ?applications, "Resolved query scope");

    let service = MetricsQueryService::new(resolver, QueryConfig::default());
    let mut request =
        QueryRequest::new(dates, applications).with_metrics(query.metrics.clone());
    if let [proxy] = query.api_proxies.as_slice() {
        request = request.with_application_filter(proxy.as_str());
    }

    let table = match service.query(&request).await? {
        QueryOutcome::NoData => {
            println!(
                "No Parquet files found in {} for the specified date range.",
                args.data_dir.display()
            );
            return Ok(ExitCode::FAILURE);
        }
        QueryOutcome::Table(table) => table,
    };

    if table.is_empty() {
        println!("No data found matching the criteria.");
    } else {
        println!("Found {} records.", table.len());
        println!("{}", export::format_head(&table, query.limit)?);

        if let Some(path) = &query.output {
            let file = BufWriter::new(File::create(path)?);
            export::write_csv(&table, file)?;
            println!("Results saved to {}", path.display());
        }
    }

    if query.aggregations {
        print_aggregations(&table);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_aggregations(table: &ResultTable) {
    println!("\nExample aggregations:");

    if table.contains_metric(aggregate::REQUEST_COUNT_METRIC) {
        println!("\nTotal requests by API proxy:");
        for row in aggregate::total_requests_by_proxy(table) {
            println!("  {:<32} {:>16.0}", row.api_proxy, row.value);
        }
    }

    if table.contains_metric(aggregate::RESPONSE_TIME_METRIC) {
        println!("\nAverage response time by API proxy (ms):");
        for row in aggregate::average_response_time_by_proxy(table) {
            println!("  {:<32} {:>16.2}", row.api_proxy, row.value);
        }
    }

    if table.contains_metric(aggregate::ERROR_COUNT_METRIC) {
        println!("\nError counts by API proxy and error type:");
        for row in aggregate::errors_by_proxy_and_type(table) {
            println!(
                "  {:<32} {:<24} {:>10.0}",
                row.api_proxy,
                row.error_type.as_deref().unwrap_or("-"),
                row.value
            );
        }
    }
}
