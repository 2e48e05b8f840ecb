//! Query building and execution
//!
//! The query path is one request/response cycle:
//! - resolve partition files for the requested dates and applications
//! - report "no data" without touching the engine when nothing matched
//! - build a [`QueryDescriptor`] and execute it with DataFusion
//! - decode the batches into a [`ResultTable`]
//!
//! An optional [`ResultCache`] memoizes outcomes by the exact request tuple.

pub mod aggregate;
mod cache;
mod descriptor;
mod engine;
mod telemetry;

pub use cache::{CacheConfig, CacheStats, QueryKey, ResultCache};
pub use descriptor::{build_query, QueryDescriptor};
pub use engine::QueryEngine;

use crate::partition::PartitionResolver;
use crate::schema::ResultTable;
use crate::{Error, Result};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Configuration for the query service
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Result cache settings; `None` disables caching
    pub cache: Option<CacheConfig>,
}

/// One query request from a consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    /// Dates as `YYYY-MM-DD`
    pub dates: Vec<String>,
    /// Applications (`app=` partitions) to read
    pub applications: Vec<String>,
    /// Metric names to keep; `None` keeps all
    pub metrics: Option<Vec<String>>,
    /// Keep only rows whose `api_proxy` equals this value; `None` keeps all
    pub application_filter: Option<String>,
}

impl QueryRequest {
    pub fn new(dates: Vec<String>, applications: Vec<String>) -> Self {
        Self {
            dates,
            applications,
            metrics: None,
            application_filter: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<String>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Restrict rows to one `api_proxy` value.
    ///
    /// Independent of `applications`: the partitions read never imply a
    /// column filter.
    pub fn with_application_filter(mut self, application: impl Into<String>) -> Self {
        self.application_filter = Some(application.into());
        self
    }
}

/// Result of one query cycle
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// No files matched; nothing was executed
    NoData,
    /// Rows matching the request
    Table(Arc<ResultTable>),
}

impl QueryOutcome {
    pub fn is_no_data(&self) -> bool {
        matches!(self, QueryOutcome::NoData)
    }

    pub fn table(&self) -> Option<&ResultTable> {
        match self {
            QueryOutcome::NoData => None,
            QueryOutcome::Table(table) => Some(table.as_ref()),
        }
    }
}

/// Resolves, executes and optionally caches metrics queries
pub struct MetricsQueryService {
    resolver: PartitionResolver,
    engine: QueryEngine,
    cache: Option<Arc<ResultCache>>,
}

impl MetricsQueryService {
    /// Create a service over the resolver's dataset
    pub fn new(resolver: PartitionResolver, config: QueryConfig) -> Self {
        let engine = QueryEngine::new().with_file_extension(resolver.file_extension());
        let cache = config.cache.map(|c| Arc::new(ResultCache::new(c)));
        Self {
            resolver,
            engine,
            cache,
        }
    }

    /// Share an existing cache, e.g. between services over the same root
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn resolver(&self) -> &PartitionResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Run one query cycle
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let span = info_span!(
            "query.execute",
            dates = request.dates.len(),
            applications = request.applications.len(),
        );

        match &self.cache {
            Some(cache) => {
                let key = QueryKey {
                    root: self.resolver.root().to_path_buf(),
                    file_extension: self.resolver.file_extension().to_string(),
                    dates: request.dates.clone(),
                    applications: request.applications.clone(),
                    metrics: request.metrics.clone(),
                    application_filter: request.application_filter.clone(),
                };
                let before = cache.stats();
                let outcome = cache
                    .get_or_load(key, || self.run(request))
                    .instrument(span)
                    .await;
                telemetry::record_cache_delta(&before, &cache.stats());
                outcome
            }
            None => self.run(request).instrument(span).await,
        }
    }

    async fn run(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let started = Instant::now();
        let files = self
            .resolver
            .resolve_files(&request.dates, &request.applications);
        let files_resolved = files.len() as u64;

        let result = self.execute(files, request).await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(outcome) => {
                let rows_returned = outcome.table().map_or(0, |t| t.len() as u64);
                info!(
                    files = files_resolved,
                    rows = rows_returned,
                    no_data = outcome.is_no_data(),
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Query completed"
                );
                telemetry::record_query(telemetry::QueryMetrics {
                    outcome: if outcome.is_no_data() { "no_data" } else { "success" },
                    error_class: None,
                    duration_seconds: elapsed,
                    files_resolved,
                    rows_returned,
                });
            }
            Err(error) => {
                warn!(files = files_resolved, error = %error, "Query failed");
                telemetry::record_query(telemetry::QueryMetrics {
                    outcome: "error",
                    error_class: Some(error.class()),
                    duration_seconds: elapsed,
                    files_resolved,
                    rows_returned: 0,
                });
            }
        }

        result
    }

    async fn execute(
        &self,
        files: Vec<PathBuf>,
        request: &QueryRequest,
    ) -> Result<QueryOutcome> {
        let descriptor = match build_query(
            files,
            request.metrics.clone(),
            request.application_filter.as_deref(),
        ) {
            Ok(descriptor) => descriptor,
            Err(Error::NoData) => return Ok(QueryOutcome::NoData),
            Err(e) => return Err(e),
        };

        let batches = self.engine.execute(&descriptor).await?;
        let table = ResultTable::from_batches(&batches)?;
        Ok(QueryOutcome::Table(Arc::new(table)))
    }
}
