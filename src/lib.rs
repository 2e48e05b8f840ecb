//! # promparq
//!
//! Partition resolution and querying for API metrics stored as
//! hive-partitioned Parquet files.
//!
//! An ingester scrapes Prometheus and writes one or more Parquet files per
//! API proxy and day under `year=YYYY/month=MM/day=DD/app=<proxy>/`. This crate
//! turns that layout plus a set of user filters into a concrete file list, a
//! query over those files and a typed result table.
//!
//! ## Components
//!
//! - **Partition**: parses `key=value` directory names and walks the tree to
//!   list dates, applications and data files
//! - **Query**: builds engine-independent query descriptors, executes them via
//!   DataFusion and optionally memoizes the outcome
//! - **Export**: flat CSV and text rendering of result tables

pub mod config;
pub mod export;
pub mod partition;
pub mod query;
pub mod schema;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::partition::{DateSelection, PartitionResolver};
    pub use crate::query::{
        build_query, MetricsQueryService, QueryConfig, QueryDescriptor, QueryOutcome,
        QueryRequest,
    };
    pub use crate::schema::{MetricRow, ResultTable};
    pub use crate::{Error, Result};
}
