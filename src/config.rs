//! Environment-based configuration
//!
//! Builds the resolver and query service from environment variables so the
//! binaries and embedding applications share one set of knobs.

use crate::partition::{PartitionResolver, DEFAULT_FILE_EXTENSION};
use crate::query::{CacheConfig, MetricsQueryService, QueryConfig};
use crate::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Dataset location and file naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Root of the `year=/month=/day=/app=` tree
    pub data_dir: PathBuf,
    /// Recognized data file extension, without the dot
    pub file_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Read resolver settings from the environment
    ///
    /// Environment variables:
    /// - PROMPARQ_DATA_DIR: dataset root (default: data)
    /// - PROMPARQ_FILE_EXTENSION: data file extension (default: parquet)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let data_dir = std::env::var("PROMPARQ_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let file_extension = std::env::var("PROMPARQ_FILE_EXTENSION")
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .unwrap_or(defaults.file_extension);

        if file_extension.is_empty() {
            return Err(Error::Config(
                "PROMPARQ_FILE_EXTENSION cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            data_dir,
            file_extension,
        })
    }

    pub fn build(&self) -> PartitionResolver {
        PartitionResolver::new(&self.data_dir).with_file_extension(self.file_extension.as_str())
    }
}

impl QueryConfig {
    /// Read query settings from the environment
    ///
    /// Environment variables:
    /// - PROMPARQ_CACHE_TTL_SECS: result cache TTL; 0 disables the cache (default: 300)
    /// - PROMPARQ_CACHE_MAX_ENTRIES: result cache capacity (default: 64)
    pub fn from_env() -> Result<Self> {
        let defaults = CacheConfig::default();
        let ttl_secs = parse_u64_env("PROMPARQ_CACHE_TTL_SECS")?.unwrap_or(defaults.ttl.as_secs());
        let max_entries = parse_u64_env("PROMPARQ_CACHE_MAX_ENTRIES")?.unwrap_or(defaults.max_entries);

        let cache = (ttl_secs > 0 && max_entries > 0).then(|| CacheConfig {
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        });
        Ok(Self { cache })
    }
}

/// Build a query service from the environment
pub fn service_from_env() -> Result<MetricsQueryService> {
    let resolver = ResolverConfig::from_env()?;
    let query = QueryConfig::from_env()?;

    info!(
        data_dir = %resolver.data_dir.display(),
        file_extension = %resolver.file_extension,
        cache_enabled = query.cache.is_some(),
        "Configured metrics query service"
    );

    Ok(MetricsQueryService::new(resolver.build(), query))
}

fn parse_u64_env(name: &str) -> Result<Option<u64>> {
    let Some(raw) = std::env::var(name).ok() else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name} must be a non-negative integer, got '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_parquet_data_dir() {
        let config = ResolverConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.file_extension, "parquet");
        assert_eq!(config.build().file_extension(), "parquet");
    }

    #[test]
    fn parse_u64_env_rejects_garbage() {
        std::env::set_var("PROMPARQ_TEST_PARSE_U64", "ten");
        let err = parse_u64_env("PROMPARQ_TEST_PARSE_U64").unwrap_err();
        assert!(format!("{err}").contains("non-negative integer"));

        std::env::set_var("PROMPARQ_TEST_PARSE_U64", " 42 ");
        assert_eq!(parse_u64_env("PROMPARQ_TEST_PARSE_U64").unwrap(), Some(42));

        std::env::remove_var("PROMPARQ_TEST_PARSE_U64");
        assert_eq!(parse_u64_env("PROMPARQ_TEST_PARSE_U64").unwrap(), None);
    }
}
