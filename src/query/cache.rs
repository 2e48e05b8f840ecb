//! Result cache keyed by the exact request tuple
//!
//! Entries expire after a fixed time-to-live; [`ResultCache::refresh`] drops
//! everything immediately. Failed loads are never cached.

use super::QueryOutcome;
use crate::{Error, Result};

use moka::future::Cache;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid after it is loaded
    pub ttl: Duration,
    /// Maximum number of cached results
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 64,
        }
    }
}

/// Exact input tuple of one query. Order of dates and applications matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub root: PathBuf,
    /// Data file extension the resolver recognizes
    pub file_extension: String,
    pub dates: Vec<String>,
    pub applications: Vec<String>,
    pub metrics: Option<Vec<String>>,
    pub application_filter: Option<String>,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes query outcomes
pub struct ResultCache {
    entries: Cache<QueryKey, QueryOutcome>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached outcome for `key`, running `load` on a miss.
    ///
    /// Concurrent callers for the same key share one load.
    pub async fn get_or_load<F, Fut>(&self, key: QueryKey, load: F) -> Result<QueryOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<QueryOutcome>>,
    {
        let entry = self
            .entries
            .entry(key)
            .or_try_insert_with(load())
            .await
            .map_err(unshare)?;

        if entry.is_fresh() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(entry.into_value())
    }

    /// Invalidate every entry
    pub fn refresh(&self) {
        self.entries.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Recover the loader error, or describe it if another waiter still holds it
fn unshare(error: Arc<Error>) -> Error {
    Arc::try_unwrap(error).unwrap_or_else(|shared| Error::Cache(shared.to_string()))
}
