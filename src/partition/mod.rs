//! Hive-style partition layout for metrics files
//!
//! Metrics are laid out on disk as
//! `<root>/year=YYYY/month=MM/day=DD/app=<name>/*.parquet`. This module parses
//! those `key=value` directory names into structured keys and walks the tree
//! to discover dates, applications and data files.
//!
//! Values are trusted literally: `month=4` and `month=04` are different
//! partitions and nothing here reformats or range-checks them.

mod dates;
mod resolver;
mod writer;

pub use dates::{parse_date, retain_available, DateSelection};
pub use resolver::PartitionResolver;
pub use writer::PartitionWriter;

use std::fmt;
use std::path::PathBuf;

/// Directory-name prefix keys, in nesting order
pub const YEAR_KEY: &str = "year";
pub const MONTH_KEY: &str = "month";
pub const DAY_KEY: &str = "day";
pub const APP_KEY: &str = "app";

/// Default extension of metrics files at a leaf partition
pub const DEFAULT_FILE_EXTENSION: &str = "parquet";

/// One parsed `key=value` path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionSegment {
    Year(String),
    Month(String),
    Day(String),
    App(String),
}

impl PartitionSegment {
    /// Parse a directory name into a segment.
    ///
    /// Returns `None` for anything that is not a partition: unknown keys,
    /// names without `=`, or an empty value.
    pub fn parse(name: &str) -> Option<Self> {
        let (key, value) = name.split_once('=')?;
        if value.is_empty() {
            return None;
        }
        let value = value.to_string();
        match key {
            YEAR_KEY => Some(Self::Year(value)),
            MONTH_KEY => Some(Self::Month(value)),
            DAY_KEY => Some(Self::Day(value)),
            APP_KEY => Some(Self::App(value)),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Year(_) => YEAR_KEY,
            Self::Month(_) => MONTH_KEY,
            Self::Day(_) => DAY_KEY,
            Self::App(_) => APP_KEY,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Year(v) | Self::Month(v) | Self::Day(v) | Self::App(v) => v,
        }
    }

    /// Directory name for this segment (`key=value`)
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value())
    }
}

/// Calendar date of a partition, kept as the literal on-disk strings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionDate {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl PartitionDate {
    pub fn new(year: impl Into<String>, month: impl Into<String>, day: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            month: month.into(),
            day: day.into(),
        }
    }

    /// Decompose a `YYYY-MM-DD` string.
    ///
    /// Splits on the first two dashes only; returns `None` if any part is
    /// missing or empty.
    pub fn parse(date: &str) -> Option<Self> {
        let mut parts = date.splitn(3, '-');
        let year = parts.next().filter(|p| !p.is_empty())?;
        let month = parts.next().filter(|p| !p.is_empty())?;
        let day = parts.next().filter(|p| !p.is_empty())?;
        Some(Self::new(year, month, day))
    }

    /// Path of the day partition relative to the dataset root
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(PartitionSegment::Year(self.year.clone()).dir_name());
        path.push(PartitionSegment::Month(self.month.clone()).dir_name());
        path.push(PartitionSegment::Day(self.day.clone()).dir_name());
        path
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

/// Full partition key of a leaf directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub date: PartitionDate,
    pub application: String,
}

impl PartitionKey {
    pub fn new(date: PartitionDate, application: impl Into<String>) -> Self {
        Self {
            date,
            application: application.into(),
        }
    }

    /// Path of the leaf partition relative to the dataset root
    pub fn relative_path(&self) -> PathBuf {
        let mut path = self.date.relative_path();
        path.push(PartitionSegment::App(self.application.clone()).dir_name());
        path
    }
}
