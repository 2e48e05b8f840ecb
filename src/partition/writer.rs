//! Parquet writer for the partitioned metrics layout

use super::PartitionKey;
use crate::schema::{MetricBatchBuilder, MetricRow};
use crate::{Error, Result};

use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes metric rows into `<root>/<partition>/<file>.parquet`
pub struct PartitionWriter {
    root: PathBuf,
    props: WriterProperties,
}

impl PartitionWriter {
    /// Create a writer with snappy compression
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            props: Self::build_writer_properties(Compression::SNAPPY, 1024 * 1024),
        }
    }

    /// Use a named codec: snappy, gzip, lz4, zstd or none
    pub fn with_compression(mut self, codec: &str) -> Result<Self> {
        let compression = parse_compression(codec)?;
        self.props = Self::build_writer_properties(compression, self.props.max_row_group_size());
        Ok(self)
    }

    fn build_writer_properties(compression: Compression, max_row_group_size: usize) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(compression)
            .set_dictionary_enabled(true)
            .set_max_row_group_size(max_row_group_size)
            // Min/max on timestamp and metric_name let the engine prune row groups
            .set_statistics_enabled(EnabledStatistics::Page)
            .build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `rows` as one file in the leaf partition for `key`.
    ///
    /// Creates missing partition directories and overwrites an existing file
    /// of the same name.
    pub fn write(&self, key: &PartitionKey, file_name: &str, rows: &[MetricRow]) -> Result<PathBuf> {
        if rows.is_empty() {
            return Err(Error::InvalidSchema("No rows to write".into()));
        }

        let dir = self.root.join(key.relative_path());
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);

        let mut builder = MetricBatchBuilder::new();
        for row in rows {
            builder.append(row)?;
        }
        let batch = builder.finish()?;

        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.props.clone()))?;
        writer.write(&batch)?;
        writer.close()?;

        debug!(path = %path.display(), rows = rows.len(), "Wrote metrics file");
        Ok(path)
    }
}

fn parse_compression(codec: &str) -> Result<Compression> {
    match codec.trim().to_ascii_lowercase().as_str() {
        "snappy" => Ok(Compression::SNAPPY),
        "gzip" => Ok(Compression::GZIP(GzipLevel::default())),
        "lz4" => Ok(Compression::LZ4_RAW),
        "zstd" => Ok(Compression::ZSTD(ZstdLevel::default())),
        "none" | "uncompressed" => Ok(Compression::UNCOMPRESSED),
        other => Err(Error::Config(format!(
            "unknown compression '{other}', expected one of [snappy, gzip, lz4, zstd, none]"
        ))),
    }
}
