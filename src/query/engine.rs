//! DataFusion query engine integration

use super::descriptor::QueryDescriptor;
use crate::partition::DEFAULT_FILE_EXTENSION;
use crate::schema::{RESULT_COLUMNS, TIMESTAMP_FIELD};
use crate::Result;

use arrow_array::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::*;
use tracing::debug;

/// Query engine powered by DataFusion
#[derive(Clone)]
pub struct QueryEngine {
    /// DataFusion session context
    ctx: SessionContext,
    /// Extension of scanned files, with the leading dot
    file_extension: String,
}

impl QueryEngine {
    /// Create a new query engine
    pub fn new() -> Self {
        let session_config = SessionConfig::new()
            .with_batch_size(8192)
            .with_target_partitions(num_cpus::get())
            .with_information_schema(true)
            .with_parquet_pruning(true)
            .with_collect_statistics(true);

        Self {
            ctx: SessionContext::new_with_config(session_config),
            file_extension: format!(".{}", DEFAULT_FILE_EXTENSION),
        }
    }

    /// Scan files with a different extension (without the leading dot)
    pub fn with_file_extension(mut self, extension: &str) -> Self {
        self.file_extension = format!(".{}", extension.trim_start_matches('.'));
        self
    }

    /// Execute a descriptor and collect its record batches
    pub async fn execute(&self, descriptor: &QueryDescriptor) -> Result<Vec<RecordBatch>> {
        let df = self
            .scan(descriptor)
            .await?
            .filter(descriptor.predicate())?
            .select_columns(&RESULT_COLUMNS)?
            .sort(vec![col(TIMESTAMP_FIELD).sort(true, false)])?;

        let batches = df.collect().await?;
        debug!(
            files = descriptor.files().len(),
            batches = batches.len(),
            "Executed metrics query"
        );
        Ok(batches)
    }

    /// Register the descriptor's files as a named table for ad-hoc SQL.
    ///
    /// Any table previously registered under `name` is replaced.
    pub async fn register_files(&self, name: &str, descriptor: &QueryDescriptor) -> Result<()> {
        let df = self.scan(descriptor).await?;
        self.ctx.deregister_table(name)?;
        self.ctx.register_table(name, df.into_view())?;
        Ok(())
    }

    /// Execute a SQL query
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        let batches = df.collect().await?;
        Ok(batches)
    }

    /// Get the session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    async fn scan(&self, descriptor: &QueryDescriptor) -> Result<DataFrame> {
        let paths: Vec<String> = descriptor
            .files()
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        let options = ParquetReadOptions {
            file_extension: &self.file_extension,
            ..Default::default()
        };
        Ok(self.ctx.read_parquet(paths, options).await?)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation() {
        let engine = QueryEngine::new();
        assert_eq!(engine.file_extension, ".parquet");
        assert!(engine.context().state().config().information_schema());
    }

    #[test]
    fn test_file_extension_normalized() {
        let engine = QueryEngine::new().with_file_extension(".pq");
        assert_eq!(engine.file_extension, ".pq");
    }
}
