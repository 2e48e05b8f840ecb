//! Partition discovery and file resolution

use super::{PartitionDate, PartitionKey, PartitionSegment, DEFAULT_FILE_EXTENSION};

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolves partitions and data files below a dataset root.
///
/// Every call walks the filesystem again; nothing is indexed or cached here.
/// Missing directories are treated as empty and never surface as errors.
#[derive(Debug, Clone)]
pub struct PartitionResolver {
    root: PathBuf,
    file_extension: String,
}

impl PartitionResolver {
    /// Create a resolver for the given root directory.
    ///
    /// A relative root is anchored to the current directory so resolved
    /// file paths are absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }

    /// Override the recognized data file extension (without the leading dot)
    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// List every `YYYY-MM-DD` with a complete `year=/month=/day=` path,
    /// most recent first.
    pub fn list_available_dates(&self) -> Vec<String> {
        let mut dates = BTreeSet::new();

        for (year, year_path) in partition_children(&self.root) {
            let PartitionSegment::Year(year) = year else {
                continue;
            };
            for (month, month_path) in partition_children(&year_path) {
                let PartitionSegment::Month(month) = month else {
                    continue;
                };
                for (day, _) in partition_children(&month_path) {
                    let PartitionSegment::Day(day) = day else {
                        continue;
                    };
                    dates.insert(PartitionDate::new(year.as_str(), month.as_str(), day).to_string());
                }
            }
        }

        debug!(root = %self.root.display(), count = dates.len(), "Listed available dates");
        dates.into_iter().rev().collect()
    }

    /// List the distinct application names present under the given dates,
    /// sorted ascending.
    pub fn list_available_applications<S: AsRef<str>>(&self, dates: &[S]) -> Vec<String> {
        let mut applications = BTreeSet::new();

        for date in dates {
            let Some(date) = PartitionDate::parse(date.as_ref()) else {
                debug!(date = date.as_ref(), "Skipping date that is not YYYY-MM-DD");
                continue;
            };
            let day_path = self.root.join(date.relative_path());
            for (segment, _) in partition_children(&day_path) {
                if let PartitionSegment::App(app) = segment {
                    applications.insert(app);
                }
            }
        }

        applications.into_iter().collect()
    }

    /// Resolve the data files for every (date, application) pair.
    ///
    /// Order is date-major, then application, then directory listing order.
    /// An empty result means "no data" and must not be queried.
    pub fn resolve_files<S, A>(&self, dates: &[S], applications: &[A]) -> Vec<PathBuf>
    where
        S: AsRef<str>,
        A: AsRef<str>,
    {
        let mut files = Vec::new();

        for date in dates {
            let Some(date) = PartitionDate::parse(date.as_ref()) else {
                continue;
            };
            for application in applications {
                let key = PartitionKey::new(date.clone(), application.as_ref());
                let leaf = self.root.join(key.relative_path());
                if !leaf.is_dir() {
                    continue;
                }
                files.extend(self.data_files(&leaf));
            }
        }

        debug!(
            root = %self.root.display(),
            dates = dates.len(),
            applications = applications.len(),
            files = files.len(),
            "Resolved partition files"
        );
        files
    }

    fn data_files(&self, leaf: &Path) -> Vec<PathBuf> {
        let extension = OsStr::new(&self.file_extension);
        read_entries(leaf)
            .into_iter()
            .filter(|path| path.is_file() && path.extension() == Some(extension))
            .collect()
    }
}

/// Child directories of `dir` that parse as partition segments
fn partition_children(dir: &Path) -> Vec<(PartitionSegment, PathBuf)> {
    read_entries(dir)
        .into_iter()
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let segment = path.file_name()?.to_str().and_then(PartitionSegment::parse)?;
            Some((segment, path))
        })
        .collect()
}

fn read_entries(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to read partition directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Failed to read directory entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempdir().unwrap();
        let resolver = PartitionResolver::new(dir.path().join("does-not-exist"));

        assert!(resolver.list_available_dates().is_empty());
        assert!(resolver.list_available_applications(&["2025-04-07"]).is_empty());
        assert!(resolver.resolve_files(&["2025-04-07"], &["checkout"]).is_empty());
    }

    #[test]
    fn dates_skip_incomplete_and_foreign_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("year=2025/month=04/day=07")).unwrap();
        fs::create_dir_all(root.join("year=2025/month=05")).unwrap();
        fs::create_dir_all(root.join("year=2025/notes/day=01")).unwrap();
        fs::create_dir_all(root.join("2024/month=01/day=01")).unwrap();
        touch(&root.join("year=2025/month=04/day=09"));

        let resolver = PartitionResolver::new(root);
        assert_eq!(resolver.list_available_dates(), vec!["2025-04-07".to_string()]);
    }

    #[test]
    fn dates_are_distinct_and_descending() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for path in [
            "year=2024/month=12/day=31",
            "year=2025/month=01/day=02",
            "year=2025/month=01/day=01",
        ] {
            fs::create_dir_all(root.join(path).join("app=a")).unwrap();
            fs::create_dir_all(root.join(path).join("app=b")).unwrap();
        }

        let resolver = PartitionResolver::new(root);
        assert_eq!(
            resolver.list_available_dates(),
            vec!["2025-01-02", "2025-01-01", "2024-12-31"]
        );
    }

    #[test]
    fn custom_extension_is_respected() {
        let dir = tempdir().unwrap();
        let leaf = dir.path().join("year=2025/month=04/day=07/app=checkout");
        touch(&leaf.join("a.parquet"));
        touch(&leaf.join("b.pq"));

        let resolver = PartitionResolver::new(dir.path()).with_file_extension(".pq");
        let files = resolver.resolve_files(&["2025-04-07"], &["checkout"]);
        assert_eq!(files, vec![leaf.join("b.pq")]);
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let resolver = PartitionResolver::new("data");
        assert!(resolver.root().is_absolute());
    }
}
