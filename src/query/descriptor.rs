//! Engine-independent query descriptors
//!
//! A descriptor names the files to scan as one relation, the optional
//! `api_proxy` / `metric_name` filters and the fixed ascending timestamp
//! order. It never executes anything itself.

use crate::schema::{MetricRow, API_PROXY_FIELD, METRIC_NAME_FIELD, RESULT_COLUMNS, TIMESTAMP_FIELD};
use crate::{Error, Result};

use datafusion::prelude::{col, lit, Expr};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// What to scan, how to filter it and how to order it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    files: Vec<PathBuf>,
    application: Option<String>,
    metric_names: Option<BTreeSet<String>>,
}

/// Build a descriptor over `files`.
///
/// Filters are ANDed; a filter that is not given never excludes a row. An
/// empty metric-name set counts as not given. An empty file list is
/// [`Error::NoData`]: callers must report "no data" instead of querying.
pub fn build_query<I, S>(
    files: Vec<PathBuf>,
    metric_names: Option<I>,
    application: Option<&str>,
) -> Result<QueryDescriptor>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    if files.is_empty() {
        return Err(Error::NoData);
    }

    let metric_names = metric_names
        .map(|names| names.into_iter().map(Into::into).collect::<BTreeSet<String>>())
        .filter(|names| !names.is_empty());

    Ok(QueryDescriptor {
        files,
        application: application.map(str::to_string),
        metric_names,
    })
}

impl QueryDescriptor {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn metric_names(&self) -> Option<&BTreeSet<String>> {
        self.metric_names.as_ref()
    }

    /// Filter predicate as a DataFusion expression; `true` when unfiltered
    pub fn predicate(&self) -> Expr {
        let mut conjuncts = Vec::new();
        if let Some(application) = &self.application {
            conjuncts.push(col(API_PROXY_FIELD).eq(lit(application.as_str())));
        }
        if let Some(names) = &self.metric_names {
            let list = names.iter().map(|name| lit(name.as_str())).collect();
            conjuncts.push(col(METRIC_NAME_FIELD).in_list(list, false));
        }

        conjuncts
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or_else(|| lit(true))
    }

    /// Evaluate the filter against a single materialized row
    pub fn matches(&self, row: &MetricRow) -> bool {
        let application_ok = self
            .application
            .as_deref()
            .map_or(true, |app| row.api_proxy == app);
        let metric_ok = self
            .metric_names
            .as_ref()
            .map_or(true, |names| names.contains(&row.metric_name));
        application_ok && metric_ok
    }

    /// Render as SQL over an already registered relation.
    ///
    /// Identifiers are double-quoted and string literals have embedded
    /// single quotes doubled.
    pub fn to_sql(&self, relation: &str) -> String {
        let columns = RESULT_COLUMNS
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conditions = Vec::new();
        if let Some(application) = &self.application {
            conditions.push(format!(
                "{} = {}",
                quote_ident(API_PROXY_FIELD),
                quote_literal(application)
            ));
        }
        if let Some(names) = &self.metric_names {
            let list = names
                .iter()
                .map(|name| quote_literal(name))
                .collect::<Vec<_>>()
                .join(", ");
            conditions.push(format!("{} IN ({})", quote_ident(METRIC_NAME_FIELD), list));
        }

        let mut sql = format!("SELECT {} FROM {}", columns, quote_ident(relation));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {} ASC", quote_ident(TIMESTAMP_FIELD)));
        sql
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
