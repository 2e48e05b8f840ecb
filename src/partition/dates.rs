//! Consumer-side date selection
//!
//! Turns "today", "last N days", an explicit range or a list into the
//! `YYYY-MM-DD` strings the resolver works with.

use crate::{Error, Result};

use chrono::{Days, NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a caller picks the dates to query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    /// The current UTC day
    Today,
    /// A single date string, passed through literally
    Single(String),
    /// An explicit list, passed through literally and in order
    Explicit(Vec<String>),
    /// Every day from `start` through `end`, inclusive
    Range { start: NaiveDate, end: NaiveDate },
    /// `today - days` through `today`, inclusive
    LastDays { days: u32, today: NaiveDate },
}

impl DateSelection {
    /// The last `days` days ending at the current UTC day
    pub fn last_days(days: u32) -> Self {
        Self::LastDays {
            days,
            today: Utc::now().date_naive(),
        }
    }

    /// Expand into date strings, oldest first for ranges
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Self::Today => vec![format_date(Utc::now().date_naive())],
            Self::Single(date) => vec![date.clone()],
            Self::Explicit(dates) => dates.clone(),
            Self::Range { start, end } => expand_range(*start, *end),
            Self::LastDays { days, today } => {
                match today.checked_sub_days(Days::new(u64::from(*days))) {
                    Some(start) => expand_range(start, *today),
                    None => Vec::new(),
                }
            }
        }
    }
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| Error::Config(format!("invalid date '{raw}', expected YYYY-MM-DD: {e}")))
}

/// Keep only the requested dates that have data, preserving request order
pub fn retain_available(requested: Vec<String>, available: &[String]) -> Vec<String> {
    requested
        .into_iter()
        .filter(|date| available.contains(date))
        .collect()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn expand_range(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(format_date)
        .collect()
}
