use crate::types::{Dataset, Record};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

const MIN_YEAR: i32 = 2020;
const MAX_YEAR: i32 = 2025;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("{field} must be a date in YYYY-MM-DD format, got '{value}'")]
    InvalidFormat { field: &'static str, value: String },
    #[error("{field} year {year} is outside {MIN_YEAR}-{MAX_YEAR}")]
    YearOutOfRange { field: &'static str, year: i32 },
    #[error("fecha_inicio {start} is after fecha_fin {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("limit must be a non-negative integer, got '{0}'")]
pub struct InvalidLimit(pub String);

/// A blank `limit` means "use the default"; anything else must parse.
pub fn parse_limit(value: &Option<String>) -> Result<Option<usize>, InvalidLimit> {
    non_empty(value)
        .map(|v| v.parse::<usize>().map_err(|_| InvalidLimit(v.to_string())))
        .transpose()
}

/// Query-string filter parameters as they arrive over HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub categoria: Option<String>,
    pub urgencia: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub limit: Option<String>,
}

/// Validated predicates. Every `None` is "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bound(field: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>, DateRangeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DateRangeError::InvalidFormat { field, value: value.to_string() })?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(DateRangeError::YearOutOfRange { field, year: date.year() });
    }
    Ok(Some(date))
}

impl FilterParams {
    pub fn validate(&self) -> Result<RecordFilter, DateRangeError> {
        let start = parse_bound("fecha_inicio", non_empty(&self.fecha_inicio))?;
        let end = parse_bound("fecha_fin", non_empty(&self.fecha_fin))?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DateRangeError::StartAfterEnd { start, end });
            }
        }
        Ok(RecordFilter {
            category: non_empty(&self.categoria).map(str::to_string),
            urgency: non_empty(&self.urgencia).map(str::to_string),
            start,
            end,
        })
    }

    pub fn limit(&self) -> Result<Option<usize>, InvalidLimit> {
        parse_limit(&self.limit)
    }
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.urgency.is_none() && self.start.is_none() && self.end.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(category) = &self.category {
            if record.category != *category {
                return false;
            }
        }
        if let Some(urgency) = &self.urgency {
            if record.urgency.label() != urgency {
                return false;
            }
        }
        if self.start.is_some() || self.end.is_some() {
            let Some(date) = record.date else {
                return false;
            };
            if self.start.map_or(false, |s| date < s) || self.end.map_or(false, |e| date > e) {
                return false;
            }
        }
        true
    }

    /// The matching subset, in dataset order. Extra columns carry over.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        Dataset {
            records: dataset.records.iter().filter(|r| self.matches(r)).cloned().collect(),
            extra_columns: dataset.extra_columns.clone(),
        }
    }
}
