//! Error and warning types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to obtain a response from the query backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Backend response is not JSON (content-type: {content_type})")]
    NotJson { content_type: String },

    #[error("Failed to decode backend response: {reason}")]
    Decode { reason: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Request timed out")]
    Timeout,
}

/// Invalid calendar range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("Invalid date '{value}' (expected YYYY-MM-DD): {reason}")]
    Parse { value: String, reason: String },
}

/// Which backend query a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Quartiles,
    DailyMetric,
    DailyQuartilePosition,
}

/// Non-fatal conditions reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// No agent matched the active filter.
    EmptyPopulation,
    /// A row was missing fields or carried unusable values and was skipped.
    MalformedRecord {
        source: RowSource,
        index: usize,
        reason: String,
    },
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestWarning::EmptyPopulation => f.write_str("No agents matched the active filter"),
            IngestWarning::MalformedRecord {
                source,
                index,
                reason,
            } => write!(f, "Skipped malformed {:?} row #{}: {}", source, index, reason),
        }
    }
}
