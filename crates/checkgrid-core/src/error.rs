use chrono::NaiveDate;
use thiserror::Error;

/// Why a dynamic question source produced nothing to render.
///
/// Every variant is recovered by the session, which falls back to the
/// configured question list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source responded with HTTP {status}")]
    Http { status: u16 },

    #[error("source could not be reached: {0}")]
    Network(String),

    #[error("source returned an empty body")]
    EmptyBody,

    #[error("no questions parsed from CSV")]
    NoRows,

    #[error("source was requested but no response was supplied")]
    NotFetched,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a load is already in flight")]
    LoadInFlight,

    #[error("no rendered row at index {index} (table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("option '{option}' is not offered for row {index}")]
    OptionNotOffered { index: usize, option: String },

    #[error("'{0}' is not a YYYY-MM-DD date")]
    InvalidDate(String),

    #[error("{date} is after the latest allowed date {max} for row {index}")]
    DateAfterMax {
        index: usize,
        date: NaiveDate,
        max: NaiveDate,
    },

    #[error("the table has not finished loading")]
    NotReady,
}

/// A persisted submission value that cannot be restored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistedError {
    #[error("persisted value is not valid JSON: {0}")]
    Json(String),

    #[error("persisted value is not an array of answers: {0}")]
    Shape(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
