use crate::parsing::uue::UueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Too many requests (retry after {retry_after:?})")]
    TooManyRequests {
        retry_after: Option<std::time::Duration>,
    },

    #[error("Server error: {0}")]
    ServerError(reqwest::StatusCode),

    #[error("Interrupted")]
    Interrupted,

    #[error("Invalid year: must be 1994 or greater")]
    InvalidYear,

    #[error("Invalid quarter: must be between 1 and 4")]
    InvalidQuarter,

    #[error("Invalid month: must be between 1 and 12")]
    InvalidMonth,

    #[error("Invalid day: not a valid calendar date")]
    InvalidDay,

    #[error("Invalid year: must be 2005 or greater for XBRL")]
    InvalidXBRLYear,

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Invalid accession number: {0}")]
    InvalidAccession(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("No index data could be parsed from {0} input(s)")]
    NoIndexData(usize),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("UU decoding error: {0}")]
    Uue(#[from] UueError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

impl EdgarError {
    /// Whether the fetch client should try the request again.
    ///
    /// Only transient conditions qualify: timeouts, connection failures, 5xx and 429
    /// responses. Everything else (404, other 4xx, local I/O, interrupts) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            EdgarError::RequestError(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            EdgarError::ServerError(_) | EdgarError::TooManyRequests { .. } => true,
            _ => false,
        }
    }
}

#[cfg(feature = "xbrl-feed")]
impl From<quick_xml::DeError> for EdgarError {
    fn from(error: quick_xml::DeError) -> Self {
        EdgarError::XmlError(error.to_string())
    }
}

#[cfg(feature = "xbrl-feed")]
impl From<quick_xml::Error> for EdgarError {
    fn from(error: quick_xml::Error) -> Self {
        EdgarError::XmlError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EdgarError>;
