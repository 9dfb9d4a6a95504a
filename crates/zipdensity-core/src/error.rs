use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for zipdensity.
#[derive(Error, Debug)]
pub enum AppError {
    /// Input does not normalize to a 5-digit or ZIP+4 code.
    #[error("invalid zip code: {0:?}")]
    InvalidZipFormat(String),

    /// Tabular input lacks the required zip code column.
    #[error("input must have a '{0}' column (case-insensitive)")]
    MissingColumn(String),

    /// Reading or writing CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value is out of range or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Transport-level failure for a single page fetch.
///
/// Never escapes a batch: the processor folds it into the record's status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The source answered with a non-2xx status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// DNS, connect, reset, or body read failure.
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// True when the source has no page for the zip code (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::HttpStatus { status: 404, .. })
    }

    /// True if a later attempt could plausibly succeed.
    ///
    /// Nothing retries automatically; this only picks the log level for
    /// failed lookups.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
