use std::fmt;

use serde::Serialize;

use crate::decode::{DecodedText, decode_page};
use crate::error::FetchError;

/// Raw payload of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub bytes: Vec<u8>,
    /// Charset label from the response's `Content-Type`, if any.
    pub declared_charset: Option<String>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            bytes: bytes.into(),
            declared_charset: None,
        }
    }

    pub fn with_declared_charset(mut self, charset: impl Into<String>) -> Self {
        self.declared_charset = Some(charset.into());
        self
    }

    /// Decode the payload through the fallback chain. Never fails.
    pub fn decode(&self) -> DecodedText {
        decode_page(&self.bytes, self.declared_charset.as_deref())
    }
}

/// Result of fetching one page: the payload or a tagged transport failure.
pub type FetchOutcome = Result<FetchedPage, FetchError>;

/// A density figure located in page text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityMatch {
    /// People per square mile.
    pub density: f64,
    /// The sentence or cell text the figure came from.
    pub full_text: String,
}

/// Terminal state of one zip code lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RecordStatus {
    Found,
    NotFound,
    Error(String),
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Found => "found",
            RecordStatus::NotFound => "not_found",
            RecordStatus::Error(_) => "error",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Marker written to the density column when no figure was found.
pub const NOT_FOUND_MARKER: &str = "Not Found";

/// Outcome of resolving one input.
///
/// `zipcode` holds the normalized form, even when it failed validation, so
/// the caller can see what was actually looked up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityRecord {
    pub zipcode: String,
    pub full_text: Option<String>,
    pub density: Option<f64>,
    #[serde(flatten)]
    pub status: RecordStatus,
}

impl DensityRecord {
    pub fn found(zipcode: impl Into<String>, found: DensityMatch) -> Self {
        Self {
            zipcode: zipcode.into(),
            full_text: Some(found.full_text),
            density: Some(found.density),
            status: RecordStatus::Found,
        }
    }

    pub fn not_found(zipcode: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
            full_text: None,
            density: None,
            status: RecordStatus::NotFound,
        }
    }

    pub fn error(zipcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
            full_text: None,
            density: None,
            status: RecordStatus::Error(message.into()),
        }
    }

    /// Value for the density column. Never empty.
    pub fn density_cell(&self) -> String {
        match (&self.status, self.density) {
            (RecordStatus::Found, Some(density)) => density.to_string(),
            (RecordStatus::Error(message), _) => format!("Error: {message}"),
            _ => NOT_FOUND_MARKER.to_string(),
        }
    }
}
