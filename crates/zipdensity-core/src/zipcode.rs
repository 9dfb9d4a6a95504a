//! Zip code canonicalization and validation.
//!
//! Malformed input is a value, not a failure: [`normalize`] never errors and
//! returns shapes it does not recognise unchanged. Only [`ZipCode::parse`]
//! rejects them, which is the gate every fetch goes through.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;

fn valid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern is valid"))
}

/// Canonicalize a raw zip code.
///
/// Trims surrounding whitespace and restores the leading zero that numeric
/// spreadsheets drop: `"1234"` becomes `"01234"` and `"1234-5678"` becomes
/// `"01234-5678"`. Everything else is returned trimmed but otherwise as-is.
/// Idempotent.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let (head, tail) = match trimmed.split_once('-') {
        Some((head, tail)) => (head, Some(tail)),
        None => (trimmed, None),
    };

    let head_is_four_digits = head.len() == 4 && head.bytes().all(|b| b.is_ascii_digit());
    let tail_ok = match tail {
        None => true,
        Some(t) => t.len() == 4 && t.bytes().all(|b| b.is_ascii_digit()),
    };

    if head_is_four_digits && tail_ok {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// True iff `code` is a 5-digit zip code, optionally with a `-dddd` suffix.
pub fn is_valid(code: &str) -> bool {
    valid_pattern().is_match(code)
}

/// A normalized, validated zip code.
///
/// Only constructible through [`ZipCode::parse`], so anything holding one
/// has already passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZipCode(String);

impl ZipCode {
    /// Normalize `raw` and accept it if the result is valid.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let normalized = normalize(raw);
        if is_valid(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(AppError::InvalidZipFormat(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
