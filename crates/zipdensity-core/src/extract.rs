//! Density figure extraction.
//!
//! The reference page format is not stable, so extraction is an ordered list
//! of patterns tried until one yields a number. The first two are fixed:
//!
//! 1. the prose sentence "population density of `N` people per square mile";
//! 2. a labeled table cell, `<td>Population Density:</td><td>N</td>`.
//!
//! Further fallbacks can be appended with [`DensityExtractor::with_pattern`].
//! A miss is a normal outcome, not an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;
use crate::models::DensityMatch;

/// Number with optional thousands separators and fraction: `1,234.5`.
const NUMBER: &str = r"(?P<number>\d[\d,]*(?:\.\d+)?)";

/// A named regex with a `number` capture group.
///
/// If the pattern also has a `text` group, that becomes the match's
/// `full_text`; otherwise the whole match is used.
#[derive(Debug, Clone)]
pub struct DensityPattern {
    name: &'static str,
    regex: Regex,
}

impl DensityPattern {
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, AppError> {
        let regex = Regex::new(pattern)
            .map_err(|e| AppError::ConfigError(format!("invalid pattern '{name}': {e}")))?;
        if regex.capture_names().flatten().all(|n| n != "number") {
            return Err(AppError::ConfigError(format!(
                "pattern '{name}' has no 'number' capture group"
            )));
        }
        Ok(Self { name, regex })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, text: &str) -> Option<DensityMatch> {
        for caps in self.regex.captures_iter(text) {
            let Some(density) = caps.name("number").and_then(|m| parse_number(m.as_str())) else {
                continue;
            };
            let full_text = caps
                .name("text")
                .or_else(|| caps.get(0))
                .map(|m| collapse_whitespace(&strip_tags(m.as_str())))
                .unwrap_or_default();
            return Some(DensityMatch { density, full_text });
        }
        None
    }
}

fn sentence_pattern() -> &'static DensityPattern {
    static PATTERN: OnceLock<DensityPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let pattern = format!(
            r"(?i)(?P<text>[^.<>]*population\s+density\s+of\s+{NUMBER}\s+people\s+per\s+square\s+mile[^.<>]*\.?)"
        );
        DensityPattern::new("sentence", &pattern).expect("sentence pattern is valid")
    })
}

fn table_cell_pattern() -> &'static DensityPattern {
    static PATTERN: OnceLock<DensityPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let pattern = format!(
            r"(?is)(?P<text><td[^>]*>\s*(?:<[^>]+>\s*)*population\s+density[^<]*(?:<[^>]+>\s*)*</td>\s*<td[^>]*>\s*(?:<[^>]+>\s*)*{NUMBER})"
        );
        DensityPattern::new("table_cell", &pattern).expect("table cell pattern is valid")
    })
}

/// Tries its patterns in order and returns the first figure found.
#[derive(Debug, Clone)]
pub struct DensityExtractor {
    patterns: Vec<DensityPattern>,
}

impl DensityExtractor {
    /// The sentence pattern followed by the table-cell fallback.
    pub fn new() -> Self {
        Self {
            patterns: vec![sentence_pattern().clone(), table_cell_pattern().clone()],
        }
    }

    /// Append another fallback, tried after all existing patterns.
    pub fn with_pattern(mut self, pattern: DensityPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn find(&self, text: &str) -> Option<DensityMatch> {
        self.patterns.iter().find_map(|pattern| {
            let found = pattern.find(text)?;
            tracing::trace!(pattern = pattern.name(), density = found.density, "Density matched");
            Some(found)
        })
    }

    pub fn extract(&self, text: &str) -> Option<f64> {
        self.find(text).map(|m| m.density)
    }
}

impl Default for DensityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the density figure from page text with the default patterns.
pub fn extract(text: &str) -> Option<f64> {
    find_density(text).map(|m| m.density)
}

/// Like [`extract`], but also returns the text the figure was found in.
pub fn find_density(text: &str) -> Option<DensityMatch> {
    sentence_pattern()
        .find(text)
        .or_else(|| table_cell_pattern().find(text))
}

/// Strip thousands separators and parse. `None` for anything not a finite,
/// non-negative number.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
