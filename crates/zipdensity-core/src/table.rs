//! Tabular input and output.
//!
//! A [`Table`] is a CSV file held as strings: headers plus rows, every
//! column passed through untouched. [`aggregate`] appends the lookup
//! results as new columns without reordering or dropping anything.

use std::io::{Read, Write};

use crate::batch::{BatchResult, BatchSummary};
use crate::error::AppError;

/// Name of the required input column, matched case-insensitively.
pub const ZIPCODE_COLUMN: &str = "zipcode";

/// Output column holding the matched sentence.
pub const FULL_TEXT_COLUMN: &str = "Full Text";

/// Output column holding the density, `Not Found`, or an error description.
pub const DENSITY_COLUMN: &str = "Population Density";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a CSV with a header row. Short rows are padded with empty cells;
    /// long rows keep their extra cells. Headers are kept verbatim.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            rows.push(row);
        }

        tracing::debug!(columns = headers.len(), rows = rows.len(), "Read input table");
        Ok(Self { headers, rows })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), AppError> {
        let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, AppError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| AppError::Generic(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns, counting cells past the header in long rows.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .fold(self.headers.len(), usize::max)
    }

    /// Index of the first header equal to `name`, ignoring ASCII case and
    /// surrounding whitespace.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Index of the zip code column, or `MissingColumn`.
    pub fn zip_column(&self) -> Result<usize, AppError> {
        self.column_index(ZIPCODE_COLUMN)
            .ok_or_else(|| AppError::MissingColumn(ZIPCODE_COLUMN.to_string()))
    }

    /// Raw zip code values, one per row, in row order.
    pub fn zip_inputs(&self) -> Result<Vec<String>, AppError> {
        let column = self.zip_column()?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect())
    }

    /// Index of column `name`, appending it if absent.
    ///
    /// A new column goes after the widest row, so cells beyond the header
    /// are never overwritten; the header row gets blank names up to there.
    /// Rows only ever grow.
    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        let index = self.width();
        self.headers.resize(index, String::new());
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.resize(index + 1, String::new());
        }
        index
    }
}

/// Merge batch results onto the input table.
///
/// Appends `Full Text` (when `include_full_text`) and `Population Density`,
/// reusing those columns if the input already has them. Rows keep their
/// order and every other column is untouched. `result.records` must be
/// aligned with the table's rows.
pub fn aggregate(
    input: &Table,
    result: &BatchResult,
    include_full_text: bool,
) -> Result<Table, AppError> {
    if input.rows.len() != result.records.len() {
        return Err(AppError::Generic(format!(
            "result has {} records for {} rows",
            result.records.len(),
            input.rows.len()
        )));
    }

    let mut output = input.clone();
    let full_text_column = include_full_text.then(|| output.ensure_column(FULL_TEXT_COLUMN));
    let density_column = output.ensure_column(DENSITY_COLUMN);
    let width = output.width();

    for (row, record) in output.rows.iter_mut().zip(&result.records) {
        if row.len() < width {
            row.resize(width, String::new());
        }
        if let Some(column) = full_text_column {
            row[column] = record.full_text.clone().unwrap_or_default();
        }
        row[density_column] = record.density_cell();
    }

    Ok(output)
}

/// Human-readable summary lines, e.g. `Found: 3 (75.0%)`.
pub fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    vec![
        format!("Total rows: {}", summary.total),
        format!("Found: {} ({:.1}%)", summary.found, summary.found_percent()),
        format!(
            "Not found: {} ({:.1}%)",
            summary.not_found,
            summary.not_found_percent()
        ),
        format!("Errors: {} ({:.1}%)", summary.error, summary.error_percent()),
    ]
}
