//! Row formatters.
//!
//! A [`TableFormatter`] turns one row into the text written for it: either an
//! aligned, wrapped block of lines ([`ColumnFormatter`]) or a single JSON
//! object ([`JsonFormatter`]).

use crate::layout::{allocate_widths, COLUMN_GAP};
use crate::table::Column;
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

/// Formats table rows for output
pub trait TableFormatter {
    /// Whether the header row should be written before the first row
    fn print_header(&self) -> bool;

    /// Format one row; the result carries no trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if the row does not match the schema.
    fn format_row(&self, row: &[String]) -> Result<String, FormatError>;
}

/// Formatting errors
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Row length differs from the number of columns
    #[error("unexpected number of fields: expected {expected}, got {actual}")]
    FieldCount {
        /// Number of configured fields
        expected: usize,
        /// Number of cells in the row
        actual: usize,
    },

    /// JSON serialization failed
    #[error("failed to encode row as json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Formats rows as JSON objects keyed by field name
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    fields: Vec<String>,
}

impl JsonFormatter {
    /// Create a formatter; `fields` are usually the table header
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl TableFormatter for JsonFormatter {
    fn print_header(&self) -> bool {
        false
    }

    fn format_row(&self, row: &[String]) -> Result<String, FormatError> {
        if row.len() != self.fields.len() {
            return Err(FormatError::FieldCount {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }

        let object: IndexMap<&str, &str> = self
            .fields
            .iter()
            .map(String::as_str)
            .zip(row.iter().map(String::as_str))
            .collect();
        Ok(serde_json::to_string(&object)?)
    }
}

/// Formats rows as aligned columns, wrapping cells that exceed their width
#[derive(Debug)]
pub struct ColumnFormatter {
    table_width: usize,
    columns: Vec<Column>,
    /// Computed on first use, then fixed for the rest of the run
    computed_widths: OnceCell<Vec<usize>>,
}

impl ColumnFormatter {
    /// Create a formatter for a table `table_width` characters wide
    #[must_use]
    pub fn new(table_width: usize, columns: Vec<Column>) -> Self {
        Self {
            table_width,
            columns,
            computed_widths: OnceCell::new(),
        }
    }

    /// Width of each column
    pub fn column_widths(&self) -> &[usize] {
        self.computed_widths
            .get_or_init(|| allocate_widths(self.table_width, &self.columns))
    }
}

impl TableFormatter for ColumnFormatter {
    fn print_header(&self) -> bool {
        true
    }

    fn format_row(&self, row: &[String]) -> Result<String, FormatError> {
        let widths = self.column_widths();
        if row.len() != widths.len() {
            return Err(FormatError::FieldCount {
                expected: widths.len(),
                actual: row.len(),
            });
        }

        let cells: Vec<Vec<String>> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| wrap_cell(cell, *width))
            .collect();
        let max_lines = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);

        let separator = " ".repeat(COLUMN_GAP);
        let mut lines = Vec::with_capacity(max_lines);
        for line in 0..max_lines {
            let parts: Vec<String> = cells
                .iter()
                .zip(widths)
                .map(|(slices, width)| {
                    slices
                        .get(line)
                        .cloned()
                        .unwrap_or_else(|| " ".repeat(*width))
                })
                .collect();
            lines.push(parts.join(separator.as_str()));
        }
        Ok(lines.join("\n"))
    }
}

/// Split a cell into slices of exactly `width` characters.
///
/// The last slice is right-padded with spaces. An empty cell yields no
/// slices.
#[must_use]
pub fn wrap_cell(cell: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = cell.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| {
            let mut slice: String = chunk.iter().collect();
            slice.extend(std::iter::repeat_n(' ', width - chunk.len()));
            slice
        })
        .collect()
}
