//! The grid accessor contract.
//!
//! Every operation handler talks to the backing spreadsheet only through the
//! [`Grid`] and [`Workbook`] traits defined here. Indices are 1-based, row 1
//! holds the headers, and `last_row`/`last_column` report the last row and
//! column that contain anything at all.

use crate::cell::{CellFormat, CellValue};
use crate::error::GridError;

/// A 1-based rectangular block of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub row: usize,
    pub column: usize,
    pub num_rows: usize,
    pub num_columns: usize,
}

impl Range {
    pub fn new(row: usize, column: usize, num_rows: usize, num_columns: usize) -> Self {
        Range {
            row,
            column,
            num_rows,
            num_columns,
        }
    }

    pub fn cell(row: usize, column: usize) -> Self {
        Range::new(row, column, 1, 1)
    }

    /// One full row, `width` columns wide.
    pub fn row(row: usize, width: usize) -> Self {
        Range::new(row, 1, 1, width)
    }

    pub fn end_row(&self) -> usize {
        self.row.saturating_add(self.num_rows).saturating_sub(1)
    }

    pub fn end_column(&self) -> usize {
        self.column.saturating_add(self.num_columns).saturating_sub(1)
    }

    /// Ranges must start at (1, 1) or later and cover at least one cell.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.row < 1 || self.column < 1 || self.num_rows < 1 || self.num_columns < 1 {
            return Err(GridError::InvalidRange {
                row: self.row,
                column: self.column,
                num_rows: self.num_rows,
                num_columns: self.num_columns,
            });
        }
        Ok(())
    }
}

/// One tab of the spreadsheet.
pub trait Grid {
    fn name(&self) -> &str;

    /// Last row containing a value or formula, 0 for an empty sheet.
    fn last_row(&self) -> usize;

    /// Last column containing a value or formula, 0 for an empty sheet.
    fn last_column(&self) -> usize;

    /// Allocated width of the sheet; whole-row operations span this many columns.
    fn max_columns(&self) -> usize;

    fn get_values(&self, range: Range) -> Result<Vec<Vec<CellValue>>, GridError>;

    /// Formulas for the range; cells without a formula read as "".
    fn get_formulas(&self, range: Range) -> Result<Vec<Vec<String>>, GridError>;

    fn get_formats(&self, range: Range) -> Result<Vec<Vec<CellFormat>>, GridError>;

    /// Write a rectangular block anchored at (row, column). Every row of
    /// `values` must have the width of the first one.
    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), GridError>;

    /// Set every cell of the range to the same value.
    fn fill(&mut self, range: Range, value: &CellValue) -> Result<(), GridError>;

    /// Remove values and formulas from the range, keeping formatting.
    fn clear_content(&mut self, range: Range) -> Result<(), GridError>;

    /// Write `values` into the row after the last row.
    fn append_row(&mut self, values: Vec<CellValue>) -> Result<(), GridError>;

    fn insert_column_before(&mut self, column: usize) -> Result<(), GridError>;

    /// Insert an empty column right after `column`; 0 inserts at the front.
    fn insert_column_after(&mut self, column: usize) -> Result<(), GridError>;

    fn delete_column(&mut self, column: usize) -> Result<(), GridError>;

    fn get_value(&self, row: usize, column: usize) -> Result<CellValue, GridError> {
        let values = self.get_values(Range::cell(row, column))?;
        Ok(values
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .unwrap_or_default())
    }

    fn set_value(&mut self, row: usize, column: usize, value: CellValue) -> Result<(), GridError> {
        self.set_values(row, column, &[vec![value]])
    }
}

/// Metadata of a tab as listed by the workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetInfo {
    pub name: String,
    pub id: u32,
    /// 0-based position of the tab.
    pub position: usize,
    pub hidden: bool,
}

/// Raw result of the backing service's CSV export endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvExport {
    pub status: u16,
    pub body: String,
}

/// The whole spreadsheet: a set of named tabs.
pub trait Workbook {
    fn spreadsheet_id(&self) -> &str;

    fn sheets(&self) -> Vec<SheetInfo>;

    /// Position of the tab whose name matches case-insensitively.
    fn find_sheet(&self, name: &str) -> Option<usize>;

    fn sheet(&self, position: usize) -> Option<&dyn Grid>;

    fn sheet_mut(&mut self, position: usize) -> Option<&mut dyn Grid>;

    fn export_csv(&self, sheet_id: u32) -> Result<CsvExport, GridError>;
}

/// Convert a 1-based column number to its letter label (1 -> A, 27 -> AA).
pub fn column_to_letter(col: usize) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

/// Convert a letter label to its 1-based column number (A -> 1, AA -> 27).
/// Base 26 without a zero digit. Returns `None` for anything but ASCII letters.
pub fn letter_to_column(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        acc.checked_mul(26)?.checked_add(digit)
    })
}
