//! Operation handlers. Each takes the resolved tab (or the workbook for the
//! workbook-level methods) and returns a response envelope or an error.

pub mod columns;
pub mod query;
pub mod range;
pub mod rows;
pub mod sheets;

use crate::cell::CellValue;
use crate::codec::{Record, row_to_record};
use crate::error::GridError;
use crate::grid::{Grid, Range};
use crate::response::{ApiError, Response};
use serde_json::Value;

pub type HandlerResult = Result<Response, ApiError>;

/// First row that holds data; row 1 is the header row.
pub const FIRST_DATA_ROW: usize = 2;

/// Read `width` cells of one row. A zero width reads as an empty row.
pub(crate) fn read_row(grid: &dyn Grid, row: usize, width: usize) -> Result<Vec<CellValue>, GridError> {
    if width == 0 {
        return Ok(Vec::new());
    }
    Ok(grid
        .get_values(Range::row(row, width))?
        .into_iter()
        .next()
        .unwrap_or_default())
}

/// Decode rows `first..=last`, dropping empty ones.
pub(crate) fn read_records(
    grid: &dyn Grid,
    first: usize,
    last: usize,
    headers: &[String],
) -> Result<Vec<Record>, GridError> {
    let width = grid.last_column();
    if first > last || width == 0 {
        return Ok(Vec::new());
    }

    let rows = grid.get_values(Range::new(first, 1, last - first + 1, width))?;
    Ok(rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row_to_record(row, first + i, headers))
        .collect())
}

/// Data rows (2..=last) whose cell in `column` reads as `id`.
pub(crate) fn matching_rows(
    grid: &dyn Grid,
    column: usize,
    id: &str,
    all_matches: bool,
) -> Result<Vec<usize>, GridError> {
    let last_row = grid.last_row();
    if last_row < FIRST_DATA_ROW {
        return Ok(Vec::new());
    }

    let cells = grid.get_values(Range::new(FIRST_DATA_ROW, column, last_row - 1, 1))?;
    let mut matches = Vec::new();
    for (i, row) in cells.iter().enumerate() {
        let cell = row.first().cloned().unwrap_or_default();
        if cell.to_string() == id {
            matches.push(FIRST_DATA_ROW + i);
            if !all_matches {
                break;
            }
        }
    }
    Ok(matches)
}

pub(crate) fn records_to_json(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

pub(crate) fn matrix_to_json<T>(matrix: &[Vec<T>], cell: impl Fn(&T) -> Value) -> Value {
    Value::Array(
        matrix
            .iter()
            .map(|row| Value::Array(row.iter().map(&cell).collect()))
            .collect(),
    )
}
