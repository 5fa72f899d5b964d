use crate::cell::CellValue;
use crate::codec::Record;
use crate::error::GridError;
use crate::grid::{Grid, Range};
use log::debug;

/// Header of the reserved first column stamped by write-oriented operations.
pub const DATE_MODIFIED: &str = "Date Modified";

/// Row 1 up to the last column, with the trailing run of empty cells trimmed.
/// Empty names between named headers are kept.
pub fn effective_headers(grid: &dyn Grid) -> Result<Vec<String>, GridError> {
    let last_column = grid.last_column();
    if last_column == 0 {
        return Ok(Vec::new());
    }

    let row = grid
        .get_values(Range::row(1, last_column))?
        .into_iter()
        .next()
        .unwrap_or_default();

    let end = row
        .iter()
        .rposition(|cell| !cell.is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);

    Ok(row[..end].iter().map(CellValue::to_string).collect())
}

/// 1-based index of the header named `name`.
pub fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name).map(|i| i + 1)
}

/// Make sure column 1 is the "Date Modified" column, inserting it in front of
/// everything else when it is not.
pub fn ensure_date_modified_column(grid: &mut dyn Grid) -> Result<bool, GridError> {
    let headers = effective_headers(grid)?;
    if headers.first().map(String::as_str) == Some(DATE_MODIFIED) {
        return Ok(false);
    }

    grid.insert_column_before(1)?;
    grid.set_value(1, 1, CellValue::text(DATE_MODIFIED))?;
    debug!("inserted {:?} column into sheet {}", DATE_MODIFIED, grid.name());
    Ok(true)
}

/// Add one column per key that appears in `records` but not in the headers.
/// New columns are appended in first-seen order across the whole batch.
pub fn grow_schema(grid: &mut dyn Grid, records: &[Record]) -> Result<Vec<String>, GridError> {
    ensure_date_modified_column(grid)?;
    let existing = effective_headers(grid)?;

    let mut new_columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !existing.contains(key) && !new_columns.contains(key) {
                new_columns.push(key.clone());
            }
        }
    }

    for name in &new_columns {
        let last_column = grid.last_column();
        grid.insert_column_after(last_column)?;
        grid.set_value(1, last_column + 1, CellValue::text(name.as_str()))?;
    }

    if !new_columns.is_empty() {
        debug!("sheet {} grew columns {:?}", grid.name(), new_columns);
    }

    Ok(new_columns)
}
