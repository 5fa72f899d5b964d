//! Raw block access: whole rows and columns, the full sheet, rectangular
//! writes, and contiguous-range extraction.

use super::{FIRST_DATA_ROW, HandlerResult, matrix_to_json};
use crate::cell::{CellFormat, CellValue};
use crate::error::GridError;
use crate::grid::{Grid, Range};
use crate::headers::{DATE_MODIFIED, effective_headers};
use crate::request::{AllCellsOptions, RangeOptions, SearchRange};
use crate::response::{ApiError, Response};
use log::error;
use serde_json::{Map, Value, json};

fn values_json(values: &[Vec<CellValue>]) -> Value {
    matrix_to_json(values, CellValue::to_json)
}

fn formulas_json(formulas: &[Vec<String>]) -> Value {
    matrix_to_json(formulas, |f| Value::String(f.clone()))
}

fn format_json(formats: &[Vec<CellFormat>], attribute: impl Fn(&CellFormat) -> Value) -> Value {
    matrix_to_json(formats, attribute)
}

fn empty_values(include_formulas: bool) -> Value {
    let mut body = json!({ "values": [] });
    if include_formulas {
        body["formulas"] = json!([]);
    }
    body
}

/// Rows `start_row..=end_row` across every used column. The end is clamped to
/// the last row; an empty or inverted span yields no values.
pub fn get_rows(grid: &dyn Grid, start_row: i64, end_row: i64, include_formulas: bool) -> HandlerResult {
    let end_row = end_row.min(grid.last_row() as i64);
    let width = grid.last_column();
    if start_row < 1 || start_row > end_row || width == 0 {
        return Ok(Response::data(200, empty_values(include_formulas)));
    }

    let range = Range::new(start_row as usize, 1, (end_row - start_row + 1) as usize, width);
    let mut body = json!({ "values": values_json(&grid.get_values(range)?) });
    if include_formulas {
        body["formulas"] = formulas_json(&grid.get_formulas(range)?);
    }
    Ok(Response::data(200, body))
}

/// Columns `start..=end` across every used row, optionally with formulas and
/// basic formatting.
pub fn get_columns(
    grid: &dyn Grid,
    start: i64,
    end: i64,
    include_formulas: bool,
    include_formatting: bool,
) -> HandlerResult {
    let end = end.min(grid.last_column() as i64);
    let height = grid.last_row();
    if start < 1 || start > end || height == 0 {
        return Ok(Response::data(200, empty_values(include_formulas)));
    }

    let range = Range::new(1, start as usize, height, (end - start + 1) as usize);
    let mut body = json!({ "values": values_json(&grid.get_values(range)?) });
    if include_formulas {
        body["formulas"] = formulas_json(&grid.get_formulas(range)?);
    }
    if include_formatting {
        let formats = grid.get_formats(range)?;
        body["backgrounds"] = format_json(&formats, |f| json!(f.background));
        body["fontColors"] = format_json(&formats, |f| json!(f.font_color));
        body["numberFormats"] = format_json(&formats, |f| json!(f.number_format));
    }
    Ok(Response::data(200, body))
}

/// The whole used block of the sheet with the requested attributes.
pub fn get_all_cells(grid: &dyn Grid, options: &AllCellsOptions) -> HandlerResult {
    let last_row = grid.last_row();
    let last_column = grid.last_column();

    let mut body = Map::new();
    body.insert("lastRow".to_string(), json!(last_row));
    body.insert("lastColumn".to_string(), json!(last_column));

    if last_row == 0 || last_column == 0 {
        body.insert("values".to_string(), json!([]));
        return Ok(Response::data(200, Value::Object(body)));
    }

    let range = Range::new(1, 1, last_row, last_column);
    body.insert("values".to_string(), values_json(&grid.get_values(range)?));
    if options.formulas {
        body.insert("formulas".to_string(), formulas_json(&grid.get_formulas(range)?));
    }

    let attributes: [(bool, &str, fn(&CellFormat) -> Value); 8] = [
        (options.backgrounds, "backgrounds", |f| json!(f.background)),
        (options.font_colors, "fontColors", |f| json!(f.font_color)),
        (options.number_formats, "numberFormats", |f| json!(f.number_format)),
        (options.font_families, "fontFamilies", |f| json!(f.font_family)),
        (options.font_sizes, "fontSizes", |f| json!(f.font_size)),
        (options.font_styles, "fontStyles", |f| json!(f.font_style)),
        (options.alignments, "horizontalAlignments", |f| json!(f.horizontal_alignment)),
        (options.alignments, "verticalAlignments", |f| json!(f.vertical_alignment)),
    ];

    if attributes.iter().any(|(wanted, _, _)| *wanted) || options.wraps {
        let formats = grid.get_formats(range)?;
        for (wanted, name, attribute) in attributes {
            if wanted {
                body.insert(name.to_string(), format_json(&formats, attribute));
            }
        }
        if options.wraps {
            body.insert("wraps".to_string(), format_json(&formats, |f| json!(f.wrap)));
        }
    }

    Ok(Response::data(200, Value::Object(body)))
}

/// Write a rectangular block, then stamp the date column of every data row it
/// touched.
pub fn range_update(
    grid: &mut dyn Grid,
    start_row: i64,
    start_col: i64,
    data: &[Vec<CellValue>],
    stamp: &str,
) -> HandlerResult {
    let num_rows = data.len();
    let num_columns = data.first().map(Vec::len).unwrap_or(0);

    match write_block(grid, start_row, start_col, data, stamp) {
        Ok(()) => Ok(Response::data(
            200,
            json!({
                "updated": {
                    "rows": num_rows,
                    "columns": num_columns,
                    "cells": num_rows * num_columns,
                }
            }),
        )),
        Err(err) => {
            error!("range update on {} failed: {}", grid.name(), err);
            Err(ApiError::new(
                500,
                "update_failed",
                json!({
                    "message": err.to_string(),
                    "range": format!(
                        "{},{} to {},{}",
                        start_row,
                        start_col,
                        start_row.saturating_add(num_rows as i64),
                        start_col.saturating_add(num_columns as i64)
                    ),
                }),
            ))
        }
    }
}

fn write_block(
    grid: &mut dyn Grid,
    start_row: i64,
    start_col: i64,
    data: &[Vec<CellValue>],
    stamp: &str,
) -> Result<(), GridError> {
    if start_row < 1 || start_col < 1 {
        return Err(GridError::InvalidRange {
            row: start_row.max(0) as usize,
            column: start_col.max(0) as usize,
            num_rows: data.len(),
            num_columns: data.first().map(Vec::len).unwrap_or(0),
        });
    }
    let (start_row, start_col) = (start_row as usize, start_col as usize);
    grid.set_values(start_row, start_col, data)?;

    let headers = effective_headers(grid)?;
    if headers.first().map(String::as_str) != Some(DATE_MODIFIED) {
        return Ok(());
    }

    let first = start_row.max(FIRST_DATA_ROW);
    let last = start_row + data.len() - 1;
    if first <= last {
        grid.fill(Range::new(first, 1, last - first + 1, 1), &CellValue::text(stamp))?;
    }
    Ok(())
}

fn empty_range() -> Value {
    json!({ "values": [], "range": null })
}

/// Indices `0..count` that survive the empty-line rules. With `stop` the scan
/// ends at the first empty line, otherwise empty lines are dropped.
fn kept_lines(count: usize, is_empty: impl Fn(usize) -> bool, stop: bool) -> Vec<usize> {
    let mut kept = Vec::new();
    for i in 0..count {
        if !is_empty(i) {
            kept.push(i);
        } else if stop {
            break;
        }
    }
    kept
}

fn pick_columns<T: Clone>(matrix: &[Vec<T>], columns: &[usize]) -> Vec<Vec<T>> {
    matrix
        .iter()
        .map(|row| columns.iter().map(|&c| row[c].clone()).collect())
        .collect()
}

fn pick_rows<T: Clone>(matrix: &[Vec<T>], rows: &[usize]) -> Vec<Vec<T>> {
    rows.iter().map(|&r| matrix[r].clone()).collect()
}

/// Read from `(start_row, start_col)` to the end of the used block, applying
/// the empty-row and empty-column rules. Columns are filtered before rows.
pub(crate) fn extract_range(
    grid: &dyn Grid,
    start_row: i64,
    start_col: i64,
    options: &RangeOptions,
) -> Result<Value, GridError> {
    let last_row = grid.last_row() as i64;
    let last_column = grid.last_column() as i64;
    if start_row < 1 || start_col < 1 || start_row > last_row || start_col > last_column {
        return Ok(empty_range());
    }

    let (start_row, start_col) = (start_row as usize, start_col as usize);
    let range = Range::new(
        start_row,
        start_col,
        last_row as usize - start_row + 1,
        last_column as usize - start_col + 1,
    );

    let mut values = grid.get_values(range)?;
    let mut formulas = if options.include_formulas {
        Some(grid.get_formulas(range)?)
    } else {
        None
    };
    let mut end_row = range.end_row();
    let mut end_column = range.end_column();

    if options.stop_at_empty_column || options.skip_empty_columns {
        let kept = kept_lines(
            range.num_columns,
            |c| values.iter().all(|row| row[c].is_empty()),
            options.stop_at_empty_column,
        );
        if kept.is_empty() {
            return Ok(empty_range());
        }
        values = pick_columns(&values, &kept);
        formulas = formulas.map(|f| pick_columns(&f, &kept));
        end_column = start_col + kept.len() - 1;
    }

    if options.stop_at_empty_row || options.skip_empty_rows {
        let kept = kept_lines(
            values.len(),
            |r| values[r].iter().all(CellValue::is_empty),
            options.stop_at_empty_row,
        );
        if kept.is_empty() {
            return Ok(empty_range());
        }
        values = pick_rows(&values, &kept);
        formulas = formulas.map(|f| pick_rows(&f, &kept));
        end_row = start_row + kept.len() - 1;
    }

    let mut body = json!({
        "values": values_json(&values),
        "range": {
            "startRow": start_row,
            "startCol": start_col,
            "endRow": end_row,
            "endCol": end_column,
            "numRows": end_row - start_row + 1,
            "numCols": end_column - start_col + 1,
        }
    });
    if let Some(formulas) = formulas {
        body["formulas"] = formulas_json(&formulas);
    }
    Ok(body)
}

pub fn get_range(grid: &dyn Grid, start_row: i64, start_col: i64, options: &RangeOptions) -> HandlerResult {
    Ok(Response::data(200, extract_range(grid, start_row, start_col, options)?))
}

/// Find the first non-empty cell in the search rectangle and extract the
/// contiguous block that starts there.
pub fn get_data_block(grid: &dyn Grid, search: &SearchRange) -> HandlerResult {
    let start_row = search.start_row.unwrap_or(1);
    let start_col = search.start_col.unwrap_or(1);
    let end_row = search
        .end_row
        .map_or(grid.last_row() as i64, |r| r.min(grid.last_row() as i64));
    let end_col = search
        .end_col
        .map_or(grid.last_column() as i64, |c| c.min(grid.last_column() as i64));

    if start_row < 1 || start_col < 1 || end_row < start_row || end_col < start_col {
        return Ok(Response::data(200, empty_range()));
    }

    let values = grid.get_values(Range::new(
        start_row as usize,
        start_col as usize,
        (end_row - start_row + 1) as usize,
        (end_col - start_col + 1) as usize,
    ))?;

    let origin = values.iter().enumerate().find_map(|(r, row)| {
        row.iter()
            .position(|cell| !cell.is_empty())
            .map(|c| (start_row + r as i64, start_col + c as i64))
    });

    match origin {
        Some((row, column)) => Ok(Response::data(
            200,
            extract_range(grid, row, column, &RangeOptions::data_block())?,
        )),
        None => Ok(Response::data(200, empty_range())),
    }
}
