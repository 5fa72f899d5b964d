use super::{FIRST_DATA_ROW, HandlerResult, read_records, records_to_json};
use crate::cell::number_to_json;
use crate::downloader::records_to_csv;
use crate::grid::{Grid, Range};
use crate::headers::{column_index, effective_headers};
use crate::response::{ApiError, Response};
use log::debug;
use serde_json::{Value, json};

/// Dump every data row as JSON records or as CSV text.
pub fn export(grid: &dyn Grid, format: &str) -> HandlerResult {
    if format != "json" && format != "csv" {
        return Err(ApiError::new(400, "invalid_format", json!({ "format": format })));
    }

    let headers = effective_headers(grid)?;
    let records = read_records(grid, FIRST_DATA_ROW, grid.last_row(), &headers)?;

    if format == "csv" {
        let csv = records_to_csv(&headers, &records);
        return Ok(Response::data(200, csv).with("format", "csv"));
    }
    Ok(Response::data(200, records_to_json(records)))
}

/// Reduce the numeric cells of one column. Non-numeric cells are ignored.
pub fn aggregate(
    grid: &dyn Grid,
    column: &str,
    operation: &str,
    filter: Option<&Value>,
) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let index = column_index(&headers, column)
        .ok_or_else(|| ApiError::new(400, "column_not_found", json!({ "column": column })))?;

    if filter.is_some() {
        debug!("aggregate over {} ignores its where clause", grid.name());
    }

    let last_row = grid.last_row();
    let numbers: Vec<f64> = if last_row < FIRST_DATA_ROW {
        Vec::new()
    } else {
        grid.get_values(Range::new(FIRST_DATA_ROW, index, last_row - 1, 1))?
            .iter()
            .filter_map(|row| row.first().and_then(|cell| cell.as_number()))
            .collect()
    };

    let sum: f64 = numbers.iter().sum();
    let result = match operation.to_lowercase().as_str() {
        "sum" => number_to_json(sum),
        "avg" => number_to_json(sum / numbers.len() as f64),
        "min" => number_to_json(numbers.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => number_to_json(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "count" => json!(numbers.len()),
        _ => {
            return Err(ApiError::new(
                400,
                "invalid_operation",
                json!({ "operation": operation }),
            ));
        }
    };

    Ok(Response::data(200, json!({ "result": result })))
}
