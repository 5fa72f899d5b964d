use super::HandlerResult;
use crate::cell::CellValue;
use crate::grid::Grid;
use crate::headers::{column_index, effective_headers};
use crate::response::{ApiError, Response};
use log::debug;
use serde_json::json;

fn column_name_missing() -> ApiError {
    ApiError::new(400, "column_name_missing", json!({}))
}

/// Append a named column after the last one in use.
pub fn add_column(grid: &mut dyn Grid, name: &str) -> HandlerResult {
    if name.is_empty() {
        return Err(column_name_missing());
    }

    let last_column = grid.last_column();
    grid.insert_column_after(last_column)?;
    grid.set_value(1, last_column + 1, CellValue::text(name))?;

    debug!("added column {:?} to {}", name, grid.name());
    Ok(Response::message(201, "Column added"))
}

pub fn edit_column(grid: &mut dyn Grid, old_name: &str, new_name: &str) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let column = column_index(&headers, old_name).ok_or_else(|| {
        ApiError::new(404, "column_not_found", json!({ "oldColumnName": old_name }))
    })?;
    if new_name.is_empty() {
        return Err(column_name_missing());
    }

    grid.set_value(1, column, CellValue::text(new_name))?;
    Ok(Response::message(201, "Column renamed"))
}

/// Delete a column. Columns to its right shift left by one.
pub fn remove_column(grid: &mut dyn Grid, name: &str) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let column = column_index(&headers, name).ok_or_else(|| {
        ApiError::new(404, "column_not_found", json!({ "columnName": name }))
    })?;

    grid.delete_column(column)?;
    Ok(Response::message(204, "Column removed"))
}
