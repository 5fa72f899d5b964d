use super::{
    FIRST_DATA_ROW, HandlerResult, matching_rows, read_records, read_row, records_to_json,
};
use crate::cell::CellValue;
use crate::codec::{ID_FIELD, Record, record_to_row, row_to_record, value_to_int};
use crate::grid::{Grid, Range};
use crate::headers::{DATE_MODIFIED, column_index, effective_headers, grow_schema};
use crate::request::PageQuery;
use crate::response::{ApiError, Response};
use log::debug;
use serde_json::{Value, json};

/// Headers after the reserved date column.
fn payload_headers(headers: &[String]) -> &[String] {
    headers.get(1..).unwrap_or(&[])
}

/// A new row: the timestamp followed by the encoded payload.
fn stamped_row(stamp: &str, record: &Record, headers: &[String]) -> Vec<CellValue> {
    let mut row = vec![CellValue::text(stamp)];
    row.extend(record_to_row(record, payload_headers(headers)));
    row
}

fn id_column_index(headers: &[String], id_column: &str) -> Result<usize, ApiError> {
    column_index(headers, id_column).ok_or_else(|| {
        ApiError::new(400, "id_column_not_found", json!({ "idColumn": id_column }))
    })
}

fn row_id_missing() -> ApiError {
    ApiError::new(400, "row_id_missing", json!({}))
}

pub fn get_row(grid: &dyn Grid, row: usize) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let cells = read_row(grid, row, grid.last_column())?;

    match row_to_record(&cells, row, &headers) {
        Some(record) => Ok(Response::data(200, Value::Object(record))),
        None => Err(ApiError::new(404, "row_not_found", json!({ "_id": row }))),
    }
}

/// Page through the data rows in either direction.
pub fn list_rows(grid: &dyn Grid, query: &PageQuery) -> HandlerResult {
    let headers = effective_headers(grid)?;

    let first_row = FIRST_DATA_ROW as i64;
    let last_row = grid.last_row() as i64;
    let total = (last_row - first_row + 1).max(0);
    let limit = query.limit.map_or(total, |limit| limit.min(total));
    let ascending = !query.descending;

    let mut first_in_page = if ascending { first_row } else { last_row - limit + 1 };
    if let Some(start_id) = query.start_id {
        if start_id < first_row || start_id > last_row {
            return Err(ApiError::new(
                404,
                "start_id_out_of_range",
                json!({ "start_id": start_id }),
            ));
        }
        first_in_page = start_id - if ascending { 0 } else { limit - 1 };
    }

    let last_in_page = (first_in_page + limit - 1).min(last_row);
    let first_in_page = first_in_page.max(first_row);

    if first_in_page > last_in_page {
        return Ok(Response::data(200, json!([])));
    }

    let mut records = read_records(
        grid,
        first_in_page as usize,
        last_in_page as usize,
        &headers,
    )?;
    if !ascending {
        records.reverse();
    }

    let next = if ascending { last_in_page + 1 } else { first_in_page - 1 };
    let next = Some(next).filter(|n| (first_row..=last_row).contains(n));

    Ok(Response::data(200, records_to_json(records)).with_optional("next", next))
}

pub fn post(grid: &mut dyn Grid, payload: &Record, stamp: &str) -> HandlerResult {
    let headers = effective_headers(grid)?;
    grid.append_row(stamped_row(stamp, payload, &headers))?;
    Ok(Response::empty(201))
}

/// Append one row per record, adding any columns the batch introduces first.
pub fn dynamic_post(grid: &mut dyn Grid, records: &[Record], stamp: &str) -> HandlerResult {
    grow_schema(grid, records)?;
    let headers = effective_headers(grid)?;

    for record in records {
        grid.append_row(stamped_row(stamp, record, &headers))?;
    }

    Ok(Response::empty(201))
}

/// Update the first row whose `id_column` matches `id`, or insert a new one.
pub fn upsert(
    grid: &mut dyn Grid,
    id_column: &str,
    id: &str,
    payload: &Record,
    stamp: &str,
) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let column = id_column_index(&headers, id_column)?;

    if let Some(&row) = matching_rows(grid, column, id, false)?.first() {
        grid.set_values(row, 1, &[stamped_row(stamp, payload, &headers)])?;
        return Ok(Response::message(200, "Row updated"));
    }

    grow_schema(grid, std::slice::from_ref(payload))?;
    let headers = effective_headers(grid)?;
    grid.append_row(stamped_row(stamp, payload, &headers))?;
    Ok(Response::message(201, "Row inserted"))
}

/// Overwrite the named cells of one row. Keys without a column are ignored.
pub fn put(grid: &mut dyn Grid, row: Option<usize>, payload: &Record) -> HandlerResult {
    let row = row.ok_or_else(row_id_missing)?;
    let headers = effective_headers(grid)?;

    for (key, value) in payload {
        if let Some(column) = column_index(&headers, key) {
            grid.set_value(row, column, CellValue::from_json(value))?;
        }
    }

    Ok(Response::empty(201))
}

/// Clear the contents of one row. The row itself stays in place.
pub fn delete(grid: &mut dyn Grid, row: Option<usize>) -> HandlerResult {
    let row = row.ok_or_else(row_id_missing)?;
    let width = grid.max_columns();
    if width > 0 {
        grid.clear_content(Range::row(row, width))?;
    }
    Ok(Response::empty(204))
}

pub fn find(grid: &dyn Grid, id_column: &str, id: &str, all_matches: bool) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let column = id_column_index(&headers, id_column)?;
    let width = grid.last_column();

    // An empty id can match an all-empty row; it is reported as `null`.
    let mut matches = Vec::new();
    for row in matching_rows(grid, column, id, all_matches)? {
        let cells = read_row(grid, row, width)?;
        matches.push(row_to_record(&cells, row, &headers).map_or(Value::Null, Value::Object));
    }

    match matches.len() {
        0 => Err(ApiError::new(404, "no_matches_found", json!({}))),
        1 if !all_matches => Ok(Response::data(200, matches.remove(0))),
        _ => Ok(Response::data(200, Value::Array(matches))),
    }
}

pub fn bulk_delete(grid: &mut dyn Grid, ids: &[usize]) -> HandlerResult {
    let width = grid.max_columns();
    if width > 0 {
        for &row in ids {
            grid.clear_content(Range::row(row, width))?;
        }
    }
    Ok(Response::data(200, json!({ "deleted": ids.len() })))
}

/// Apply field updates to several rows. Entries without a usable `_id` are
/// skipped but still counted.
pub fn batch_update(grid: &mut dyn Grid, updates: &[Record], stamp: &str) -> HandlerResult {
    let headers = effective_headers(grid)?;
    let has_date_column = headers.first().map(String::as_str) == Some(DATE_MODIFIED);

    for update in updates {
        let row = match update
            .get(ID_FIELD)
            .and_then(value_to_int)
            .filter(|&r| r >= FIRST_DATA_ROW as i64)
        {
            Some(row) => row as usize,
            None => continue,
        };

        if has_date_column {
            grid.set_value(row, 1, CellValue::text(stamp))?;
        }

        for (key, value) in update {
            if key == ID_FIELD {
                continue;
            }
            if let Some(column) = column_index(&headers, key) {
                grid.set_value(row, column, CellValue::from_json(value))?;
            }
        }
    }

    Ok(Response::data(200, json!({ "updated": updates.len() })))
}

/// Cursor pager over row offsets. `sort_by` must name a column, but rows are
/// returned in sheet order.
pub fn paginated_get(
    grid: &dyn Grid,
    cursor: Option<usize>,
    limit: usize,
    sort_by: &str,
    sort_desc: bool,
) -> HandlerResult {
    let headers = effective_headers(grid)?;
    if column_index(&headers, sort_by).is_none() {
        return Err(ApiError::new(
            400,
            "sort_column_not_found",
            json!({ "sortBy": sort_by }),
        ));
    }
    debug!(
        "paginated read of {} by offset (sortBy {:?}, desc {})",
        grid.name(),
        sort_by,
        sort_desc
    );

    let start_row = cursor.unwrap_or(FIRST_DATA_ROW);
    let available = (grid.last_row() + 1).saturating_sub(start_row);
    let count = (limit + 1).min(available);

    let mut records = if count == 0 {
        Vec::new()
    } else {
        read_records(grid, start_row, start_row + count - 1, &headers)?
    };

    let has_more = records.len() > limit;
    records.truncate(limit);
    let next_cursor = if has_more { Some(start_row + limit) } else { None };

    Ok(Response::data(200, records_to_json(records))
        .with("cursor", next_cursor.map(Value::from).unwrap_or(Value::Null))
        .with("hasMore", has_more))
}
