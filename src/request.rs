//! Request envelopes and the closed set of operations they decode into.

use crate::cell::CellValue;
use crate::codec::{Record, decode_structured, value_to_flag, value_to_int, value_to_text};
use crate::grid::letter_to_column;
use crate::response::ApiError;
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// Every method the dispatcher understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Upsert,
    DynamicPost,
    AddColumn,
    EditColumn,
    RemoveColumn,
    Find,
    BulkDelete,
    PaginatedGet,
    Export,
    Aggregate,
    BatchUpdate,
    GetRows,
    GetColumns,
    GetAllCells,
    RangeUpdate,
    GetSheets,
    GetCsv,
    GetRange,
    GetDataBlock,
}

impl Method {
    pub const ALL: [Method; 23] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Upsert,
        Method::DynamicPost,
        Method::AddColumn,
        Method::EditColumn,
        Method::RemoveColumn,
        Method::Find,
        Method::BulkDelete,
        Method::PaginatedGet,
        Method::Export,
        Method::Aggregate,
        Method::BatchUpdate,
        Method::GetRows,
        Method::GetColumns,
        Method::GetAllCells,
        Method::RangeUpdate,
        Method::GetSheets,
        Method::GetCsv,
        Method::GetRange,
        Method::GetDataBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Upsert => "UPSERT",
            Method::DynamicPost => "DYNAMIC_POST",
            Method::AddColumn => "ADD_COLUMN",
            Method::EditColumn => "EDIT_COLUMN",
            Method::RemoveColumn => "REMOVE_COLUMN",
            Method::Find => "FIND",
            Method::BulkDelete => "BULK_DELETE",
            Method::PaginatedGet => "PAGINATED_GET",
            Method::Export => "EXPORT",
            Method::Aggregate => "AGGREGATE",
            Method::BatchUpdate => "BATCH_UPDATE",
            Method::GetRows => "GET_ROWS",
            Method::GetColumns => "GET_COLUMNS",
            Method::GetAllCells => "GET_ALL_CELLS",
            Method::RangeUpdate => "RANGE_UPDATE",
            Method::GetSheets => "GET_SHEETS",
            Method::GetCsv => "GET_CSV",
            Method::GetRange => "GET_RANGE",
            Method::GetDataBlock => "GET_DATA_BLOCK",
        }
    }

    /// Methods that modify the grid.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Method::Post
                | Method::Put
                | Method::Delete
                | Method::Upsert
                | Method::DynamicPost
                | Method::AddColumn
                | Method::EditColumn
                | Method::RemoveColumn
                | Method::BulkDelete
                | Method::BatchUpdate
                | Method::RangeUpdate
        )
    }

    /// Methods whose `id` parameter is a row index rather than a value to
    /// search for.
    pub fn addresses_row(&self) -> bool {
        matches!(self, Method::Get | Method::Put | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Method::ALL
            .iter()
            .find(|m| m.as_str() == upper)
            .copied()
            .ok_or(UnknownMethod(upper))
    }
}

/// The outer fields every request carries, as received.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Upper-cased, "GET" when absent.
    pub method: String,
    /// Lower-cased, "" when absent.
    pub sheet: String,
    pub key: String,
    pub params: Map<String, Value>,
}

impl Envelope {
    /// Read the envelope fields from a decoded request. Anything that is not
    /// a JSON object is treated as an empty request.
    pub fn from_value(value: &Value) -> Self {
        let params = value.as_object().cloned().unwrap_or_default();
        let text = |name: &str| params.get(name).map(value_to_text).unwrap_or_default();

        let method = match text("method") {
            m if m.is_empty() => "GET".to_string(),
            m => m.to_uppercase(),
        };

        Envelope {
            method,
            sheet: text("sheet").to_lowercase(),
            key: text("key"),
            params,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    pub fn text(&self, name: &str) -> String {
        self.get(name).map(value_to_text).unwrap_or_default()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(value_to_flag)
    }

    pub fn flag_or(&self, name: &str, default: bool) -> bool {
        self.get(name).map(value_to_flag).unwrap_or(default)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(value_to_int)
    }

    /// The row index named by `id`, for methods that address a row. A value
    /// that is not a whole number reads as 0 so that it fails validation.
    pub fn row_id(&self) -> Option<i64> {
        self.get("id").map(|v| value_to_int(v).unwrap_or(0))
    }
}

/// Column given either as a 1-based number or a letter label.
pub fn column_identifier(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) if s.trim().chars().all(|c| c.is_ascii_alphabetic()) => {
            letter_to_column(s.trim()).map(|c| c as i64)
        }
        other => value_to_int(other),
    }
}

/// How GET walks the rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub start_id: Option<i64>,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeOptions {
    pub stop_at_empty_row: bool,
    pub stop_at_empty_column: bool,
    pub skip_empty_rows: bool,
    pub skip_empty_columns: bool,
    pub include_formulas: bool,
}

impl RangeOptions {
    /// The options used to auto-detect a contiguous block.
    pub fn data_block() -> Self {
        RangeOptions {
            stop_at_empty_row: true,
            stop_at_empty_column: true,
            skip_empty_rows: true,
            skip_empty_columns: true,
            include_formulas: false,
        }
    }
}

/// Search rectangle for GET_DATA_BLOCK; unset bounds default to the sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRange {
    pub start_row: Option<i64>,
    pub start_col: Option<i64>,
    pub end_row: Option<i64>,
    pub end_col: Option<i64>,
}

/// Which parts of GET_ALL_CELLS to return.
#[derive(Debug, Clone, PartialEq)]
pub struct AllCellsOptions {
    pub formulas: bool,
    pub backgrounds: bool,
    pub font_colors: bool,
    pub number_formats: bool,
    pub font_families: bool,
    pub font_sizes: bool,
    pub font_styles: bool,
    pub alignments: bool,
    pub wraps: bool,
}

/// A fully decoded request, one variant per method.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetRow { row: usize },
    ListRows(PageQuery),
    Post { payload: Record },
    DynamicPost { records: Vec<Record> },
    Upsert { id_column: String, id: String, payload: Record },
    Put { row: Option<usize>, payload: Record },
    Delete { row: Option<usize> },
    AddColumn { name: String },
    EditColumn { old_name: String, new_name: String },
    RemoveColumn { name: String },
    Find { id_column: String, id: String, all_matches: bool },
    BulkDelete { ids: Vec<usize> },
    PaginatedGet { cursor: Option<usize>, limit: usize, sort_by: String, sort_desc: bool },
    Export { format: String },
    Aggregate { column: String, operation: String, filter: Option<Value> },
    BatchUpdate { updates: Vec<Record> },
    GetRows { start_row: i64, end_row: i64, include_formulas: bool },
    GetColumns { start: i64, end: i64, include_formulas: bool, include_formatting: bool },
    GetAllCells(AllCellsOptions),
    RangeUpdate { start_row: i64, start_col: i64, data: Vec<Vec<CellValue>> },
    GetRange { start_row: i64, start_col: i64, options: RangeOptions },
    GetDataBlock(SearchRange),
    GetSheets,
    GetCsv { sheet: String },
}

impl Operation {
    /// Decode the method-specific parameters of `envelope`.
    pub fn parse(method: Method, envelope: &Envelope) -> Result<Operation, ApiError> {
        let op = match method {
            Method::Get => match envelope.row_id() {
                Some(row) => Operation::GetRow { row: row as usize },
                None => Operation::ListRows(parse_page_query(envelope)?),
            },
            Method::Post => Operation::Post {
                payload: payload_object(envelope)?,
            },
            Method::DynamicPost => Operation::DynamicPost {
                records: payload_objects(envelope)?,
            },
            Method::Upsert => Operation::Upsert {
                id_column: envelope.text("idColumn"),
                id: envelope.text("id"),
                payload: payload_object(envelope)?,
            },
            Method::Put => Operation::Put {
                row: envelope.row_id().map(|r| r as usize),
                payload: payload_object(envelope)?,
            },
            Method::Delete => Operation::Delete {
                row: envelope.row_id().map(|r| r as usize),
            },
            Method::AddColumn => Operation::AddColumn {
                name: envelope.text("columnName"),
            },
            Method::EditColumn => Operation::EditColumn {
                old_name: envelope.text("oldColumnName"),
                new_name: envelope.text("newColumnName"),
            },
            Method::RemoveColumn => Operation::RemoveColumn {
                name: envelope.text("columnName"),
            },
            Method::Find => Operation::Find {
                id_column: envelope.text("idColumn"),
                id: envelope.text("id"),
                all_matches: envelope.flag("returnAllMatches"),
            },
            Method::BulkDelete => Operation::BulkDelete {
                ids: parse_ids(envelope)?,
            },
            Method::PaginatedGet => parse_paginated_get(envelope)?,
            Method::Export => Operation::Export {
                format: match envelope.text("format") {
                    f if f.is_empty() => "json".to_string(),
                    f => f.to_lowercase(),
                },
            },
            Method::Aggregate => Operation::Aggregate {
                column: envelope.text("column"),
                operation: envelope.text("operation"),
                filter: envelope.get("where").cloned(),
            },
            Method::BatchUpdate => Operation::BatchUpdate {
                updates: payload_objects(envelope)?,
            },
            Method::GetRows => {
                let start_row = envelope.int("startRow").unwrap_or(0);
                Operation::GetRows {
                    start_row,
                    end_row: envelope.int("endRow").unwrap_or(start_row),
                    include_formulas: envelope.flag("includeFormulas"),
                }
            }
            Method::GetColumns => {
                let start = envelope
                    .get("startColumn")
                    .and_then(column_identifier)
                    .unwrap_or(0);
                Operation::GetColumns {
                    start,
                    end: envelope
                        .get("endColumn")
                        .and_then(column_identifier)
                        .unwrap_or(start),
                    include_formulas: envelope.flag("includeFormulas"),
                    include_formatting: envelope.flag("includeFormatting"),
                }
            }
            Method::GetAllCells => Operation::GetAllCells(parse_all_cells_options(envelope)),
            Method::RangeUpdate => Operation::RangeUpdate {
                start_row: envelope.int("startRow").unwrap_or(0),
                start_col: envelope.int("startCol").unwrap_or(0),
                data: parse_grid_data(envelope)?,
            },
            Method::GetRange => Operation::GetRange {
                start_row: envelope.int("startRow").unwrap_or(0),
                start_col: envelope.int("startCol").unwrap_or(0),
                options: RangeOptions {
                    stop_at_empty_row: envelope.flag("stopAtEmptyRow"),
                    stop_at_empty_column: envelope.flag("stopAtEmptyColumn"),
                    skip_empty_rows: envelope.flag("skipEmptyRows"),
                    skip_empty_columns: envelope.flag("skipEmptyColumns"),
                    include_formulas: envelope.flag("includeFormulas"),
                },
            },
            Method::GetDataBlock => Operation::GetDataBlock(parse_search_range(envelope)),
            Method::GetSheets => Operation::GetSheets,
            Method::GetCsv => Operation::GetCsv {
                sheet: envelope
                    .params
                    .get("sheet")
                    .map(value_to_text)
                    .unwrap_or_default(),
            },
        };
        Ok(op)
    }
}

fn invalid_payload(message: &str) -> ApiError {
    ApiError::new(400, "invalid_payload", json!({ "message": message }))
}

fn payload_value(envelope: &Envelope) -> Option<Value> {
    envelope.get("payload").map(decode_structured)
}

fn payload_object(envelope: &Envelope) -> Result<Record, ApiError> {
    match payload_value(envelope) {
        Some(Value::Object(map)) => Ok(map),
        None => Ok(Record::new()),
        Some(_) => Err(invalid_payload("payload must be an object")),
    }
}

/// A single object is treated as a batch of one.
fn payload_objects(envelope: &Envelope) -> Result<Vec<Record>, ApiError> {
    match payload_value(envelope) {
        Some(Value::Object(map)) => Ok(vec![map]),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(invalid_payload("payload items must be objects")),
            })
            .collect(),
        None => Ok(Vec::new()),
        Some(_) => Err(invalid_payload("payload must be an object or a list of objects")),
    }
}

fn parse_page_query(envelope: &Envelope) -> Result<PageQuery, ApiError> {
    let limit = match envelope.get("limit") {
        None => None,
        Some(raw) => match value_to_int(raw) {
            Some(limit) if limit >= 0 => Some(limit),
            _ => return Err(ApiError::new(404, "invalid_limit", json!({ "limit": raw }))),
        },
    };

    let start_id = match envelope.get("start_id") {
        None => None,
        Some(raw) => match value_to_int(raw) {
            Some(id) => Some(id),
            None => {
                return Err(ApiError::new(
                    404,
                    "start_id_out_of_range",
                    json!({ "start_id": raw }),
                ));
            }
        },
    };

    Ok(PageQuery {
        limit,
        start_id,
        descending: envelope.text("order").eq_ignore_ascii_case("desc"),
    })
}

fn parse_paginated_get(envelope: &Envelope) -> Result<Operation, ApiError> {
    let cursor = match envelope.get("cursor") {
        None => None,
        Some(raw) if value_to_text(raw).is_empty() => None,
        Some(raw) => match value_to_int(raw) {
            Some(c) if c >= 2 => Some(c as usize),
            _ => return Err(ApiError::new(400, "invalid_cursor", json!({ "cursor": raw }))),
        },
    };

    let limit = match envelope.get("limit") {
        None => 10,
        Some(raw) => match value_to_int(raw) {
            Some(limit) if limit >= 0 => limit as usize,
            _ => return Err(ApiError::new(404, "invalid_limit", json!({ "limit": raw }))),
        },
    };

    let sort_by = match envelope.text("sortBy") {
        s if s.is_empty() => crate::headers::DATE_MODIFIED.to_string(),
        s => s,
    };

    Ok(Operation::PaginatedGet {
        cursor,
        limit,
        sort_by,
        sort_desc: !envelope.text("sortDir").eq_ignore_ascii_case("asc"),
    })
}

fn parse_ids(envelope: &Envelope) -> Result<Vec<usize>, ApiError> {
    let invalid = |message: &str| ApiError::new(400, "invalid_ids", json!({ "message": message }));

    let ids = match envelope.get("ids").map(decode_structured) {
        Some(Value::Array(ids)) => ids,
        _ => return Err(invalid("ids must be an array")),
    };

    ids.iter()
        .map(|id| match value_to_int(id) {
            Some(row) if row >= 2 => Ok(row as usize),
            _ => Err(invalid("ids must be row numbers greater than 1")),
        })
        .collect()
}

fn parse_grid_data(envelope: &Envelope) -> Result<Vec<Vec<CellValue>>, ApiError> {
    let invalid = || ApiError::new(400, "invalid_data", json!({ "message": "Data must be a 2D array" }));

    let rows = match envelope.get("data").map(decode_structured) {
        Some(Value::Array(rows)) if !rows.is_empty() => rows,
        _ => return Err(invalid()),
    };

    match rows.first() {
        Some(Value::Array(first)) if !first.is_empty() => {}
        _ => return Err(invalid()),
    }

    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells.iter().map(CellValue::from_json).collect()),
            _ => Err(invalid()),
        })
        .collect()
}

fn parse_all_cells_options(envelope: &Envelope) -> AllCellsOptions {
    let formatting = envelope.flag_or("includeFormatting", true);
    let attribute = |name: &str| formatting && envelope.flag_or(name, true);

    AllCellsOptions {
        formulas: envelope.flag_or("includeFormulas", true),
        backgrounds: attribute("includeBackgrounds"),
        font_colors: attribute("includeFontColors"),
        number_formats: attribute("includeNumberFormats"),
        font_families: attribute("includeFontFamilies"),
        font_sizes: attribute("includeFontSizes"),
        font_styles: attribute("includeFontStyles"),
        alignments: attribute("includeAlignments"),
        wraps: attribute("includeWraps"),
    }
}

fn parse_search_range(envelope: &Envelope) -> SearchRange {
    let search = match envelope.get("searchRange").map(decode_structured) {
        Some(Value::Object(map)) => map,
        _ => return SearchRange::default(),
    };
    let bound = |name: &str| search.get(name).and_then(value_to_int);

    SearchRange {
        start_row: bound("startRow"),
        start_col: bound("startCol"),
        end_row: bound("endRow"),
        end_col: bound("endCol"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_parse_case_insensitively() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("dynamic_post".parse::<Method>(), Ok(Method::DynamicPost));
        assert_eq!(
            "FROB".parse::<Method>(),
            Err(UnknownMethod("FROB".to_string()))
        );
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn envelope_defaults() {
        let envelope = Envelope::from_value(&json!({}));
        assert_eq!(envelope.method, "GET");
        assert_eq!(envelope.sheet, "");
        assert_eq!(envelope.key, "");

        let envelope = Envelope::from_value(&json!({"method": "find", "sheet": "Logs"}));
        assert_eq!(envelope.method, "FIND");
        assert_eq!(envelope.sheet, "logs");
    }

    #[test]
    fn column_identifiers_accept_letters_and_numbers() {
        assert_eq!(column_identifier(&json!("B")), Some(2));
        assert_eq!(column_identifier(&json!("AA")), Some(27));
        assert_eq!(column_identifier(&json!(3)), Some(3));
        assert_eq!(column_identifier(&json!("4")), Some(4));
    }

    #[test]
    fn range_update_requires_a_2d_array() {
        let envelope = Envelope::from_value(&json!({"data": [1, 2]}));
        let err = Operation::parse(Method::RangeUpdate, &envelope).unwrap_err();
        assert_eq!(err.code, "invalid_data");

        let envelope = Envelope::from_value(&json!({"data": [], "startRow": 2, "startCol": 1}));
        assert!(Operation::parse(Method::RangeUpdate, &envelope).is_err());

        let envelope = Envelope::from_value(&json!({"data": [[1, 2]], "startRow": "2", "startCol": 1}));
        match Operation::parse(Method::RangeUpdate, &envelope).unwrap() {
            Operation::RangeUpdate { start_row, data, .. } => {
                assert_eq!(start_row, 2);
                assert_eq!(data, vec![vec![CellValue::Number(1.0), CellValue::Number(2.0)]]);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }
}
