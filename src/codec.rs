//! Row <-> record conversion, plus the coercions applied to loosely typed
//! request values (the query-string transport delivers everything as text).

use crate::cell::{CellValue, format_number};
use serde_json::{Map, Value};

/// A header-keyed view of one data row. Always carries `_id`, the 1-based row
/// index, as its first field.
pub type Record = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

/// Decode a row. Returns `None` when every cell is empty; headers with an
/// empty name are skipped.
pub fn row_to_record(row: &[CellValue], row_index: usize, headers: &[String]) -> Option<Record> {
    if row.iter().all(CellValue::is_empty) {
        return None;
    }

    let mut record = Record::new();
    record.insert(ID_FIELD.to_string(), Value::from(row_index));
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        let value = row.get(i).map(CellValue::to_json).unwrap_or_else(|| Value::from(""));
        record.insert(header.clone(), value);
    }

    Some(record)
}

/// Encode `record` as cells, one per header. Callers pass the headers that
/// follow the reserved date column. Missing or null fields become empty
/// cells, objects and arrays become JSON text.
pub fn record_to_row(record: &Map<String, Value>, headers: &[String]) -> Vec<CellValue> {
    headers
        .iter()
        .map(|header| record.get(header).map(CellValue::from_json).unwrap_or_default())
        .collect()
}

/// Integer form of a request value: a JSON integer, a whole float, or text
/// holding one.
pub fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Boolean flag; accepts `true`, `"true"`, `"1"` and non-zero numbers.
pub fn value_to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// String form used when comparing ids and naming columns.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Structured values may arrive as JSON text; decode those, leave anything
/// else untouched.
pub fn decode_structured(value: &Value) -> Value {
    if let Value::String(s) = value {
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                return parsed;
            }
        }
    }
    value.clone()
}
