use crate::cell::CellValue;
use serde_json::{Map, Value};

/// Quote a CSV field when it contains a delimiter, a quote or a line break.
/// Embedded quotes are doubled.
///
/// # Examples
/// ```
/// use sheetlog::downloader::escape_field;
///
/// assert_eq!(escape_field("plain"), "plain");
/// assert_eq!(escape_field("a,b"), "\"a,b\"");
/// assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
/// ```
pub fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a raw block of cells, one line per row.
pub fn grid_to_csv(values: &[Vec<CellValue>]) -> String {
    values
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| escape_field(&cell.to_string()))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render decoded records: a header line followed by one line per record,
/// fields in header order. Missing fields are left blank.
pub fn records_to_csv(headers: &[String], records: &[Map<String, Value>]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );

    for record in records {
        let line = headers
            .iter()
            .map(|h| escape_field(&field_text(record.get(h))))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
