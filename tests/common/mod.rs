#![allow(dead_code)]

use chrono::{Local, TimeZone};
use serde_json::Value;
use sheetlog::{AuthConfig, CellValue, Dispatcher, Grid, MemoryWorkbook, Range};

/// What the fixed test clock stamps into "Date Modified".
pub const STAMP: &str = "01/02/2024 03:04:05";

pub fn cells(rows: Value) -> Vec<Vec<CellValue>> {
    rows.as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(CellValue::from_json).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A dispatcher over one tab named "Logs" holding `rows`, with the default
/// anonymous user and a fixed clock.
pub fn dispatcher(rows: Value) -> Dispatcher<MemoryWorkbook> {
    let mut workbook = MemoryWorkbook::new("book1");
    workbook.add_sheet_with_values("Logs", cells(rows));
    with_fixed_clock(Dispatcher::new(workbook, AuthConfig::default()))
}

pub fn with_fixed_clock(dispatcher: Dispatcher<MemoryWorkbook>) -> Dispatcher<MemoryWorkbook> {
    dispatcher.with_clock(|| Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
}

pub fn call(dispatcher: &mut Dispatcher<MemoryWorkbook>, request: Value) -> Value {
    dispatcher.handle(&request).to_json()
}

/// Raw display values of the "Logs" tab, row by row.
pub fn sheet_rows(dispatcher: &Dispatcher<MemoryWorkbook>) -> Vec<Vec<String>> {
    let sheet = dispatcher
        .workbook()
        .sheet_by_name("Logs")
        .expect("Logs tab exists");
    let (rows, cols) = (sheet.last_row(), sheet.last_column());
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    sheet
        .get_values(Range::new(1, 1, rows, cols))
        .unwrap()
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

pub fn error_code(response: &Value) -> &str {
    response["error"]["code"].as_str().unwrap_or_default()
}
