mod common;

use common::{call, cells, dispatcher, error_code, with_fixed_clock};
use serde_json::json;
use sheetlog::grid::{CsvExport, SheetInfo};
use sheetlog::{AuthConfig, Dispatcher, Grid, GridError, MemoryWorkbook, Workbook};

const USERS: &str = r#"{
    "users": [
        {"name": "weak", "key": "abc", "permissions": "*"},
        {"name": "reader", "key": "Read3r!pass", "permissions": ["GET", "FIND"]},
        {"name": "scoped", "key": "Sc0ped!key", "permissions": {"logs": "*", "ALL": ["GET"]}},
        {"name": "poster", "key": "abc12", "permissions": ["POST"]},
        {"name": "proto", "key": {"__unsafe": "x"}, "permissions": "*"}
    ]
}"#;

fn secured() -> Dispatcher<MemoryWorkbook> {
    let mut workbook = MemoryWorkbook::new("book1");
    workbook.add_sheet_with_values("Logs", cells(json!([["Date Modified", "n"], ["d", 1]])));
    workbook.add_sheet_with_values("Other", cells(json!([["name"], ["x"]])));
    let auth = AuthConfig::from_json(USERS).unwrap();
    with_fixed_clock(Dispatcher::new(workbook, auth))
}

#[test]
fn authorization_runs_before_key_strength() {
    let mut d = secured();

    let unknown = call(&mut d, json!({"sheet": "logs", "key": "nobody"}));
    assert_eq!(unknown["status"], 401);
    assert_eq!(error_code(&unknown), "unauthorized");

    let weak = call(&mut d, json!({"sheet": "logs", "key": "abc"}));
    assert_eq!(weak["status"], 401);
    assert_eq!(error_code(&weak), "weak_key");
    assert!(weak["error"]["details"]["message"].is_string());

    // Weak and not permitted: the permission failure wins.
    let denied = call(&mut d, json!({"sheet": "logs", "key": "abc12"}));
    assert_eq!(error_code(&denied), "unauthorized");

    let unsafe_key = call(&mut d, json!({"sheet": "logs", "key": "x"}));
    assert_eq!(unsafe_key["status"], 200);
    println!("✓ unauthorized is reported before weak_key");
}

#[test]
fn grants_are_checked_per_method_and_sheet() {
    let mut d = secured();

    let read = call(&mut d, json!({"sheet": "logs", "key": "Read3r!pass"}));
    assert_eq!(read["status"], 200);

    let write = call(
        &mut d,
        json!({"method": "POST", "sheet": "logs", "key": "Read3r!pass", "payload": {"n": 2}}),
    );
    assert_eq!(error_code(&write), "unauthorized");

    let scoped_write = call(
        &mut d,
        json!({"method": "POST", "sheet": "LOGS", "key": "Sc0ped!key", "payload": {"n": 2}}),
    );
    assert_eq!(scoped_write["status"], 201);

    let fallback_read = call(&mut d, json!({"sheet": "other", "key": "Sc0ped!key"}));
    assert_eq!(fallback_read["status"], 200);

    let fallback_write = call(
        &mut d,
        json!({"method": "ADD_COLUMN", "sheet": "other", "key": "Sc0ped!key", "columnName": "z"}),
    );
    assert_eq!(error_code(&fallback_write), "unauthorized");
    println!("✓ per-sheet grants fall back to ALL");
}

#[test]
fn sheet_and_method_lookup() {
    let mut d = dispatcher(json!([["a"], [1]]));

    let missing = call(&mut d, json!({"sheet": "nope"}));
    assert_eq!(missing["status"], 404);
    assert_eq!(error_code(&missing), "sheet_not_found");

    let unknown = call(&mut d, json!({"method": "frobnicate", "sheet": "logs"}));
    assert_eq!(unknown["status"], 404);
    assert_eq!(error_code(&unknown), "unknown_method");
    assert_eq!(unknown["error"]["details"]["method"], "FROBNICATE");

    let lower = call(&mut d, json!({"method": "get", "sheet": "LoGs"}));
    assert_eq!(lower["status"], 200);
}

#[test]
fn batches_answer_in_order() {
    let mut d = dispatcher(json!([["Date Modified", "n"]]));

    let responses = d.handle_body(&json!([
        {"method": "POST", "sheet": "logs", "payload": {"n": 1}},
        {"sheet": "missing"},
        {"sheet": "logs"},
    ]));
    let responses = responses.as_array().unwrap();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["status"], 201);
    assert_eq!(error_code(&responses[1]), "sheet_not_found");
    assert_eq!(responses[2]["data"][0]["n"], 1);

    let single = d.handle_body(&json!({"sheet": "logs"}));
    assert!(single.is_object());
    println!("✓ batch entries are handled independently");
}

#[test]
fn export_as_json_and_csv() {
    let mut d = dispatcher(json!([["name", "note"], ["a", "x,y"], [], ["b", "say \"hi\""]]));

    let records = call(&mut d, json!({"method": "EXPORT", "sheet": "logs"}));
    assert_eq!(
        records["data"],
        json!([
            {"_id": 2, "name": "a", "note": "x,y"},
            {"_id": 4, "name": "b", "note": "say \"hi\""},
        ])
    );

    let csv = call(&mut d, json!({"method": "EXPORT", "sheet": "logs", "format": "CSV"}));
    assert_eq!(csv["format"], "csv");
    assert_eq!(csv["data"], "name,note\na,\"x,y\"\nb,\"say \"\"hi\"\"\"");

    let xml = call(&mut d, json!({"method": "EXPORT", "sheet": "logs", "format": "xml"}));
    assert_eq!(error_code(&xml), "invalid_format");
}

#[test]
fn aggregate_ignores_non_numbers() {
    let mut d = dispatcher(json!([["amount", "blank"], [10, ""], ["n/a", ""], [20, ""], ["", ""]]));

    let sum = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "amount", "operation": "sum"}),
    );
    assert_eq!(sum["data"], json!({"result": 30}));

    let avg = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "amount", "operation": "avg"}),
    );
    assert_eq!(avg["data"]["result"], 15);

    let count = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "amount", "operation": "count", "where": {"x": 1}}),
    );
    assert_eq!(count["data"]["result"], 2);

    let max = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "amount", "operation": "max"}),
    );
    assert_eq!(max["data"]["result"], 20);

    let empty_min = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "blank", "operation": "min"}),
    );
    assert_eq!(empty_min["data"]["result"], serde_json::Value::Null);

    let bad_op = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "amount", "operation": "median"}),
    );
    assert_eq!(error_code(&bad_op), "invalid_operation");

    let bad_column = call(
        &mut d,
        json!({"method": "AGGREGATE", "sheet": "logs", "column": "zz", "operation": "sum"}),
    );
    assert_eq!(error_code(&bad_column), "column_not_found");
    println!("✓ AGGREGATE reduces numeric cells only");
}

#[test]
fn sheets_are_listed_with_links() {
    let mut workbook = MemoryWorkbook::new("book1");
    workbook.add_sheet_with_values("Logs", cells(json!([["name", "n"], ["a", 1]])));
    workbook.add_sheet("Hidden").hidden = true;
    let mut d = with_fixed_clock(Dispatcher::new(workbook, AuthConfig::default()));

    let sheets = call(&mut d, json!({"method": "GET_SHEETS", "sheet": "logs"}));
    assert_eq!(
        sheets["data"],
        json!([
            {
                "name": "Logs",
                "id": 0,
                "index": 1,
                "isHidden": false,
                "csvUrl": "https://docs.google.com/spreadsheets/d/book1/export?format=csv&gid=0",
                "sheetUrl": "https://docs.google.com/spreadsheets/d/book1/edit#gid=0",
            },
            {
                "name": "Hidden",
                "id": 1,
                "index": 2,
                "isHidden": true,
                "csvUrl": "https://docs.google.com/spreadsheets/d/book1/export?format=csv&gid=1",
                "sheetUrl": "https://docs.google.com/spreadsheets/d/book1/edit#gid=1",
            },
        ])
    );

    let csv = call(&mut d, json!({"method": "GET_CSV", "sheet": "Logs"}));
    assert_eq!(csv, json!({"status": 200, "data": "name,n\na,1"}));

    let wrong_case = call(&mut d, json!({"method": "GET_CSV", "sheet": "LOGS"}));
    assert_eq!(error_code(&wrong_case), "sheet_not_found");
    println!("✓ GET_SHEETS and GET_CSV describe the workbook");
}

/// A workbook whose CSV export always fails in the same way.
struct BrokenExport {
    inner: MemoryWorkbook,
    export: fn() -> Result<CsvExport, GridError>,
}

impl Workbook for BrokenExport {
    fn spreadsheet_id(&self) -> &str {
        self.inner.spreadsheet_id()
    }

    fn sheets(&self) -> Vec<SheetInfo> {
        self.inner.sheets()
    }

    fn find_sheet(&self, name: &str) -> Option<usize> {
        self.inner.find_sheet(name)
    }

    fn sheet(&self, position: usize) -> Option<&dyn Grid> {
        self.inner.sheet(position)
    }

    fn sheet_mut(&mut self, position: usize) -> Option<&mut dyn Grid> {
        self.inner.sheet_mut(position)
    }

    fn export_csv(&self, _sheet_id: u32) -> Result<CsvExport, GridError> {
        (self.export)()
    }
}

fn broken_export(export: fn() -> Result<CsvExport, GridError>) -> Dispatcher<BrokenExport> {
    let mut inner = MemoryWorkbook::new("book1");
    inner.add_sheet_with_values("Logs", cells(json!([["name"], ["a"]])));
    Dispatcher::new(BrokenExport { inner, export }, AuthConfig::default())
}

#[test]
fn csv_export_failures_are_reported() {
    let mut refused = broken_export(|| {
        Ok(CsvExport {
            status: 403,
            body: "forbidden".to_string(),
        })
    });
    let response = refused
        .handle(&json!({"method": "GET_CSV", "sheet": "Logs"}))
        .to_json();
    assert_eq!(response["status"], 403);
    assert_eq!(error_code(&response), "csv_fetch_failed");
    assert_eq!(response["error"]["details"]["sheet"], "Logs");
    assert_eq!(response["error"]["details"]["message"], "forbidden");

    let mut crashed = broken_export(|| Err(GridError::Backend("export service down".to_string())));
    let response = crashed
        .handle(&json!({"method": "GET_CSV", "sheet": "Logs"}))
        .to_json();
    assert_eq!(response["status"], 500);
    assert_eq!(error_code(&response), "csv_processing_failed");
    assert_eq!(response["error"]["details"]["sheet"], "Logs");
    assert_eq!(response["error"]["details"]["message"], "export service down");
    println!("✓ GET_CSV surfaces refused and failed exports");
}

#[test]
fn timestamps_use_the_configured_format() {
    let d = dispatcher(json!([]));
    assert_eq!(d.timestamp(), common::STAMP);

    let custom = d.with_config(sheetlog::DispatchConfig {
        timestamp_format: "%Y-%m-%d".to_string(),
        ..Default::default()
    });
    assert_eq!(custom.timestamp(), "2024-01-02");
}
