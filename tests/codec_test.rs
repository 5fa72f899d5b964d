use serde_json::{Value, json};
use sheetlog::codec::{Record, record_to_row, row_to_record};
use sheetlog::CellValue;

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

#[test]
fn primitive_records_round_trip() {
    let headers = headers(&["Date Modified", "name", "score", "active"]);
    let samples = [
        json!({"_id": 2, "Date Modified": "01/02/2024 03:04:05", "name": "Ann", "score": 7, "active": true}),
        json!({"_id": 9, "Date Modified": "t", "name": "", "score": 2.5, "active": false}),
        json!({"_id": 3, "Date Modified": "t", "name": "x,y", "score": "", "active": ""}),
    ];

    for sample in samples {
        let original = record(sample);
        let id = original["_id"].as_u64().unwrap() as usize;
        let row = record_to_row(&original, &headers);
        assert_eq!(row_to_record(&row, id, &headers), Some(original.clone()));
    }
    println!("✓ rows decode back to the records they were built from");
}

#[test]
fn structured_values_come_back_as_json_text() {
    let headers = headers(&["meta", "tags"]);
    let row = record_to_row(&record(json!({"meta": {"a": 1}, "tags": [1, 2]})), &headers);
    assert_eq!(row, vec![CellValue::text("{\"a\":1}"), CellValue::text("[1,2]")]);

    let decoded = row_to_record(&row, 2, &headers).unwrap();
    assert_eq!(decoded["meta"], json!("{\"a\":1}"));
    assert_eq!(decoded["tags"], json!("[1,2]"));
}

#[test]
fn empty_rows_and_unnamed_headers() {
    let headers = headers(&["a", "", "c"]);
    assert_eq!(row_to_record(&[CellValue::Empty, CellValue::text("")], 4, &headers), None);

    let row = vec![CellValue::Number(1.0), CellValue::text("hidden"), CellValue::Empty];
    let decoded = row_to_record(&row, 4, &headers).unwrap();
    assert_eq!(Value::Object(decoded), json!({"_id": 4, "a": 1, "c": ""}));

    let keys: Vec<_> = row_to_record(&row, 4, &headers).unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["_id", "a", "c"]);
}
