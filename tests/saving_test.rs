use sheetlog::saving::{load_workbook, read_workbook, save_workbook, write_workbook};
use sheetlog::{CellFormat, CellValue, Grid, MemoryWorkbook, Range, Workbook};

fn sample() -> MemoryWorkbook {
    let mut workbook = MemoryWorkbook::new("book1");
    let sheet = workbook.add_sheet_with_values(
        "Logs",
        vec![
            vec![CellValue::text("Date Modified"), CellValue::text("n")],
            vec![CellValue::text("01/02/2024 03:04:05"), CellValue::Number(1.5)],
        ],
    );
    sheet
        .set_formula(2, 3, "=B2*2", CellValue::Number(3.0))
        .unwrap();
    sheet
        .set_format(
            1,
            1,
            CellFormat {
                background: "#ff0000".to_string(),
                ..CellFormat::default()
            },
        )
        .unwrap();
    workbook.add_sheet("Empty").hidden = true;
    workbook
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.bin.gz");

    let workbook = sample();
    save_workbook(&workbook, &path).unwrap();
    assert!(path.exists());
    println!("✓ snapshot written to {}", path.display());

    let loaded = load_workbook(&path).unwrap();
    assert_eq!(loaded.spreadsheet_id(), "book1");
    assert_eq!(loaded.sheets(), workbook.sheets());

    let logs = loaded.sheet_by_name("logs").unwrap();
    let range = Range::new(1, 1, 2, 3);
    assert_eq!(
        logs.get_values(range).unwrap(),
        workbook.sheet_by_name("Logs").unwrap().get_values(range).unwrap()
    );
    assert_eq!(logs.get_formulas(Range::cell(2, 3)).unwrap(), vec![vec!["=B2*2".to_string()]]);
    assert_eq!(logs.get_formats(Range::cell(1, 1)).unwrap()[0][0].background, "#ff0000");
    println!("✓ values, formulas and formats survive a round trip");
}

#[test]
fn snapshots_are_gzip_compressed() {
    let mut buffer = Vec::new();
    write_workbook(&sample(), &mut buffer).unwrap();
    assert_eq!(&buffer[..2], &[0x1f, 0x8b]);

    let loaded = read_workbook(buffer.as_slice()).unwrap();
    assert_eq!(loaded.sheets().len(), 2);
}

#[test]
fn corrupt_snapshots_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.bin.gz");
    std::fs::write(&path, b"not a snapshot").unwrap();

    assert!(load_workbook(&path).is_err());
    assert!(load_workbook(dir.path().join("missing.bin.gz")).is_err());
}
