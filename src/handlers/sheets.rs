use super::HandlerResult;
use crate::grid::Workbook;
use crate::response::{ApiError, Response};
use log::error;
use serde_json::{Value, json};

/// Describe every tab of the workbook, with export and edit links.
pub fn get_sheets(workbook: &dyn Workbook, base_url: &str) -> HandlerResult {
    let spreadsheet_id = workbook.spreadsheet_id();
    let base_url = base_url.trim_end_matches('/');

    let sheets = workbook
        .sheets()
        .into_iter()
        .map(|info| {
            json!({
                "name": info.name,
                "id": info.id,
                "index": info.position + 1,
                "isHidden": info.hidden,
                "csvUrl": format!(
                    "{}/{}/export?format=csv&gid={}",
                    base_url, spreadsheet_id, info.id
                ),
                "sheetUrl": format!("{}/{}/edit#gid={}", base_url, spreadsheet_id, info.id),
            })
        })
        .collect::<Vec<Value>>();

    Ok(Response::data(200, sheets))
}

/// Fetch the CSV export of the tab named exactly `sheet`.
pub fn get_csv(workbook: &dyn Workbook, sheet: &str) -> HandlerResult {
    let info = workbook
        .sheets()
        .into_iter()
        .find(|info| info.name == sheet)
        .ok_or_else(|| ApiError::new(404, "sheet_not_found", json!({ "sheet": sheet })))?;

    match workbook.export_csv(info.id) {
        Ok(export) if export.status == 200 => Ok(Response::data(200, export.body)),
        Ok(export) => Err(ApiError::new(
            export.status,
            "csv_fetch_failed",
            json!({ "message": export.body, "sheet": sheet }),
        )),
        Err(err) => {
            error!("csv export of {} failed: {}", sheet, err);
            Err(ApiError::new(
                500,
                "csv_processing_failed",
                json!({ "message": err.to_string(), "sheet": sheet }),
            ))
        }
    }
}
