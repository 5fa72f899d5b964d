//! Request dispatch: validation order, method routing and batch handling.

use crate::auth::AuthConfig;
use crate::grid::{Grid, Workbook};
use crate::handlers::{HandlerResult, columns, query, range, rows, sheets};
use crate::request::{Envelope, Method, Operation};
use crate::response::{ApiError, Response};
use chrono::{DateTime, Local};
use log::{debug, warn};
use serde_json::{Value, json};

pub const DEFAULT_EXPORT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

const WEAK_KEY_MESSAGE: &str = "Key must be at least 8 characters long and contain a lower case \
letter, an upper case letter, a digit and a symbol";

/// Settings that shape responses but not access.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Prefix of the links returned by GET_SHEETS.
    pub export_base_url: String,
    /// chrono format of the "Date Modified" stamp.
    pub timestamp_format: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            export_base_url: DEFAULT_EXPORT_BASE_URL.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Routes decoded requests to the operation handlers.
///
/// Checks run in a fixed order: authorization, key strength, sheet lookup,
/// row index validation, then method resolution. The first failure becomes
/// the response.
pub struct Dispatcher<W: Workbook> {
    workbook: W,
    auth: AuthConfig,
    config: DispatchConfig,
    clock: Clock,
}

impl<W: Workbook> Dispatcher<W> {
    pub fn new(workbook: W, auth: AuthConfig) -> Self {
        Dispatcher {
            workbook,
            auth,
            config: DispatchConfig::default(),
            clock: Box::new(Local::now),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock used for "Date Modified" stamps.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut W {
        &mut self.workbook
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The current time in the configured stamp format.
    pub fn timestamp(&self) -> String {
        (self.clock)().format(&self.config.timestamp_format).to_string()
    }

    /// Handle one request object.
    pub fn handle(&mut self, request: &Value) -> Response {
        let envelope = Envelope::from_value(request);
        match self.dispatch(&envelope) {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    "{} on {:?} failed: {} {}",
                    envelope.method, envelope.sheet, err.status, err.code
                );
                err.into()
            }
        }
    }

    /// Handle a request body: an array is a batch and yields an array of
    /// responses in the same order, anything else a single response.
    pub fn handle_body(&mut self, body: &Value) -> Value {
        match body {
            Value::Array(requests) => Value::Array(
                requests
                    .iter()
                    .map(|request| self.handle(request).to_json())
                    .collect(),
            ),
            request => self.handle(request).to_json(),
        }
    }

    fn dispatch(&mut self, envelope: &Envelope) -> HandlerResult {
        debug!("{} on sheet {:?}", envelope.method, envelope.sheet);

        if !self.auth.authorize(&envelope.key, &envelope.sheet, &envelope.method) {
            warn!(
                "unauthorized {} on sheet {:?}",
                envelope.method, envelope.sheet
            );
            return Err(ApiError::new(401, "unauthorized", json!({})));
        }

        if !self.auth.is_strong_key(&envelope.key) {
            warn!("rejected weak key for sheet {:?}", envelope.sheet);
            return Err(ApiError::new(
                401,
                "weak_key",
                json!({ "message": WEAK_KEY_MESSAGE }),
            ));
        }

        let position = self.workbook.find_sheet(&envelope.sheet).ok_or_else(|| {
            ApiError::new(404, "sheet_not_found", json!({ "sheet": envelope.sheet }))
        })?;

        let method = envelope.method.parse::<Method>();
        if let Ok(method) = method {
            if method.addresses_row() && envelope.row_id().is_some_and(|row| row <= 1) {
                return Err(ApiError::new(
                    400,
                    "row_index_invalid",
                    json!({ "_id": envelope.get("id") }),
                ));
            }
        }

        let method = method.map_err(|unknown| {
            ApiError::new(404, "unknown_method", json!({ "method": unknown.0 }))
        })?;

        let operation = Operation::parse(method, envelope)?;
        self.execute(position, operation)
    }

    fn grid(&mut self, position: usize) -> Result<&mut dyn Grid, ApiError> {
        self.workbook
            .sheet_mut(position)
            .ok_or_else(|| ApiError::internal(format!("sheet {} is gone", position)))
    }

    fn execute(&mut self, position: usize, operation: Operation) -> HandlerResult {
        let stamp = self.timestamp();

        match operation {
            Operation::GetRow { row } => rows::get_row(self.grid(position)?, row),
            Operation::ListRows(query) => rows::list_rows(self.grid(position)?, &query),
            Operation::Post { payload } => rows::post(self.grid(position)?, &payload, &stamp),
            Operation::DynamicPost { records } => {
                rows::dynamic_post(self.grid(position)?, &records, &stamp)
            }
            Operation::Upsert {
                id_column,
                id,
                payload,
            } => rows::upsert(self.grid(position)?, &id_column, &id, &payload, &stamp),
            Operation::Put { row, payload } => rows::put(self.grid(position)?, row, &payload),
            Operation::Delete { row } => rows::delete(self.grid(position)?, row),
            Operation::AddColumn { name } => columns::add_column(self.grid(position)?, &name),
            Operation::EditColumn { old_name, new_name } => {
                columns::edit_column(self.grid(position)?, &old_name, &new_name)
            }
            Operation::RemoveColumn { name } => {
                columns::remove_column(self.grid(position)?, &name)
            }
            Operation::Find {
                id_column,
                id,
                all_matches,
            } => rows::find(self.grid(position)?, &id_column, &id, all_matches),
            Operation::BulkDelete { ids } => rows::bulk_delete(self.grid(position)?, &ids),
            Operation::PaginatedGet {
                cursor,
                limit,
                sort_by,
                sort_desc,
            } => rows::paginated_get(self.grid(position)?, cursor, limit, &sort_by, sort_desc),
            Operation::Export { format } => query::export(self.grid(position)?, &format),
            Operation::Aggregate {
                column,
                operation,
                filter,
            } => query::aggregate(self.grid(position)?, &column, &operation, filter.as_ref()),
            Operation::BatchUpdate { updates } => {
                rows::batch_update(self.grid(position)?, &updates, &stamp)
            }
            Operation::GetRows {
                start_row,
                end_row,
                include_formulas,
            } => range::get_rows(self.grid(position)?, start_row, end_row, include_formulas),
            Operation::GetColumns {
                start,
                end,
                include_formulas,
                include_formatting,
            } => range::get_columns(
                self.grid(position)?,
                start,
                end,
                include_formulas,
                include_formatting,
            ),
            Operation::GetAllCells(options) => {
                range::get_all_cells(self.grid(position)?, &options)
            }
            Operation::RangeUpdate {
                start_row,
                start_col,
                data,
            } => range::range_update(self.grid(position)?, start_row, start_col, &data, &stamp),
            Operation::GetRange {
                start_row,
                start_col,
                options,
            } => range::get_range(self.grid(position)?, start_row, start_col, &options),
            Operation::GetDataBlock(search) => {
                range::get_data_block(self.grid(position)?, &search)
            }
            Operation::GetSheets => {
                sheets::get_sheets(&self.workbook, &self.config.export_base_url)
            }
            Operation::GetCsv { sheet } => sheets::get_csv(&self.workbook, &sheet),
        }
    }
}

/// True when `request` names a method that modifies the grid. Batches count
/// as writes when any entry does.
pub fn is_write_request(request: &Value) -> bool {
    match request {
        Value::Array(requests) => requests.iter().any(is_write_request),
        request => Envelope::from_value(request)
            .method
            .parse::<Method>()
            .is_ok_and(|method| method.is_write()),
    }
}
