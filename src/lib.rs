/*!
# Sheetlog

A JSON API that turns the tabs of a spreadsheet into a small database, built
in Rust.

## Overview

Callers send a request envelope (`method`, `sheet`, `key` plus method
parameters) either as a query string or as a JSON body. Row 1 of every tab
holds the column headers and each following row is one record. Records are
exchanged as JSON objects keyed by header name, with `_id` carrying the
1-based row index.

## Architecture

### Transport Layer
- **Technologies**: axum, tower-http (CORS), clap
- `GET /` and `POST /` decode the request and hand it to the dispatcher
- A JSON array body is a batch; each entry gets its own response

### Dispatch Layer
- Permission Engine - users, keys, key strength and per-sheet grants
- Dispatcher - fixed validation order, then one handler per method
- Response Envelope - `{status, data?, error?}` plus method-specific fields

### Data Layer
- Grid Accessor - the `Grid` and `Workbook` traits every handler goes through
- Header Manager - header discovery and schema growth
- Row Codec - row to record conversion and back
- In-memory backend with gzip + bincode snapshots

## Methods

- Rows: `GET`, `POST`, `DYNAMIC_POST`, `UPSERT`, `PUT`, `DELETE`, `FIND`,
  `BULK_DELETE`, `BATCH_UPDATE`, `PAGINATED_GET`
- Columns: `ADD_COLUMN`, `EDIT_COLUMN`, `REMOVE_COLUMN`
- Queries: `EXPORT`, `AGGREGATE`
- Blocks: `GET_ROWS`, `GET_COLUMNS`, `GET_ALL_CELLS`, `RANGE_UPDATE`,
  `GET_RANGE`, `GET_DATA_BLOCK`
- Workbook: `GET_SHEETS`, `GET_CSV`

## Modules

- **cell**: cell values and formatting
- **grid**: the grid accessor contract
- **spreadsheet**: in-memory workbook and tabs
- **headers**: header row handling
- **codec**: row and record conversion
- **auth**: users and permissions
- **request**: request envelopes and typed operations
- **response**: response envelopes and API errors
- **handlers**: one function per method
- **dispatcher**: request routing
- **saving**: snapshot persistence with compression
- **downloader**: CSV rendering
- **app**, **config**: the HTTP server (feature `web`)
*/

pub mod auth;
pub mod cell;
pub mod codec;
pub mod dispatcher;
pub mod downloader;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod headers;
pub mod request;
pub mod response;
pub mod saving;
pub mod spreadsheet;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use auth::{AuthConfig, Credential, MethodGrant, Permission, User};
pub use cell::{Cell, CellFormat, CellValue};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use error::{ConfigError, GridError};
pub use grid::{Grid, Range, Workbook};
pub use request::{Method, Operation};
pub use response::{ApiError, Response};
pub use spreadsheet::{MemorySheet, MemoryWorkbook};
