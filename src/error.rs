use thiserror::Error;

/// Failures reported by a grid backend.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("invalid range: row {row}, column {column}, {num_rows}x{num_columns}")]
    InvalidRange {
        row: usize,
        column: usize,
        num_rows: usize,
        num_columns: usize,
    },

    #[error("data has {found} columns in row {row} but the range is {expected} columns wide")]
    RaggedData {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("sheet would grow to {rows} rows by {columns} columns, past the size limit")]
    TooLarge { rows: usize, columns: usize },

    #[error("column {0} is out of bounds")]
    ColumnOutOfBounds(usize),

    #[error("sheet with id {0} does not exist")]
    SheetNotFound(u32),

    #[error("{0}")]
    Backend(String),
}

/// Failures while loading user or server configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("unknown method `{0}` in permission grant")]
    UnknownMethod(String),

    #[error("invalid permission grant: {0}")]
    InvalidGrant(String),
}
