use crate::error::GridError;
use log::error;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// The uniform response envelope: `{status, data?, error?, ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,

    /// Method-specific top-level fields such as `next`, `cursor` or `hasMore`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub details: Value,
}

impl Response {
    /// A success envelope carrying `data`.
    pub fn data(status: u16, data: impl Into<Value>) -> Self {
        Response {
            status,
            data: Some(data.into()),
            error: None,
            extra: Map::new(),
        }
    }

    /// A success envelope without a body.
    pub fn empty(status: u16) -> Self {
        Response {
            status,
            data: None,
            error: None,
            extra: Map::new(),
        }
    }

    pub fn message(status: u16, message: &str) -> Self {
        Response::data(status, json!({ "message": message }))
    }

    /// Attach a top-level field. `null` values are kept; use
    /// [`Response::with_optional`] to omit absent ones.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    pub fn with_optional(self, name: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            json!({
                "status": 500,
                "error": { "code": "internal_error", "details": { "message": e.to_string() } }
            })
        })
    }
}

/// A request-level failure, surfaced to the caller as an error envelope.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status} {code}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub details: Value,
}

impl ApiError {
    pub fn new(status: u16, code: &str, details: Value) -> Self {
        ApiError {
            status,
            code: code.to_string(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(500, "internal_error", json!({ "message": message.into() }))
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        Response {
            status: err.status,
            data: None,
            error: Some(ErrorBody {
                code: err.code,
                details: err.details,
            }),
            extra: Map::new(),
        }
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        error!("grid operation failed: {}", err);
        ApiError::internal(err.to_string())
    }
}
