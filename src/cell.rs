use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Largest integer magnitude that survives a round trip through an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A single cell value as the backing grid stores it.
///
/// Structured JSON (objects and arrays) never reaches the grid as such: it is
/// flattened to its JSON text on the way in and stays a string on the way out.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// An empty cell, or a cell holding the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric payload, if the cell holds a number. Numeric-looking text is
    /// not parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    /// Convert a request value into a cell value.
    ///
    /// `null` becomes empty, objects and arrays are serialized to JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            Value::String(s) => CellValue::text(s.as_str()),
            structured => CellValue::Text(structured.to_string()),
        }
    }

    /// Convert a cell value into the JSON shape returned to callers. Empty
    /// cells read back as the empty string.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Number(n) => number_to_json(*n),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Render a number the way the spreadsheet displays it: whole numbers without
/// a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// JSON form of a number; whole numbers are emitted as integers and
/// non-finite values as `null`.
pub fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Display attributes of a cell, mirroring what the backing service reports.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CellFormat {
    pub background: String,
    pub font_color: String,
    pub number_format: String,
    pub font_family: String,
    pub font_size: u32,
    pub font_style: String,
    pub horizontal_alignment: String,
    pub vertical_alignment: String,
    pub wrap: bool,
}

impl Default for CellFormat {
    fn default() -> Self {
        CellFormat {
            background: "#ffffff".to_string(),
            font_color: "#000000".to_string(),
            number_format: "0.###############".to_string(),
            font_family: "Arial".to_string(),
            font_size: 10,
            font_style: "normal".to_string(),
            horizontal_alignment: "general".to_string(),
            vertical_alignment: "bottom".to_string(),
            wrap: false,
        }
    }
}

/// One stored cell: its value, the formula that produced it (if any) and
/// non-default formatting.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub formula: Option<String>,
    pub format: Option<Box<CellFormat>>,
}

impl Cell {
    pub fn create(value: CellValue) -> Self {
        let formula = match &value {
            CellValue::Text(s) if s.starts_with('=') => Some(s.clone()),
            _ => None,
        };
        Cell {
            value,
            formula,
            format: None,
        }
    }

    /// True when the cell carries neither a value nor a formula.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }

    /// Clear the contents, keeping the formatting.
    pub fn clear_content(&mut self) {
        self.value = CellValue::Empty;
        self.formula = None;
    }

    pub fn format(&self) -> CellFormat {
        self.format.as_deref().cloned().unwrap_or_default()
    }
}
