use chrono::{DateTime, Utc};

use crate::fetching::errors::DecodeError;

// ============================================================================
// Store Values and Rows
// ============================================================================

/// Column value or bound parameter, independent of any SQL dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: column alias to value, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn extend(&mut self, other: Row) {
        self.columns.extend(other.columns);
    }

    pub fn extended(mut self, other: Row) -> Self {
        self.extend(other);
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> Result<&Value, DecodeError> {
        self.get(column)
            .ok_or_else(|| DecodeError::new(column, "column missing from row"))
    }

    pub fn int(&self, column: &str) -> Result<i64, DecodeError> {
        self.opt_int(column)?
            .ok_or_else(|| DecodeError::new(column, "unexpected null"))
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>, DecodeError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str, DecodeError> {
        self.opt_text(column)?
            .ok_or_else(|| DecodeError::new(column, "unexpected null"))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<&str>, DecodeError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.as_str())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, DecodeError> {
        match self.require(column)? {
            Value::Timestamp(v) => Ok(*v),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }
}

fn mismatch(column: &str, expected: &str, found: &Value) -> DecodeError {
    DecodeError::new(
        column,
        format!("expected {}, found {}", expected, found.type_name()),
    )
}
