//! Core data types for preproc-test
//!
//! This module contains the value model shared by every preprocessing step:
//! the semantic [`ValueType`] tags, the tagged [`Value`] itself and the
//! optional [`HistoryContext`] supplied by callers for delta-style steps.
//!
//! # Value Types
//!
//! - Numeric: unsigned 64-bit integers and 64-bit floats
//! - Text and log records (log values carry only their message here)
//! - Raw binary payloads
//!
//! # Error Values
//!
//! [`Value::Error`] is not a semantic type of its own. It is produced when a
//! step fails under the "set custom error" policy and keeps flowing through
//! the chain so later steps can inspect the error text.

use crate::coercion::{self, ConversionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic type of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// 64-bit floating point
    Float,
    /// 64-bit unsigned integer
    Unsigned,
    /// Character data
    #[default]
    Text,
    /// Log record (message only)
    Log,
    /// Raw bytes
    Binary,
}

impl ValueType {
    /// All value types, in wire order
    pub fn all() -> &'static [ValueType] {
        &[
            ValueType::Float,
            ValueType::Unsigned,
            ValueType::Text,
            ValueType::Log,
            ValueType::Binary,
        ]
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Float => write!(f, "float"),
            ValueType::Unsigned => write!(f, "unsigned"),
            ValueType::Text => write!(f, "text"),
            ValueType::Log => write!(f, "log"),
            ValueType::Binary => write!(f, "binary"),
        }
    }
}

/// A tagged value flowing through a preprocessing chain
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Unsigned(u64),
    Text(String),
    Log(String),
    Binary(Vec<u8>),
    /// Error text produced by the "set custom error" policy
    Error(String),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Create an error-tagged value
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    /// The semantic type of this value.
    ///
    /// Error values carry text, so they report [`ValueType::Text`].
    pub fn semantic_type(&self) -> ValueType {
        match self {
            Value::Float(_) => ValueType::Float,
            Value::Unsigned(_) => ValueType::Unsigned,
            Value::Text(_) | Value::Error(_) => ValueType::Text,
            Value::Log(_) => ValueType::Log,
            Value::Binary(_) => ValueType::Binary,
        }
    }

    /// Returns true if this is an error-tagged value
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Canonical text form of this value. Always defined.
    pub fn to_text(&self) -> String {
        coercion::format_text(self)
    }

    /// Build a value of type `value_type` from its wire payload.
    ///
    /// Binary payloads are hex encoded; every other type is parsed from text.
    pub fn from_payload(value_type: ValueType, payload: &str) -> Result<Value, ConversionError> {
        match value_type {
            ValueType::Binary => coercion::decode_hex(payload).map(Value::Binary),
            other => coercion::coerce(&Value::text(payload), other),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Previous observation supplied by the caller for delta-style steps
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryContext {
    /// Value observed last time
    pub previous_value: Value,
    /// When it was observed
    pub previous_timestamp: DateTime<Utc>,
}

impl HistoryContext {
    pub fn new(previous_value: Value, previous_timestamp: DateTime<Utc>) -> Self {
        Self {
            previous_value,
            previous_timestamp,
        }
    }

    /// Seconds elapsed between the previous observation and `now`.
    ///
    /// Negative when `now` precedes the previous timestamp.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.previous_timestamp)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_else(|| (now - self.previous_timestamp).num_seconds() as f64)
    }
}
