//! Wire form of a test request.

use crate::types::ValueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decoded test request.
///
/// Step kinds and policies are kept in their raw form so that every
/// malformed entry can be reported at once instead of failing on the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequest {
    #[serde(default)]
    pub value_type: ValueType,
    /// Payload text; hex for binary values
    pub value: String,
    /// When the value was observed, defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<WireHistory>,
    pub steps: Vec<RawStep>,
    /// Overrides the configured timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TestRequest {
    pub fn new(value_type: ValueType, value: impl Into<String>) -> Self {
        Self {
            value_type,
            value: value.into(),
            timestamp: None,
            history: None,
            steps: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Previous observation as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireHistory {
    pub value: String,
    #[serde(default)]
    pub value_type: ValueType,
    pub timestamp: DateTime<Utc>,
}

/// A step as sent on the wire, validated by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    pub kind: String,
    #[serde(default)]
    pub params: Vec<String>,
    /// `"abort"`, `"discard"`, `{"set_value": ..}` or `{"set_error": ..}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<serde_json::Value>,
}

impl RawStep {
    pub fn new<I, S>(kind: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            params: params.into_iter().map(Into::into).collect(),
            on_fail: None,
        }
    }
}
