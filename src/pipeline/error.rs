//! Step-level error types.

use crate::coercion::ConversionError;
use crate::scripting::ScriptError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Structural,
    TypeMismatch,
    StepAlgorithm,
    Timeout,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::StepAlgorithm => "step_algorithm",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while executing a single step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("{0}")]
    TypeMismatch(#[from] ConversionError),

    #[error("{0}")]
    Algorithm(String),

    #[error("no previous value is available")]
    MissingHistory,

    #[error("execution time limit of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    /// Error text set by the "set custom error" policy
    #[error("{0}")]
    Custom(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StepError {
    pub fn algorithm(message: impl Into<String>) -> Self {
        StepError::Algorithm(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            StepError::Algorithm(_) | StepError::MissingHistory | StepError::Custom(_) => {
                ErrorKind::StepAlgorithm
            }
            StepError::Timeout(_) => ErrorKind::Timeout,
            StepError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the step's failure policy may handle this error.
    ///
    /// Timeouts and internal faults always stop the chain.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StepError::Timeout(_) | StepError::Internal(_))
    }
}

impl From<ScriptError> for StepError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Timeout(limit) => StepError::Timeout(limit),
            ScriptError::Internal(message) => StepError::Internal(message),
            other => StepError::Algorithm(other.to_string()),
        }
    }
}

pub type StepResult<T> = std::result::Result<T, StepError>;
