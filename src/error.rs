//! Error handling for preproc-test
//!
//! This module defines the crate-level error type returned by the test
//! service and configuration layer, and a Result alias for use throughout
//! the crate. Failures of individual steps are not errors at this level:
//! they are recorded in the trace (see [`crate::pipeline::StepError`]).

use crate::pipeline::StepKind;
use serde::Serialize;
use thiserror::Error;

/// A malformed part of a test request, detected before any step runs
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum StructuralError {
    #[error("step {index}: unknown step kind '{kind}'")]
    UnknownKind { index: usize, kind: String },

    #[error("step {index} ({kind}): expected {expected} parameter(s), got {actual}")]
    Arity {
        index: usize,
        kind: StepKind,
        expected: usize,
        actual: usize,
    },

    #[error("step list is empty")]
    EmptyChain,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Main error type for preproc-test operations
#[derive(Error, Debug)]
pub enum PreprocError {
    /// The request is malformed; no step was executed
    #[error("Invalid request: {}", join_structural(.0))]
    Structural(Vec<StructuralError>),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to request/response encoding
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocError>,
    },
}

fn join_structural(errors: &[StructuralError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PreprocError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Structural errors carried by this error, looking through context
    pub fn structural_errors(&self) -> Option<&[StructuralError]> {
        match self {
            PreprocError::Structural(errors) => Some(errors),
            PreprocError::WithContext { source, .. } => source.structural_errors(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PreprocError {
    fn from(err: serde_json::Error) -> Self {
        PreprocError::Serialization(err.to_string())
    }
}

/// Result type alias for preproc-test operations
pub type Result<T> = std::result::Result<T, PreprocError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
