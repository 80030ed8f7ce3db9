//! # preproc-test: dry runs of item value preprocessing chains
//!
//! Feeds a value (and optionally the previous observation) through an ordered
//! chain of preprocessing steps and reports what every step did, without
//! touching any stored item state.
//!
//! ## Architecture
//!
//! - **Types**: the tagged [`Value`] and the optional [`HistoryContext`]
//! - **Coercion**: lossless conversions between value types
//! - **Pipeline**: step definitions, step algorithms and the executor
//! - **Scripting**: Rhai sandbox for script steps behind [`ScriptRunner`]
//! - **Service**: request validation, deadline handling and the wire format
//!
//! ## Configuration
//!
//! The overall timeout and script limits are read from `config.toml` in the
//! platform config directory under `preproc-test` (see [`config`]).
//!
//! ## Example
//!
//! ```no_run
//! use preproc_test::{EngineConfig, TestRequest, TestService};
//!
//! let request = TestRequest::from_json(
//!     r#"{"value": "  42.5  ", "steps": [
//!         {"kind": "trim", "params": [" "]},
//!         {"kind": "to_float"},
//!         {"kind": "validate_range", "params": ["0", "100"]}
//!     ]}"#,
//! )?;
//!
//! let service = TestService::new(EngineConfig::load_or_default());
//! let response = service.evaluate(&request)?;
//! assert_eq!(response.result.as_deref(), Some("42.5"));
//! # Ok::<(), preproc_test::PreprocError>(())
//! ```

pub mod coercion;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scripting;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, ScriptLimits};
pub use error::{PreprocError, Result, StructuralError};
pub use pipeline::{
    ErrorKind, ErrorPolicy, FinalResult, PipelineExecutor, Step, StepError, StepKind, TestOutcome,
};
pub use scripting::{RhaiScriptRunner, ScriptError, ScriptRunner};
pub use service::{TestRequest, TestResponse, TestService};
pub use types::{HistoryContext, Value, ValueType};
