//! Preprocessing chains and their executor.
//!
//! A chain is an ordered list of [`Step`]s applied to a single [`Value`].
//! The executor threads the current value from step to step, coercing it to
//! each step's input requirement, and records every attempt in the trace.
//!
//! # Architecture
//!
//! ```text
//! Value ──► coerce ──► step algorithm ──► next value
//!              │              │
//!              └── failure ───┴──► ErrorPolicy (abort / discard / set value / set error)
//! ```
//!
//! # Design
//!
//! - **Closed step set**: [`StepKind`] is an enum and dispatch is one
//!   exhaustive `match` in [`steps::apply`].
//! - **Errors as data**: a custom error replaces the current value with
//!   [`Value::Error`], so later steps can still inspect it.
//! - **Scripts behind a trait**: script steps only see [`ScriptRunner`].
//!
//! [`Value`]: crate::types::Value
//! [`Value::Error`]: crate::types::Value::Error
//! [`ScriptRunner`]: crate::scripting::ScriptRunner

pub mod error;
pub mod executor;
pub mod jsonpath;
pub mod step;
pub mod steps;
pub mod trace;

pub use error::{ErrorKind, StepError, StepResult};
pub use executor::PipelineExecutor;
pub use jsonpath::{JsonPath, JsonPathError};
pub use step::{ErrorPolicy, InputRequirement, Step, StepKind};
pub use trace::{FinalResult, StepOutput, StepRecord, TestOutcome};
