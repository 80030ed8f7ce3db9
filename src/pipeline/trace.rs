//! Execution trace produced by a test run.

use crate::pipeline::error::StepError;
use crate::pipeline::step::{ErrorPolicy, StepKind};
use crate::types::{HistoryContext, Value};
use std::time::Duration;

/// What a step produced on success.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Value(Value),
    /// The step decided no value should be produced
    Discarded,
}

/// Record of one attempted step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub index: usize,
    pub kind: StepKind,
    /// Value the step received, before coercion
    pub input: Value,
    pub outcome: Result<StepOutput, StepError>,
    /// Failure policy that fired; `None` when the step succeeded or the
    /// error bypassed the policy
    pub policy_applied: Option<ErrorPolicy>,
    pub elapsed: Duration,
}

impl StepRecord {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&StepError> {
        self.outcome.as_ref().err()
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.outcome {
            Ok(StepOutput::Value(v)) => Some(v),
            _ => None,
        }
    }
}

/// Final result of a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalResult {
    Value(Value),
    /// No value was produced, either by a discarding step or by the discard
    /// policy
    Discarded,
    Failed(StepError),
}

/// Everything a test run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub steps: Vec<StepRecord>,
    pub result: FinalResult,
    /// History a live engine would keep for the next observation
    pub next_history: Option<HistoryContext>,
}

impl TestOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.result, FinalResult::Failed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.result {
            FinalResult::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match &self.result {
            FinalResult::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self.result, FinalResult::Discarded)
    }
}
