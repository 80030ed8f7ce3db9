//! Test service: the entry point for dry runs of a preprocessing chain.
//!
//! [`TestService::evaluate`] validates a decoded [`TestRequest`], runs the
//! chain under the overall deadline and encodes the outcome as a
//! [`TestResponse`]. Nothing outside the response is touched, so one service
//! can be shared by any number of threads.

pub mod request;
pub mod response;

pub use request::{RawStep, TestRequest, WireHistory};
pub use response::{StepTrace, StructuralReport, TestResponse};

use crate::config::EngineConfig;
use crate::error::{PreprocError, Result, StructuralError};
use crate::pipeline::{ErrorPolicy, FinalResult, PipelineExecutor, Step, StepKind, TestOutcome};
use crate::scripting::{RhaiScriptRunner, ScriptRunner};
use crate::types::{HistoryContext, Value};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// A request that passed structural validation
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTest {
    pub value: Value,
    pub history: Option<HistoryContext>,
    pub steps: Vec<Step>,
    pub timeout: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Runs test requests
pub struct TestService {
    config: EngineConfig,
    scripts: Arc<dyn ScriptRunner>,
}

impl TestService {
    /// Create a service running scripts in the Rhai sandbox
    pub fn new(config: EngineConfig) -> Self {
        let scripts = Arc::new(RhaiScriptRunner::with_limits(config.script.clone()));
        Self { config, scripts }
    }

    /// Create a service with a custom script runner
    pub fn with_runner(config: EngineConfig, scripts: Arc<dyn ScriptRunner>) -> Self {
        Self { config, scripts }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check the shape of a request, collecting every problem found.
    pub fn validate(&self, request: &TestRequest) -> Result<PreparedTest> {
        let mut errors = Vec::new();

        if request.steps.is_empty() {
            errors.push(StructuralError::EmptyChain);
        }

        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.timeout());
        if timeout.is_zero() {
            errors.push(StructuralError::ZeroTimeout);
        }

        let value = Value::from_payload(request.value_type, &request.value)
            .map_err(|e| invalid("value", e))
            .map_err(|e| errors.push(e))
            .ok();

        let history = match &request.history {
            Some(h) => Value::from_payload(h.value_type, &h.value)
                .map(|v| Some(HistoryContext::new(v, h.timestamp)))
                .map_err(|e| errors.push(invalid("history.value", e)))
                .ok(),
            None => Some(None),
        };

        let steps: Vec<Step> = request
            .steps
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match parse_step(index, raw) {
                Ok(step) => Some(step),
                Err(mut step_errors) => {
                    errors.append(&mut step_errors);
                    None
                }
            })
            .collect();

        match (value, history) {
            (Some(value), Some(history)) if errors.is_empty() => Ok(PreparedTest {
                value,
                history,
                steps,
                timeout,
                timestamp: request.timestamp.unwrap_or_else(Utc::now),
            }),
            _ => Err(PreprocError::Structural(errors)),
        }
    }

    /// Run a request and return the typed outcome
    pub fn evaluate_outcome(&self, request: &TestRequest) -> Result<TestOutcome> {
        let test = self.validate(request)?;

        let span = tracing::info_span!("evaluate", steps = test.steps.len());
        let _guard = span.enter();

        let outcome = PipelineExecutor::new(self.scripts.as_ref())
            .at(test.timestamp)
            .with_timeout(test.timeout)
            .run(test.value, test.history.as_ref(), &test.steps);

        match &outcome.result {
            FinalResult::Value(v) => tracing::info!("chain produced {}", v),
            FinalResult::Discarded => tracing::info!("chain discarded the value"),
            FinalResult::Failed(e) => tracing::info!("chain failed ({}): {}", e.kind(), e),
        }
        Ok(outcome)
    }

    /// Run a request and encode the outcome for the caller
    pub fn evaluate(&self, request: &TestRequest) -> Result<TestResponse> {
        self.evaluate_outcome(request).map(TestResponse::from)
    }
}

impl Default for TestService {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn invalid(field: &str, message: impl std::fmt::Display) -> StructuralError {
    StructuralError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn parse_step(index: usize, raw: &RawStep) -> std::result::Result<Step, Vec<StructuralError>> {
    let mut errors = Vec::new();

    let kind = match raw.kind.parse::<StepKind>() {
        Ok(kind) => Some(kind),
        Err(kind) => {
            errors.push(StructuralError::UnknownKind { index, kind });
            None
        }
    };

    if let Some(kind) = kind {
        if raw.params.len() != kind.arity() {
            errors.push(StructuralError::Arity {
                index,
                kind,
                expected: kind.arity(),
                actual: raw.params.len(),
            });
        }
    }

    let on_fail = match &raw.on_fail {
        None => Some(ErrorPolicy::Abort),
        Some(policy) => serde_json::from_value::<ErrorPolicy>(policy.clone())
            .map_err(|e| errors.push(invalid(&format!("steps[{}].on_fail", index), e)))
            .ok(),
    };

    match (kind, on_fail) {
        (Some(kind), Some(on_fail)) if errors.is_empty() => Ok(Step {
            kind,
            params: raw.params.clone(),
            on_fail,
        }),
        _ => Err(errors),
    }
}
