//! Wire form of a test response.

use crate::error::StructuralError;
use crate::pipeline::{ErrorKind, ErrorPolicy, FinalResult, StepKind, StepOutput, TestOutcome};
use crate::service::request::WireHistory;
use crate::types::Value;
use serde::{Deserialize, Serialize};

fn is_false(b: &bool) -> bool {
    !*b
}

/// One attempted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub index: usize,
    pub kind: StepKind,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub discarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Error policy that handled a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ErrorPolicy>,
    /// Wall time spent in the step, in microseconds
    #[serde(default)]
    pub elapsed_us: u64,
}

/// Response to a test request.
///
/// Exactly one of `result`, `discarded` or `error` describes the final
/// outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResponse {
    pub steps: Vec<StepTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub discarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// History a live engine would store for the next value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<WireHistory>,
}

impl TestResponse {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_json(&self, pretty: bool) -> crate::error::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Body written in place of a response when a request is rejected before
/// any step runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralReport<'a> {
    pub structural_errors: &'a [StructuralError],
}

impl<'a> StructuralReport<'a> {
    pub fn new(structural_errors: &'a [StructuralError]) -> Self {
        Self { structural_errors }
    }

    pub fn to_json(&self, pretty: bool) -> crate::error::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

fn payload(value: &Value) -> String {
    value.to_text()
}

impl From<&TestOutcome> for TestResponse {
    fn from(outcome: &TestOutcome) -> Self {
        let steps = outcome
            .steps
            .iter()
            .map(|record| {
                let mut trace = StepTrace {
                    index: record.index,
                    kind: record.kind,
                    input: payload(&record.input),
                    result: None,
                    discarded: false,
                    error: None,
                    error_kind: None,
                    action: record.policy_applied.clone(),
                    elapsed_us: u64::try_from(record.elapsed.as_micros()).unwrap_or(u64::MAX),
                };
                match &record.outcome {
                    Ok(StepOutput::Value(v)) => trace.result = Some(payload(v)),
                    Ok(StepOutput::Discarded) => trace.discarded = true,
                    Err(e) => {
                        trace.error = Some(e.to_string());
                        trace.error_kind = Some(e.kind());
                    }
                }
                trace
            })
            .collect();

        let mut response = TestResponse {
            steps,
            result: None,
            discarded: false,
            error: None,
            error_kind: None,
            history: outcome.next_history.as_ref().map(|h| WireHistory {
                value: payload(&h.previous_value),
                value_type: h.previous_value.semantic_type(),
                timestamp: h.previous_timestamp,
            }),
        };

        match &outcome.result {
            FinalResult::Value(v) => response.result = Some(payload(v)),
            FinalResult::Discarded => response.discarded = true,
            FinalResult::Failed(e) => {
                response.error = Some(e.to_string());
                response.error_kind = Some(e.kind());
            }
        }
        response
    }
}

impl From<TestOutcome> for TestResponse {
    fn from(outcome: TestOutcome) -> Self {
        TestResponse::from(&outcome)
    }
}
