//! Test data builders for creating requests and chains

use chrono::{DateTime, Utc};
use preproc_test::service::{RawStep, WireHistory};
use preproc_test::{ErrorPolicy, Step, StepKind, TestRequest, ValueType};
use serde_json::json;

/// Builder for a single step, usable both typed and on the wire
pub struct StepBuilder {
    kind: StepKind,
    params: Vec<String>,
    on_fail: ErrorPolicy,
}

impl StepBuilder {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
            on_fail: ErrorPolicy::Abort,
        }
    }

    pub fn param(mut self, param: &str) -> Self {
        self.params.push(param.to_string());
        self
    }

    pub fn on_fail(mut self, policy: ErrorPolicy) -> Self {
        self.on_fail = policy;
        self
    }

    pub fn build(self) -> Step {
        Step::new(self.kind, self.params).on_fail(self.on_fail)
    }

    pub fn raw(self) -> RawStep {
        let on_fail = match &self.on_fail {
            ErrorPolicy::Abort => None,
            policy => Some(json!(policy)),
        };
        RawStep {
            kind: self.kind.name().to_string(),
            params: self.params,
            on_fail,
        }
    }
}

/// Builder for test requests
pub struct RequestBuilder {
    request: TestRequest,
}

impl RequestBuilder {
    pub fn text(value: &str) -> Self {
        Self::typed(ValueType::Text, value)
    }

    pub fn typed(value_type: ValueType, value: &str) -> Self {
        Self {
            request: TestRequest::new(value_type, value),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.request.timestamp = Some(timestamp);
        self
    }

    pub fn history(mut self, value_type: ValueType, value: &str, timestamp: DateTime<Utc>) -> Self {
        self.request.history = Some(WireHistory {
            value: value.to_string(),
            value_type,
            timestamp,
        });
        self
    }

    pub fn step(mut self, step: StepBuilder) -> Self {
        self.request.steps.push(step.raw());
        self
    }

    pub fn raw_step(mut self, step: RawStep) -> Self {
        self.request.steps.push(step);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.request.timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> TestRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_builder() {
        let step = StepBuilder::new(StepKind::ValidateRange)
            .param("0")
            .param("100")
            .on_fail(ErrorPolicy::DiscardSilently)
            .build();

        assert_eq!(step.kind, StepKind::ValidateRange);
        assert_eq!(step.params, vec!["0", "100"]);
        assert_eq!(step.on_fail, ErrorPolicy::DiscardSilently);
    }

    #[test]
    fn test_raw_policy_encoding() {
        let raw = StepBuilder::new(StepKind::ToFloat)
            .on_fail(ErrorPolicy::SetValue("0".into()))
            .raw();
        assert_eq!(raw.kind, "to_float");
        assert_eq!(raw.on_fail, Some(json!({"set_value": "0"})));
    }
}
