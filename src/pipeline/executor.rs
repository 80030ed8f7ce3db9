//! Pipeline executor: runs a chain of steps over one value.
//!
//! For every step, in declared order:
//! 1. Check the overall deadline.
//! 2. Coerce the current value to the step's input requirement.
//! 3. Run the step algorithm.
//! 4. On failure, apply the step's error policy.
//!
//! Every attempted step leaves a [`StepRecord`] in the trace, so callers see
//! exactly where and why a chain stopped.

use crate::coercion;
use crate::config::DEFAULT_TIMEOUT_MS;
use crate::pipeline::error::{StepError, StepResult};
use crate::pipeline::step::{ErrorPolicy, InputRequirement, Step};
use crate::pipeline::steps::{apply, StepContext};
use crate::pipeline::trace::{FinalResult, StepOutput, StepRecord, TestOutcome};
use crate::scripting::ScriptRunner;
use crate::types::{HistoryContext, Value, ValueType};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Runs step chains against a value and an optional history.
pub struct PipelineExecutor<'a> {
    scripts: &'a dyn ScriptRunner,
    timeout: Duration,
    timestamp: DateTime<Utc>,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(scripts: &'a dyn ScriptRunner) -> Self {
        Self {
            scripts,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            timestamp: Utc::now(),
        }
    }

    /// Timestamp of the value under test
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Bound on the wall-clock time of a whole run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `steps` over `initial`.
    pub fn run(
        &self,
        initial: Value,
        history: Option<&HistoryContext>,
        steps: &[Step],
    ) -> TestOutcome {
        let span = tracing::debug_span!("pipeline", steps = steps.len());
        let _guard = span.enter();

        let deadline = Instant::now() + self.timeout;
        let mut trace = Vec::with_capacity(steps.len());
        let mut next_history = None;
        let mut current = initial;

        for (index, step) in steps.iter().enumerate() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    "deadline of {}ms passed before step {} ({})",
                    self.timeout.as_millis(),
                    index,
                    step.kind
                );
                return TestOutcome {
                    steps: trace,
                    result: FinalResult::Failed(StepError::Timeout(self.timeout)),
                    next_history,
                };
            }

            let started = Instant::now();
            let ctx = StepContext {
                step,
                history,
                timestamp: self.timestamp,
                deadline,
                scripts: self.scripts,
            };

            let outcome = coerce_input(&current, step.kind.input()).and_then(|input| {
                if step.kind.uses_history() {
                    next_history = Some(HistoryContext::new(input.clone(), self.timestamp));
                }
                apply(step.kind, input, &ctx)
            });

            let elapsed = started.elapsed();
            let error = match &outcome {
                Ok(StepOutput::Value(value)) => {
                    tracing::debug!("step {} ({}) -> {}", index, step.kind, value);
                    None
                }
                Ok(StepOutput::Discarded) => {
                    tracing::debug!("step {} ({}) discarded the value", index, step.kind);
                    None
                }
                Err(error) => Some(error.clone()),
            };

            let mut record = StepRecord {
                index,
                kind: step.kind,
                input: current.clone(),
                outcome,
                policy_applied: None,
                elapsed,
            };

            let Some(error) = error else {
                let discarded = record.output().is_none();
                if let Some(value) = record.output() {
                    current = value.clone();
                }
                trace.push(record);
                if discarded {
                    return TestOutcome {
                        steps: trace,
                        result: FinalResult::Discarded,
                        next_history,
                    };
                }
                continue;
            };

            tracing::debug!("step {} ({}) failed: {}", index, step.kind, error);

            if !error.is_recoverable() {
                if matches!(error, StepError::Timeout(_)) {
                    tracing::warn!("step {} ({}) timed out", index, step.kind);
                }
                trace.push(record);
                return TestOutcome {
                    steps: trace,
                    result: FinalResult::Failed(error),
                    next_history,
                };
            }

            record.policy_applied = Some(step.on_fail.clone());
            trace.push(record);

            match &step.on_fail {
                ErrorPolicy::Abort => {
                    return TestOutcome {
                        steps: trace,
                        result: FinalResult::Failed(error),
                        next_history,
                    };
                }
                ErrorPolicy::DiscardSilently => {
                    return TestOutcome {
                        steps: trace,
                        result: FinalResult::Discarded,
                        next_history,
                    };
                }
                ErrorPolicy::SetValue(value) => current = Value::text(value.clone()),
                ErrorPolicy::SetCustomError(message) => current = Value::error(message.clone()),
            }
        }

        let result = match current {
            Value::Error(message) => FinalResult::Failed(StepError::Custom(message)),
            value => FinalResult::Value(value),
        };
        TestOutcome {
            steps: trace,
            result,
            next_history,
        }
    }
}

/// Coerce `value` to what a step expects
fn coerce_input(value: &Value, requirement: InputRequirement) -> StepResult<Value> {
    let coerced = match requirement {
        InputRequirement::Any => return Ok(value.clone()),
        InputRequirement::Text => coercion::coerce(value, ValueType::Text),
        InputRequirement::Float => coercion::coerce(value, ValueType::Float),
        InputRequirement::Unsigned => coercion::coerce(value, ValueType::Unsigned),
        InputRequirement::Numeric => coercion::to_numeric(value),
    };
    Ok(coerced?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::ErrorKind;
    use crate::pipeline::step::StepKind;
    use crate::scripting::{MockScriptRunner, ScriptError};

    fn no_scripts() -> MockScriptRunner {
        let mut mock = MockScriptRunner::new();
        mock.expect_execute().never();
        mock
    }

    #[test]
    fn test_trim_float_range_chain() {
        let scripts = no_scripts();
        let steps = vec![
            Step::new(StepKind::Trim, [" "]),
            Step::bare(StepKind::ToFloat),
            Step::new(StepKind::ValidateRange, ["0", "100"]),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("  42.5  "), None, &steps);

        assert_eq!(outcome.result, FinalResult::Value(Value::Float(42.5)));
        assert_eq!(outcome.steps.len(), 3);
        assert!(outcome.steps.iter().all(|s| !s.is_failure()));
        assert_eq!(outcome.steps[0].input, Value::text("  42.5  "));
        assert_eq!(outcome.steps[2].input, Value::Float(42.5));
        assert!(outcome.next_history.is_none());
    }

    #[test]
    fn test_type_mismatch_aborts() {
        let scripts = no_scripts();
        let steps = vec![Step::bare(StepKind::ToFloat)];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("abc"), None, &steps);

        assert_eq!(outcome.steps.len(), 1);
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(outcome.steps[0].policy_applied, Some(ErrorPolicy::Abort));
    }

    #[test]
    fn test_delta_with_history() {
        let scripts = no_scripts();
        let now = Utc::now();
        let history = HistoryContext::new(Value::Float(5.0), now - chrono::Duration::seconds(60));
        let steps = vec![Step::bare(StepKind::DeltaValue)];

        let outcome = PipelineExecutor::new(&scripts)
            .at(now)
            .run(Value::Float(10.0), Some(&history), &steps);

        assert_eq!(outcome.result, FinalResult::Value(Value::Float(5.0)));
        let next = outcome.next_history.unwrap();
        assert_eq!(next.previous_value, Value::Float(10.0));
        assert_eq!(next.previous_timestamp, now);
    }

    #[test]
    fn test_abort_stops_at_failing_step() {
        let scripts = no_scripts();
        let steps = vec![
            Step::new(StepKind::Trim, [" "]),
            Step::new(StepKind::RegexExtract, [r"\d+", ""]),
            Step::bare(StepKind::ToUnsigned),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text(" none "), None, &steps);

        assert_eq!(outcome.steps.len(), 2);
        assert!(outcome.steps[1].is_failure());
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::StepAlgorithm);
    }

    #[test]
    fn test_discard_policy() {
        let scripts = no_scripts();
        let steps = vec![
            Step::bare(StepKind::ToUnsigned).on_fail(ErrorPolicy::DiscardSilently),
            Step::new(StepKind::Multiplier, ["2"]),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("-1"), None, &steps);

        assert!(outcome.is_discarded());
        assert!(outcome.is_success());
        assert_eq!(outcome.steps.len(), 1);
    }

    #[test]
    fn test_set_value_continues() {
        let scripts = no_scripts();
        let steps = vec![
            Step::bare(StepKind::ToUnsigned).on_fail(ErrorPolicy::SetValue("7".into())),
            Step::new(StepKind::Multiplier, ["3"]),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("n/a"), None, &steps);

        assert_eq!(outcome.result, FinalResult::Value(Value::Unsigned(21)));
        assert_eq!(outcome.steps[1].input, Value::text("7"));
    }

    #[test]
    fn test_custom_error_flows_into_next_step() {
        let scripts = no_scripts();
        let steps = vec![
            Step::new(StepKind::ValidateRange, ["0", "10"])
                .on_fail(ErrorPolicy::SetCustomError("sensor code 503".into())),
            Step::new(StepKind::RegexExtract, [r"code (\d+)", ""]),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::Unsigned(99), None, &steps);

        assert_eq!(outcome.steps[1].input, Value::error("sensor code 503"));
        assert_eq!(outcome.result, FinalResult::Value(Value::text("503")));
    }

    #[test]
    fn test_trailing_custom_error_fails() {
        let scripts = no_scripts();
        let steps = vec![Step::bare(StepKind::ToFloat)
            .on_fail(ErrorPolicy::SetCustomError("unparseable".into()))];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("x"), None, &steps);

        assert_eq!(
            outcome.result,
            FinalResult::Failed(StepError::Custom("unparseable".into()))
        );
    }

    #[test]
    fn test_script_timeout_bypasses_policy() {
        let mut scripts = MockScriptRunner::new();
        scripts
            .expect_execute()
            .times(1)
            .returning(|_, _, timeout| Err(ScriptError::Timeout(timeout)));

        let steps = vec![
            Step::new(StepKind::Script, ["loop {}"]).on_fail(ErrorPolicy::SetValue("0".into())),
            Step::bare(StepKind::ToFloat),
        ];

        let outcome = PipelineExecutor::new(&scripts)
            .with_timeout(Duration::from_millis(200))
            .run(Value::Unsigned(1), None, &steps);

        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].policy_applied, None);
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_internal_error_bypasses_policy() {
        let mut scripts = MockScriptRunner::new();
        scripts
            .expect_execute()
            .times(1)
            .returning(|_, _, _| Err(ScriptError::Internal("cache lock poisoned".into())));

        let steps = vec![
            Step::new(StepKind::Trim, [" "]),
            Step::new(StepKind::Script, ["value"]).on_fail(ErrorPolicy::SetValue("0".into())),
            Step::bare(StepKind::ToText),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text(" 5 "), None, &steps);

        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[1].policy_applied, None);
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "internal error: cache lock poisoned");
    }

    #[test]
    fn test_custom_error_into_numeric_step_is_type_mismatch() {
        let scripts = no_scripts();
        let steps = vec![
            Step::bare(StepKind::ToUnsigned)
                .on_fail(ErrorPolicy::SetCustomError("bad reading".into())),
            Step::bare(StepKind::ToFloat),
        ];

        let outcome = PipelineExecutor::new(&scripts).run(Value::text("n/a"), None, &steps);

        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[1].input, Value::error("bad reading"));
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            err.to_string(),
            "cannot convert text value to float: value is an error: bad reading"
        );
    }

    #[test]
    fn test_script_receives_value_and_history() {
        let now = Utc::now();
        let history = HistoryContext::new(Value::Unsigned(4), now - chrono::Duration::seconds(2));

        let mut scripts = MockScriptRunner::new();
        scripts
            .expect_execute()
            .withf(|code, input, _| {
                code.trim() == "value * 2"
                    && input.value == Value::Unsigned(3)
                    && input.history.is_some()
            })
            .returning(|_, _, _| Ok(Value::Unsigned(6)));

        let steps = vec![Step::new(StepKind::Script, ["value * 2"])];
        let outcome = PipelineExecutor::new(&scripts)
            .at(now)
            .run(Value::Unsigned(3), Some(&history), &steps);

        assert_eq!(outcome.value(), Some(&Value::Unsigned(6)));
        assert_eq!(outcome.next_history.unwrap().previous_value, Value::Unsigned(3));
    }

    #[test]
    fn test_expired_deadline_runs_nothing() {
        let scripts = no_scripts();
        let steps = vec![Step::bare(StepKind::ToText)];

        let outcome = PipelineExecutor::new(&scripts)
            .with_timeout(Duration::ZERO)
            .run(Value::Unsigned(1), None, &steps);

        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_discard_unchanged_stops_chain() {
        let scripts = no_scripts();
        let history = HistoryContext::new(Value::Unsigned(8), Utc::now());
        let steps = vec![
            Step::bare(StepKind::DiscardUnchanged),
            Step::new(StepKind::Multiplier, ["2"]),
        ];

        let outcome =
            PipelineExecutor::new(&scripts).run(Value::Unsigned(8), Some(&history), &steps);

        assert!(outcome.is_discarded());
        assert_eq!(outcome.steps.len(), 1);
    }
}
