//! Integration tests for the test service
//!
//! These tests drive the service through its wire types:
//! - JSON requests in, JSON responses out
//! - Structural validation before execution
//! - Configuration loaded from disk

mod common;

use common::builders::{RequestBuilder, StepBuilder};
use common::test_now;
use preproc_test::service::RawStep;
use preproc_test::{
    EngineConfig, ErrorKind, ErrorPolicy, StepKind, StructuralError, TestRequest, TestResponse,
    TestService, ValueType,
};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_json_request_round_trip() {
    let request = TestRequest::from_json(
        r#"{
            "value_type": "text",
            "value": "  42.5  ",
            "steps": [
                {"kind": "trim", "params": [" "]},
                {"kind": "to_float"},
                {"kind": "validate_range", "params": ["0", "100"], "on_fail": "discard"}
            ]
        }"#,
    )
    .unwrap();

    let response = TestService::default().evaluate(&request).unwrap();
    let json: serde_json::Value = serde_json::from_str(&response.to_json(false).unwrap()).unwrap();

    assert_eq!(json["result"], "42.5");
    assert_eq!(json["discarded"], false);
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["steps"][0]["input"], "  42.5  ");
    assert_eq!(json["steps"][2]["kind"], "validate_range");

    let decoded: TestResponse = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_history_in_and_out() {
    let request = RequestBuilder::typed(ValueType::Float, "10")
        .at(test_now())
        .history(
            ValueType::Float,
            "5",
            test_now() - chrono::Duration::seconds(60),
        )
        .step(StepBuilder::new(StepKind::DeltaValue))
        .build();

    let response = TestService::default().evaluate(&request).unwrap();

    assert_eq!(response.result.as_deref(), Some("5"));
    let history = response.history.unwrap();
    assert_eq!(history.value, "10");
    assert_eq!(history.value_type, ValueType::Float);
    assert_eq!(history.timestamp, test_now());
}

#[test]
fn test_discard_policy_is_explicit() {
    let request = RequestBuilder::text("n/a")
        .step(StepBuilder::new(StepKind::ToFloat).on_fail(ErrorPolicy::DiscardSilently))
        .build();

    let response = TestService::default().evaluate(&request).unwrap();

    assert!(response.discarded);
    assert!(response.result.is_none());
    assert!(response.error.is_none());
    assert_eq!(response.steps[0].action, Some(ErrorPolicy::DiscardSilently));
    assert_eq!(response.steps[0].error_kind, Some(ErrorKind::TypeMismatch));
}

#[test]
fn test_custom_error_reported_when_last() {
    let request = RequestBuilder::text("oops")
        .step(
            StepBuilder::new(StepKind::ToUnsigned)
                .on_fail(ErrorPolicy::SetCustomError("bad counter".into())),
        )
        .build();

    let response = TestService::default().evaluate(&request).unwrap();

    assert_eq!(response.error.as_deref(), Some("bad counter"));
    assert_eq!(response.error_kind, Some(ErrorKind::StepAlgorithm));
}

#[test]
fn test_structural_errors_stop_before_execution() {
    let request = RequestBuilder::text("1")
        .raw_step(RawStep::new("to_float", Vec::<String>::new()))
        .raw_step(RawStep::new("regex_extract", ["(\\d+)"]))
        .raw_step(RawStep::new("not_a_step", Vec::<String>::new()))
        .build();

    let err = TestService::default().evaluate(&request).unwrap_err();
    let errors = err.structural_errors().unwrap();

    assert_eq!(errors.len(), 2);
    assert!(matches!(
        errors[0],
        StructuralError::Arity {
            index: 1,
            kind: StepKind::RegexExtract,
            expected: 2,
            actual: 1
        }
    ));
    assert!(matches!(&errors[1], StructuralError::UnknownKind { index: 2, kind } if kind == "not_a_step"));
}

#[test]
fn test_unknown_policy_is_structural() {
    let mut step = RawStep::new("to_text", Vec::<String>::new());
    step.on_fail = Some(json!({"retry": 3}));
    let request = RequestBuilder::text("1").raw_step(step).build();

    let err = TestService::default().evaluate(&request).unwrap_err();
    assert_eq!(err.structural_errors().unwrap().len(), 1);
}

#[test]
fn test_request_timeout_overrides_config() {
    let config = EngineConfig::default();
    let service = TestService::new(config);
    let request = RequestBuilder::typed(ValueType::Unsigned, "1")
        .step(StepBuilder::new(StepKind::Script).param("loop { }"))
        .timeout_ms(50)
        .build();

    let response = service.evaluate(&request).unwrap();

    // The default operation cap may trip before the deadline does
    let kind = response.error_kind.unwrap();
    assert!(matches!(kind, ErrorKind::Timeout | ErrorKind::StepAlgorithm));
    assert_eq!(response.steps.len(), 1);
}

#[test]
fn test_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timeout_ms = 40\n\n[script]\nmax_operations = 0").unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.timeout_ms, 40);

    let request = RequestBuilder::typed(ValueType::Unsigned, "1")
        .step(StepBuilder::new(StepKind::Script).param("loop { }"))
        .build();

    let response = TestService::new(config).evaluate(&request).unwrap();
    assert_eq!(response.error_kind, Some(ErrorKind::Timeout));
}

#[test]
fn test_binary_payload_is_hex() {
    let request = RequestBuilder::typed(ValueType::Binary, "48656c6c6f")
        .step(StepBuilder::new(StepKind::ToText))
        .build();

    let response = TestService::default().evaluate(&request).unwrap();
    assert_eq!(response.steps[0].input, "48656c6c6f");
}
