//! Structured-document steps.

use crate::pipeline::error::{StepError, StepResult};
use crate::pipeline::jsonpath::JsonPath;
use crate::types::Value;
use super::into_text;
use serde_json::Value as Json;

fn parse_path(path: &str) -> StepResult<JsonPath> {
    JsonPath::parse(path).map_err(|e| StepError::algorithm(e.to_string()))
}

/// Text form of a selected node: strings unquoted, everything else as JSON
fn render(node: &Json) -> String {
    match node {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Definite paths yield the single node; other paths yield a JSON array of
/// every match.
fn render_matches(path: &JsonPath, matches: &[&Json]) -> String {
    if path.is_definite() {
        matches.first().map(|n| render(n)).unwrap_or_default()
    } else {
        Json::Array(matches.iter().map(|n| (*n).clone()).collect()).to_string()
    }
}

pub fn json_path(value: Value, path: &str) -> StepResult<Value> {
    let path = parse_path(path)?;
    let text = into_text(value);
    let doc: Json = serde_json::from_str(&text)
        .map_err(|e| StepError::algorithm(format!("cannot parse JSON: {}", e)))?;

    let matches = path.query(&doc);
    if matches.is_empty() {
        return Err(StepError::algorithm("no data matches the specified path"));
    }
    Ok(Value::Text(render_matches(&path, &matches)))
}

/// Fail with the field's content if the document carries a non-empty error
/// field at `path`. Anything else, malformed documents included, passes
/// through unchanged.
pub fn error_field_json(value: Value, path: &str) -> StepResult<Value> {
    let path = parse_path(path)?;
    let text = into_text(value);

    let Ok(doc) = serde_json::from_str::<Json>(&text) else {
        return Ok(Value::Text(text));
    };

    let matches = path.query(&doc);
    let message = if matches.is_empty() {
        String::new()
    } else {
        render_matches(&path, &matches)
    };

    if message.is_empty() || message == "null" {
        Ok(Value::Text(text))
    } else {
        Err(StepError::Algorithm(message))
    }
}
