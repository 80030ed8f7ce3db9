//! Steps that compare the value with the previous observation.

use crate::coercion;
use crate::pipeline::error::{StepError, StepResult};
use crate::pipeline::trace::StepOutput;
use crate::types::{HistoryContext, Value, ValueType};
use chrono::{DateTime, Utc};

fn previous_numeric(history: &HistoryContext) -> StepResult<Value> {
    coercion::to_numeric(&history.previous_value)
        .map_err(|e| StepError::algorithm(format!("previous value is not numeric: {}", e)))
}

/// Exact float form of a numeric value; counters beyond 2^53 that a float
/// cannot hold fail as a type mismatch.
fn as_f64(value: &Value) -> StepResult<f64> {
    match coercion::coerce(value, ValueType::Float)? {
        Value::Float(v) => Ok(v),
        other => Err(StepError::Internal(format!(
            "expected a numeric value, got {:?}",
            other
        ))),
    }
}

/// `current - previous`. A decrease discards the value, as a counter reset
/// has no meaningful delta.
pub fn delta_value(current: Value, history: Option<&HistoryContext>) -> StepResult<StepOutput> {
    let history = history.ok_or(StepError::MissingHistory)?;
    let previous = previous_numeric(history)?;

    if let (Value::Unsigned(cur), Value::Unsigned(prev)) = (&current, &previous) {
        return Ok(match cur.checked_sub(*prev) {
            Some(delta) => StepOutput::Value(Value::Unsigned(delta)),
            None => StepOutput::Discarded,
        });
    }

    let (cur, prev) = (as_f64(&current)?, as_f64(&previous)?);
    if cur < prev {
        return Ok(StepOutput::Discarded);
    }
    Ok(StepOutput::Value(Value::Float(cur - prev)))
}

/// `(current - previous) / seconds elapsed`, always a float.
pub fn delta_speed(
    current: Value,
    history: Option<&HistoryContext>,
    now: DateTime<Utc>,
) -> StepResult<StepOutput> {
    let history = history.ok_or(StepError::MissingHistory)?;
    let previous = previous_numeric(history)?;

    let elapsed = history.elapsed_secs(now);
    if elapsed <= 0.0 {
        return Err(StepError::algorithm(format!(
            "timestamp {} is not later than previous timestamp {}",
            now.to_rfc3339(),
            history.previous_timestamp.to_rfc3339()
        )));
    }

    let delta = match (&current, &previous) {
        (Value::Unsigned(cur), Value::Unsigned(prev)) => match cur.checked_sub(*prev) {
            Some(delta) => delta as f64,
            None => return Ok(StepOutput::Discarded),
        },
        _ => {
            let (cur, prev) = (as_f64(&current)?, as_f64(&previous)?);
            if cur < prev {
                return Ok(StepOutput::Discarded);
            }
            cur - prev
        }
    };

    let speed = delta / elapsed;
    if !speed.is_finite() {
        return Err(StepError::algorithm("division by zero"));
    }
    Ok(StepOutput::Value(Value::Float(speed)))
}

/// Previous value compared in the current value's type
fn unchanged(current: &Value, history: &HistoryContext) -> bool {
    if current.is_error() || history.previous_value.is_error() {
        return *current == history.previous_value;
    }
    coercion::coerce(&history.previous_value, current.semantic_type())
        .map(|prev| prev == *current)
        .unwrap_or(false)
}

/// Discard the value if it equals the previous one. Without history every
/// value counts as changed.
pub fn discard_unchanged(current: Value, history: Option<&HistoryContext>) -> StepOutput {
    match history {
        Some(h) if unchanged(&current, h) => StepOutput::Discarded,
        _ => StepOutput::Value(current),
    }
}

/// Like [`discard_unchanged`], but let an unchanged value through once
/// `heartbeat` seconds have passed since the previous one.
pub fn discard_unchanged_heartbeat(
    current: Value,
    history: Option<&HistoryContext>,
    now: DateTime<Utc>,
    heartbeat: &str,
) -> StepResult<StepOutput> {
    let seconds = coercion::parse_float(heartbeat)
        .ok()
        .filter(|s| *s > 0.0)
        .ok_or_else(|| {
            StepError::algorithm(format!(
                "heartbeat '{}' is not a positive number of seconds",
                heartbeat
            ))
        })?;

    Ok(match history {
        Some(h) if unchanged(&current, h) && h.elapsed_secs(now) < seconds => {
            StepOutput::Discarded
        }
        _ => StepOutput::Value(current),
    })
}
