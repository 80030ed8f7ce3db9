//! Type coercion between [`Value`] types
//!
//! Every step declares the type it needs its input in; the executor coerces
//! the current value with [`coerce`] before running the step. Coercion never
//! truncates: it either produces an exactly equivalent value or fails with a
//! [`ConversionError`].
//!
//! Numeric parsing is locale independent. Surrounding whitespace is ignored,
//! `inf`/`nan` literals are rejected and magnitudes that overflow are
//! reported as out of range.

use crate::types::{Value, ValueType};
use thiserror::Error;

/// Largest fractional part accepted when converting a float to an integer
pub const FRACTION_TOLERANCE: f64 = 1e-9;

/// 2^64 as f64, the first float that no longer fits in a u64
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// A value could not be represented in the requested type
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {from} value to {to}: {reason}")]
pub struct ConversionError {
    pub from: ValueType,
    pub to: ValueType,
    pub reason: String,
}

impl ConversionError {
    fn new(from: ValueType, to: ValueType, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Coerce `value` into `target`.
///
/// Same-type coercion returns an unchanged copy, which makes coercion
/// idempotent.
pub fn coerce(value: &Value, target: ValueType) -> Result<Value, ConversionError> {
    let from = value.semantic_type();

    if let Value::Error(msg) = value {
        return match target {
            ValueType::Text => Ok(Value::Text(msg.clone())),
            _ => Err(ConversionError::new(
                from,
                target,
                format!("value is an error: {}", msg),
            )),
        };
    }

    if from == target {
        return Ok(value.clone());
    }

    tracing::trace!("coercing {} value to {}", from, target);

    match (value, target) {
        (_, ValueType::Text) => Ok(Value::Text(format_text(value))),
        (Value::Text(s), ValueType::Float) => parse_float(s).map(Value::Float),
        (Value::Text(s), ValueType::Unsigned) => parse_unsigned(s).map(Value::Unsigned),
        (Value::Text(s), ValueType::Log) => Ok(Value::Log(s.clone())),
        (Value::Text(s), ValueType::Binary) => Ok(Value::Binary(s.as_bytes().to_vec())),
        (Value::Float(v), ValueType::Unsigned) => float_to_unsigned(*v).map(Value::Unsigned),
        (Value::Unsigned(v), ValueType::Float) => unsigned_to_float(*v).map(Value::Float),
        (Value::Log(m), ValueType::Binary) => Ok(Value::Binary(m.as_bytes().to_vec())),
        (Value::Float(_) | Value::Unsigned(_) | Value::Binary(_), ValueType::Log) => {
            Ok(Value::Log(format_text(value)))
        }
        (Value::Log(_) | Value::Binary(_), ValueType::Float | ValueType::Unsigned) => Err(
            ConversionError::new(from, target, "type is opaque to numeric conversion"),
        ),
        (Value::Float(_) | Value::Unsigned(_), ValueType::Binary) => Err(ConversionError::new(
            from,
            target,
            "numeric values have no binary representation",
        )),
        _ => Err(ConversionError::new(from, target, "unsupported conversion")),
    }
}

/// Coerce to whichever numeric type fits the value.
///
/// Numeric values are returned unchanged. Text that is a plain integer
/// becomes [`Value::Unsigned`], any other numeric text becomes
/// [`Value::Float`].
pub fn to_numeric(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Float(_) | Value::Unsigned(_) => Ok(value.clone()),
        Value::Text(s) => match parse_unsigned(s) {
            Ok(v) => Ok(Value::Unsigned(v)),
            Err(_) => parse_float(s).map(Value::Float),
        },
        other => coerce(other, ValueType::Float),
    }
}

/// Canonical text form of any value
pub fn format_text(value: &Value) -> String {
    match value {
        Value::Float(v) => format_float(*v),
        Value::Unsigned(v) => v.to_string(),
        Value::Text(s) | Value::Log(s) | Value::Error(s) => s.clone(),
        Value::Binary(bytes) => encode_hex(bytes),
    }
}

/// Below this magnitude floats are written in exponent form
const EXPONENT_BELOW: f64 = 1e-5;

/// From this magnitude on floats are written in exponent form
const EXPONENT_FROM: f64 = 1e16;

/// Shortest form that round-trips: plain decimal (`42.5`, `10`) for ordinary
/// magnitudes, exponent notation (`1e-7`, `1.5e300`) for very small or very
/// large ones.
pub fn format_float(v: f64) -> String {
    if v == 0.0 {
        // Normalise -0
        return "0".to_string();
    }
    let magnitude = v.abs();
    if magnitude < EXPONENT_BELOW || magnitude >= EXPONENT_FROM {
        format!("{:e}", v)
    } else {
        format!("{}", v)
    }
}

/// Parse locale-independent decimal or exponent notation
pub fn parse_float(s: &str) -> Result<f64, ConversionError> {
    let trimmed = s.trim();
    let err = |reason: &str| ConversionError::new(ValueType::Text, ValueType::Float, reason);

    if trimmed.is_empty() {
        return Err(err("empty string"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return Err(err(&format!("'{}' is not a number", trimmed)));
    }

    let v: f64 = trimmed
        .parse()
        .map_err(|_| err(&format!("'{}' is not a number", trimmed)))?;

    if !v.is_finite() {
        return Err(err(&format!("'{}' is out of range", trimmed)));
    }
    Ok(v)
}

/// Parse an unsigned decimal integer with optional leading `+`
pub fn parse_unsigned(s: &str) -> Result<u64, ConversionError> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let err = |reason: String| ConversionError::new(ValueType::Text, ValueType::Unsigned, reason);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(err(format!("'{}' is not an unsigned integer", trimmed)));
    }

    digits
        .parse::<u64>()
        .map_err(|_| err(format!("'{}' is out of range", trimmed)))
}

fn float_to_unsigned(v: f64) -> Result<u64, ConversionError> {
    let err = |reason: String| ConversionError::new(ValueType::Float, ValueType::Unsigned, reason);

    if !v.is_finite() {
        return Err(err(format!("{} is not finite", v)));
    }
    if v < 0.0 {
        return Err(err(format!("{} is negative", format_float(v))));
    }

    let rounded = v.round();
    if (v - rounded).abs() > FRACTION_TOLERANCE {
        return Err(err(format!(
            "{} has a fractional part",
            format_float(v)
        )));
    }
    if rounded >= U64_LIMIT {
        return Err(err(format!("{} is out of range", format_float(v))));
    }
    Ok(rounded as u64)
}

fn unsigned_to_float(v: u64) -> Result<f64, ConversionError> {
    let f = v as f64;
    if f >= U64_LIMIT || f as u64 != v {
        return Err(ConversionError::new(
            ValueType::Unsigned,
            ValueType::Float,
            format!("{} is not exactly representable", v),
        ));
    }
    Ok(f)
}

/// Lowercase hex encoding used for binary payloads
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode hex, ignoring whitespace between digits
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ConversionError> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let err = |reason: &str| ConversionError::new(ValueType::Text, ValueType::Binary, reason);

    if digits.len() % 2 != 0 {
        return Err(err("odd number of hex digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(err("invalid hex digit")),
            }
        })
        .collect()
}
