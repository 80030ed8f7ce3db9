//! Numeric steps: scaling, range validation and error checks.

use crate::coercion;
use crate::pipeline::error::{StepError, StepResult};
use crate::types::{Value, ValueType};
use std::cmp::Ordering;

/// Parse a numeric step parameter
fn number_param(param: &str, what: &str) -> StepResult<f64> {
    coercion::parse_float(param)
        .map_err(|_| StepError::algorithm(format!("{} '{}' is not a number", what, param)))
}

/// Exact float form of the input. Unsigned values a float cannot hold
/// fail as a type mismatch.
fn as_number(value: &Value) -> StepResult<f64> {
    match coercion::coerce(value, ValueType::Float)? {
        Value::Float(v) => Ok(v),
        other => Err(StepError::Internal(format!(
            "expected a numeric input, got {:?}",
            other
        ))),
    }
}

/// A range bound, kept as an integer when it is written as one
#[derive(Debug, Clone, Copy)]
enum Bound {
    Unsigned(u64),
    Float(f64),
}

impl Bound {
    fn parse(param: &str, what: &str) -> StepResult<Self> {
        match coercion::parse_unsigned(param) {
            Ok(v) => Ok(Bound::Unsigned(v)),
            Err(_) => number_param(param, what).map(Bound::Float),
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Unsigned(v) => write!(f, "{}", v),
            Bound::Float(v) => write!(f, "{}", coercion::format_float(*v)),
        }
    }
}

/// Exact ordering of an unsigned integer against a finite float
fn cmp_unsigned_float(v: u64, f: f64) -> Ordering {
    if f < 0.0 {
        return Ordering::Greater;
    }
    let whole = f.floor();
    if whole >= 18_446_744_073_709_551_616.0 {
        return Ordering::Less;
    }
    match v.cmp(&(whole as u64)) {
        Ordering::Equal if f > whole => Ordering::Less,
        other => other,
    }
}

/// Exact ordering of a numeric input against a bound
fn cmp_bound(value: &Value, bound: Bound) -> StepResult<Ordering> {
    match (value, bound) {
        (Value::Unsigned(v), Bound::Unsigned(b)) => Ok(v.cmp(&b)),
        (Value::Unsigned(v), Bound::Float(b)) => Ok(cmp_unsigned_float(*v, b)),
        (Value::Float(v), Bound::Unsigned(b)) => Ok(cmp_unsigned_float(b, *v).reverse()),
        (Value::Float(v), Bound::Float(b)) => v
            .partial_cmp(&b)
            .ok_or_else(|| StepError::algorithm(format!("value {} is not comparable", v))),
        (other, _) => Err(StepError::Internal(format!(
            "expected a numeric input, got {:?}",
            other
        ))),
    }
}

/// Multiply by `factor`. Unsigned inputs with an integer factor stay
/// unsigned; anything else becomes a float, which requires the input to be
/// exactly representable as one.
pub fn multiply(value: Value, factor: &str) -> StepResult<Value> {
    if let (Value::Unsigned(v), Ok(f)) = (&value, coercion::parse_unsigned(factor)) {
        return v
            .checked_mul(f)
            .map(Value::Unsigned)
            .ok_or_else(|| StepError::algorithm(format!("{} * {} overflows", v, f)));
    }

    let f = number_param(factor, "multiplier")?;
    let product = as_number(&value)? * f;
    if !product.is_finite() {
        return Err(StepError::algorithm(format!(
            "{} * {} is out of range",
            value,
            factor.trim()
        )));
    }
    Ok(Value::Float(product))
}

/// Pass the value through if it lies within `[min, max]`; an empty bound
/// is open.
pub fn validate_range(value: Value, min: &str, max: &str) -> StepResult<Value> {
    if !min.trim().is_empty() {
        let min = Bound::parse(min, "minimum")?;
        if cmp_bound(&value, min)? == Ordering::Less {
            return Err(StepError::algorithm(format!(
                "value {} is less than {}",
                value, min
            )));
        }
    }
    if !max.trim().is_empty() {
        let max = Bound::parse(max, "maximum")?;
        if cmp_bound(&value, max)? == Ordering::Greater {
            return Err(StepError::algorithm(format!(
                "value {} is greater than {}",
                value, max
            )));
        }
    }
    Ok(value)
}

/// Fail with the carried message if the input is an error value
pub fn check_not_error(value: Value) -> StepResult<Value> {
    match value {
        Value::Error(message) => Err(StepError::Algorithm(message)),
        other => Ok(other),
    }
}
