//! Text steps: trimming, pattern matching, replacement and number parsing.

use crate::coercion;
use crate::pipeline::error::{StepError, StepResult};
use crate::types::Value;
use super::into_text;
use regex::{Captures, Regex};

/// Tokens accepted by `bool_to_decimal`, compared case-insensitively
const TRUE_TOKENS: &[&str] = &[
    "true", "t", "yes", "y", "on", "up", "running", "enabled", "available", "ok", "master",
];
const FALSE_TOKENS: &[&str] = &[
    "false",
    "f",
    "no",
    "n",
    "off",
    "down",
    "unused",
    "disabled",
    "unavailable",
    "err",
    "slave",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSide {
    Left,
    Right,
    Both,
}

fn compile(pattern: &str) -> StepResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| StepError::algorithm(format!("invalid regular expression: {}", e)))
}

pub fn trim(value: Value, charset: &str, side: TrimSide) -> Value {
    let text = into_text(value);
    let in_set = |c: char| charset.contains(c);
    let trimmed = match side {
        TrimSide::Left => text.trim_start_matches(in_set),
        TrimSide::Right => text.trim_end_matches(in_set),
        TrimSide::Both => text.trim_matches(in_set),
    };
    Value::Text(trimmed.to_string())
}

/// Expand `\0`..`\9` references in `template`; `\\` is a literal backslash.
fn expand(template: &str, caps: &Captures) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let group = d.to_digit(10).unwrap_or(0) as usize;
                if let Some(m) = caps.get(group) {
                    out.push_str(m.as_str());
                }
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Rewrite `\N` references into the `${N}` syntax of the regex crate.
fn to_replacement(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    chars.next();
                    out.push_str(&format!("${{{}}}", d));
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

/// First capture group (or the whole match) when `output` is empty,
/// otherwise `output` with group references expanded.
fn extract(caps: &Captures, output: &str) -> String {
    if output.is_empty() {
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    } else {
        expand(output, caps)
    }
}

pub fn regex_extract(value: Value, pattern: &str, output: &str) -> StepResult<Value> {
    let re = compile(pattern)?;
    let text = into_text(value);
    let caps = re
        .captures(&text)
        .ok_or_else(|| StepError::algorithm(format!("pattern '{}' does not match", pattern)))?;
    Ok(Value::Text(extract(&caps, output)))
}

pub fn regex_replace(value: Value, pattern: &str, replacement: &str) -> StepResult<Value> {
    let re = compile(pattern)?;
    let text = into_text(value);
    let replaced = re.replace_all(&text, to_replacement(replacement).as_str());
    Ok(Value::Text(replaced.into_owned()))
}

/// Resolve `\n`, `\r`, `\t` and `\s` (space) escapes
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let replacement = match chars.peek() {
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('s') => Some(' '),
            Some('\\') => Some('\\'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                chars.next();
                out.push(r);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn string_replace(value: Value, search: &str, replace: &str) -> StepResult<Value> {
    let search = unescape(search);
    if search.is_empty() {
        return Err(StepError::algorithm("search string is empty"));
    }
    let text = into_text(value);
    Ok(Value::Text(text.replace(&search, &unescape(replace))))
}

/// Pass the value through if it matches (`must_match`) or does not match.
pub fn validate_regex(value: Value, pattern: &str, must_match: bool) -> StepResult<Value> {
    let re = compile(pattern)?;
    let text = into_text(value);
    match (re.is_match(&text), must_match) {
        (true, true) | (false, false) => Ok(Value::Text(text)),
        (false, true) => Err(StepError::algorithm(format!(
            "value does not match pattern '{}'",
            pattern
        ))),
        (true, false) => Err(StepError::algorithm(format!(
            "value matches pattern '{}'",
            pattern
        ))),
    }
}

/// Fail with the extracted message if `pattern` matches; pass through otherwise.
pub fn error_field_regex(value: Value, pattern: &str, output: &str) -> StepResult<Value> {
    let re = compile(pattern)?;
    let text = into_text(value);
    let message = re.captures(&text).map(|caps| extract(&caps, output));

    match message {
        Some(message) if !message.is_empty() => Err(StepError::Algorithm(message)),
        _ => Ok(Value::Text(text)),
    }
}

pub fn bool_to_decimal(value: Value) -> StepResult<Value> {
    let text = into_text(value);
    let token = text.trim();
    let lower = token.to_ascii_lowercase();

    if TRUE_TOKENS.contains(&lower.as_str()) {
        return Ok(Value::Unsigned(1));
    }
    if FALSE_TOKENS.contains(&lower.as_str()) {
        return Ok(Value::Unsigned(0));
    }
    if let Ok(v) = coercion::parse_float(token) {
        return Ok(Value::Unsigned(u64::from(v != 0.0)));
    }

    Err(StepError::algorithm(format!(
        "cannot convert '{}' to a boolean",
        token
    )))
}

/// Parse octal or hexadecimal text into an unsigned value
pub fn radix_to_decimal(value: Value, radix: u32) -> StepResult<Value> {
    let text = into_text(value);
    let mut digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    if radix == 16 {
        if let Some(rest) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            digits = rest.to_string();
        }
    }

    let name = if radix == 16 { "hexadecimal" } else { "octal" };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(StepError::algorithm(format!(
            "'{}' is not a valid {} number",
            text.trim(),
            name
        )));
    }

    u64::from_str_radix(&digits, radix)
        .map(Value::Unsigned)
        .map_err(|_| {
            StepError::algorithm(format!("{} number '{}' is out of range", name, text.trim()))
        })
}
