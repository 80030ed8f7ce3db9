//! Step algorithms, one function per step kind.
//!
//! The executor coerces the input to [`StepKind::input`] first; every
//! function here receives an already-coerced value and returns either the new
//! value, a discard signal or a [`StepError`].

mod history;
mod json;
mod numeric;
mod script;
mod text;

use crate::pipeline::error::StepResult;
use crate::pipeline::step::{Step, StepKind};
use crate::pipeline::trace::StepOutput;
use crate::scripting::ScriptRunner;
use crate::types::{HistoryContext, Value};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Everything a step may read besides its input value.
pub struct StepContext<'a> {
    pub step: &'a Step,
    pub history: Option<&'a HistoryContext>,
    /// Timestamp of the value under test
    pub timestamp: DateTime<Utc>,
    /// When the whole test run must be finished
    pub deadline: Instant,
    pub scripts: &'a dyn ScriptRunner,
}

impl StepContext<'_> {
    pub fn param(&self, i: usize) -> &str {
        self.step.param(i)
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Text payload of a value already coerced to text
fn into_text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        other => other.to_text(),
    }
}

/// Run the algorithm of `kind` on an already-coerced input.
pub fn apply(kind: StepKind, input: Value, ctx: &StepContext) -> StepResult<StepOutput> {
    let value = match kind {
        StepKind::Trim => text::trim(input, ctx.param(0), text::TrimSide::Both),
        StepKind::LTrim => text::trim(input, ctx.param(0), text::TrimSide::Left),
        StepKind::RTrim => text::trim(input, ctx.param(0), text::TrimSide::Right),
        StepKind::RegexExtract => text::regex_extract(input, ctx.param(0), ctx.param(1))?,
        StepKind::RegexReplace => text::regex_replace(input, ctx.param(0), ctx.param(1))?,
        StepKind::StringReplace => text::string_replace(input, ctx.param(0), ctx.param(1))?,
        StepKind::ValidateRegex => text::validate_regex(input, ctx.param(0), true)?,
        StepKind::ValidateNotRegex => text::validate_regex(input, ctx.param(0), false)?,
        StepKind::ErrorFieldRegex => text::error_field_regex(input, ctx.param(0), ctx.param(1))?,
        StepKind::BoolToDecimal => text::bool_to_decimal(input)?,
        StepKind::OctalToDecimal => text::radix_to_decimal(input, 8)?,
        StepKind::HexToDecimal => text::radix_to_decimal(input, 16)?,
        StepKind::JsonPath => json::json_path(input, ctx.param(0))?,
        StepKind::ErrorFieldJson => json::error_field_json(input, ctx.param(0))?,
        StepKind::CheckNotError => numeric::check_not_error(input)?,
        // Coercion already happened; the algorithm is identity
        StepKind::ToFloat | StepKind::ToUnsigned | StepKind::ToText => input,
        StepKind::Multiplier => numeric::multiply(input, ctx.param(0))?,
        StepKind::ValidateRange => numeric::validate_range(input, ctx.param(0), ctx.param(1))?,
        StepKind::DeltaValue => return history::delta_value(input, ctx.history),
        StepKind::DeltaSpeed => return history::delta_speed(input, ctx.history, ctx.timestamp),
        StepKind::DiscardUnchanged => return Ok(history::discard_unchanged(input, ctx.history)),
        StepKind::DiscardUnchangedHeartbeat => {
            return history::discard_unchanged_heartbeat(
                input,
                ctx.history,
                ctx.timestamp,
                ctx.param(0),
            )
        }
        StepKind::Script => script::run(input, ctx)?,
    };
    Ok(StepOutput::Value(value))
}
