//! Script step: hands the value to the configured [`ScriptRunner`].
//!
//! [`ScriptRunner`]: crate::scripting::ScriptRunner

use crate::pipeline::error::StepResult;
use crate::pipeline::steps::StepContext;
use crate::scripting::ScriptInput;
use crate::types::Value;

pub fn run(value: Value, ctx: &StepContext) -> StepResult<Value> {
    let input = ScriptInput::new(value)
        .with_history(ctx.history.cloned())
        .at(ctx.timestamp);

    let remaining = ctx.remaining();
    tracing::debug!("running script step with {:?} left", remaining);

    Ok(ctx.scripts.execute(ctx.param(0), &input, remaining)?)
}
