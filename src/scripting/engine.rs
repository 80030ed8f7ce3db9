//! Rhai Script Runner Implementation
//!
//! Every execution gets a freshly configured [`Engine`]: the history
//! accessors are closures over that execution's input, and the progress hook
//! carries that execution's deadline. Compiled ASTs are shared through the
//! script cache.

use crate::config::ScriptLimits;
use crate::scripting::{
    create_shared_cache, CompiledScript, ScriptError, ScriptInput, ScriptRunner,
    SharedScriptCache, TRANSFORM_FN,
};
use crate::types::Value;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope};
use std::time::{Duration, Instant};

/// How often (in operations) the progress hook checks the clock
const DEADLINE_CHECK_INTERVAL: u64 = 64;

/// Sandboxed Rhai implementation of [`ScriptRunner`]
pub struct RhaiScriptRunner {
    limits: ScriptLimits,
    cache: SharedScriptCache,
}

impl RhaiScriptRunner {
    /// Create a runner with default limits
    pub fn new() -> Self {
        Self::with_limits(ScriptLimits::default())
    }

    pub fn with_limits(limits: ScriptLimits) -> Self {
        let cache = create_shared_cache(limits.cache_capacity);
        Self { limits, cache }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    pub fn cache(&self) -> &SharedScriptCache {
        &self.cache
    }

    /// Check that a script compiles, without running it
    pub fn validate(&self, source: &str) -> Result<(), ScriptError> {
        let engine = self.sandbox();
        self.compile(&engine, source).map(|_| ())
    }

    /// An engine with the safety limits applied and nothing else
    fn sandbox(&self) -> Engine {
        let mut engine = Engine::new();
        let limits = &self.limits;

        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        // Scripts must not write to the host's stdout
        engine.on_print(|text| tracing::debug!(target: "preproc_test::script", "{}", text));
        engine.on_debug(|text, _, _| tracing::trace!(target: "preproc_test::script", "{}", text));

        engine
    }

    /// A sandbox bound to one execution: deadline hook and history accessors
    fn engine_for(&self, input: &ScriptInput, deadline: Instant) -> Engine {
        let mut engine = self.sandbox();

        engine.on_progress(move |ops| {
            if ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                Some(Dynamic::UNIT)
            } else {
                None
            }
        });

        register_history(&mut engine, input);
        register_helpers(&mut engine);
        engine
    }

    fn compile(&self, engine: &Engine, source: &str) -> Result<CompiledScript, ScriptError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| ScriptError::Internal(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(engine, source)
    }
}

impl ScriptRunner for RhaiScriptRunner {
    fn execute(
        &self,
        code: &str,
        input: &ScriptInput,
        timeout: Duration,
    ) -> Result<Value, ScriptError> {
        if timeout.is_zero() {
            return Err(ScriptError::Timeout(timeout));
        }

        let started = Instant::now();
        let engine = self.engine_for(input, started + timeout);
        let script = self.compile(&engine, code)?;

        let arg = to_dynamic(&input.value);
        let mut scope = Scope::new();
        scope.push("value", arg.clone());

        let result = if script.has_transform() {
            let options = CallFnOptions::new().eval_ast(false);
            engine.call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                script.ast(),
                TRANSFORM_FN,
                (arg,),
            )
        } else {
            engine.eval_ast_with_scope::<Dynamic>(&mut scope, script.ast())
        };

        let elapsed = started.elapsed();
        match result {
            Ok(output) => {
                tracing::debug!("script finished in {:?}", elapsed);
                from_dynamic(output)
            }
            Err(err) => {
                let err = map_eval_error(*err, timeout);
                if matches!(err, ScriptError::Timeout(_)) {
                    tracing::warn!("script terminated after {:?}: {}", elapsed, err);
                } else {
                    tracing::debug!("script failed after {:?}: {}", elapsed, err);
                }
                Err(err)
            }
        }
    }
}

impl Default for RhaiScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RhaiScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiScriptRunner")
            .field("limits", &self.limits)
            .field("cache_size", &self.cache.read().map(|c| c.len()).ok())
            .finish()
    }
}

/// Convert a value into what the script sees as `value`
pub(crate) fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Float(v) => Dynamic::from_float(*v),
        Value::Unsigned(v) => match i64::try_from(*v) {
            Ok(i) => Dynamic::from_int(i),
            // Too large for a script integer; keep it exact as text
            Err(_) => Dynamic::from(v.to_string()),
        },
        Value::Text(s) | Value::Log(s) | Value::Error(s) => Dynamic::from(s.clone()),
        Value::Binary(bytes) => Dynamic::from_blob(bytes.clone()),
    }
}

/// Convert a script result back into a value
pub(crate) fn from_dynamic(output: Dynamic) -> Result<Value, ScriptError> {
    if output.is_float() {
        let v = output.as_float().map_err(|t| ScriptError::NoValue(t.to_string()))?;
        if !v.is_finite() {
            return Err(ScriptError::NoValue(format!("non-finite number {}", v)));
        }
        return Ok(Value::Float(v));
    }
    if output.is_int() {
        let v = output.as_int().map_err(|t| ScriptError::NoValue(t.to_string()))?;
        return Ok(match u64::try_from(v) {
            Ok(u) => Value::Unsigned(u),
            Err(_) => Value::Float(v as f64),
        });
    }
    if output.is_bool() {
        let v = output.as_bool().map_err(|t| ScriptError::NoValue(t.to_string()))?;
        return Ok(Value::Unsigned(u64::from(v)));
    }
    if output.is_string() {
        return output
            .into_string()
            .map(Value::Text)
            .map_err(|t| ScriptError::NoValue(t.to_string()));
    }
    if output.is_blob() {
        return output
            .into_blob()
            .map(Value::Binary)
            .map_err(|t| ScriptError::NoValue(t.to_string()));
    }
    Err(ScriptError::NoValue(output.type_name().to_string()))
}

fn map_eval_error(err: EvalAltResult, timeout: Duration) -> ScriptError {
    match err {
        EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout(timeout),
        EvalAltResult::ErrorRuntime(thrown, _) => ScriptError::Raised(thrown.to_string()),
        EvalAltResult::ErrorTooManyOperations(_) => {
            ScriptError::LimitExceeded("too many operations".to_string())
        }
        EvalAltResult::ErrorStackOverflow(_) => {
            ScriptError::LimitExceeded("call stack too deep".to_string())
        }
        EvalAltResult::ErrorDataTooLarge(what, _) => {
            ScriptError::LimitExceeded(format!("{} too large", what))
        }
        other => ScriptError::Runtime(other.to_string()),
    }
}

fn register_history(engine: &mut Engine, input: &ScriptInput) {
    let prev = input.history.as_ref().map(|h| to_dynamic(&h.previous_value));
    let prev_time = input
        .history
        .as_ref()
        .map(|h| h.previous_timestamp.timestamp_millis() as f64 / 1000.0);
    let dt = input
        .history
        .as_ref()
        .map(|h| h.elapsed_secs(input.timestamp))
        .unwrap_or(0.0);
    let has_prev = prev.is_some();

    engine.register_fn("prev", move || -> Dynamic {
        prev.clone().unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("has_prev", move || -> bool { has_prev });
    engine.register_fn("prev_time", move || -> f64 { prev_time.unwrap_or(f64::NAN) });
    engine.register_fn("dt", move || -> f64 { dt });
}

fn register_helpers(engine: &mut Engine) {
    // Rate of change; 0 when there is no usable previous sample
    engine.register_fn(
        "derivative",
        |current: f64, previous: f64, dt: f64| -> f64 {
            if dt > 0.0 && !previous.is_nan() {
                (current - previous) / dt
            } else {
                0.0
            }
        },
    );

    engine.register_fn("deadband", |value: f64, center: f64, width: f64| -> f64 {
        if (value - center).abs() < width / 2.0 {
            center
        } else {
            value
        }
    });

    // f64::clamp panics on inverted bounds
    engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.max(min).min(max));
    engine.register_fn(
        "map_range",
        |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
            (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
        },
    );
}
