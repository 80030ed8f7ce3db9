//! Rhai Scripting for Script Steps
//!
//! Script steps run user code on the current value inside a sandboxed Rhai
//! engine. The engine core only sees the [`ScriptRunner`] trait; the Rhai
//! implementation lives in [`RhaiScriptRunner`].
//!
//! ## Script Interface
//!
//! - `value` - The current value (float, int, string or blob)
//! - `prev()` - Previous value from the history context (`()` if absent)
//! - `has_prev()` - Returns true if a previous value is available
//! - `prev_time()` - Unix time of the previous value in seconds
//! - `dt()` - Seconds between the previous and the current value
//!
//! A script either evaluates to the new value, or defines
//! `fn transform(value)` which is called instead. `throw "message"` fails the
//! step with that message.
//!
//! ## Helper Functions
//!
//! - `derivative(current, previous, dt)` - Rate of change
//! - `deadband(value, center, width)` - Snap small deviations to `center`
//! - `clamp(x, min, max)` - Bound a value, tolerating inverted bounds
//! - `map_range(x, in_min, in_max, out_min, out_max)`
//!
//! ## Example Scripts
//!
//! Scale a reading:
//! ```rhai
//! value * 1.8 + 32.0
//! ```
//!
//! Reject unexpected payloads:
//! ```rhai
//! fn transform(value) {
//!     if !value.starts_with("OK") { throw "device reported: " + value; }
//!     value.sub_string(3)
//! }
//! ```

mod engine;

pub use engine::RhaiScriptRunner;

use crate::types::{HistoryContext, Value};
use chrono::{DateTime, Utc};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Name of the optional entry point a script may define
pub const TRANSFORM_FN: &str = "transform";

/// Errors raised while running a script step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("cannot compile script: {0}")]
    Compile(String),

    /// The script threw a value
    #[error("{0}")]
    Raised(String),

    #[error("script failed: {0}")]
    Runtime(String),

    #[error("script exceeded a resource limit: {0}")]
    LimitExceeded(String),

    #[error("script execution time limit of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    #[error("script returned no usable value ({0})")]
    NoValue(String),

    #[error("script engine fault: {0}")]
    Internal(String),
}

/// Everything a script can see
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInput {
    pub value: Value,
    pub history: Option<HistoryContext>,
    /// Timestamp of the current value
    pub timestamp: DateTime<Utc>,
}

impl ScriptInput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            history: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_history(mut self, history: Option<HistoryContext>) -> Self {
        self.history = history;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Capability interface for running script steps.
///
/// Implementations must stop executing once `timeout` has elapsed and
/// report [`ScriptError::Timeout`].
#[cfg_attr(test, mockall::automock)]
pub trait ScriptRunner: Send + Sync {
    fn execute(
        &self,
        code: &str,
        input: &ScriptInput,
        timeout: Duration,
    ) -> Result<Value, ScriptError>;
}

/// A compiled script
#[derive(Clone)]
pub struct CompiledScript {
    ast: AST,
    source: String,
    has_transform: bool,
}

impl CompiledScript {
    fn new(ast: AST, source: &str) -> Self {
        let has_transform = ast
            .iter_functions()
            .any(|f| f.name == TRANSFORM_FN && f.params.len() == 1);
        Self {
            ast,
            source: source.to_string(),
            has_transform,
        }
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if the script defines `fn transform(value)`
    pub fn has_transform(&self) -> bool {
        self.has_transform
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("source", &self.source)
            .field("has_transform", &self.has_transform)
            .finish()
    }
}

/// Cache for compiled scripts to avoid recompilation
#[derive(Default)]
pub struct ScriptCache {
    /// Map from script source to compiled script
    cache: HashMap<String, CompiledScript>,
    /// Entries kept before the cache is flushed
    capacity: usize,
}

impl ScriptCache {
    /// Create a new empty cache
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity,
        }
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(
        &mut self,
        engine: &Engine,
        source: &str,
    ) -> Result<CompiledScript, ScriptError> {
        if let Some(script) = self.cache.get(source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;
        let script = CompiledScript::new(ast, source);

        if self.capacity > 0 {
            if self.cache.len() >= self.capacity {
                tracing::debug!("script cache full ({} entries), flushing", self.cache.len());
                self.cache.clear();
            }
            self.cache.insert(source.to_string(), script.clone());
        }
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

/// Create a new shared script cache
pub fn create_shared_cache(capacity: usize) -> SharedScriptCache {
    Arc::new(RwLock::new(ScriptCache::new(capacity)))
}
