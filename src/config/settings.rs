//! Sandbox limits for script steps
//!
//! These bound what a single script execution may consume besides wall-clock
//! time, which is governed by the overall test timeout.

use serde::{Deserialize, Serialize};

/// Default maximum number of Rhai operations per script run
pub const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;

/// Default number of compiled scripts kept in the cache
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Resource limits applied to every script engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Maximum operations per run (0 disables the limit)
    pub max_operations: u64,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum expression nesting depth (also used for function bodies)
    pub max_expr_depth: usize,

    /// Maximum length of any string value
    pub max_string_size: usize,

    /// Maximum number of array elements
    pub max_array_size: usize,

    /// Maximum number of object map entries
    pub max_map_size: usize,

    /// Number of compiled scripts to cache (0 disables caching)
    pub cache_capacity: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 1024 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ScriptLimits {
    /// Limits with no operation cap, for scripts bounded only by time
    pub fn unbounded_operations() -> Self {
        Self {
            max_operations: 0,
            ..Self::default()
        }
    }
}
