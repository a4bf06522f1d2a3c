//! Script engine limits

use serde::{Deserialize, Serialize};

/// Resource limits applied to every Rhai engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptEngineConfig {
    /// Maximum number of operations per evaluation or call (0 = unlimited)
    pub max_operations: u64,
    /// Maximum script call stack depth
    pub max_call_levels: usize,
    /// Maximum string length (0 = unlimited)
    pub max_string_size: usize,
    /// Maximum array length (0 = unlimited)
    pub max_array_size: usize,
    /// Maximum object map size (0 = unlimited)
    pub max_map_size: usize,
    /// Whether loops are allowed
    pub allow_loops: bool,
}

impl Default for ScriptEngineConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 64,
            max_string_size: 1_000_000,
            max_array_size: 10_000,
            max_map_size: 10_000,
            allow_loops: true,
        }
    }
}

impl ScriptEngineConfig {
    pub(crate) fn apply(&self, engine: &mut rhai::Engine) {
        engine.set_max_operations(self.max_operations);
        engine.set_max_call_levels(self.max_call_levels);
        engine.set_max_string_size(self.max_string_size);
        engine.set_max_array_size(self.max_array_size);
        engine.set_max_map_size(self.max_map_size);
        engine.set_allow_looping(self.allow_loops);
    }
}
