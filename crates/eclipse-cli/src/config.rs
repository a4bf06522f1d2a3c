//! Host configuration
//!
//! Read from an optional file (YAML, TOML, JSON, INI, RON or JSON5) and
//! overridden by `ECLIPSE_*` environment variables, e.g.
//! `ECLIPSE_MANAGER__STRICT_IMPORTS=true`.

use crate::error::CliError;
use eclipse_plugins::{DEFAULT_ENGINE_LOCK_TIMEOUT_MS, DEFAULT_MAX_CALL_DEPTH, LoadMode, ManagerConfig};
use eclipse_script::ScriptEngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ECLIPSE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub plugins: PluginsSection,
    pub manager: ManagerSection,
    pub engine: ScriptEngineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Script file extension, without the dot
    pub extension: String,
    pub load_mode: LoadMode,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            extension: "rhai".to_string(),
            load_mode: LoadMode::FailFast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    pub strict_imports: bool,
    pub max_call_depth: usize,
    pub engine_lock_timeout_ms: u64,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            strict_imports: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            engine_lock_timeout_ms: DEFAULT_ENGINE_LOCK_TIMEOUT_MS,
        }
    }
}

impl HostConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        Ok(eclipse_kernel::config::load_with_env(path, ENV_PREFIX)?)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            strict_imports: self.manager.strict_imports,
            max_call_depth: self.manager.max_call_depth,
            engine_lock_timeout_ms: self.manager.engine_lock_timeout_ms,
            engine: self.engine.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = HostConfig::default();
        assert_eq!(config.plugins.extension, "rhai");
        assert_eq!(config.plugins.load_mode, LoadMode::FailFast);
        assert!(!config.manager.strict_imports);
        assert_eq!(config.manager_config().max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
plugins:
  extension: lua
  load_mode: best_effort
manager:
  strict_imports: true
  max_call_depth: 8
  engine_lock_timeout_ms: 250
engine:
  max_operations: 500
"#
        )
        .unwrap();

        let config = HostConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.plugins.extension, "lua");
        assert_eq!(config.plugins.load_mode, LoadMode::BestEffort);

        let manager = config.manager_config();
        assert!(manager.strict_imports);
        assert_eq!(manager.max_call_depth, 8);
        assert_eq!(manager.engine_lock_timeout_ms, 250);
        assert_eq!(manager.engine.max_operations, 500);
        assert_eq!(manager.engine.max_call_levels, ScriptEngineConfig::default().max_call_levels);
    }

    #[test]
    fn test_unknown_extension_is_config_error() {
        let file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        assert!(matches!(
            HostConfig::load(Some(file.path())),
            Err(CliError::Config(_))
        ));
    }
}
