//! Engine adapter contract
//!
//! The narrow surface the plugin runtime needs from an embedded scripting
//! engine. One adapter instance belongs to exactly one plugin.

use crate::error::{HostError, ScriptResult};
use crate::value::{ProcedureRef, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a plugin script comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Script file on disk
    File(PathBuf),
    /// In-memory script content
    Inline { name: String, content: String },
}

impl ScriptSource {
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Human-readable origin used in logs and errors
    pub fn display_name(&self) -> String {
        match self {
            ScriptSource::File(path) => path.display().to_string(),
            ScriptSource::Inline { name, .. } => name.clone(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ScriptSource::File(path) => Some(path),
            ScriptSource::Inline { .. } => None,
        }
    }
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl From<PathBuf> for ScriptSource {
    fn from(path: PathBuf) -> Self {
        ScriptSource::File(path)
    }
}

impl From<&Path> for ScriptSource {
    fn from(path: &Path) -> Self {
        ScriptSource::File(path.to_path_buf())
    }
}

/// Host callback behind the script-side `invoke_import(provider, procedure, args)`.
///
/// Returns `Ok(None)` for procedures that produce no result.
pub type ImportHook =
    Arc<dyn Fn(&str, &str, Vec<Value>) -> Result<Option<Value>, HostError> + Send + Sync>;

/// An exclusively-owned embedded engine instance.
pub trait EngineAdapter: Send {
    /// Run a plugin script and return the single value it produces.
    fn execute(&mut self, source: &ScriptSource) -> ScriptResult<Value>;

    /// Call a procedure produced by this adapter with positional arguments.
    ///
    /// Procedures without a meaningful result yield `Value::Nil`.
    fn call(&self, procedure: &ProcedureRef, args: Vec<Value>) -> ScriptResult<Value>;

    /// Publish a value under `name` to every procedure of this instance.
    fn set_global(&mut self, name: &str, value: Value);

    /// Expose the import call path to scripts.
    fn bind_imports(&mut self, hook: ImportHook);

    /// Release script state. Further calls fail with `ScriptFault::Closed`.
    fn close(&mut self);

    /// Engine name, for diagnostics
    fn engine_name(&self) -> &'static str;
}

/// Builds fresh adapter instances, one per plugin load.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> ScriptResult<Box<dyn EngineAdapter>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> ScriptResult<Box<dyn EngineAdapter>> + Send + Sync,
{
    fn create(&self) -> ScriptResult<Box<dyn EngineAdapter>> {
        self()
    }
}
