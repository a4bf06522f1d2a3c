//! Plugin runtime errors

use eclipse_kernel::ScriptFault;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Name kinds
// ============================================================================

/// What kind of name a lookup or registration was about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Plugin,
    Command,
    Event,
    Export,
    ImportNamespace,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NameKind::Plugin => "plugin",
            NameKind::Command => "command",
            NameKind::Event => "event",
            NameKind::Export => "export",
            NameKind::ImportNamespace => "import namespace",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Argument count violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArityError {
    #[error("command `{command}` requires at least {required} argument(s), got {actual}")]
    TooFewArguments {
        command: String,
        required: usize,
        actual: usize,
    },

    #[error("strict command `{command}` takes exactly {expected} argument(s), got {actual}")]
    ArgumentCountMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },
}

/// Plugin runtime error
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PluginError {
    /// The plugin script could not be executed
    #[error("failed to load plugin {path}: {fault}")]
    Load { path: String, fault: ScriptFault },

    /// Missing or malformed descriptor section or field
    #[error("invalid plugin descriptor in {origin}: {reason}")]
    Configuration { origin: String, reason: String },

    /// Name collision
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: NameKind, name: String },

    /// Unknown name on lookup or removal
    #[error("{kind} `{name}` not found")]
    NotFound { kind: NameKind, name: String },

    #[error(transparent)]
    Arity(#[from] ArityError),

    /// A required argument was nil and has no default
    #[error("argument `{argument}` (position {position}) of command `{command}` is required but was nil")]
    NilValue {
        command: String,
        argument: String,
        position: usize,
    },

    /// The procedure failed while running
    #[error("procedure `{procedure}` failed: {fault}")]
    Invocation {
        procedure: String,
        fault: ScriptFault,
    },

    /// The import was never resolved
    #[error("plugin `{consumer}` has no resolved import `{provider}.{procedure}`")]
    ImportResolutionMiss {
        consumer: String,
        provider: String,
        procedure: String,
    },

    /// The import's provider has been unloaded
    #[error("import `{provider}.{procedure}` targets an unloaded plugin")]
    ImportTargetUnloaded { provider: String, procedure: String },

    #[error("call cycle detected: {chain}")]
    CallCycleDetected { chain: String },

    #[error("maximum call depth {limit} exceeded calling `{plugin}.{procedure}`")]
    CallDepthExceeded {
        plugin: String,
        procedure: String,
        limit: usize,
    },

    /// Another thread held the plugin's engine past the lock timeout
    #[error("plugin `{plugin}` engine stayed busy for {waited_ms} ms")]
    EngineBusy { plugin: String, waited_ms: u64 },

    #[error("plugin `{0}` is already unloaded")]
    AlreadyUnloaded(String),

    #[error("plugin `{0}` is already loaded")]
    AlreadyLoaded(String),

    #[error("plugin `{0}` is not loaded")]
    NotLoaded(String),
}

/// Plugin result type
pub type PluginResult<T = ()> = Result<T, PluginError>;

impl PluginError {
    pub(crate) fn configuration(origin: &str, reason: impl Into<String>) -> Self {
        PluginError::Configuration {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn duplicate(kind: NameKind, name: &str) -> Self {
        PluginError::Duplicate {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn not_found(kind: NameKind, name: &str) -> Self {
        PluginError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Map an engine fault raised while running `procedure`.
    ///
    /// Runtime errors raised by nested plugin calls come back as host errors
    /// and are restored as-is; anything else is an invocation failure.
    pub(crate) fn from_fault(procedure: &str, fault: ScriptFault) -> Self {
        if let ScriptFault::Host(host) = &fault {
            if let Some(inner) = host.downcast_ref::<PluginError>() {
                return inner.clone();
            }
        }
        PluginError::Invocation {
            procedure: procedure.to_string(),
            fault,
        }
    }
}
