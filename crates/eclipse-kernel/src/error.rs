//! Typed errors for the engine boundary.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A fault raised by an engine adapter.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ScriptFault {
    /// The script source could not be read.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The script failed to compile.
    #[error("compile error in {script}: {message}")]
    Compile { script: String, message: String },

    /// The script or one of its procedures failed at runtime.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A host function called from the script returned a typed error.
    #[error("{0}")]
    Host(HostError),

    /// A procedure reference that this adapter did not produce.
    #[error("foreign procedure reference `{0}`")]
    ForeignProcedure(String),

    /// `call` before any script was executed.
    #[error("no script has been executed in this engine")]
    NotExecuted,

    /// The adapter was closed.
    #[error("engine instance is closed")]
    Closed,
}

/// Result alias for adapter operations.
pub type ScriptResult<T> = Result<T, ScriptFault>;

/// Carrier for a typed host error crossing the script boundary.
///
/// Host functions (such as the import call path) raise these inside a running
/// script; the adapter hands them back untouched so the caller can recover the
/// original error with [`HostError::downcast_ref`].
#[derive(Clone)]
pub struct HostError(Arc<dyn StdError + Send + Sync>);

impl HostError {
    pub fn new<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self(Arc::new(err))
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}
