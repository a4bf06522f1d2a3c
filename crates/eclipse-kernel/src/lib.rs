//! Eclipse Kernel
//!
//! Shared contracts for the plugin host:
//! - [`Value`], the tagged value variant exchanged with script engines
//! - [`EngineAdapter`] / [`EngineFactory`], the engine boundary
//! - [`ScriptFault`] and [`HostError`], errors crossing that boundary
//! - [`config`], multi-format configuration loading

pub mod config;
pub mod engine;
pub mod error;
pub mod value;

pub use engine::{EngineAdapter, EngineFactory, ImportHook, ScriptSource};
pub use error::{HostError, ScriptFault, ScriptResult};
pub use value::{ProcedureRef, Table, Value};
