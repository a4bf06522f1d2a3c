//! Eclipse Plugins
//!
//! Hosts independently loaded script plugins, each in its own engine
//! instance, and lets them call each other's exported commands.
//!
//! - [`Plugin`]: lifecycle of one script module (load, invoke, unload)
//! - [`Command`] / [`Event`]: named procedures and lifecycle hooks
//! - [`PluginManager`]: name-keyed registry, batch loading and import resolution
//!
//! ```no_run
//! use eclipse_plugins::{PluginManager, ManagerConfig};
//!
//! let manager = PluginManager::new(ManagerConfig::default());
//! let math = manager.create_plugin(std::path::PathBuf::from("plugins/math.rhai"));
//! let app = manager.create_plugin(std::path::PathBuf::from("plugins/app.rhai"));
//! manager.load_plugins([math, app])?;
//!
//! let result = manager.invoke("app", "run", vec![5_i64.into()])?;
//! # Ok::<(), eclipse_plugins::PluginError>(())
//! ```

mod call_chain;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod import;
pub mod manager;
pub mod plugin;

pub use call_chain::{DEFAULT_MAX_CALL_DEPTH, active_depth};
pub use command::{Argument, ArgumentHelp, Command, CommandHelp};
pub use descriptor::{PluginDescriptor, UNSPECIFIED};
pub use error::{ArityError, NameKind, PluginError, PluginResult};
pub use event::{Event, ON_LOAD, ON_READY, ON_UNLOAD};
pub use import::{ImportBinding, ImportRequest};
pub use manager::{
    BatchFailure, BatchReport, LoadMode, ManagerConfig, ManagerEvent, ManagerStats, PluginManager,
};
pub use plugin::{DEFAULT_ENGINE_LOCK_TIMEOUT_MS, PLUGIN_GLOBAL, Plugin, PluginStatus};
