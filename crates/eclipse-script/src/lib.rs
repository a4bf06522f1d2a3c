//! Rhai engine adapter for Eclipse plugins
//!
//! A plugin script is a Rhai file whose last expression is the plugin
//! descriptor:
//!
//! ```rhai
//! fn add(ctx, args) {
//!     args[0] + args[1]
//! }
//!
//! #{
//!     Metadata: #{ Name: "math", Version: "1.0.0" },
//!     Events: #{ OnLoad: || log("math loaded") },
//!     Commands: #{
//!         add: #{
//!             Return: true,
//!             Export: true,
//!             Args: [ #{ Name: "a" }, #{ Name: "b", Optional: true, Default: 0 } ],
//!             Run: Fn("add"),
//!         },
//!     },
//!     Imports: [],
//! }
//! ```
//!
//! Procedures may be closures or `Fn("name")` pointers to script functions.
//! Script functions can read the plugin's own descriptor through the
//! `Plugin` global; closures receive it as their first argument instead.
//! Imported procedures are called with `invoke_import(provider, procedure, [args])`.

mod config;
mod convert;
mod engine;

pub use config::ScriptEngineConfig;
pub use convert::{dynamic_to_value, value_to_dynamic};
pub use engine::{INVOKE_IMPORT_FN, RhaiEngine, RhaiEngineFactory};
