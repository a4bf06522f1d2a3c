//! Plugin descriptor parsing
//!
//! A plugin script evaluates to one descriptor value with four sections:
//! `Metadata`, `Events`, `Commands` and `Imports`. Every accessor here turns
//! a missing or mistyped field into a [`PluginError::Configuration`].

use crate::error::{PluginError, PluginResult};
use eclipse_kernel::{ProcedureRef, Table, Value};
use serde::Serialize;
use std::path::PathBuf;

/// Placeholder for optional descriptor text left unspecified
pub const UNSPECIFIED: &str = "N/A";

/// Identity of a loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    /// Registry key, immutable after load
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    /// Script path, if the plugin was loaded from disk
    pub source_path: Option<PathBuf>,
}

impl PluginDescriptor {
    pub(crate) fn from_metadata(
        metadata: &Fields<'_>,
        source_path: Option<PathBuf>,
    ) -> PluginResult<Self> {
        let name = metadata
            .string("Name")?
            .ok_or_else(|| metadata.error("missing required field `Name`"))?;

        Ok(Self {
            name,
            description: metadata.string_or("Description", UNSPECIFIED)?,
            author: metadata.string_or("Author", UNSPECIFIED)?,
            version: metadata.string_or("Version", UNSPECIFIED)?,
            source_path,
        })
    }
}

// ============================================================================
// Field access
// ============================================================================

/// Typed view over one table of the descriptor
pub(crate) struct Fields<'a> {
    origin: &'a str,
    scope: String,
    table: &'a Table,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(origin: &'a str, scope: impl Into<String>, value: &'a Value) -> PluginResult<Self> {
        let scope = scope.into();
        match value.as_table() {
            Some(table) => Ok(Self {
                origin,
                scope,
                table,
            }),
            None => Err(PluginError::configuration(
                origin,
                format!("`{}` must be a table, found {}", scope, value.type_name()),
            )),
        }
    }

    pub(crate) fn error(&self, reason: impl AsRef<str>) -> PluginError {
        PluginError::configuration(self.origin, format!("{}: {}", self.scope, reason.as_ref()))
    }

    pub(crate) fn origin(&self) -> &'a str {
        self.origin
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&'a String, &'a Value)> + use<'a> {
        self.table.iter()
    }

    fn required(&self, key: &str) -> PluginResult<&'a Value> {
        match self.table.get(key) {
            Some(value) if !value.is_nil() => Ok(value),
            _ => Err(self.error(format!("missing required field `{key}`"))),
        }
    }

    fn mistyped(&self, key: &str, expected: &str, found: &Value) -> PluginError {
        self.error(format!(
            "field `{key}` must be {expected}, found {}",
            found.type_name()
        ))
    }

    /// Required nested table
    pub(crate) fn nested(&self, key: &str) -> PluginResult<Fields<'a>> {
        let value = self.required(key)?;
        Fields::new(self.origin, format!("{}.{}", self.scope, key), value)
    }

    /// Required ordered list
    pub(crate) fn list(&self, key: &str) -> PluginResult<&'a [Value]> {
        let value = self.required(key)?;
        value
            .as_list()
            .ok_or_else(|| self.mistyped(key, "a list", value))
    }

    /// Required procedure
    pub(crate) fn procedure(&self, key: &str) -> PluginResult<&'a ProcedureRef> {
        let value = self.required(key)?;
        value
            .as_procedure()
            .ok_or_else(|| self.mistyped(key, "a procedure", value))
    }

    /// Optional text, `None` when absent
    pub(crate) fn string(&self, key: &str) -> PluginResult<Option<String>> {
        match self.table.get(key) {
            None | Some(Value::Nil) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.mistyped(key, "a string", other)),
        }
    }

    pub(crate) fn string_or(&self, key: &str, default: &str) -> PluginResult<String> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> PluginResult<bool> {
        match self.table.get(key) {
            None | Some(Value::Nil) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.mistyped(key, "a boolean", other)),
        }
    }

    /// Raw field value, `Nil` when absent
    pub(crate) fn value(&self, key: &str) -> &'a Value {
        static NIL: Value = Value::Nil;
        self.table.get(key).unwrap_or(&NIL)
    }
}
