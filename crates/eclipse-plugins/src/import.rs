//! Cross-plugin imports

use crate::command::Command;
use crate::descriptor::Fields;
use crate::error::{NameKind, PluginError, PluginResult};
use crate::plugin::Plugin;
use eclipse_kernel::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A declared dependency on another plugin's exported command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImportRequest {
    /// Provider plugin name
    pub plugin: String,
    /// Exported command name
    pub procedure: String,
}

impl ImportRequest {
    pub fn new(plugin: impl Into<String>, procedure: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            procedure: procedure.into(),
        }
    }

    pub(crate) fn from_descriptor(entry: &Fields<'_>) -> PluginResult<Self> {
        let plugin = entry
            .string("Plugin")?
            .ok_or_else(|| entry.error("missing required field `Plugin`"))?;
        let procedure = entry
            .string("Procedure")?
            .ok_or_else(|| entry.error("missing required field `Procedure`"))?;
        Ok(Self { plugin, procedure })
    }
}

/// A resolved import: the provider plugin and its exported command.
///
/// The provider is held weakly; once it is unloaded or dropped, calls through
/// the binding fail with [`PluginError::ImportTargetUnloaded`].
#[derive(Debug, Clone)]
pub struct ImportBinding {
    provider: Weak<Plugin>,
    provider_name: String,
    command: Arc<Command>,
}

impl ImportBinding {
    pub fn new(provider: &Arc<Plugin>, provider_name: impl Into<String>, command: Arc<Command>) -> Self {
        Self {
            provider: Arc::downgrade(provider),
            provider_name: provider_name.into(),
            command,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// The provider, if it is still loaded
    pub fn provider(&self) -> Option<Arc<Plugin>> {
        self.provider.upgrade().filter(|p| p.is_loaded())
    }

    /// Invoke the bound command in the provider's context and engine
    pub fn call(&self, args: Vec<Value>) -> PluginResult<Option<Value>> {
        let provider = self.provider().ok_or_else(|| self.unloaded())?;
        provider
            .invoke_bound(&self.command, args)
            .map_err(|err| match err {
                PluginError::NotLoaded(_) => self.unloaded(),
                other => other,
            })
    }

    fn unloaded(&self) -> PluginError {
        PluginError::ImportTargetUnloaded {
            provider: self.provider_name.clone(),
            procedure: self.command.name().to_string(),
        }
    }
}

// ============================================================================
// Import table
// ============================================================================

/// Per-consumer bindings: provider name -> procedure name -> binding
#[derive(Debug, Default)]
pub(crate) struct ImportTable {
    consumer: String,
    namespaces: HashMap<String, HashMap<String, ImportBinding>>,
}

impl ImportTable {
    pub(crate) fn set_consumer(&mut self, consumer: &str) {
        self.consumer = consumer.to_string();
    }

    pub(crate) fn has_namespace(&self, provider: &str) -> bool {
        self.namespaces.contains_key(provider)
    }

    pub(crate) fn init_namespace(&mut self, provider: &str) -> PluginResult<()> {
        if self.namespaces.contains_key(provider) {
            return Err(PluginError::duplicate(NameKind::ImportNamespace, provider));
        }
        self.namespaces.insert(provider.to_string(), HashMap::new());
        Ok(())
    }

    pub(crate) fn insert(&mut self, binding: ImportBinding) -> PluginResult<()> {
        let namespace = self
            .namespaces
            .get_mut(binding.provider_name())
            .ok_or_else(|| PluginError::not_found(NameKind::ImportNamespace, binding.provider_name()))?;
        namespace.insert(binding.command().name().to_string(), binding);
        Ok(())
    }

    pub(crate) fn lookup(&self, provider: &str, procedure: &str) -> PluginResult<ImportBinding> {
        self.namespaces
            .get(provider)
            .and_then(|namespace| namespace.get(procedure))
            .cloned()
            .ok_or_else(|| PluginError::ImportResolutionMiss {
                consumer: self.consumer.clone(),
                provider: provider.to_string(),
                procedure: procedure.to_string(),
            })
    }

    /// Resolved `(provider, procedure)` pairs, sorted
    pub(crate) fn resolved(&self) -> Vec<ImportRequest> {
        let mut resolved: Vec<_> = self
            .namespaces
            .iter()
            .flat_map(|(provider, namespace)| {
                namespace
                    .keys()
                    .map(move |procedure| ImportRequest::new(provider.clone(), procedure.clone()))
            })
            .collect();
        resolved.sort_by(|a, b| (&a.plugin, &a.procedure).cmp(&(&b.plugin, &b.procedure)));
        resolved
    }

    pub(crate) fn clear(&mut self) {
        self.namespaces.clear();
    }
}
