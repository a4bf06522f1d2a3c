//! Plugin Manager
//!
//! Registry of loaded plugins keyed by name. Owns the batch load lifecycle:
//! every plugin of a batch is loaded first, then imports are resolved across
//! the whole batch, then `OnReady` fires on each plugin.
//!
//! Batches are not atomic. When a batch stops early, plugins loaded before
//! the failure stay registered; callers that need all-or-nothing semantics
//! must remove them.

use crate::call_chain::DEFAULT_MAX_CALL_DEPTH;
use crate::error::{NameKind, PluginError, PluginResult};
use crate::event::ON_READY;
use crate::import::{ImportBinding, ImportRequest};
use crate::plugin::{DEFAULT_ENGINE_LOCK_TIMEOUT_MS, Plugin};
use eclipse_kernel::{EngineFactory, ScriptSource, Value};
use eclipse_script::{RhaiEngineFactory, ScriptEngineConfig};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Fail a batch when any declared import stays unresolved
    pub strict_imports: bool,
    /// Maximum nested command invocations per thread
    pub max_call_depth: usize,
    /// Milliseconds a call waits for a plugin engine busy on another thread
    pub engine_lock_timeout_ms: u64,
    /// Limits for plugin engines created by this manager
    pub engine: ScriptEngineConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            strict_imports: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            engine_lock_timeout_ms: DEFAULT_ENGINE_LOCK_TIMEOUT_MS,
            engine: ScriptEngineConfig::default(),
        }
    }
}

/// How a batch reacts to a plugin that fails to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Stop at the first failure
    #[default]
    FailFast,
    /// Load what can be loaded and report the rest
    BestEffort,
}

/// A plugin that failed to load in a best-effort batch
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Script origin
    pub origin: String,
    pub error: PluginError,
}

/// Outcome of a batch load
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Names of plugins registered by this batch
    pub loaded: Vec<String>,
    pub failed: Vec<BatchFailure>,
    /// Import requests left unresolved, per consumer
    pub unresolved: Vec<(String, ImportRequest)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Events and statistics
// ============================================================================

/// Manager event
#[derive(Debug, Clone, Serialize)]
pub enum ManagerEvent {
    Loaded { plugin: String, version: String },
    ImportsResolved {
        plugin: String,
        resolved: usize,
        unresolved: usize,
    },
    Ready { plugin: String },
    Unloaded { plugin: String },
    Error { plugin: String, error: String },
}

/// Manager statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    /// Total plugins loaded
    pub total_loaded: u64,
    /// Total plugins unloaded
    pub total_unloaded: u64,
    /// Plugins that failed to load or register
    pub failed_loads: u64,
    /// Currently registered plugins
    pub active_plugins: usize,
    /// Import bindings created
    pub resolved_imports: u64,
    /// Import requests left unresolved
    pub unresolved_imports: u64,
}

// ============================================================================
// Plugin Manager
// ============================================================================

/// Registry of plugins keyed by name.
///
/// Registry mutation is serialized by an internal lock; lookups run
/// concurrently. Commands execute on the calling thread.
pub struct PluginManager {
    config: ManagerConfig,
    engines: Arc<dyn EngineFactory>,
    plugins: RwLock<HashMap<String, Arc<Plugin>>>,
    event_tx: broadcast::Sender<ManagerEvent>,
    stats: RwLock<ManagerStats>,
}

impl PluginManager {
    pub fn new(config: ManagerConfig) -> Self {
        let engines = Arc::new(RhaiEngineFactory::new(config.engine.clone()));
        Self::with_engine_factory(config, engines)
    }

    pub fn with_engine_factory(config: ManagerConfig, engines: Arc<dyn EngineFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            config,
            engines,
            plugins: RwLock::new(HashMap::new()),
            event_tx,
            stats: RwLock::new(ManagerStats::default()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Unloaded plugin that will run on this manager's engine factory
    pub fn create_plugin(&self, source: impl Into<ScriptSource>) -> Plugin {
        Plugin::with_engine(source.into(), self.engines.clone())
    }

    /// Subscribe to manager events
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ManagerEvent) {
        let _ = self.event_tx.send(event);
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load one plugin and register it under its name.
    ///
    /// An empty or already registered name unloads the fresh instance before
    /// failing, so nothing is left half-registered. Imports are not resolved.
    pub fn load_plugin(&self, plugin: impl Into<Arc<Plugin>>) -> PluginResult<Arc<Plugin>> {
        let plugin = plugin.into();
        plugin.set_max_call_depth(self.config.max_call_depth);
        plugin.set_engine_lock_timeout(Duration::from_millis(self.config.engine_lock_timeout_ms));

        if let Err(err) = plugin.load() {
            self.record_failure(&plugin.label(), &err);
            return Err(err);
        }

        let Some(descriptor) = plugin.descriptor() else {
            return Err(PluginError::NotLoaded(plugin.label()));
        };
        let name = descriptor.name.clone();

        let rejected = if name.is_empty() {
            Some(PluginError::configuration(
                &plugin.source().display_name(),
                "Metadata.Name must not be empty",
            ))
        } else {
            let mut plugins = self.plugins.write();
            if plugins.contains_key(&name) {
                Some(PluginError::duplicate(NameKind::Plugin, &name))
            } else {
                plugins.insert(name.clone(), plugin.clone());
                None
            }
        };

        if let Some(err) = rejected {
            if let Err(unload_err) = plugin.unload() {
                warn!("Failed to release rejected plugin {}: {}", plugin.label(), unload_err);
            }
            self.record_failure(&plugin.label(), &err);
            return Err(err);
        }

        {
            let mut stats = self.stats.write();
            stats.total_loaded += 1;
            stats.active_plugins = self.plugins.read().len();
        }
        self.emit(ManagerEvent::Loaded {
            plugin: name.clone(),
            version: descriptor.version,
        });
        info!("Registered plugin: {}", name);
        Ok(plugin)
    }

    /// Load a batch, stopping at the first failure.
    ///
    /// Plugins loaded before a failure stay registered. After every plugin
    /// loads, imports are resolved across the batch and `OnReady` fires.
    pub fn load_plugins<I>(&self, batch: I) -> PluginResult<BatchReport>
    where
        I: IntoIterator,
        I::Item: Into<Arc<Plugin>>,
    {
        self.load_plugins_with(batch, LoadMode::FailFast)
    }

    /// Load a batch with an explicit failure mode.
    ///
    /// In [`LoadMode::BestEffort`] load failures are collected in the report
    /// and the remaining plugins proceed to import resolution and `OnReady`.
    /// Strict import misses and `OnReady` faults fail the call in both modes.
    pub fn load_plugins_with<I>(&self, batch: I, mode: LoadMode) -> PluginResult<BatchReport>
    where
        I: IntoIterator,
        I::Item: Into<Arc<Plugin>>,
    {
        let mut report = BatchReport::default();
        let mut loaded = Vec::new();

        for plugin in batch {
            let plugin: Arc<Plugin> = plugin.into();
            match self.load_plugin(plugin.clone()) {
                Ok(plugin) => {
                    report.loaded.push(plugin.label());
                    loaded.push(plugin);
                }
                Err(err) if mode == LoadMode::BestEffort => {
                    warn!("Skipping plugin {}: {}", plugin.source(), err);
                    report.failed.push(BatchFailure {
                        origin: plugin.source().display_name(),
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        report.unresolved = self.resolve_imports(&loaded);
        if self.config.strict_imports {
            if let Some((consumer, request)) = report.unresolved.first() {
                return Err(PluginError::ImportResolutionMiss {
                    consumer: consumer.clone(),
                    provider: request.plugin.clone(),
                    procedure: request.procedure.clone(),
                });
            }
        }

        self.fire_ready(&loaded)?;
        Ok(report)
    }

    /// Bind every import request of `consumers` against the registry.
    ///
    /// Misses are skipped, so the result does not depend on batch order.
    /// Returns the requests left unresolved.
    fn resolve_imports(&self, consumers: &[Arc<Plugin>]) -> Vec<(String, ImportRequest)> {
        let mut unresolved = Vec::new();

        for consumer in consumers {
            let consumer_name = consumer.label();
            let mut resolved_count = 0;
            let mut unresolved_count = 0;

            for request in consumer.import_requests() {
                match self.resolve_one(consumer, &request) {
                    Ok(true) => resolved_count += 1,
                    Ok(false) => {
                        debug!(
                            plugin = %consumer_name,
                            "Import {}.{} left unresolved",
                            request.plugin,
                            request.procedure
                        );
                        unresolved_count += 1;
                        unresolved.push((consumer_name.clone(), request));
                    }
                    Err(err) => {
                        warn!(plugin = %consumer_name, "Import {}.{} rejected: {}", request.plugin, request.procedure, err);
                        unresolved_count += 1;
                        unresolved.push((consumer_name.clone(), request));
                    }
                }
            }

            {
                let mut stats = self.stats.write();
                stats.resolved_imports += resolved_count as u64;
                stats.unresolved_imports += unresolved_count as u64;
            }
            self.emit(ManagerEvent::ImportsResolved {
                plugin: consumer_name,
                resolved: resolved_count,
                unresolved: unresolved_count,
            });
        }

        unresolved
    }

    fn resolve_one(&self, consumer: &Arc<Plugin>, request: &ImportRequest) -> PluginResult<bool> {
        let Some(provider) = self.get_plugin(&request.plugin) else {
            return Ok(false);
        };

        if !consumer.has_import_namespace(&request.plugin) {
            consumer.init_import_namespace(&request.plugin)?;
        }

        let Some(command) = provider.export(&request.procedure) else {
            return Ok(false);
        };

        consumer.add_import(ImportBinding::new(&provider, request.plugin.clone(), command))?;
        Ok(true)
    }

    /// Fire `OnReady(descriptor)` on every plugin; the first fault is returned
    fn fire_ready(&self, plugins: &[Arc<Plugin>]) -> PluginResult<()> {
        let mut first_error = None;

        for plugin in plugins {
            match plugin.fire_lifecycle(ON_READY, vec![plugin.context()]) {
                Ok(()) => self.emit(ManagerEvent::Ready {
                    plugin: plugin.label(),
                }),
                Err(err) => {
                    error!("{} failed for plugin {}: {}", ON_READY, plugin.label(), err);
                    self.emit(ManagerEvent::Error {
                        plugin: plugin.label(),
                        error: err.to_string(),
                    });
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_failure(&self, label: &str, err: &PluginError) {
        self.stats.write().failed_loads += 1;
        self.emit(ManagerEvent::Error {
            plugin: label.to_string(),
            error: err.to_string(),
        });
    }

    // ------------------------------------------------------------------------
    // Lookup and removal
    // ------------------------------------------------------------------------

    pub fn get_plugin(&self, name: &str) -> Option<Arc<Plugin>> {
        self.plugins.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    /// Registered plugin names, sorted
    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    /// Unload a plugin and drop it from the registry.
    ///
    /// The plugin is deregistered even when `OnUnload` faults; that fault is
    /// returned afterwards.
    pub fn remove_plugin(&self, name: &str) -> PluginResult<()> {
        let plugin = self
            .plugins
            .write()
            .remove(name)
            .ok_or_else(|| PluginError::not_found(NameKind::Plugin, name))?;

        let result = plugin.unload();

        {
            let mut stats = self.stats.write();
            stats.total_unloaded += 1;
            stats.active_plugins = self.plugins.read().len();
        }
        self.emit(ManagerEvent::Unloaded {
            plugin: name.to_string(),
        });
        info!("Removed plugin: {}", name);
        result
    }

    /// Remove every plugin. Faults are logged; the first one is returned.
    pub fn unload_all(&self) -> PluginResult<()> {
        let mut first_error = None;
        for name in self.plugin_names() {
            if let Err(err) = self.remove_plugin(&name) {
                error!("Failed to unload plugin {}: {}", name, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Invoke a command on a registered plugin
    pub fn invoke(&self, plugin: &str, command: &str, args: Vec<Value>) -> PluginResult<Option<Value>> {
        let plugin = self
            .get_plugin(plugin)
            .ok_or_else(|| PluginError::not_found(NameKind::Plugin, plugin))?;
        plugin.invoke_command(command, args)
    }

    pub fn stats(&self) -> ManagerStats {
        let mut stats = self.stats.read().clone();
        stats.active_plugins = self.len();
        stats
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        if let Err(err) = self.unload_all() {
            error!("Plugin shutdown finished with errors: {}", err);
        }
    }
}
