//! Plugin lifecycle
//!
//! A [`Plugin`] is created with only its script source known. [`Plugin::load`]
//! runs the script in a fresh engine instance, parses the returned
//! descriptor and fires `OnLoad`. [`Plugin::unload`] fires `OnUnload` and
//! releases the engine. Both transitions happen once: a plugin never returns
//! to `Loaded` after it was unloaded.

use crate::call_chain::{CallFrame, DEFAULT_MAX_CALL_DEPTH};
use crate::command::Command;
use crate::descriptor::{Fields, PluginDescriptor};
use crate::error::{NameKind, PluginError, PluginResult};
use crate::event::{Event, ON_LOAD, ON_UNLOAD};
use crate::import::{ImportBinding, ImportRequest, ImportTable};
use eclipse_kernel::{EngineAdapter, EngineFactory, HostError, ImportHook, ScriptSource, Value};
use eclipse_script::RhaiEngineFactory;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name under which a plugin's own descriptor is published to its engine
pub const PLUGIN_GLOBAL: &str = "Plugin";

/// How long a call waits for a plugin engine held by another thread
pub const DEFAULT_ENGINE_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Plugin lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    /// Constructed, script not yet executed
    Pending,
    Loaded,
    /// Terminal
    Unloaded,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginStatus::Pending => "pending",
            PluginStatus::Loaded => "loaded",
            PluginStatus::Unloaded => "unloaded",
        };
        f.write_str(label)
    }
}

/// Everything parsed out of the descriptor
struct PluginParts {
    status: PluginStatus,
    descriptor: Option<PluginDescriptor>,
    /// The descriptor value, passed as context to the plugin's procedures
    context: Value,
    commands: HashMap<String, Arc<Command>>,
    events: HashMap<String, Arc<Event>>,
    exports: HashMap<String, Arc<Command>>,
    import_requests: Vec<ImportRequest>,
}

impl PluginParts {
    fn pending() -> Self {
        Self {
            status: PluginStatus::Pending,
            descriptor: None,
            context: Value::Nil,
            commands: HashMap::new(),
            events: HashMap::new(),
            exports: HashMap::new(),
            import_requests: Vec::new(),
        }
    }

    fn parse(origin: &str, source_path: Option<PathBuf>, root: &Value) -> PluginResult<Self> {
        let root_fields = Fields::new(origin, "descriptor", root)?;

        let metadata = root_fields.nested("Metadata")?;
        let events = root_fields.nested("Events")?;
        let commands = root_fields.nested("Commands")?;
        let imports = root_fields.list("Imports")?;

        let mut parts = Self::pending();
        parts.descriptor = Some(PluginDescriptor::from_metadata(&metadata, source_path)?);
        parts.context = root.clone();

        for (name, procedure) in events.entries() {
            let procedure = procedure.as_procedure().ok_or_else(|| {
                events.error(format!(
                    "event `{name}` must be a procedure, found {}",
                    procedure.type_name()
                ))
            })?;
            parts.insert_event(Event::new(name.clone(), procedure.clone()))?;
        }

        for (name, entry) in commands.entries() {
            let entry = Fields::new(origin, format!("Commands.{name}"), entry)?;
            parts.insert_command(Command::from_descriptor(name, &entry)?)?;
        }

        for (position, entry) in imports.iter().enumerate() {
            let entry = Fields::new(origin, format!("Imports[{position}]"), entry)?;
            parts.import_requests.push(ImportRequest::from_descriptor(&entry)?);
        }

        Ok(parts)
    }

    fn insert_command(&mut self, command: Command) -> PluginResult<()> {
        let name = command.name().to_string();
        // Exports are a subset of commands, so this also rules out export clashes
        if self.commands.contains_key(&name) {
            return Err(PluginError::duplicate(NameKind::Command, &name));
        }

        let command = Arc::new(command);
        if command.is_exported() {
            self.exports.insert(name.clone(), command.clone());
        }
        self.commands.insert(name, command);
        Ok(())
    }

    fn insert_event(&mut self, event: Event) -> PluginResult<()> {
        if self.events.contains_key(event.name()) {
            return Err(PluginError::duplicate(NameKind::Event, event.name()));
        }
        self.events.insert(event.name().to_string(), Arc::new(event));
        Ok(())
    }
}

type EngineCell = RefCell<Option<Box<dyn EngineAdapter>>>;
type EngineSlot = ReentrantMutex<EngineCell>;

// ============================================================================
// Plugin
// ============================================================================

/// One script module with its own engine instance
pub struct Plugin {
    source: ScriptSource,
    engines: Arc<dyn EngineFactory>,
    max_call_depth: AtomicUsize,
    engine_lock_timeout_ms: AtomicU64,
    state: RwLock<PluginParts>,
    /// Exclusive engine access; re-entrant so nested imports into this
    /// plugin on the same thread can proceed
    engine: EngineSlot,
    imports: Arc<RwLock<ImportTable>>,
}

impl Plugin {
    /// Unloaded plugin for a script file, run with the default Rhai engine
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_source(ScriptSource::File(path.into()))
    }

    pub fn from_source(source: ScriptSource) -> Self {
        Self::with_engine(source, Arc::new(RhaiEngineFactory::default()))
    }

    pub fn with_engine(source: ScriptSource, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            source,
            engines,
            max_call_depth: AtomicUsize::new(DEFAULT_MAX_CALL_DEPTH),
            engine_lock_timeout_ms: AtomicU64::new(DEFAULT_ENGINE_LOCK_TIMEOUT_MS),
            state: RwLock::new(PluginParts::pending()),
            engine: ReentrantMutex::new(RefCell::new(None)),
            imports: Arc::new(RwLock::new(ImportTable::default())),
        }
    }

    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    pub fn set_max_call_depth(&self, depth: usize) {
        self.max_call_depth.store(depth, Ordering::Relaxed);
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth.load(Ordering::Relaxed)
    }

    /// Bound on waiting for this plugin's engine while another thread uses it
    pub fn set_engine_lock_timeout(&self, timeout: Duration) {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.engine_lock_timeout_ms.store(millis, Ordering::Relaxed);
    }

    pub fn engine_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_lock_timeout_ms.load(Ordering::Relaxed))
    }

    pub fn status(&self) -> PluginStatus {
        self.state.read().status
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == PluginStatus::Loaded
    }

    pub fn descriptor(&self) -> Option<PluginDescriptor> {
        self.state.read().descriptor.clone()
    }

    /// Plugin name once loaded
    pub fn name(&self) -> Option<String> {
        self.state.read().descriptor.as_ref().map(|d| d.name.clone())
    }

    /// Name if known, script origin otherwise
    pub fn label(&self) -> String {
        self.name().unwrap_or_else(|| self.source.display_name())
    }

    /// The descriptor value the plugin's procedures run with
    pub fn context(&self) -> Value {
        self.state.read().context.clone()
    }

    pub fn command(&self, name: &str) -> Option<Arc<Command>> {
        self.state.read().commands.get(name).cloned()
    }

    pub fn export(&self, name: &str) -> Option<Arc<Command>> {
        self.state.read().exports.get(name).cloned()
    }

    pub fn command_names(&self) -> Vec<String> {
        sorted_keys(&self.state.read().commands)
    }

    pub fn event_names(&self) -> Vec<String> {
        sorted_keys(&self.state.read().events)
    }

    pub fn export_names(&self) -> Vec<String> {
        sorted_keys(&self.state.read().exports)
    }

    /// Imports declared by the descriptor, in declaration order
    pub fn import_requests(&self) -> Vec<ImportRequest> {
        self.state.read().import_requests.clone()
    }

    /// Imports bound during resolution
    pub fn resolved_imports(&self) -> Vec<ImportRequest> {
        self.imports.read().resolved()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Execute the script, parse its descriptor and fire `OnLoad`.
    ///
    /// Script and descriptor failures leave the plugin `Pending` with no
    /// engine attached. An `OnLoad` fault releases the engine without firing
    /// `OnUnload` and leaves the plugin `Unloaded`.
    pub fn load(&self) -> PluginResult<()> {
        match self.status() {
            PluginStatus::Pending => {}
            PluginStatus::Loaded => return Err(PluginError::AlreadyLoaded(self.label())),
            PluginStatus::Unloaded => return Err(PluginError::AlreadyUnloaded(self.label())),
        }

        let origin = self.source.display_name();
        let load_error = |fault| PluginError::Load {
            path: origin.clone(),
            fault,
        };

        let mut engine = self.engines.create().map_err(load_error)?;
        let engine_name = engine.engine_name();
        engine.bind_imports(self.import_hook());
        let root = match engine.execute(&self.source) {
            Ok(root) => root,
            Err(fault) => {
                engine.close();
                return Err(load_error(fault));
            }
        };

        let parts = match PluginParts::parse(&origin, self.source.path().map(Path::to_path_buf), &root) {
            Ok(parts) => parts,
            Err(err) => {
                engine.close();
                return Err(err);
            }
        };
        engine.set_global(PLUGIN_GLOBAL, root);

        let name = parts
            .descriptor
            .as_ref()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        {
            let guard = self.engine.lock();
            *guard.borrow_mut() = Some(engine);
        }
        self.imports.write().set_consumer(&name);
        {
            let mut state = self.state.write();
            *state = parts;
            state.status = PluginStatus::Loaded;
        }
        info!(
            plugin = %name,
            engine = engine_name,
            commands = self.command_names().len(),
            events = self.event_names().len(),
            "Loaded plugin from {}",
            origin
        );

        if let Err(err) = self.fire_lifecycle(ON_LOAD, Vec::new()) {
            warn!(plugin = %name, "{} failed, releasing plugin: {}", ON_LOAD, err);
            self.release();
            return Err(err);
        }
        Ok(())
    }

    /// Fire `OnUnload`, then release the engine regardless of its outcome.
    ///
    /// Import bindings held by other plugins that point here fail with
    /// `ImportTargetUnloaded` from now on.
    pub fn unload(&self) -> PluginResult<()> {
        if !self.is_loaded() {
            return Err(PluginError::AlreadyUnloaded(self.label()));
        }

        let hook_result = self.fire_lifecycle(ON_UNLOAD, Vec::new());
        if let Err(err) = &hook_result {
            warn!(plugin = %self.label(), "{} failed: {}", ON_UNLOAD, err);
        }

        self.release();
        info!(plugin = %self.label(), "Unloaded plugin");
        hook_result
    }

    /// Drop the engine and everything bound to it
    fn release(&self) {
        {
            let mut state = self.state.write();
            state.status = PluginStatus::Unloaded;
            state.commands.clear();
            state.events.clear();
            state.exports.clear();
        }
        self.imports.write().clear();

        let guard = self.engine.lock();
        let engine = guard.borrow_mut().take();
        if let Some(mut engine) = engine {
            engine.close();
        }
    }

    /// Host callback behind the script-side `invoke_import`
    fn import_hook(&self) -> ImportHook {
        let imports = self.imports.clone();
        Arc::new(move |provider, procedure, args| {
            let binding = imports.read().lookup(provider, procedure);
            binding
                .and_then(|binding| binding.call(args))
                .map_err(HostError::new)
        })
    }

    // ------------------------------------------------------------------------
    // Commands and events
    // ------------------------------------------------------------------------

    /// Register a command on a loaded plugin
    pub fn add_command(&self, command: Command) -> PluginResult<()> {
        let mut state = self.state.write();
        if state.status != PluginStatus::Loaded {
            return Err(PluginError::NotLoaded(self.source.display_name()));
        }
        state.insert_command(command)
    }

    /// Register an event on a loaded plugin
    pub fn add_event(&self, event: Event) -> PluginResult<()> {
        let mut state = self.state.write();
        if state.status != PluginStatus::Loaded {
            return Err(PluginError::NotLoaded(self.source.display_name()));
        }
        state.insert_event(event)
    }

    /// Invoke one of this plugin's commands with its own context
    pub fn invoke_command(&self, name: &str, args: Vec<Value>) -> PluginResult<Option<Value>> {
        let command = {
            let state = self.state.read();
            if state.status != PluginStatus::Loaded {
                return Err(PluginError::NotLoaded(self.source.display_name()));
            }
            state
                .commands
                .get(name)
                .cloned()
                .ok_or_else(|| PluginError::not_found(NameKind::Command, name))?
        };
        self.invoke_bound(&command, args)
    }

    /// Invoke a command object owned by this plugin
    pub(crate) fn invoke_bound(&self, command: &Command, args: Vec<Value>) -> PluginResult<Option<Value>> {
        let (plugin, context) = {
            let state = self.state.read();
            if state.status != PluginStatus::Loaded {
                return Err(PluginError::NotLoaded(self.source.display_name()));
            }
            let plugin = state.descriptor.as_ref().map(|d| d.name.clone()).unwrap_or_default();
            (plugin, state.context.clone())
        };

        let _frame = CallFrame::enter(&plugin, command.name(), self.max_call_depth())?;
        let guard = self.lock_engine(&plugin)?;
        let slot = guard.borrow();
        let engine = slot
            .as_deref()
            .ok_or_else(|| PluginError::NotLoaded(plugin.clone()))?;
        command.invoke(engine, &context, args)
    }

    /// Fire an event by name; unknown events are `NotFound`
    pub fn fire_event(&self, name: &str, args: Vec<Value>) -> PluginResult<()> {
        let event = {
            let state = self.state.read();
            if state.status != PluginStatus::Loaded {
                return Err(PluginError::NotLoaded(self.source.display_name()));
            }
            state
                .events
                .get(name)
                .cloned()
                .ok_or_else(|| PluginError::not_found(NameKind::Event, name))?
        };
        self.run_event(&event, args)
    }

    /// Fire a lifecycle event if the descriptor defines it
    pub(crate) fn fire_lifecycle(&self, name: &str, args: Vec<Value>) -> PluginResult<()> {
        let event = self.state.read().events.get(name).cloned();
        match event {
            Some(event) => self.run_event(&event, args),
            None => Ok(()),
        }
    }

    fn run_event(&self, event: &Event, args: Vec<Value>) -> PluginResult<()> {
        let guard = self.lock_engine(&self.label())?;
        let slot = guard.borrow();
        let engine = slot
            .as_deref()
            .ok_or_else(|| PluginError::NotLoaded(self.label()))?;
        event.fire(engine, args)
    }

    /// Take the engine for a call.
    ///
    /// Re-entry on the owning thread succeeds at once. A different thread
    /// waits at most the engine lock timeout, so two threads calling into
    /// each other's plugins fail with `EngineBusy` instead of blocking forever.
    fn lock_engine(&self, plugin: &str) -> PluginResult<ReentrantMutexGuard<'_, EngineCell>> {
        let timeout = self.engine_lock_timeout();
        self.engine.try_lock_for(timeout).ok_or_else(|| {
            warn!(plugin = %plugin, "Engine busy for {:?}, giving up", timeout);
            PluginError::EngineBusy {
                plugin: plugin.to_string(),
                waited_ms: self.engine_lock_timeout_ms.load(Ordering::Relaxed),
            }
        })
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    pub fn has_import_namespace(&self, provider: &str) -> bool {
        self.imports.read().has_namespace(provider)
    }

    /// Create the namespace for `provider`; a second call is `Duplicate`
    pub fn init_import_namespace(&self, provider: &str) -> PluginResult<()> {
        self.imports.write().init_namespace(provider)
    }

    /// Store a binding under its provider's namespace
    pub fn add_import(&self, binding: ImportBinding) -> PluginResult<()> {
        debug!(
            plugin = %self.label(),
            "Bound import {}.{}",
            binding.provider_name(),
            binding.command().name()
        );
        self.imports.write().insert(binding)
    }

    /// Call a bound import from the host side
    pub fn call_import(&self, provider: &str, procedure: &str, args: Vec<Value>) -> PluginResult<Option<Value>> {
        if !self.is_loaded() {
            return Err(PluginError::NotLoaded(self.label()));
        }
        let binding = self.imports.read().lookup(provider, procedure)?;
        binding.call(args)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("source", &self.source)
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}
