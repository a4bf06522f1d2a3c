//! Rhai engine adapter
//!
//! Implements [`EngineAdapter`] on top of a private `rhai::Engine`. Each
//! adapter keeps the AST of the script it executed so that procedure
//! references (closures and `Fn("name")` pointers) stay callable for the
//! lifetime of the plugin.

use crate::config::ScriptEngineConfig;
use crate::convert::{dynamic_to_value, value_to_dynamic};
use eclipse_kernel::{
    EngineAdapter, EngineFactory, HostError, ImportHook, ProcedureRef, ScriptFault, ScriptResult,
    ScriptSource, Value,
};
use parking_lot::RwLock;
use rhai::{AST, Array, Dynamic, Engine, EvalAltResult, FnPtr, Position, Scope};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Name of the script-side import call function
pub const INVOKE_IMPORT_FN: &str = "invoke_import";

// ============================================================================
// Rhai Engine Adapter
// ============================================================================

/// One embedded Rhai instance, owned by exactly one plugin
pub struct RhaiEngine {
    engine: Engine,
    config: ScriptEngineConfig,
    ast: Option<AST>,
    /// Values published with `set_global`, resolved on every variable lookup
    globals: Arc<RwLock<HashMap<String, Dynamic>>>,
    /// Script name used to tag script log output
    label: Arc<RwLock<String>>,
    closed: bool,
}

impl RhaiEngine {
    pub fn new(config: ScriptEngineConfig) -> Self {
        let globals = Arc::new(RwLock::new(HashMap::new()));
        let label = Arc::new(RwLock::new(String::from("<unnamed>")));
        let engine = Self::build_engine(&config, globals.clone(), label.clone());

        Self {
            engine,
            config,
            ast: None,
            globals,
            label,
            closed: false,
        }
    }

    fn build_engine(
        config: &ScriptEngineConfig,
        globals: Arc<RwLock<HashMap<String, Dynamic>>>,
        label: Arc<RwLock<String>>,
    ) -> Engine {
        let mut engine = Engine::new();
        config.apply(&mut engine);

        // Published globals take precedence over script variables of the same name
        engine.on_var(move |name, _index, _context| Ok(globals.read().get(name).cloned()));

        Self::register_builtin_functions(&mut engine, label);
        engine
    }

    /// Route script output to `tracing` and add JSON helpers
    fn register_builtin_functions(engine: &mut Engine, label: Arc<RwLock<String>>) {
        let script = label.clone();
        engine.on_print(move |msg| info!(script = %script.read(), "{}", msg));

        let script = label.clone();
        engine.on_debug(move |msg, _src, pos| {
            debug!(script = %script.read(), position = %pos, "{}", msg)
        });

        let script = label.clone();
        engine.register_fn("log", move |msg: &str| {
            info!(script = %script.read(), "{}", msg);
        });

        let script = label.clone();
        engine.register_fn("warn", move |msg: &str| {
            warn!(script = %script.read(), "{}", msg);
        });

        let script = label;
        engine.register_fn("error", move |msg: &str| {
            error!(script = %script.read(), "{}", msg);
        });

        engine.register_fn("to_json", |value: Dynamic| -> String {
            dynamic_to_value(&value).to_json().to_string()
        });

        engine.register_fn("from_json", |json: &str| -> Dynamic {
            serde_json::from_str::<serde_json::Value>(json)
                .map(|v| value_to_dynamic(&Value::from_json(&v)))
                .unwrap_or(Dynamic::UNIT)
        });
    }

    pub fn config(&self) -> &ScriptEngineConfig {
        &self.config
    }

    fn read_source(source: &ScriptSource) -> ScriptResult<(String, String)> {
        match source {
            ScriptSource::File(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ScriptFault::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Ok((path.display().to_string(), content))
            }
            ScriptSource::Inline { name, content } => Ok((name.clone(), content.clone())),
        }
    }

    /// Pad or trim arguments to the arity of a script-defined procedure.
    ///
    /// An overload taking exactly `args.len()` parameters is called as is.
    /// Otherwise the overload with the closest arity wins: missing trailing
    /// arguments read as `()`, extra ones are dropped. Native functions are
    /// called with the arguments unchanged.
    fn fit_arity(ast: &AST, fn_ptr: &FnPtr, mut args: Vec<Dynamic>) -> Vec<Dynamic> {
        let curried = fn_ptr.curry().len();
        let arity = ast
            .iter_functions()
            .filter(|f| f.name == fn_ptr.fn_name() && f.params.len() >= curried)
            .map(|f| f.params.len() - curried)
            .min_by_key(|arity| arity.abs_diff(args.len()));

        if let Some(arity) = arity {
            args.resize(arity, Dynamic::UNIT);
        }
        args
    }
}

impl EngineAdapter for RhaiEngine {
    fn execute(&mut self, source: &ScriptSource) -> ScriptResult<Value> {
        if self.closed {
            return Err(ScriptFault::Closed);
        }

        let (name, content) = Self::read_source(source)?;
        *self.label.write() = name.clone();

        let ast = self
            .engine
            .compile(&content)
            .map_err(|e| ScriptFault::Compile {
                script: name.clone(),
                message: e.to_string(),
            })?;

        let mut scope = Scope::new();
        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| fault_from_eval(&e))?;

        debug!("Rhai script executed: {}", name);
        self.ast = Some(ast);
        Ok(dynamic_to_value(&result))
    }

    fn call(&self, procedure: &ProcedureRef, args: Vec<Value>) -> ScriptResult<Value> {
        if self.closed {
            return Err(ScriptFault::Closed);
        }
        let ast = self.ast.as_ref().ok_or(ScriptFault::NotExecuted)?;
        let fn_ptr = procedure
            .downcast_ref::<FnPtr>()
            .ok_or_else(|| ScriptFault::ForeignProcedure(procedure.name().to_string()))?;

        let args: Vec<Dynamic> = args.iter().map(value_to_dynamic).collect();
        let args = Self::fit_arity(ast, fn_ptr, args);

        let result = fn_ptr
            .call::<Dynamic>(&self.engine, ast, args)
            .map_err(|e| fault_from_eval(&e))?;
        Ok(dynamic_to_value(&result))
    }

    fn set_global(&mut self, name: &str, value: Value) {
        self.globals
            .write()
            .insert(name.to_string(), value_to_dynamic(&value));
    }

    fn bind_imports(&mut self, hook: ImportHook) {
        let with_args = hook.clone();
        self.engine.register_fn(
            INVOKE_IMPORT_FN,
            move |provider: &str, procedure: &str, args: Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let args = args.iter().map(dynamic_to_value).collect();
                dispatch_import(&with_args, provider, procedure, args)
            },
        );

        let without_args = hook;
        self.engine.register_fn(
            INVOKE_IMPORT_FN,
            move |provider: &str, procedure: &str| -> Result<Dynamic, Box<EvalAltResult>> {
                dispatch_import(&without_args, provider, procedure, Vec::new())
            },
        );
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ast = None;
        self.globals.write().clear();
        // Drop registered host closures along with the old engine
        self.engine = Engine::new_raw();
        debug!("Rhai engine closed: {}", self.label.read());
    }

    fn engine_name(&self) -> &'static str {
        "rhai"
    }
}

fn dispatch_import(
    hook: &ImportHook,
    provider: &str,
    procedure: &str,
    args: Vec<Value>,
) -> Result<Dynamic, Box<EvalAltResult>> {
    match hook(provider, procedure, args) {
        Ok(Some(result)) => Ok(value_to_dynamic(&result)),
        Ok(None) => Ok(Dynamic::UNIT),
        Err(err) => Err(Box::new(EvalAltResult::ErrorRuntime(
            Dynamic::from(err),
            Position::NONE,
        ))),
    }
}

/// Map a Rhai evaluation error to a fault, restoring typed host errors
fn fault_from_eval(err: &EvalAltResult) -> ScriptFault {
    match host_error_of(err) {
        Some(host) => ScriptFault::Host(host),
        None => ScriptFault::Runtime(err.to_string()),
    }
}

fn host_error_of(err: &EvalAltResult) -> Option<HostError> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<HostError>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => host_error_of(inner),
        EvalAltResult::ErrorInModule(_, inner, _) => host_error_of(inner),
        _ => None,
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates one [`RhaiEngine`] per plugin load
#[derive(Debug, Clone, Default)]
pub struct RhaiEngineFactory {
    config: ScriptEngineConfig,
}

impl RhaiEngineFactory {
    pub fn new(config: ScriptEngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for RhaiEngineFactory {
    fn create(&self) -> ScriptResult<Box<dyn EngineAdapter>> {
        Ok(Box::new(RhaiEngine::new(self.config.clone())))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run(script: &str) -> (RhaiEngine, Value) {
        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let value = engine
            .execute(&ScriptSource::inline("test.rhai", script))
            .unwrap();
        (engine, value)
    }

    #[derive(Debug, Clone, PartialEq)]
    struct HostBoom(String);

    impl std::fmt::Display for HostBoom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "host boom: {}", self.0)
        }
    }

    impl std::error::Error for HostBoom {}

    #[test]
    fn test_execute_returns_descriptor_value() {
        let (_, value) = run(r#"#{ Metadata: #{ Name: "demo" }, Imports: [] }"#);

        assert_eq!(value.field("Metadata").field("Name").as_str(), Some("demo"));
        assert_eq!(value.field("Imports").as_list().map(|l| l.len()), Some(0));
    }

    #[test]
    fn test_execute_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.rhai");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "40 + 2").unwrap();

        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let value = engine.execute(&ScriptSource::File(path)).unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_missing_file_is_io_fault() {
        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let result = engine.execute(&ScriptSource::File("/nonexistent/plugin.rhai".into()));
        assert!(matches!(result, Err(ScriptFault::Io { .. })));
    }

    #[test]
    fn test_compile_and_runtime_faults() {
        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let result = engine.execute(&ScriptSource::inline("bad.rhai", "let x = ;"));
        assert!(matches!(result, Err(ScriptFault::Compile { .. })));

        let result = engine.execute(&ScriptSource::inline("throw.rhai", r#"throw "nope";"#));
        assert!(matches!(result, Err(ScriptFault::Runtime(_))));
    }

    #[test]
    fn test_call_closure_with_args() {
        let (engine, value) = run(r#"#{ Run: |ctx, args| ctx.base + args[0] + args[1] }"#);
        let procedure = value.field("Run").as_procedure().unwrap().clone();

        let mut ctx = eclipse_kernel::Table::new();
        ctx.insert("base".to_string(), Value::Int(100));
        let result = engine
            .call(
                &procedure,
                vec![Value::Table(ctx), Value::List(vec![Value::Int(5), Value::Int(3)])],
            )
            .unwrap();
        assert_eq!(result, Value::Int(108));
    }

    #[test]
    fn test_call_named_function_pointer() {
        let (engine, value) = run(
            r#"
            fn shout(text) { text.to_upper() }
            #{ Run: Fn("shout") }
            "#,
        );
        let procedure = value.field("Run").as_procedure().unwrap().clone();

        let result = engine.call(&procedure, vec![Value::from("hey")]).unwrap();
        assert_eq!(result, Value::from("HEY"));
    }

    #[test]
    fn test_arity_is_fitted() {
        let (engine, value) = run(r#"#{ NoArgs: || 7, OneArg: |a| a }"#);
        let no_args = value.field("NoArgs").as_procedure().unwrap().clone();
        let one_arg = value.field("OneArg").as_procedure().unwrap().clone();

        assert_eq!(
            engine.call(&no_args, vec![Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Int(7)
        );
        assert_eq!(engine.call(&one_arg, vec![]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_arity_prefers_matching_overload() {
        let (engine, value) = run(
            r#"
            fn pick(a, b) { "two" }
            fn pick(a) { "one" }
            fn pick(a, b, c, d) { "four" }
            #{ Run: Fn("pick") }
            "#,
        );
        let procedure = value.field("Run").as_procedure().unwrap().clone();
        let call = |n: i64| engine.call(&procedure, (0..n).map(Value::Int).collect()).unwrap();

        assert_eq!(call(1), Value::from("one"));
        assert_eq!(call(2), Value::from("two"));
        assert_eq!(call(4), Value::from("four"));
        // No 0-ary or 3-ary overload: the nearest one is padded or trimmed
        assert_eq!(call(0), Value::from("one"));
        assert_eq!(call(5), Value::from("four"));
    }

    #[test]
    fn test_closure_captures_survive() {
        let (engine, value) = run(
            r#"
            let offset = 10;
            #{ Run: |x| x + offset }
            "#,
        );
        let procedure = value.field("Run").as_procedure().unwrap().clone();
        assert_eq!(engine.call(&procedure, vec![Value::Int(1)]).unwrap(), Value::Int(11));
    }

    #[test]
    fn test_global_visible_inside_procedures() {
        let (mut engine, value) = run(
            r#"
            fn name_of_self() { Plugin.Metadata.Name }
            fn version_of_self(prefix) { prefix + Plugin.Metadata.Version }
            #{ Named: Fn("name_of_self"), Versioned: Fn("version_of_self") }
            "#,
        );

        let mut metadata = eclipse_kernel::Table::new();
        metadata.insert("Name".to_string(), Value::from("self-aware"));
        metadata.insert("Version".to_string(), Value::from("1.2.0"));
        let mut descriptor = eclipse_kernel::Table::new();
        descriptor.insert("Metadata".to_string(), Value::Table(metadata));
        engine.set_global("Plugin", Value::Table(descriptor));

        let named = value.field("Named").as_procedure().unwrap().clone();
        assert_eq!(engine.call(&named, vec![]).unwrap(), Value::from("self-aware"));

        let versioned = value.field("Versioned").as_procedure().unwrap().clone();
        assert_eq!(
            engine.call(&versioned, vec![Value::from("v")]).unwrap(),
            Value::from("v1.2.0")
        );
    }

    #[test]
    fn test_import_hook_round_trip() {
        let mut engine = RhaiEngine::new(ScriptEngineConfig::default());
        let hook: ImportHook = Arc::new(|provider, procedure, args| {
            if provider == "math" && procedure == "add" {
                let sum = args.iter().filter_map(Value::as_int).sum::<i64>();
                Ok(Some(Value::Int(sum)))
            } else {
                Err(HostError::new(HostBoom(format!("{provider}.{procedure}"))))
            }
        });
        engine.bind_imports(hook);

        let value = engine
            .execute(&ScriptSource::inline(
                "app.rhai",
                r#"#{
                    Sum: || invoke_import("math", "add", [2, 3, 4]),
                    Missing: || invoke_import("math", "nope"),
                }"#,
            ))
            .unwrap();

        let sum = value.field("Sum").as_procedure().unwrap().clone();
        assert_eq!(engine.call(&sum, vec![]).unwrap(), Value::Int(9));

        let missing = value.field("Missing").as_procedure().unwrap().clone();
        match engine.call(&missing, vec![]) {
            Err(ScriptFault::Host(host)) => {
                assert_eq!(
                    host.downcast_ref::<HostBoom>(),
                    Some(&HostBoom("math.nope".to_string()))
                );
            }
            other => panic!("expected host fault, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_procedure_rejected() {
        let (engine, _) = run("()");
        let foreign = ProcedureRef::new("native", 5u32);
        assert!(matches!(
            engine.call(&foreign, vec![]),
            Err(ScriptFault::ForeignProcedure(_))
        ));
    }

    #[test]
    fn test_closed_engine_refuses_work() {
        let (mut engine, value) = run(r#"#{ Run: || 1 }"#);
        let procedure = value.field("Run").as_procedure().unwrap().clone();

        engine.close();
        assert!(matches!(engine.call(&procedure, vec![]), Err(ScriptFault::Closed)));
        assert!(matches!(
            engine.execute(&ScriptSource::inline("again", "1")),
            Err(ScriptFault::Closed)
        ));
    }

    #[test]
    fn test_operation_limit_enforced() {
        let mut engine = RhaiEngine::new(ScriptEngineConfig {
            max_operations: 500,
            ..ScriptEngineConfig::default()
        });
        let result = engine.execute(&ScriptSource::inline("spin", "loop { }"));
        assert!(matches!(result, Err(ScriptFault::Runtime(_))));
    }
}
