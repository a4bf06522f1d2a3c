//! Commands: named procedures with a typed argument contract

use crate::descriptor::{Fields, UNSPECIFIED};
use crate::error::{ArityError, PluginError, PluginResult};
use eclipse_kernel::{EngineAdapter, ProcedureRef, Value};
use serde::Serialize;
use std::fmt;
use tracing::debug;

// ============================================================================
// Argument
// ============================================================================

/// One declared command argument
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    /// Value substituted for nil when the argument is optional
    pub default: Option<Value>,
    pub optional: bool,
}

impl Argument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            default: (!default.is_nil()).then_some(default),
            optional: true,
        }
    }

    fn from_descriptor(entry: &Fields<'_>) -> PluginResult<Self> {
        let default = entry.value("Default");
        Ok(Self {
            name: entry.string_or("Name", UNSPECIFIED)?,
            default: (!default.is_nil()).then(|| default.clone()),
            optional: entry.bool_or("Optional", false)?,
        })
    }

    fn default_or_nil(&self) -> Value {
        self.default.clone().unwrap_or_default()
    }
}

// ============================================================================
// Command
// ============================================================================

/// A named, independently invokable procedure
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    description: String,
    usage: String,
    args: Vec<Argument>,
    arg_count: usize,
    required_arg_count: usize,
    strict: bool,
    returns_value: bool,
    exported: bool,
    procedure: ProcedureRef,
}

impl Command {
    pub fn new(name: impl Into<String>, procedure: ProcedureRef, args: Vec<Argument>) -> Self {
        let required_arg_count = args.iter().filter(|a| !a.optional).count();
        Self {
            name: name.into(),
            description: UNSPECIFIED.to_string(),
            usage: UNSPECIFIED.to_string(),
            arg_count: args.len(),
            required_arg_count,
            args,
            strict: false,
            returns_value: false,
            exported: false,
            procedure,
        }
    }

    /// Build a command from its `Commands.<name>` descriptor entry
    pub(crate) fn from_descriptor(name: &str, entry: &Fields<'_>) -> PluginResult<Self> {
        let procedure = entry.procedure("Run")?.clone();

        let mut args = Vec::new();
        for (position, arg) in entry.list("Args")?.iter().enumerate() {
            let arg = Fields::new(entry.origin(), format!("Commands.{name}.Args[{position}]"), arg)?;
            args.push(Argument::from_descriptor(&arg)?);
        }

        Ok(Self::new(name, procedure, args)
            .with_description(entry.string_or("Description", UNSPECIFIED)?)
            .with_usage(entry.string_or("Use", UNSPECIFIED)?)
            .with_strict(entry.bool_or("Strict", false)?)
            .with_return(entry.bool_or("Return", false)?)
            .with_export(entry.bool_or("Export", false)?))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_return(mut self, returns_value: bool) -> Self {
        self.returns_value = returns_value;
        self
    }

    pub fn with_export(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    pub fn required_arg_count(&self) -> usize {
        self.required_arg_count
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn procedure(&self) -> &ProcedureRef {
        &self.procedure
    }

    /// Check the argument contract and build the positional call list.
    ///
    /// Declared positions that are nil, or missing past the end of `actual`,
    /// take the argument's default when optional and fail otherwise. In
    /// non-strict mode positions past the declared list are kept unchanged.
    pub fn assemble_args(&self, actual: Vec<Value>) -> PluginResult<Vec<Value>> {
        if actual.len() < self.required_arg_count {
            return Err(ArityError::TooFewArguments {
                command: self.name.clone(),
                required: self.required_arg_count,
                actual: actual.len(),
            }
            .into());
        }

        if self.strict && actual.len() != self.arg_count {
            return Err(ArityError::ArgumentCountMismatch {
                command: self.name.clone(),
                expected: self.arg_count,
                actual: actual.len(),
            }
            .into());
        }

        let mut actual = actual.into_iter();
        let mut assembled = Vec::with_capacity(self.arg_count.max(actual.len()));

        for (position, declared) in self.args.iter().enumerate() {
            let value = actual.next().unwrap_or_default();
            if !value.is_nil() {
                assembled.push(value);
            } else if declared.optional {
                assembled.push(declared.default_or_nil());
            } else {
                return Err(PluginError::NilValue {
                    command: self.name.clone(),
                    argument: declared.name.clone(),
                    position,
                });
            }
        }

        assembled.extend(actual);
        Ok(assembled)
    }

    /// Run the command on `engine` with the owning plugin's `context`.
    ///
    /// Returns `Some` only for commands declared with `Return`.
    pub fn invoke(
        &self,
        engine: &dyn EngineAdapter,
        context: &Value,
        args: Vec<Value>,
    ) -> PluginResult<Option<Value>> {
        let args = self.assemble_args(args)?;
        debug!(command = %self.name, args = args.len(), "Invoking command");

        let result = engine
            .call(&self.procedure, vec![context.clone(), Value::List(args)])
            .map_err(|fault| PluginError::from_fault(&self.name, fault))?;

        Ok(self.returns_value.then_some(result))
    }

    /// Structured help for this command
    pub fn usage(&self) -> CommandHelp {
        CommandHelp {
            name: self.name.clone(),
            description: self.description.clone(),
            usage: self.usage.clone(),
            strict: self.strict,
            returns_value: self.returns_value,
            exported: self.exported,
            arguments: self
                .args
                .iter()
                .map(|arg| ArgumentHelp {
                    name: arg.name.clone(),
                    required: !arg.optional,
                    default: arg.default.as_ref().map(|v| v.to_string()),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Help
// ============================================================================

/// Help text for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandHelp {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub strict: bool,
    pub returns_value: bool,
    pub exported: bool,
    pub arguments: Vec<ArgumentHelp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentHelp {
    pub name: String,
    pub required: bool,
    pub default: Option<String>,
}

impl fmt::Display for CommandHelp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name:        {}", self.name)?;
        writeln!(f, "Description: {}", self.description)?;
        writeln!(f, "Usage:       {}", self.usage)?;
        writeln!(f)?;
        write!(f, "Arguments:")?;
        for arg in &self.arguments {
            write!(
                f,
                "\n  {:<10} ({}) Default: {}",
                arg.name,
                if arg.required { "Required" } else { "Optional" },
                arg.default.as_deref().unwrap_or("None"),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eclipse_kernel::{ImportHook, ScriptResult, ScriptSource};
    use parking_lot::Mutex;

    /// Returns the call arguments unchanged and remembers them
    #[derive(Default)]
    struct EchoEngine {
        calls: Mutex<Vec<Vec<Value>>>,
    }

    impl EngineAdapter for EchoEngine {
        fn execute(&mut self, _source: &ScriptSource) -> ScriptResult<Value> {
            Ok(Value::Nil)
        }

        fn call(&self, _procedure: &ProcedureRef, args: Vec<Value>) -> ScriptResult<Value> {
            self.calls.lock().push(args.clone());
            Ok(Value::List(args))
        }

        fn set_global(&mut self, _name: &str, _value: Value) {}

        fn bind_imports(&mut self, _hook: ImportHook) {}

        fn close(&mut self) {}

        fn engine_name(&self) -> &'static str {
            "echo"
        }
    }

    fn add_command() -> Command {
        Command::new(
            "add",
            ProcedureRef::new("add", ()),
            vec![Argument::required("a"), Argument::optional("b", 0_i64)],
        )
        .with_return(true)
    }

    #[test]
    fn test_counts_follow_declared_args() {
        let cmd = add_command();
        assert_eq!(cmd.arg_count(), 2);
        assert_eq!(cmd.required_arg_count(), 1);
        assert!(cmd.required_arg_count() <= cmd.arg_count());
    }

    #[test]
    fn test_too_few_arguments() {
        let err = add_command().assemble_args(vec![]).unwrap_err();
        assert!(matches!(
            err,
            PluginError::Arity(ArityError::TooFewArguments {
                required: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_strict_rejects_shortfall_and_excess() {
        let cmd = add_command().with_strict(true);

        for args in [vec![Value::Int(1)], vec![Value::Int(1), Value::Int(2), Value::Int(3)]] {
            let err = cmd.assemble_args(args).unwrap_err();
            assert!(matches!(
                err,
                PluginError::Arity(ArityError::ArgumentCountMismatch { expected: 2, .. })
            ));
        }
        assert!(cmd.assemble_args(vec![Value::Int(1), Value::Int(2)]).is_ok());
    }

    #[test]
    fn test_non_strict_passes_excess_through() {
        let extra = Value::from("extra");
        let assembled = add_command()
            .assemble_args(vec![Value::Int(1), Value::Int(2), extra.clone(), Value::Nil])
            .unwrap();
        assert_eq!(
            assembled,
            vec![Value::Int(1), Value::Int(2), extra, Value::Nil]
        );
    }

    #[test]
    fn test_nil_handling() {
        let cmd = add_command();

        let err = cmd.assemble_args(vec![Value::Nil]).unwrap_err();
        assert!(matches!(
            err,
            PluginError::NilValue { ref argument, position: 0, .. } if argument == "a"
        ));

        let assembled = cmd.assemble_args(vec![Value::Int(5), Value::Nil]).unwrap();
        assert_eq!(assembled, vec![Value::Int(5), Value::Int(0)]);

        let assembled = cmd.assemble_args(vec![Value::Int(5)]).unwrap();
        assert_eq!(assembled, vec![Value::Int(5), Value::Int(0)]);
    }

    #[test]
    fn test_optional_without_default_reads_nil() {
        let cmd = Command::new(
            "greet",
            ProcedureRef::new("greet", ()),
            vec![Argument::optional("name", Value::Nil)],
        );
        assert_eq!(cmd.assemble_args(vec![]).unwrap(), vec![Value::Nil]);
    }

    #[test]
    fn test_invoke_passes_context_first() {
        let engine = EchoEngine::default();
        let context = Value::from("ctx");

        let result = add_command()
            .invoke(&engine, &context, vec![Value::Int(5)])
            .unwrap();

        let expected = Value::List(vec![
            context.clone(),
            Value::List(vec![Value::Int(5), Value::Int(0)]),
        ]);
        assert_eq!(result, Some(expected));
        assert_eq!(engine.calls.lock().len(), 1);
    }

    #[test]
    fn test_invoke_without_return_yields_none() {
        let engine = EchoEngine::default();
        let result = add_command()
            .with_return(false)
            .invoke(&engine, &Value::Nil, vec![Value::Int(1)])
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_usage() {
        let help = add_command().with_description("Adds numbers").usage();
        assert_eq!(help.arguments.len(), 2);
        assert!(help.arguments[0].required);
        assert_eq!(help.arguments[1].default.as_deref(), Some("0"));

        let text = help.to_string();
        assert!(text.contains("Description: Adds numbers"));
        assert!(text.contains("(Required) Default: None"));
        assert!(text.contains("(Optional) Default: 0"));
    }
}
