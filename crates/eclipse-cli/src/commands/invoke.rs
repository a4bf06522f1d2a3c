//! `eclipse invoke` command implementation

use super::CliContext;
use crate::error::CliError;
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use eclipse_kernel::Value;
use std::path::Path;
use tracing::debug;

/// Execute the `eclipse invoke` command
pub fn run(
    ctx: &CliContext,
    dir: &Path,
    plugin: &str,
    command: &str,
    args: &[String],
) -> Result<(), CliError> {
    let (manager, _) = ctx.load_dir(dir, ctx.config.plugins.load_mode)?;

    let args: Vec<Value> = args.iter().map(|raw| parse_literal(raw)).collect();
    debug!("Invoking {}.{} with {:?}", plugin, command, args);

    let result = manager.invoke(plugin, command, args);
    let unloaded = manager.unload_all();
    let result = result?;
    unloaded?;

    if ctx.output == OutputFormat::Json {
        print_json(&serde_json::json!({
            "plugin": plugin,
            "command": command,
            "result": result.as_ref().map(Value::to_json),
        }))?;
    } else {
        match result {
            Some(value) => println!("{value}"),
            None => println!("{}", "(no result)".dimmed()),
        }
    }
    Ok(())
}

/// Interpret one command-line argument as a script value.
///
/// `nil`, booleans, integers and floats parse to their typed values; a
/// double-quoted argument is taken verbatim without the quotes; anything
/// else is a string.
pub fn parse_literal(raw: &str) -> Value {
    match raw {
        "nil" => return Value::Nil,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::Float(float);
        }
    }

    let unquoted = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}
