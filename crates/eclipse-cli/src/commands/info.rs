//! `eclipse info` command implementation

use super::CliContext;
use crate::error::CliError;
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use eclipse_plugins::{CommandHelp, NameKind, PluginDescriptor, PluginError};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct PluginInfo {
    #[serde(flatten)]
    descriptor: PluginDescriptor,
    events: Vec<String>,
    commands: Vec<CommandHelp>,
    imports: Vec<String>,
}

/// Execute the `eclipse info` command
pub fn run(ctx: &CliContext, dir: &Path, name: &str) -> Result<(), CliError> {
    let (manager, _) = ctx.load_dir(dir, ctx.config.plugins.load_mode)?;

    let plugin = manager
        .get_plugin(name)
        .ok_or_else(|| PluginError::NotFound {
            kind: NameKind::Plugin,
            name: name.to_string(),
        })?;
    let descriptor = plugin
        .descriptor()
        .ok_or_else(|| PluginError::NotLoaded(name.to_string()))?;

    let info = PluginInfo {
        descriptor,
        events: plugin.event_names(),
        commands: plugin
            .command_names()
            .iter()
            .filter_map(|command| plugin.command(command))
            .map(|command| command.usage())
            .collect(),
        imports: plugin
            .resolved_imports()
            .iter()
            .map(|request| format!("{}.{}", request.plugin, request.procedure))
            .collect(),
    };

    if ctx.output == OutputFormat::Json {
        print_json(&info)?;
    } else {
        print_info(&info);
    }

    manager.unload_all()?;
    Ok(())
}

fn print_info(info: &PluginInfo) {
    let descriptor = &info.descriptor;
    println!();
    println!("  {}", descriptor.name.bold());
    println!("  Version:     {}", descriptor.version.yellow());
    println!("  Author:      {}", descriptor.author);
    println!("  Description: {}", descriptor.description);
    if let Some(path) = &descriptor.source_path {
        println!("  Source:      {}", path.display().to_string().cyan());
    }
    if !info.events.is_empty() {
        println!("  Events:      {}", info.events.join(", "));
    }
    if !info.imports.is_empty() {
        println!("  Imports:     {}", info.imports.join(", "));
    }

    for help in &info.commands {
        println!();
        println!("{help}");
    }
    println!();
}
