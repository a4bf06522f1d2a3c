//! `eclipse list` command implementation

use super::CliContext;
use crate::error::CliError;
use crate::output::{OutputFormat, Table, print_json};
use colored::Colorize;
use eclipse_plugins::Plugin;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct PluginRow {
    name: String,
    version: String,
    author: String,
    description: String,
    commands: Vec<String>,
    exports: Vec<String>,
    events: Vec<String>,
    imports_resolved: usize,
    imports_declared: usize,
}

impl PluginRow {
    fn from_plugin(plugin: &Plugin) -> Option<Self> {
        let descriptor = plugin.descriptor()?;
        Some(Self {
            name: descriptor.name,
            version: descriptor.version,
            author: descriptor.author,
            description: descriptor.description,
            commands: plugin.command_names(),
            exports: plugin.export_names(),
            events: plugin.event_names(),
            imports_resolved: plugin.resolved_imports().len(),
            imports_declared: plugin.import_requests().len(),
        })
    }
}

/// Execute the `eclipse list` command
pub fn run(ctx: &CliContext, dir: &Path) -> Result<(), CliError> {
    let (manager, _) = ctx.load_dir(dir, ctx.config.plugins.load_mode)?;

    let rows: Vec<PluginRow> = manager
        .plugin_names()
        .iter()
        .filter_map(|name| manager.get_plugin(name))
        .filter_map(|plugin| PluginRow::from_plugin(&plugin))
        .collect();

    if ctx.output == OutputFormat::Json {
        print_json(&rows)?;
    } else if rows.is_empty() {
        println!("{}", "No plugins found.".yellow());
    } else {
        let mut builder = Table::builder().headers(&[
            "Name", "Version", "Author", "Commands", "Exports", "Imports",
        ]);
        for row in &rows {
            builder = builder.add_row(vec![
                row.name.clone(),
                row.version.clone(),
                row.author.clone(),
                row.commands.join(", "),
                row.exports.join(", "),
                format!("{}/{}", row.imports_resolved, row.imports_declared),
            ]);
        }
        println!("{}", builder.build());
    }

    manager.unload_all()?;
    Ok(())
}
