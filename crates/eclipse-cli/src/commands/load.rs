//! `eclipse load` command implementation

use super::CliContext;
use crate::error::CliError;
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use eclipse_plugins::{BatchReport, LoadMode};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct LoadSummary {
    loaded: Vec<String>,
    failed: Vec<FailureSummary>,
    unresolved: Vec<UnresolvedSummary>,
}

#[derive(Debug, Serialize)]
struct FailureSummary {
    origin: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct UnresolvedSummary {
    consumer: String,
    provider: String,
    procedure: String,
}

impl From<&BatchReport> for LoadSummary {
    fn from(report: &BatchReport) -> Self {
        Self {
            loaded: report.loaded.clone(),
            failed: report
                .failed
                .iter()
                .map(|failure| FailureSummary {
                    origin: failure.origin.clone(),
                    error: failure.error.to_string(),
                })
                .collect(),
            unresolved: report
                .unresolved
                .iter()
                .map(|(consumer, request)| UnresolvedSummary {
                    consumer: consumer.clone(),
                    provider: request.plugin.clone(),
                    procedure: request.procedure.clone(),
                })
                .collect(),
        }
    }
}

/// Execute the `eclipse load` command
pub fn run(ctx: &CliContext, dir: &Path, mode: LoadMode) -> Result<(), CliError> {
    let (manager, report) = ctx.load_dir(dir, mode)?;
    let summary = LoadSummary::from(&report);

    if ctx.output == OutputFormat::Json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }

    manager.unload_all()?;
    Ok(())
}

fn print_summary(summary: &LoadSummary) {
    for name in &summary.loaded {
        println!("{} {}", "✓".green(), name);
    }
    for failure in &summary.failed {
        println!("{} {}: {}", "✗".red(), failure.origin, failure.error.red());
    }
    for miss in &summary.unresolved {
        println!(
            "{} {} imports {}.{} (unresolved)",
            "!".yellow(),
            miss.consumer,
            miss.provider,
            miss.procedure
        );
    }

    println!();
    println!(
        "{} loaded, {} failed, {} unresolved import(s)",
        summary.loaded.len().to_string().green(),
        summary.failed.len().to_string().red(),
        summary.unresolved.len().to_string().yellow()
    );
}
