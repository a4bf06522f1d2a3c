//! Eclipse CLI - discover, load and drive script plugins

mod cli;
mod commands;
mod config;
mod discovery;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use commands::CliContext;
use config::HostConfig;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = HostConfig::load(cli.config.as_deref())?;
    let ctx = CliContext::new(config, cli.output.unwrap_or_default());

    match cli.command {
        Commands::Load { dir, mode } => {
            let mode = mode.map(Into::into).unwrap_or(ctx.config.plugins.load_mode);
            commands::load::run(&ctx, &dir, mode)?;
        }
        Commands::List { dir } => {
            commands::list::run(&ctx, &dir)?;
        }
        Commands::Info { dir, plugin } => {
            commands::info::run(&ctx, &dir, &plugin)?;
        }
        Commands::Invoke {
            dir,
            plugin,
            command,
            args,
        } => {
            commands::invoke::run(&ctx, &dir, &plugin, &command, &args)?;
        }
    }

    Ok(())
}
