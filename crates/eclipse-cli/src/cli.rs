//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use eclipse_plugins::LoadMode;
use std::path::PathBuf;

/// Eclipse - host and drive script plugins
#[derive(Parser)]
#[command(name = "eclipse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short = 'c', long, global = true, env = "ECLIPSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load every plugin under a directory and report the outcome
    Load {
        /// Plugin directory, searched recursively
        dir: PathBuf,

        /// Behaviour when a plugin fails to load
        #[arg(short, long)]
        mode: Option<ModeArg>,
    },

    /// List the plugins found under a directory
    List {
        /// Plugin directory, searched recursively
        dir: PathBuf,
    },

    /// Show descriptor and command help for one plugin
    Info {
        /// Plugin directory, searched recursively
        dir: PathBuf,

        /// Plugin name
        plugin: String,
    },

    /// Invoke a plugin command
    Invoke {
        /// Plugin directory, searched recursively
        dir: PathBuf,

        /// Plugin name
        plugin: String,

        /// Command name
        command: String,

        /// Arguments: nil, true/false, integers, floats or strings
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
    },
}

/// Batch load mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Stop at the first plugin that fails
    FailFast,
    /// Skip plugins that fail and keep going
    BestEffort,
}

impl From<ModeArg> for LoadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FailFast => LoadMode::FailFast,
            ModeArg::BestEffort => LoadMode::BestEffort,
        }
    }
}
