//! Command implementations

pub mod info;
pub mod invoke;
pub mod list;
pub mod load;

use crate::config::HostConfig;
use crate::discovery::discover;
use crate::error::CliError;
use crate::output::OutputFormat;
use eclipse_plugins::{BatchReport, LoadMode, PluginManager};
use std::path::Path;
use tracing::info;

/// Shared state for every subcommand
pub struct CliContext {
    pub config: HostConfig,
    pub output: OutputFormat,
}

impl CliContext {
    pub fn new(config: HostConfig, output: OutputFormat) -> Self {
        Self { config, output }
    }

    /// Discover and load every plugin script under `dir`
    pub fn load_dir(
        &self,
        dir: &Path,
        mode: LoadMode,
    ) -> Result<(PluginManager, BatchReport), CliError> {
        let scripts = discover(dir, &self.config.plugins.extension)?;
        let manager = PluginManager::new(self.config.manager_config());
        let batch: Vec<_> = scripts
            .into_iter()
            .map(|path| manager.create_plugin(path))
            .collect();

        let report = manager.load_plugins_with(batch, mode)?;
        info!(
            "Loaded {} plugin(s) from {} ({} failed)",
            report.loaded.len(),
            dir.display(),
            report.failed.len()
        );
        Ok((manager, report))
    }
}
