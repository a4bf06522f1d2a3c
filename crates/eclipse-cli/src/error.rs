use eclipse_kernel::config::ConfigError;
use eclipse_plugins::PluginError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not a plugin directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("Failed to scan {}: {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<walkdir::Error> for CliError {
    fn from(err: walkdir::Error) -> Self {
        CliError::Discovery {
            path: err.path().map(PathBuf::from).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}
