use crate::error::{CliError, CliResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

pub mod app;

pub use app::{AppConfig, ApplyDefaults, DisplayConfig, SandboxConfig};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads configuration from `config.toml` (or `path`) and `THEMEMGR__*`
/// environment variables, which override file values.
///
/// The default file is optional; an explicitly requested one is not.
pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    dotenv::dotenv().ok();

    let file_source = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let env_source = Environment::with_prefix("THEMEMGR")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true);

    let config = Config::builder()
        .add_source(file_source)
        .add_source(env_source)
        .build()
        .map_err(|e| {
            CliError::Config(format!(
                "Configuration loading failed: {e}. Please check your config file and environment variables."
            ))
        })?;

    let app_config = config
        .try_deserialize::<AppConfig>()
        .map_err(|e| CliError::Config(format!("Failed to deserialize config: {e}")))?;

    app_config.validate().map_err(CliError::Invalid)?;
    log::debug!("Configuration loaded");
    Ok(app_config)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}
