use super::LoggingConfig;
use engine::config::ConfigValidationError;
use engine::{DisplayDims, EngineConfig};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_DISPLAY_WIDTH: u32 = 1080;
const DEFAULT_DISPLAY_HEIGHT: u32 = 1920;
const SANDBOX_DIR_NAME: &str = "thememgr/sandbox";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    display: DisplayConfig,
    #[serde(default)]
    sandbox: SandboxConfig,
    #[serde(default)]
    apply: ApplyDefaults,
    #[serde(default)]
    engine: EngineConfig,
}

impl AppConfig {
    /// Validate the configuration against defined limits
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = match self.engine.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if self.display.width == Some(0) || self.display.height == Some(0) {
            errors.push(ConfigValidationError::InvalidDisplay {
                width: self.display.dims().width,
                height: self.display.dims().height,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn sandbox(&self) -> &SandboxConfig {
        &self.sandbox
    }

    pub fn apply(&self) -> &ApplyDefaults {
        &self.apply
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }
}

/// Size of the simulated display
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    width: Option<u32>,
    height: Option<u32>,
}

impl DisplayConfig {
    pub fn dims(&self) -> DisplayDims {
        DisplayDims::new(
            self.width.unwrap_or(DEFAULT_DISPLAY_WIDTH),
            self.height.unwrap_or(DEFAULT_DISPLAY_HEIGHT),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxConfig {
    root: Option<PathBuf>,
}

impl SandboxConfig {
    /// Sandbox root (default: `<local data dir>/thememgr/sandbox`)
    pub fn root(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(SANDBOX_DIR_NAME),
        }
    }
}

/// Defaults for flags that `apply` and `reset` accept on the command line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyDefaults {
    remove_stale_overlays: Option<bool>,
    force_center_wallpaper: Option<bool>,
}

impl ApplyDefaults {
    pub fn remove_stale_overlays(&self) -> bool {
        self.remove_stale_overlays.unwrap_or(false)
    }

    pub fn force_center_wallpaper(&self) -> bool {
        self.force_center_wallpaper.unwrap_or(false)
    }
}
