//! Engine configuration.
//!
//! Every field is optional so the struct can be flattened into a front end's
//! configuration file; accessors supply the defaults.

use crate::model::UserId;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Smallest accepted installer timeout in seconds
pub const MIN_INSTALLER_TIMEOUT_SECS: u64 = 1;
/// Largest accepted installer timeout in seconds
pub const MAX_INSTALLER_TIMEOUT_SECS: u64 = 600;
/// Largest accepted font refresh settle interval in milliseconds
pub const MAX_FONT_REFRESH_SETTLE_MS: u64 = 30_000;

const DEFAULT_FONT_REFRESH_MARKER: &str = "org.thememgr.overlay.fakefonts";
const DEFAULT_FONTS_DIR: &str = "/data/system/theme/fonts";
const DEFAULT_BOOTANIMATION_DIR: &str = "/data/system/theme";

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid installer_timeout_secs: {configured} (min: {min_limit}, max: {max_limit})")]
    InstallerTimeout {
        configured: u64,
        min_limit: u64,
        max_limit: u64,
    },
    #[error("Invalid font_refresh_settle_ms: {configured} (limit: {limit})")]
    FontRefreshSettle { configured: u64, limit: u64 },
    #[error("font_refresh_marker must not be empty")]
    EmptyMarker,
    #[error("{field} must be an absolute path, got '{}'", .path.display())]
    RelativeDirectory { field: &'static str, path: PathBuf },
    #[error("Invalid display size {width}x{height}")]
    InvalidDisplay { width: u32, height: u32 },
}

/// Settings for the installer adapter, the font refresh barrier and the
/// filesystem appliers.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct EngineConfig {
    /// Bound on a single install or uninstall wait (default: 60)
    installer_timeout_secs: Option<u64>,
    /// Settle interval of the font refresh barrier (default: 1000)
    font_refresh_settle_ms: Option<u64>,
    /// Overlay toggled by the font refresh barrier
    font_refresh_marker: Option<String>,
    fonts_dir: Option<PathBuf>,
    bootanimation_dir: Option<PathBuf>,
    /// User scope passed to the overlay manager (default: 0)
    user_id: Option<u32>,
}

impl EngineConfig {
    pub fn installer_timeout(&self) -> Duration {
        Duration::from_secs(self.installer_timeout_secs.unwrap_or(60))
    }

    pub fn font_refresh_settle(&self) -> Duration {
        Duration::from_millis(self.font_refresh_settle_ms.unwrap_or(1000))
    }

    pub fn font_refresh_marker(&self) -> &str {
        self.font_refresh_marker
            .as_deref()
            .unwrap_or(DEFAULT_FONT_REFRESH_MARKER)
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.fonts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FONTS_DIR))
    }

    pub fn bootanimation_dir(&self) -> PathBuf {
        self.bootanimation_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOTANIMATION_DIR))
    }

    pub fn user_id(&self) -> UserId {
        UserId(self.user_id.unwrap_or(0))
    }

    pub fn with_installer_timeout(mut self, timeout: Duration) -> Self {
        self.installer_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_font_refresh_settle(mut self, settle: Duration) -> Self {
        self.font_refresh_settle_ms = Some(settle.as_millis() as u64);
        self
    }

    pub fn with_font_refresh_marker(mut self, marker: impl Into<String>) -> Self {
        self.font_refresh_marker = Some(marker.into());
        self
    }

    pub fn with_fonts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fonts_dir = Some(dir.into());
        self
    }

    pub fn with_bootanimation_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bootanimation_dir = Some(dir.into());
        self
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id.0);
        self
    }

    /// Validate the configuration against defined limits
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        let timeout = self.installer_timeout().as_secs();
        if !(MIN_INSTALLER_TIMEOUT_SECS..=MAX_INSTALLER_TIMEOUT_SECS).contains(&timeout) {
            errors.push(ConfigValidationError::InstallerTimeout {
                configured: timeout,
                min_limit: MIN_INSTALLER_TIMEOUT_SECS,
                max_limit: MAX_INSTALLER_TIMEOUT_SECS,
            });
        }

        let settle = self.font_refresh_settle().as_millis() as u64;
        if settle > MAX_FONT_REFRESH_SETTLE_MS {
            errors.push(ConfigValidationError::FontRefreshSettle {
                configured: settle,
                limit: MAX_FONT_REFRESH_SETTLE_MS,
            });
        }

        if self.font_refresh_marker().trim().is_empty() {
            errors.push(ConfigValidationError::EmptyMarker);
        }

        for (field, path) in [
            ("fonts_dir", self.fonts_dir()),
            ("bootanimation_dir", self.bootanimation_dir()),
        ] {
            if !path.is_absolute() {
                errors.push(ConfigValidationError::RelativeDirectory { field, path });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
