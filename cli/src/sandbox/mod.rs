//! File-backed device the engine applies themes to.
//!
//! Everything the OS would own lives under one root directory:
//!
//! ```text
//! <root>/overlays.json     installed overlay packages
//! <root>/wallpaper.png     current wallpaper
//! <root>/lockscreen.png    current lock screen
//! <root>/sounds.json       current ringtone, alarm and notification
//! <root>/sounds/<kind>/    sound files
//! <root>/fonts/            font directory
//! <root>/media/            boot animation directory
//! ```

mod installer;
mod media;
pub mod registry;

pub use installer::OverlayPackage;
pub use media::{SoundLedger, SoundRecord};
pub use registry::{OverlayRecord, OverlayRegistry};

use crate::error::{CliError, CliResult};
use async_trait::async_trait;
use engine::EngineConfig;
use engine::appliers::{OverlayInfo, OverlayManager};
use engine::errors::OverlayError;
use engine::model::UserId;
use engine::pipeline::Collaborators;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const OVERLAYS_FILE: &str = "overlays.json";
pub const SOUNDS_FILE: &str = "sounds.json";
pub const WALLPAPER_FILE: &str = "wallpaper.png";
pub const LOCK_SCREEN_FILE: &str = "lockscreen.png";
pub const SOUNDS_DIR: &str = "sounds";
pub const FONTS_DIR: &str = "fonts";
pub const BOOTANIMATION_DIR: &str = "media";

pub struct SandboxDevice {
    root: PathBuf,
    registry: Arc<Mutex<OverlayRegistry>>,
    sounds: Mutex<SoundLedger>,
}

impl SandboxDevice {
    /// Opens (creating if needed) the sandbox at `root` and makes sure the
    /// font refresh overlay `marker` is registered.
    pub fn open(root: impl Into<PathBuf>, marker: &str) -> CliResult<Arc<Self>> {
        let root = root.into();
        for dir in [
            root.clone(),
            root.join(SOUNDS_DIR),
            root.join(FONTS_DIR),
            root.join(BOOTANIMATION_DIR),
        ] {
            fs::create_dir_all(&dir).map_err(|e| CliError::io(&dir, e))?;
        }
        let root = std::path::absolute(&root).map_err(|e| CliError::io(&root, e))?;

        let mut registry = OverlayRegistry::load(root.join(OVERLAYS_FILE))?;
        if registry.get(marker).is_none() {
            log::info!("Registering font refresh overlay {}", marker);
            registry.insert(OverlayRecord {
                package: marker.to_string(),
                target: "android".to_string(),
                enabled: false,
                has_code: false,
                theme_overlay: false,
            })?;
        }

        let sounds = SoundLedger::load(root.join(SOUNDS_FILE))?;
        log::debug!("Opened sandbox at {}", root.display());

        Ok(Arc::new(Self {
            root,
            registry: Arc::new(Mutex::new(registry)),
            sounds: Mutex::new(sounds),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.root.join(FONTS_DIR)
    }

    pub fn bootanimation_dir(&self) -> PathBuf {
        self.root.join(BOOTANIMATION_DIR)
    }

    /// `base` with the font and boot animation directories moved into the
    /// sandbox.
    pub fn engine_config(&self, base: &EngineConfig) -> EngineConfig {
        base.clone()
            .with_fonts_dir(self.fonts_dir())
            .with_bootanimation_dir(self.bootanimation_dir())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            installer: self.clone(),
            overlays: self.clone(),
            wallpaper: self.clone(),
            sounds: self.clone(),
        }
    }

    /// Snapshot of the overlay registry.
    pub fn overlays(&self) -> Vec<OverlayRecord> {
        self.registry().records().cloned().collect()
    }

    pub fn sounds(&self) -> Vec<SoundRecord> {
        self.sound_ledger().records().cloned().collect()
    }

    fn registry(&self) -> MutexGuard<'_, OverlayRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sound_ledger(&self) -> MutexGuard<'_, SoundLedger> {
        self.sounds.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SandboxDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxDevice")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OverlayManager for SandboxDevice {
    async fn set_enabled(
        &self,
        package_id: &str,
        enabled: bool,
        user: UserId,
    ) -> Result<(), OverlayError> {
        log::debug!("Setting {} enabled={} for {}", package_id, enabled, user);
        match self.registry().set_enabled(package_id, enabled) {
            Ok(true) => Ok(()),
            Ok(false) => Err(OverlayError::new(
                package_id,
                enabled,
                "package is not installed",
            )),
            Err(e) => Err(OverlayError::new(package_id, enabled, e.to_string())),
        }
    }

    async fn overlay_info(&self, package_id: &str) -> Option<OverlayInfo> {
        self.registry().get(package_id).map(OverlayInfo::from)
    }

    async fn installed_overlays(&self) -> Vec<OverlayInfo> {
        self.registry().records().map(OverlayInfo::from).collect()
    }
}
