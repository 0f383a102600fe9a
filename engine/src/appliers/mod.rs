//! Resource appliers.
//!
//! Wallpaper, sound and overlay handling are OS facilities and are reached
//! through the traits below. Boot animation and font replacement are plain
//! file swaps in configured directories and are implemented here, together
//! with the font refresh barrier.

mod barrier;
mod bootanim;
mod fonts;
mod fs;
mod wallpaper;

pub use barrier::FontRefreshBarrier;
pub use bootanim::BootAnimationApplier;
pub use fonts::FontApplier;
pub use fs::{clear_dir, write_atomic};
pub use wallpaper::{CropRect, center_crop, decode_background};

use crate::errors::{OverlayError, ResourceError};
use crate::model::{BackgroundKind, SoundAsset, SoundKind, UserId};
use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use std::io::Read;

/// Wallpaper and lock-screen applier.
#[async_trait]
pub trait WallpaperApplier: Send + Sync {
    async fn set_wallpaper(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError>;

    async fn set_lock_screen(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError>;

    async fn set_background(
        &self,
        kind: BackgroundKind,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        match kind {
            BackgroundKind::Wallpaper => self.set_wallpaper(image, crop).await,
            BackgroundKind::LockScreen => self.set_lock_screen(image, crop).await,
        }
    }
}

/// Ringtone, alarm and notification sound applier.
#[async_trait]
pub trait SoundApplier: Send + Sync {
    async fn set_sound(
        &self,
        kind: SoundKind,
        sound: &SoundAsset,
        data: Box<dyn Read + Send>,
    ) -> Result<(), ResourceError>;
}

/// What the overlay manager knows about one installed overlay package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayInfo {
    pub package_id: String,
    pub target_id: String,
    pub enabled: bool,
    /// Overlays carrying code are never treated as theme overlays
    pub has_code: bool,
    /// Trusted marker set on packages built as theme overlays
    pub theme_marker: bool,
}

impl OverlayInfo {
    /// True when this overlay may be managed (disabled, removed) by themes.
    pub fn is_theme_managed(&self) -> bool {
        self.theme_marker && !self.has_code
    }
}

/// Overlay manager: toggles overlays and reports what is installed.
#[async_trait]
pub trait OverlayManager: Send + Sync {
    async fn set_enabled(
        &self,
        package_id: &str,
        enabled: bool,
        user: UserId,
    ) -> Result<(), OverlayError>;

    async fn overlay_info(&self, package_id: &str) -> Option<OverlayInfo>;

    async fn installed_overlays(&self) -> Vec<OverlayInfo>;

    async fn is_theme_overlay(&self, package_id: &str) -> bool {
        self.overlay_info(package_id)
            .await
            .is_some_and(|info| info.is_theme_managed())
    }
}
