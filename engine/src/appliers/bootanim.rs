use super::fs::{remove_if_exists, write_atomic};
use crate::bundle::{BOOT_ANIMATION_ASSET, BOOT_ANIMATION_DARK_ASSET, BundleAssetSource};
use crate::errors::{ApplyError, ResourceError};
use std::path::{Path, PathBuf};

pub const BOOT_ANIMATION_FILE: &str = "bootanimation.zip";
pub const BOOT_ANIMATION_DARK_FILE: &str = "bootanimation-dark.zip";

/// Replaces the boot animation files in a fixed directory.
#[derive(Debug, Clone)]
pub struct BootAnimationApplier {
    dir: PathBuf,
}

impl BootAnimationApplier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(BOOT_ANIMATION_FILE)
    }

    pub fn dark_path(&self) -> PathBuf {
        self.dir.join(BOOT_ANIMATION_DARK_FILE)
    }

    /// Installs the bundle's boot animation. Without a dark variant in the
    /// bundle the dark path points at the primary file.
    pub fn apply(&self, bundle: &dyn BundleAssetSource) -> Result<(), ApplyError> {
        let primary = self.primary_path();
        let dark = self.dark_path();

        let data = bundle.open_asset(BOOT_ANIMATION_ASSET)?;
        write_atomic(&primary, data)?;

        match bundle.open_asset(BOOT_ANIMATION_DARK_ASSET) {
            Ok(data) => {
                write_atomic(&dark, data)?;
            }
            Err(e) if e.is_not_found() => {
                link_dark_variant(&primary, &dark)?;
            }
            Err(e) => return Err(e.into()),
        }

        log::info!("Boot animation installed in {}", self.dir.display());
        Ok(())
    }

    /// Removes both boot animation files. Returns whether anything was
    /// removed.
    pub fn clear(&self) -> Result<bool, ResourceError> {
        let primary = remove_if_exists(&self.primary_path())?;
        let dark = remove_if_exists(&self.dark_path())?;
        Ok(primary || dark)
    }
}

/// The link target is the bare file name so it resolves next to the link
/// whatever directory the applier was given.
#[cfg(unix)]
fn link_dark_variant(_primary: &Path, dark: &Path) -> Result<(), ResourceError> {
    remove_if_exists(dark)?;
    std::os::unix::fs::symlink(BOOT_ANIMATION_FILE, dark).map_err(|e| ResourceError::io(dark, e))
}

#[cfg(not(unix))]
fn link_dark_variant(primary: &Path, dark: &Path) -> Result<(), ResourceError> {
    remove_if_exists(dark)?;
    std::fs::copy(primary, dark)
        .map(|_| ())
        .map_err(|e| ResourceError::io(dark, e))
}
