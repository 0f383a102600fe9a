use super::fs::{clear_dir, write_atomic};
use crate::bundle::{BundleAssetSource, FONTS_DIR};
use crate::errors::{ApplyError, ResourceError};
use std::path::{Path, PathBuf};

/// Swaps the contents of the system font override directory.
#[derive(Debug, Clone)]
pub struct FontApplier {
    dir: PathBuf,
}

impl FontApplier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deletes every installed font, then copies the bundle's fonts in.
    /// Returns the number of files written.
    pub fn apply(&self, bundle: &dyn BundleAssetSource) -> Result<usize, ApplyError> {
        let removed = self.clear()?;
        log::debug!("Removed {} previous font files", removed);

        let names = bundle.list_assets(FONTS_DIR)?;
        for name in &names {
            let data = bundle.open_asset(&format!("{FONTS_DIR}/{name}"))?;
            write_atomic(&self.dir.join(name), data)?;
        }

        log::info!("Installed {} font files into {}", names.len(), self.dir.display());
        Ok(names.len())
    }

    /// Removes every installed font and returns how many files went away.
    pub fn clear(&self) -> Result<usize, ResourceError> {
        clear_dir(&self.dir)
    }
}
