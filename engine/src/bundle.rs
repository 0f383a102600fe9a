//! Read side of a theme package.
//!
//! The engine never touches a bundle's storage directly; it opens assets by
//! relative path through [`BundleAssetSource`]. [`DirectoryBundle`] serves an
//! unpacked bundle from a directory.

use crate::errors::AssetError;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Manifest asset every bundle carries at its root
pub const MANIFEST_ASSET: &str = "theme_data.xml";
/// Directory holding wallpaper and lock-screen images
pub const BACKGROUNDS_DIR: &str = "backgrounds";
/// Directory holding ringtone, alarm and notification sounds
pub const SOUNDS_DIR: &str = "sounds";
/// Directory holding one overlay package per target id
pub const OVERLAY_DIR: &str = "overlay";
/// Directory holding font files
pub const FONTS_DIR: &str = "fonts";
pub const BOOT_ANIMATION_ASSET: &str = "media/bootanimation.zip";
pub const BOOT_ANIMATION_DARK_ASSET: &str = "media/bootanimation-dark.zip";

pub fn background_asset(name: &str) -> String {
    format!("{BACKGROUNDS_DIR}/{name}")
}

pub fn sound_asset(name: &str) -> String {
    format!("{SOUNDS_DIR}/{name}")
}

pub fn overlay_asset(target_id: &str) -> String {
    format!("{OVERLAY_DIR}/{target_id}")
}

/// Bundle asset source: opens assets of one installed theme package.
pub trait BundleAssetSource: Send + Sync {
    /// Stable identity of the bundle
    fn package_id(&self) -> &str;

    /// Display label, used as the title when the manifest declares none
    fn label(&self) -> &str;

    /// System-provided bundles cannot be removed by the user
    fn is_system(&self) -> bool {
        false
    }

    fn open_asset(&self, path: &str) -> Result<Box<dyn Read + Send>, AssetError>;

    /// File names directly under `dir`, sorted. A missing directory yields an
    /// empty list.
    fn list_assets(&self, dir: &str) -> Result<Vec<String>, AssetError>;

    fn has_asset(&self, path: &str) -> bool {
        self.open_asset(path).is_ok()
    }

    fn read_asset(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let mut reader = self.open_asset(path)?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|source| AssetError::Io {
                path: path.to_string(),
                source,
            })?;
        Ok(bytes)
    }
}

impl<T: BundleAssetSource + ?Sized> BundleAssetSource for Arc<T> {
    fn package_id(&self) -> &str {
        (**self).package_id()
    }

    fn label(&self) -> &str {
        (**self).label()
    }

    fn is_system(&self) -> bool {
        (**self).is_system()
    }

    fn open_asset(&self, path: &str) -> Result<Box<dyn Read + Send>, AssetError> {
        (**self).open_asset(path)
    }

    fn list_assets(&self, dir: &str) -> Result<Vec<String>, AssetError> {
        (**self).list_assets(dir)
    }
}

/// Rejects absolute paths and any `..` component.
pub fn validate_asset_path(path: &str) -> Result<PathBuf, AssetError> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(AssetError::InvalidPath {
                    path: path.to_string(),
                });
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(AssetError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(clean)
}

/// A bundle unpacked into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
    package_id: String,
    label: String,
    system: bool,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>, package_id: impl Into<String>) -> Self {
        let package_id = package_id.into();
        Self {
            root: root.into(),
            label: package_id.clone(),
            package_id,
            system: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        Ok(self.root.join(validate_asset_path(path)?))
    }
}

impl BundleAssetSource for DirectoryBundle {
    fn package_id(&self) -> &str {
        &self.package_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_system(&self) -> bool {
        self.system
    }

    fn open_asset(&self, path: &str) -> Result<Box<dyn Read + Send>, AssetError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(AssetError::NotFound {
                path: path.to_string(),
            });
        }
        match File::open(&full) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(AssetError::NotFound {
                path: path.to_string(),
            }),
            Err(source) => Err(AssetError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }

    fn list_assets(&self, dir: &str) -> Result<Vec<String>, AssetError> {
        let full = self.resolve(dir)?;
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AssetError::Io {
                    path: dir.to_string(),
                    source,
                });
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AssetError::Io {
                path: dir.to_string(),
                source,
            })?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
