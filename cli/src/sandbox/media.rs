use super::{LOCK_SCREEN_FILE, SOUNDS_DIR, SandboxDevice, WALLPAPER_FILE};
use crate::error::{CliError, CliResult};
use async_trait::async_trait;
use engine::appliers::{CropRect, SoundApplier, WallpaperApplier, write_atomic};
use engine::errors::ResourceError;
use engine::model::{ResourceKind, SoundAsset, SoundKind};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use tokio::task;

/// Sound currently set for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundRecord {
    pub kind: String,
    pub asset_name: String,
    pub display_name: String,
    pub path: PathBuf,
}

/// Current sounds, persisted in `sounds.json`.
#[derive(Debug)]
pub struct SoundLedger {
    path: PathBuf,
    records: BTreeMap<String, SoundRecord>,
}

impl SoundLedger {
    pub fn load(path: impl Into<PathBuf>) -> CliResult<Self> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CliError::State {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CliError::io(&path, e)),
        };
        Ok(Self { path, records })
    }

    pub fn records(&self) -> impl Iterator<Item = &SoundRecord> {
        self.records.values()
    }

    /// Stores `record` and returns the one it replaced.
    fn replace(&mut self, record: SoundRecord) -> Result<Option<SoundRecord>, ResourceError> {
        let previous = self.records.insert(record.kind.clone(), record);
        let json = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| ResourceError::io(&self.path, io::Error::other(e)))?;
        write_atomic(&self.path, json.as_slice())?;
        Ok(previous)
    }
}

impl SandboxDevice {
    async fn store_background(
        &self,
        resource: ResourceKind,
        file: &str,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        let path = self.root.join(file);
        let image = image.clone();
        let target = path.clone();

        task::spawn_blocking(move || {
            let image = match crop {
                Some(rect) => image.crop_imm(rect.x, rect.y, rect.width, rect.height),
                None => image,
            };
            let mut encoded = Cursor::new(Vec::new());
            image
                .write_to(&mut encoded, ImageFormat::Png)
                .map_err(|e| ResourceError::rejected(resource, e.to_string()))?;
            write_atomic(&target, encoded.get_ref().as_slice())
        })
        .await
        .map_err(|e| ResourceError::rejected(resource, e.to_string()))??;

        log::info!("Set {} to {}", resource, path.display());
        Ok(())
    }
}

#[async_trait]
impl WallpaperApplier for SandboxDevice {
    async fn set_wallpaper(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        self.store_background(ResourceKind::Wallpaper, WALLPAPER_FILE, image, crop)
            .await
    }

    async fn set_lock_screen(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        self.store_background(ResourceKind::LockScreen, LOCK_SCREEN_FILE, image, crop)
            .await
    }
}

#[async_trait]
impl SoundApplier for SandboxDevice {
    async fn set_sound(
        &self,
        kind: SoundKind,
        sound: &SoundAsset,
        data: Box<dyn Read + Send>,
    ) -> Result<(), ResourceError> {
        let resource = ResourceKind::from(kind);
        let Some(file_name) = Path::new(&sound.asset_name).file_name() else {
            return Err(ResourceError::rejected(
                resource,
                format!("'{}' is not a file name", sound.asset_name),
            ));
        };
        let path = self.root.join(SOUNDS_DIR).join(kind.as_str()).join(file_name);

        let target = path.clone();
        task::spawn_blocking(move || {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
            }
            write_atomic(&target, data)
        })
        .await
        .map_err(|e| ResourceError::rejected(resource, e.to_string()))??;

        let previous = self.sound_ledger().replace(SoundRecord {
            kind: kind.as_str().to_string(),
            asset_name: sound.asset_name.clone(),
            display_name: sound.display_name.clone(),
            path: path.clone(),
        })?;

        if let Some(previous) = previous {
            if previous.path != path {
                if let Err(e) = fs::remove_file(&previous.path) {
                    log::warn!(
                        "Failed to remove previous {} {}: {}",
                        kind,
                        previous.path.display(),
                        e
                    );
                }
            }
        }

        log::info!("Set {} to '{}'", kind, sound.display_name);
        Ok(())
    }
}
