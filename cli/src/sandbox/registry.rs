use crate::error::{CliError, CliResult};
use engine::appliers::{OverlayInfo, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One installed overlay package as persisted in `overlays.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub package: String,
    pub target: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub has_code: bool,
    #[serde(default)]
    pub theme_overlay: bool,
}

impl From<&OverlayRecord> for OverlayInfo {
    fn from(record: &OverlayRecord) -> Self {
        OverlayInfo {
            package_id: record.package.clone(),
            target_id: record.target.clone(),
            enabled: record.enabled,
            has_code: record.has_code,
            theme_marker: record.theme_overlay,
        }
    }
}

/// Overlay registry of the sandbox device, written through on every change.
#[derive(Debug)]
pub struct OverlayRegistry {
    path: PathBuf,
    overlays: BTreeMap<String, OverlayRecord>,
}

impl OverlayRegistry {
    /// Loads the registry, starting empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> CliResult<Self> {
        let path = path.into();
        let overlays = match fs::read(&path) {
            Ok(bytes) => {
                let records: Vec<OverlayRecord> =
                    serde_json::from_slice(&bytes).map_err(|source| CliError::State {
                        path: path.clone(),
                        source,
                    })?;
                records
                    .into_iter()
                    .map(|record| (record.package.clone(), record))
                    .collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CliError::io(&path, e)),
        };
        Ok(Self { path, overlays })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> CliResult<()> {
        let records: Vec<&OverlayRecord> = self.overlays.values().collect();
        let json = serde_json::to_vec_pretty(&records).map_err(|source| CliError::State {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, json.as_slice())?;
        Ok(())
    }

    pub fn get(&self, package: &str) -> Option<&OverlayRecord> {
        self.overlays.get(package)
    }

    pub fn records(&self) -> impl Iterator<Item = &OverlayRecord> {
        self.overlays.values()
    }

    /// Inserts or replaces a package. A replaced package keeps its enabled
    /// state only if the new record asks for it.
    pub fn insert(&mut self, record: OverlayRecord) -> CliResult<()> {
        self.overlays.insert(record.package.clone(), record);
        self.save()
    }

    pub fn remove(&mut self, package: &str) -> CliResult<Option<OverlayRecord>> {
        let removed = self.overlays.remove(package);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Returns `Ok(false)` when the package is unknown.
    pub fn set_enabled(&mut self, package: &str, enabled: bool) -> CliResult<bool> {
        let Some(record) = self.overlays.get_mut(package) else {
            return Ok(false);
        };
        if record.enabled != enabled {
            record.enabled = enabled;
            self.save()?;
        }
        Ok(true)
    }
}
