//! Theme bundles unpacked into directories.
//!
//! A bundle directory holds `theme_data.xml` and its assets. An optional
//! `bundle.toml` overrides the package identity, which otherwise comes from
//! the directory name.

use crate::error::{CliError, CliResult};
use engine::bundle::{DirectoryBundle, MANIFEST_ASSET};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const BUNDLE_INFO_FILE: &str = "bundle.toml";

#[derive(Debug, Default, Deserialize)]
struct BundleInfo {
    package_id: Option<String>,
    label: Option<String>,
    #[serde(default)]
    system: bool,
}

pub fn load_bundle(dir: &Path) -> CliResult<DirectoryBundle> {
    if !dir.is_dir() {
        return Err(CliError::Bundle {
            path: dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let info_path = dir.join(BUNDLE_INFO_FILE);
    let info = match fs::read_to_string(&info_path) {
        Ok(text) => toml::from_str::<BundleInfo>(&text)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => BundleInfo::default(),
        Err(e) => return Err(CliError::io(&info_path, e)),
    };

    let package_id = match info.package_id {
        Some(package_id) => package_id,
        None => dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::Bundle {
                path: dir.to_path_buf(),
                reason: "cannot derive a package id from the path".to_string(),
            })?,
    };

    let mut bundle = DirectoryBundle::new(dir, package_id).with_system(info.system);
    if let Some(label) = info.label {
        bundle = bundle.with_label(label);
    }
    Ok(bundle)
}

/// Loads every subdirectory of `dir` that carries a manifest, sorted by
/// directory name. Directories that fail to load are logged and skipped.
pub fn discover_bundles(dir: &Path) -> CliResult<Vec<DirectoryBundle>> {
    let entries = fs::read_dir(dir).map_err(|e| CliError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CliError::io(dir, e))?;
        let path = entry.path();
        if path.join(MANIFEST_ASSET).is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|path| match load_bundle(&path) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect())
}
