use super::{OverlayRecord, SandboxDevice};
use crate::error::{CliError, CliResult};
use engine::errors::{InstallerError, STATUS_FAILURE, STATUS_SUCCESS};
use engine::installer::{CompletionSink, InstallCompletion, OperationToken, PackageInstaller};
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;
use std::thread;

/// Overlay package format understood by the sandbox installer. A bundle's
/// `overlay/<target>` asset is a small TOML document:
///
/// ```toml
/// package = "org.example.ocean.overlay.android"
/// target = "android"
/// theme_overlay = true
/// ```
///
/// `fail_code` makes the install report that status instead of succeeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPackage {
    pub package: String,
    pub target: String,
    #[serde(default)]
    pub theme_overlay: bool,
    #[serde(default)]
    pub has_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_code: Option<i32>,
}

impl OverlayPackage {
    pub fn parse(payload: &[u8]) -> CliResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|e| CliError::Bundle {
            path: "overlay package".into(),
            reason: e.to_string(),
        })?;
        Ok(toml::from_str(text)?)
    }
}

impl PackageInstaller for SandboxDevice {
    fn submit_install(
        &self,
        token: &OperationToken,
        payload: Vec<u8>,
        sink: CompletionSink,
    ) -> Result<(), InstallerError> {
        let package = OverlayPackage::parse(&payload).map_err(|e| InstallerError::Rejected {
            reason: e.to_string(),
        })?;
        log::debug!("Installing {} for {} ({})", package.package, package.target, token);

        let registry = self.registry.clone();
        let token = token.clone();
        spawn_completion(move || {
            if let Some(code) = package.fail_code {
                return InstallCompletion::new(token, Some(package.package), code);
            }

            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            let enabled = registry.get(&package.package).is_some_and(|r| r.enabled);
            let record = OverlayRecord {
                package: package.package.clone(),
                target: package.target,
                enabled,
                has_code: package.has_code,
                theme_overlay: package.theme_overlay,
            };
            let status = match registry.insert(record) {
                Ok(()) => STATUS_SUCCESS,
                Err(e) => {
                    log::error!("Failed to record {}: {}", package.package, e);
                    STATUS_FAILURE
                }
            };
            InstallCompletion::new(token, Some(package.package), status)
        }, sink)
    }

    fn submit_uninstall(
        &self,
        token: &OperationToken,
        package_id: &str,
        sink: CompletionSink,
    ) -> Result<(), InstallerError> {
        log::debug!("Uninstalling {} ({})", package_id, token);

        let registry = self.registry.clone();
        let token = token.clone();
        let package_id = package_id.to_string();
        spawn_completion(move || {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            let status = match registry.remove(&package_id) {
                Ok(Some(_)) => STATUS_SUCCESS,
                Ok(None) => {
                    log::warn!("Uninstall of unknown package {}", package_id);
                    STATUS_FAILURE
                }
                Err(e) => {
                    log::error!("Failed to remove {}: {}", package_id, e);
                    STATUS_FAILURE
                }
            };
            InstallCompletion::new(token, Some(package_id), status)
        }, sink)
    }
}

/// Runs `work` on its own thread and reports its result through `sink`,
/// the way a real installer calls back from a binder thread.
fn spawn_completion<F>(work: F, sink: CompletionSink) -> Result<(), InstallerError>
where
    F: FnOnce() -> InstallCompletion + Send + 'static,
{
    thread::Builder::new()
        .name("sandbox-installer".to_string())
        .spawn(move || {
            sink.complete(work());
        })
        .map(|_| ())
        .map_err(|e| InstallerError::Rejected {
            reason: format!("failed to start installer thread: {e}"),
        })
}
