//! Removal of theme overlays that are no longer wanted.

use crate::appliers::OverlayManager;
use crate::errors::ApplyError;
use crate::installer::InstallerAdapter;
use crate::model::UserId;
use serde::Serialize;
use std::collections::HashSet;

/// Which theme overlays survive a sweep and what happens to the rest.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SweepPolicy<'a> {
    /// Overlays for these targets are left alone
    pub keep_targets: &'a HashSet<String>,
    /// These packages are left alone
    pub keep_packages: &'a HashSet<String>,
    /// Uninstall swept packages after disabling them
    pub uninstall: bool,
    /// Stop at the first fatal error instead of logging and continuing
    pub strict: bool,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleSweep {
    pub disabled: Vec<String>,
    pub uninstalled: Vec<String>,
    /// Failures that were logged instead of failing the sweep
    pub errors: Vec<String>,
}

impl StaleSweep {
    pub fn is_empty(&self) -> bool {
        self.disabled.is_empty() && self.uninstalled.is_empty()
    }

    pub(crate) fn merge(&mut self, other: StaleSweep) {
        self.disabled.extend(other.disabled);
        self.uninstalled.extend(other.uninstalled);
        self.errors.extend(other.errors);
    }
}

/// Disables, and optionally uninstalls, every theme-managed overlay the
/// policy does not keep.
///
/// Packages are handled one at a time. Without uninstall, a refused disable
/// is logged and skipped. With uninstall, refused disables and failed
/// uninstalls are fatal under a strict policy.
pub(crate) async fn sweep_theme_overlays(
    overlays: &dyn OverlayManager,
    installer: &InstallerAdapter,
    user: UserId,
    policy: SweepPolicy<'_>,
) -> Result<StaleSweep, ApplyError> {
    let mut sweep = StaleSweep::default();

    let candidates: Vec<_> = overlays
        .installed_overlays()
        .await
        .into_iter()
        .filter(|info| info.is_theme_managed())
        .filter(|info| !policy.keep_targets.contains(&info.target_id))
        .filter(|info| !policy.keep_packages.contains(&info.package_id))
        .filter(|info| info.enabled || policy.uninstall)
        .collect();

    for info in candidates {
        if info.enabled {
            match overlays.set_enabled(&info.package_id, false, user).await {
                Ok(()) => {
                    log::info!("Disabled stale theme overlay {}", info.package_id);
                    sweep.disabled.push(info.package_id.clone());
                }
                Err(e) => {
                    if policy.uninstall && policy.strict {
                        return Err(e.into());
                    }
                    log::warn!("Could not disable stale overlay {}: {}", info.package_id, e);
                    sweep.errors.push(e.to_string());
                }
            }
        }

        if policy.uninstall {
            match installer.uninstall(&info.package_id).await {
                Ok(()) => sweep.uninstalled.push(info.package_id.clone()),
                Err(e) => {
                    let err = ApplyError::installer(&info.package_id, e);
                    if policy.strict {
                        return Err(err);
                    }
                    log::warn!("Could not uninstall stale overlay: {}", err);
                    sweep.errors.push(err.to_string());
                }
            }
        }
    }

    Ok(sweep)
}

/// Disables and uninstalls packages installed by a failed run, newest first.
/// Every failure is logged and the remaining packages are still handled.
pub(crate) async fn roll_back_installs(
    overlays: &dyn OverlayManager,
    installer: &InstallerAdapter,
    user: UserId,
    packages: &[String],
) -> StaleSweep {
    let mut sweep = StaleSweep::default();

    for package_id in packages.iter().rev() {
        match overlays.set_enabled(package_id, false, user).await {
            Ok(()) => sweep.disabled.push(package_id.clone()),
            Err(e) => {
                log::warn!("Rollback could not disable {}: {}", package_id, e);
                sweep.errors.push(e.to_string());
            }
        }
        match installer.uninstall(package_id).await {
            Ok(()) => sweep.uninstalled.push(package_id.clone()),
            Err(e) => {
                let err = ApplyError::installer(package_id, e);
                log::warn!("Rollback could not uninstall: {}", err);
                sweep.errors.push(err.to_string());
            }
        }
    }

    sweep
}
