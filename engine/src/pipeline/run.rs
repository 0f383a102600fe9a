//! One apply run, from `Applying` to its terminal event.

use super::Inner;
use super::stale::{StaleSweep, SweepPolicy, roll_back_installs, sweep_theme_overlays};
use crate::appliers::{center_crop, decode_background};
use crate::bundle::{BundleAssetSource, background_asset, overlay_asset, sound_asset};
use crate::errors::{ApplyError, EngineResult};
use crate::model::{
    ApplyState, ApplyStatus, BackgroundKind, OverlayTarget, ResourceKind, SelectionSet,
    SoundKind, ThemeDescriptor,
};
use crate::status::StatusChannel;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Overlay package installed for one target during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledOverlay {
    pub target_id: String,
    pub package_id: String,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppliedTheme {
    pub package_id: String,
    /// Resource kinds swapped in, in apply order
    pub resources: Vec<ResourceKind>,
    pub overlays: Vec<InstalledOverlay>,
    /// Font files removed because the theme brought none
    pub fonts_cleared: usize,
    pub boot_animation_cleared: bool,
    pub stale_overlays: StaleSweep,
}

/// Publishes the run's events and guarantees exactly one terminal event.
///
/// If the run is dropped before finishing (the worker panicked or was
/// aborted), a `Failed` event is published from `Drop`.
struct RunReporter {
    channel: StatusChannel,
    package_id: String,
    title: String,
    finished: bool,
}

impl RunReporter {
    fn new(channel: StatusChannel, descriptor: &ThemeDescriptor) -> Self {
        Self {
            channel,
            package_id: descriptor.package_id().to_string(),
            title: descriptor.title().to_string(),
            finished: false,
        }
    }

    fn emit(&self, state: ApplyState) {
        log::debug!("{}: {}", self.package_id, state);
        self.channel
            .publish(ApplyStatus::new(&self.package_id, &self.title, state));
    }

    fn finish(&mut self, state: ApplyState) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.emit(state);
    }
}

impl Drop for RunReporter {
    fn drop(&mut self) {
        if !self.finished {
            log::error!("Apply of {} stopped without a result", self.package_id);
            self.finish(ApplyState::Failed {
                reason: "apply worker stopped unexpectedly".to_string(),
            });
        }
    }
}

pub(crate) struct ApplyRun {
    inner: Arc<Inner>,
    bundle: Arc<dyn BundleAssetSource>,
    descriptor: ThemeDescriptor,
    selection: SelectionSet,
    cancel: CancellationToken,
    reporter: RunReporter,
    result: AppliedTheme,
    /// Set once step 1 may have touched device state
    mutating: bool,
    fonts_started: bool,
}

impl ApplyRun {
    pub(crate) fn new(
        inner: Arc<Inner>,
        bundle: Arc<dyn BundleAssetSource>,
        descriptor: ThemeDescriptor,
        selection: SelectionSet,
        cancel: CancellationToken,
    ) -> Self {
        let reporter = RunReporter::new(inner.status.clone(), &descriptor);
        let result = AppliedTheme {
            package_id: descriptor.package_id().to_string(),
            ..Default::default()
        };
        Self {
            inner,
            bundle,
            descriptor,
            selection,
            cancel,
            reporter,
            result,
            mutating: false,
            fonts_started: false,
        }
    }

    pub(crate) async fn execute(mut self) -> EngineResult<AppliedTheme> {
        log::info!("Applying theme {}", self.descriptor.package_id());
        self.reporter.emit(ApplyState::Applying);

        match self.run_steps().await {
            Ok(()) => {
                log::info!("Theme {} applied", self.descriptor.package_id());
                self.reporter.finish(ApplyState::Succeeded);
                Ok(std::mem::take(&mut self.result))
            }
            Err(e) if !self.mutating => {
                log::info!(
                    "Apply of {} stopped before changing anything: {}",
                    self.descriptor.package_id(),
                    e
                );
                self.reporter.finish(ApplyState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
            Err(e) => {
                log::error!("Applying theme {} failed: {}", self.descriptor.package_id(), e);
                self.reporter.emit(ApplyState::Cleaning);
                self.clean_up_failure().await;
                self.reporter.finish(ApplyState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn checkpoint(&self) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            log::info!("Apply of {} cancelled", self.descriptor.package_id());
            return Err(ApplyError::Cancelled);
        }
        Ok(())
    }

    async fn run_steps(&mut self) -> EngineResult<()> {
        self.checkpoint()?;
        self.mutating = true;
        self.remove_stale_overlays().await?;

        for kind in [BackgroundKind::Wallpaper, BackgroundKind::LockScreen] {
            self.checkpoint()?;
            self.apply_background(kind).await?;
        }

        for kind in SoundKind::ALL {
            self.checkpoint()?;
            self.apply_sound(kind).await?;
        }

        self.checkpoint()?;
        self.apply_boot_animation().await?;

        self.checkpoint()?;
        self.apply_fonts().await?;

        self.install_overlays().await?;

        self.clean_up_success().await;
        Ok(())
    }

    fn selected_targets(&self) -> Vec<OverlayTarget> {
        self.descriptor
            .overlay_targets()
            .iter()
            .filter(|target| self.selection.target_selected(target))
            .cloned()
            .collect()
    }

    async fn remove_stale_overlays(&mut self) -> EngineResult<()> {
        log::info!(
            "Removing stale overlays before applying {}",
            self.descriptor.package_id()
        );
        let keep_targets: HashSet<String> = self
            .selected_targets()
            .into_iter()
            .map(|target| target.target_id)
            .collect();
        let keep_packages = HashSet::new();

        let sweep = sweep_theme_overlays(
            self.inner.overlays.as_ref(),
            &self.inner.installer,
            self.inner.config.user_id(),
            SweepPolicy {
                keep_targets: &keep_targets,
                keep_packages: &keep_packages,
                uninstall: self.selection.remove_stale_overlays,
                strict: true,
            },
        )
        .await?;
        self.result.stale_overlays.merge(sweep);
        Ok(())
    }

    async fn apply_background(&mut self, kind: BackgroundKind) -> EngineResult<()> {
        let (resource, state) = match kind {
            BackgroundKind::Wallpaper => (ResourceKind::Wallpaper, ApplyState::ApplyingWallpaper),
            BackgroundKind::LockScreen => {
                (ResourceKind::LockScreen, ApplyState::ApplyingLockScreen)
            }
        };
        let Some(asset) = self.descriptor.background(kind).cloned() else {
            return Ok(());
        };
        if !self.selection.resource_selected(resource) {
            return Ok(());
        }

        log::info!("Applying {} {} from {}", resource, asset.asset_name, self.descriptor.package_id());
        self.reporter.emit(state);

        let bundle = self.bundle.clone();
        let name = asset.asset_name.clone();
        let image = run_blocking(move || {
            let bytes = bundle.read_asset(&background_asset(&name))?;
            Ok(decode_background(&name, &bytes)?)
        })
        .await?;

        let crop = if self.selection.force_center_wallpaper {
            center_crop(image.width(), image.height(), self.inner.display)
        } else {
            None
        };
        self.inner
            .wallpaper
            .set_background(kind, &image, crop)
            .await?;
        self.result.resources.push(resource);
        Ok(())
    }

    async fn apply_sound(&mut self, kind: SoundKind) -> EngineResult<()> {
        let resource = ResourceKind::from(kind);
        let Some(sound) = self.descriptor.sound(kind).cloned() else {
            return Ok(());
        };
        if !self.selection.resource_selected(resource) {
            return Ok(());
        }

        log::info!("Applying {} {} from {}", resource, sound.asset_name, self.descriptor.package_id());
        self.reporter.emit(match kind {
            SoundKind::Ringtone => ApplyState::ApplyingRingtone,
            SoundKind::Alarm => ApplyState::ApplyingAlarm,
            SoundKind::Notification => ApplyState::ApplyingNotification,
        });

        let bundle = self.bundle.clone();
        let path = sound_asset(&sound.asset_name);
        let data = run_blocking(move || Ok(bundle.open_asset(&path)?)).await?;
        self.inner.sounds.set_sound(kind, &sound, data).await?;
        self.result.resources.push(resource);
        Ok(())
    }

    async fn apply_boot_animation(&mut self) -> EngineResult<()> {
        if !self.descriptor.has_boot_animation()
            || !self.selection.resource_selected(ResourceKind::BootAnimation)
        {
            return Ok(());
        }

        log::info!("Applying boot animation from {}", self.descriptor.package_id());
        self.reporter.emit(ApplyState::ApplyingBootAnimation);

        let applier = self.inner.boot_animation.clone();
        let bundle = self.bundle.clone();
        run_blocking(move || applier.apply(bundle.as_ref())).await?;
        self.result.resources.push(ResourceKind::BootAnimation);
        Ok(())
    }

    async fn apply_fonts(&mut self) -> EngineResult<()> {
        if !self.descriptor.has_fonts() || !self.selection.resource_selected(ResourceKind::Fonts) {
            return Ok(());
        }

        log::info!("Applying fonts from {}", self.descriptor.package_id());
        self.reporter.emit(ApplyState::ApplyingFonts);
        self.fonts_started = true;

        let applier = self.inner.fonts.clone();
        let bundle = self.bundle.clone();
        run_blocking(move || applier.apply(bundle.as_ref())).await?;
        self.inner.barrier.refresh().await?;
        self.result.resources.push(ResourceKind::Fonts);
        Ok(())
    }

    async fn install_overlays(&mut self) -> EngineResult<()> {
        let targets = self.selected_targets();
        if targets.is_empty() {
            return Ok(());
        }

        log::info!(
            "Installing {} overlays from {}",
            targets.len(),
            self.descriptor.package_id()
        );
        self.reporter.emit(ApplyState::InstallingOverlay);

        let max = targets.len();
        let user = self.inner.config.user_id();
        for (index, target) in targets.into_iter().enumerate() {
            self.checkpoint()?;
            self.reporter.emit(ApplyState::ApplyingOverlay {
                progress: index + 1,
                max,
                current_label: target.label.clone(),
            });

            let payload = self
                .bundle
                .read_asset(&overlay_asset(&target.target_id))?;
            let package_id = self
                .inner
                .installer
                .install(payload)
                .await
                .map_err(|e| ApplyError::installer(&target.target_id, e))?;

            self.result.overlays.push(InstalledOverlay {
                target_id: target.target_id.clone(),
                package_id: package_id.clone(),
            });

            if !self.inner.overlays.is_theme_overlay(&package_id).await {
                log::error!(
                    target: "thememgr::security",
                    "Package {} installed for {} from {} is not a verified theme overlay",
                    package_id,
                    target.target_id,
                    self.descriptor.package_id()
                );
                return Err(ApplyError::UnverifiedOverlay {
                    target_id: target.target_id,
                    package_id,
                });
            }

            self.inner
                .overlays
                .set_enabled(&package_id, true, user)
                .await?;
            log::info!("Enabled overlay {} for {}", package_id, target.target_id);
        }
        Ok(())
    }

    /// Resets fonts and boot animation the theme did not bring and sweeps
    /// theme overlays that this run did not install. Failures are logged.
    async fn clean_up_success(&mut self) {
        self.reporter.emit(ApplyState::Cleaning);

        if !self.result.resources.contains(&ResourceKind::BootAnimation) {
            let applier = self.inner.boot_animation.clone();
            match run_blocking(move || Ok(applier.clear()?)).await {
                Ok(cleared) => self.result.boot_animation_cleared = cleared,
                Err(e) => log::warn!("Could not remove previous boot animation: {}", e),
            }
        }

        if !self.result.resources.contains(&ResourceKind::Fonts) {
            let applier = self.inner.fonts.clone();
            match run_blocking(move || Ok(applier.clear()?)).await {
                Ok(0) => {}
                Ok(removed) => {
                    log::info!("Removed {} previous font files", removed);
                    self.result.fonts_cleared = removed;
                    if let Err(e) = self.inner.barrier.refresh().await {
                        log::warn!("Font refresh after cleanup failed: {}", e);
                    }
                }
                Err(e) => log::warn!("Could not remove previous fonts: {}", e),
            }
        }

        let keep_targets = HashSet::new();
        let keep_packages: HashSet<String> = self
            .result
            .overlays
            .iter()
            .map(|overlay| overlay.package_id.clone())
            .collect();
        let sweep = sweep_theme_overlays(
            self.inner.overlays.as_ref(),
            &self.inner.installer,
            self.inner.config.user_id(),
            SweepPolicy {
                keep_targets: &keep_targets,
                keep_packages: &keep_packages,
                uninstall: self.selection.remove_stale_overlays,
                strict: false,
            },
        )
        .await;
        match sweep {
            Ok(sweep) => self.result.stale_overlays.merge(sweep),
            Err(e) => log::warn!("Stale overlay sweep failed: {}", e),
        }
    }

    async fn reset_fonts(&self) {
        let applier = self.inner.fonts.clone();
        match run_blocking(move || Ok(applier.clear()?)).await {
            Ok(removed) => log::info!("Removed {} partially applied font files", removed),
            Err(e) => log::warn!("Could not reset fonts after failure: {}", e),
        }
        if let Err(e) = self.inner.barrier.refresh().await {
            log::warn!("Font refresh after failure did not complete: {}", e);
        }
    }

    /// Rolls back this run's installs and leaves no theme overlay enabled.
    /// A font step that did not finish is reset to the system fonts.
    async fn clean_up_failure(&mut self) {
        let user = self.inner.config.user_id();
        if self.fonts_started && !self.result.resources.contains(&ResourceKind::Fonts) {
            self.reset_fonts().await;
        }
        let installed: Vec<String> = self
            .result
            .overlays
            .iter()
            .map(|overlay| overlay.package_id.clone())
            .collect();
        if !installed.is_empty() {
            log::info!("Rolling back {} overlays installed by this run", installed.len());
            roll_back_installs(
                self.inner.overlays.as_ref(),
                &self.inner.installer,
                user,
                &installed,
            )
            .await;
        }

        let nothing = HashSet::new();
        if let Err(e) = sweep_theme_overlays(
            self.inner.overlays.as_ref(),
            &self.inner.installer,
            user,
            SweepPolicy {
                keep_targets: &nothing,
                keep_packages: &nothing,
                uninstall: self.selection.remove_stale_overlays,
                strict: false,
            },
        )
        .await
        {
            log::warn!("Overlay sweep after failure did not complete: {}", e);
        }
    }
}

async fn run_blocking<T, F>(work: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApplyError::Aborted(e.to_string()))?
}
