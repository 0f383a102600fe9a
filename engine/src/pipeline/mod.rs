//! The apply pipeline.
//!
//! [`ThemeManager`] owns the collaborators and a single-permit gate. At most
//! one apply or overlay removal runs at a time; a second request while the
//! gate is held fails fast with [`ApplyError::Busy`]. Each apply runs on its
//! own task and reports through the shared [`StatusChannel`].

mod gate;
mod run;
mod stale;

pub use run::{AppliedTheme, InstalledOverlay};
pub use stale::StaleSweep;

use crate::appliers::{
    BootAnimationApplier, FontApplier, FontRefreshBarrier, OverlayManager, SoundApplier,
    WallpaperApplier,
};
use crate::bundle::BundleAssetSource;
use crate::config::EngineConfig;
use crate::errors::{ApplyError, EngineResult};
use crate::installer::{InstallerAdapter, PackageInstaller};
use crate::model::{DisplayDims, SelectionSet, ThemeDescriptor};
use crate::status::{StatusChannel, StatusListener, StatusStream, SubscriptionHandle};
use gate::PipelineGate;
use run::ApplyRun;
use stale::{SweepPolicy, sweep_theme_overlays};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// OS facilities the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub installer: Arc<dyn PackageInstaller>,
    pub overlays: Arc<dyn OverlayManager>,
    pub wallpaper: Arc<dyn WallpaperApplier>,
    pub sounds: Arc<dyn SoundApplier>,
}

pub(crate) struct Inner {
    pub(crate) config: EngineConfig,
    pub(crate) display: DisplayDims,
    pub(crate) status: StatusChannel,
    pub(crate) installer: InstallerAdapter,
    pub(crate) overlays: Arc<dyn OverlayManager>,
    pub(crate) wallpaper: Arc<dyn WallpaperApplier>,
    pub(crate) sounds: Arc<dyn SoundApplier>,
    pub(crate) boot_animation: BootAnimationApplier,
    pub(crate) fonts: FontApplier,
    pub(crate) barrier: FontRefreshBarrier,
    gate: PipelineGate,
    shutdown: CancellationToken,
}

pub struct ThemeManager {
    inner: Arc<Inner>,
}

impl ThemeManager {
    pub fn new(config: EngineConfig, display: DisplayDims, collaborators: Collaborators) -> Self {
        let installer = InstallerAdapter::new(collaborators.installer, config.installer_timeout());
        let barrier = FontRefreshBarrier::new(
            collaborators.overlays.clone(),
            config.font_refresh_marker(),
            config.font_refresh_settle(),
            config.user_id(),
        );

        Self {
            inner: Arc::new(Inner {
                display,
                status: StatusChannel::new(),
                installer,
                overlays: collaborators.overlays,
                wallpaper: collaborators.wallpaper,
                sounds: collaborators.sounds,
                boot_animation: BootAnimationApplier::new(config.bootanimation_dir()),
                fonts: FontApplier::new(config.fonts_dir()),
                barrier,
                gate: PipelineGate::new(),
                shutdown: CancellationToken::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn display(&self) -> DisplayDims {
        self.inner.display
    }

    pub fn status_channel(&self) -> &StatusChannel {
        &self.inner.status
    }

    /// Registers a long-lived status listener.
    pub fn subscribe(&self, listener: Arc<dyn StatusListener>) -> SubscriptionHandle {
        self.inner.status.subscribe(listener)
    }

    pub fn is_busy(&self) -> bool {
        self.inner.gate.is_busy()
    }

    /// Starts applying a theme and returns immediately.
    ///
    /// Fails with [`ApplyError::Busy`] if another operation holds the
    /// pipeline. The returned handle streams the events of this run only.
    pub fn apply_theme(
        &self,
        bundle: Arc<dyn BundleAssetSource>,
        descriptor: ThemeDescriptor,
        selection: SelectionSet,
    ) -> Result<ApplyHandle, ApplyError> {
        let permit = self.inner.gate.try_acquire()?;

        if bundle.package_id() != descriptor.package_id() {
            log::warn!(
                "Descriptor {} applied from bundle {}",
                descriptor.package_id(),
                bundle.package_id()
            );
        }

        let stream = StatusStream::subscribe_from(&self.inner.status, self.inner.status.next_sequence());
        let cancel = self.inner.shutdown.child_token();
        let run = ApplyRun::new(
            self.inner.clone(),
            bundle,
            descriptor,
            selection,
            cancel.clone(),
        );

        let join = tokio::spawn(async move {
            let _permit = permit;
            run.execute().await
        });

        Ok(ApplyHandle {
            stream,
            cancel,
            join,
        })
    }

    /// Disables theme overlays outside the selection's kept targets, and
    /// uninstalls them when the selection asks for stale overlay removal.
    pub async fn remove_overlays(&self, selection: &SelectionSet) -> EngineResult<StaleSweep> {
        let _permit = self.inner.gate.try_acquire()?;
        let keep_packages = HashSet::new();

        let sweep = sweep_theme_overlays(
            self.inner.overlays.as_ref(),
            &self.inner.installer,
            self.inner.config.user_id(),
            SweepPolicy {
                keep_targets: selection.kept_targets(),
                keep_packages: &keep_packages,
                uninstall: selection.remove_stale_overlays,
                strict: true,
            },
        )
        .await?;

        log::info!(
            "Overlay removal disabled {} and uninstalled {} packages",
            sweep.disabled.len(),
            sweep.uninstalled.len()
        );
        Ok(sweep)
    }

    /// Cancels every run in flight. Runs stop at their next checkpoint.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

impl Drop for ThemeManager {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeManager")
            .field("display", &self.inner.display)
            .field("busy", &self.is_busy())
            .field("installer", &self.inner.installer)
            .finish()
    }
}

/// Caller side of a running apply.
#[derive(Debug)]
pub struct ApplyHandle {
    stream: StatusStream,
    cancel: CancellationToken,
    join: JoinHandle<EngineResult<AppliedTheme>>,
}

impl ApplyHandle {
    /// Events of this run, ending with exactly one terminal event.
    pub fn status(&mut self) -> &mut StatusStream {
        &mut self.stream
    }

    /// Asks the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> EngineResult<AppliedTheme> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(ApplyError::Aborted(e.to_string())),
        }
    }
}
