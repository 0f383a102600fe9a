use super::OverlayManager;
use crate::errors::OverlayError;
use crate::model::UserId;
use std::sync::Arc;
use std::time::Duration;

/// Forces an external cache refresh by toggling a marker overlay.
///
/// The marker is enabled, left on for the settle interval, then disabled.
/// The font cache is rebuilt on each overlay change.
#[derive(Clone)]
pub struct FontRefreshBarrier {
    overlays: Arc<dyn OverlayManager>,
    marker: String,
    settle: Duration,
    user: UserId,
}

impl FontRefreshBarrier {
    pub fn new(
        overlays: Arc<dyn OverlayManager>,
        marker: impl Into<String>,
        settle: Duration,
        user: UserId,
    ) -> Self {
        Self {
            overlays,
            marker: marker.into(),
            settle,
            user,
        }
    }

    /// Runs the barrier with the configured marker and settle interval.
    pub async fn refresh(&self) -> Result<(), OverlayError> {
        self.trigger_and_wait(&self.marker, self.settle).await
    }

    pub async fn trigger_and_wait(&self, marker: &str, settle: Duration) -> Result<(), OverlayError> {
        log::debug!("Triggering refresh barrier {} for {:?}", marker, settle);
        self.overlays.set_enabled(marker, true, self.user).await?;
        tokio::time::sleep(settle).await;
        self.overlays.set_enabled(marker, false, self.user).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FontRefreshBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRefreshBarrier")
            .field("marker", &self.marker)
            .field("settle", &self.settle)
            .field("user", &self.user)
            .finish()
    }
}
