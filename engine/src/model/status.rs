use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Stage of an apply run carried by an [`ApplyStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApplyState {
    Applying,
    InstallingOverlay,
    ApplyingWallpaper,
    ApplyingLockScreen,
    ApplyingRingtone,
    ApplyingAlarm,
    ApplyingNotification,
    ApplyingBootAnimation,
    ApplyingFonts,
    ApplyingOverlay {
        /// 1-based index among the selected targets
        progress: usize,
        max: usize,
        current_label: String,
    },
    Cleaning,
    Succeeded,
    Failed {
        reason: String,
    },
}

impl ApplyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplyState::Succeeded | ApplyState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApplyState::Applying => "applying",
            ApplyState::InstallingOverlay => "installing_overlay",
            ApplyState::ApplyingWallpaper => "applying_wallpaper",
            ApplyState::ApplyingLockScreen => "applying_lock_screen",
            ApplyState::ApplyingRingtone => "applying_ringtone",
            ApplyState::ApplyingAlarm => "applying_alarm",
            ApplyState::ApplyingNotification => "applying_notification",
            ApplyState::ApplyingBootAnimation => "applying_boot_animation",
            ApplyState::ApplyingFonts => "applying_fonts",
            ApplyState::ApplyingOverlay { .. } => "applying_overlay",
            ApplyState::Cleaning => "cleaning",
            ApplyState::Succeeded => "succeeded",
            ApplyState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyState::ApplyingOverlay {
                progress,
                max,
                current_label,
            } => write!(f, "applying overlay {progress}/{max}: {current_label}"),
            ApplyState::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(&other.name().replace('_', " ")),
        }
    }
}

/// One immutable status event.
///
/// `sequence` is assigned by the status channel when the event is published
/// and increases by one per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyStatus {
    pub package_id: String,
    pub title: String,
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: ApplyState,
}

impl ApplyStatus {
    pub fn new(package_id: impl Into<String>, title: impl Into<String>, state: ApplyState) -> Self {
        Self {
            package_id: package_id.into(),
            title: title.into(),
            sequence: 0,
            emitted_at: Utc::now(),
            state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.sequence, self.package_id, self.state)
    }
}
