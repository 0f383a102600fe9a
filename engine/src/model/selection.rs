use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::descriptor::{OverlayTarget, SoundKind};

/// Optional resource kinds a theme may offer, each with a stable selection
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wallpaper,
    LockScreen,
    Ringtone,
    Alarm,
    Notification,
    BootAnimation,
    Fonts,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Wallpaper,
        ResourceKind::LockScreen,
        ResourceKind::Ringtone,
        ResourceKind::Alarm,
        ResourceKind::Notification,
        ResourceKind::BootAnimation,
        ResourceKind::Fonts,
    ];

    /// Key used in a [`SelectionSet`].
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::Wallpaper => "theme.wallpaper",
            ResourceKind::LockScreen => "theme.lockscreen",
            ResourceKind::Ringtone => "theme.ringtone",
            ResourceKind::Alarm => "theme.alarm",
            ResourceKind::Notification => "theme.notification",
            ResourceKind::BootAnimation => "theme.bootanimation",
            ResourceKind::Fonts => "theme.fonts",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl From<SoundKind> for ResourceKind {
    fn from(kind: SoundKind) -> Self {
        match kind {
            SoundKind::Ringtone => ResourceKind::Ringtone,
            SoundKind::Alarm => ResourceKind::Alarm,
            SoundKind::Notification => ResourceKind::Notification,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Wallpaper => "wallpaper",
            ResourceKind::LockScreen => "lock screen",
            ResourceKind::Ringtone => "ringtone",
            ResourceKind::Alarm => "alarm sound",
            ResourceKind::Notification => "notification sound",
            ResourceKind::BootAnimation => "boot animation",
            ResourceKind::Fonts => "fonts",
        };
        f.write_str(name)
    }
}

/// Caller-provided choice of what to apply.
///
/// Keys are resource keys ([`ResourceKind::key`]) and overlay target ids.
/// Unlisted keys default to "apply".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    #[serde(default)]
    entries: HashMap<String, bool>,
    /// Uninstall stale theme overlays instead of only disabling them
    #[serde(default)]
    pub remove_stale_overlays: bool,
    /// Crop backgrounds to the display's aspect ratio around the center
    #[serde(default)]
    pub force_center_wallpaper: bool,
    /// Targets kept enabled by a standalone overlay removal
    #[serde(default)]
    keep_targets: HashSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, apply: bool) -> &mut Self {
        self.entries.insert(key.into(), apply);
        self
    }

    pub fn with(mut self, key: impl Into<String>, apply: bool) -> Self {
        self.set(key, apply);
        self
    }

    pub fn skip(self, key: impl Into<String>) -> Self {
        self.with(key, false)
    }

    pub fn with_remove_stale_overlays(mut self, remove: bool) -> Self {
        self.remove_stale_overlays = remove;
        self
    }

    pub fn with_force_center_wallpaper(mut self, center: bool) -> Self {
        self.force_center_wallpaper = center;
        self
    }

    pub fn keep_target(mut self, target_id: impl Into<String>) -> Self {
        self.keep_targets.insert(target_id.into());
        self
    }

    pub fn kept_targets(&self) -> &HashSet<String> {
        &self.keep_targets
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.entries.get(key).copied().unwrap_or(true)
    }

    pub fn resource_selected(&self, kind: ResourceKind) -> bool {
        self.is_selected(kind.key())
    }

    /// Mandatory targets are always selected.
    pub fn target_selected(&self, target: &OverlayTarget) -> bool {
        !target.switchable || self.is_selected(&target.target_id)
    }
}
