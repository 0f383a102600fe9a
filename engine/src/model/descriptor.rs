//! Theme descriptor model.
//!
//! A [`ThemeDescriptor`] is produced once by the manifest parser through a
//! [`ThemeDescriptorBuilder`] and never changes afterwards. The pipeline only
//! ever receives fully built descriptors.

use serde::Serialize;

/// Pixel dimensions of the display a theme is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayDims {
    pub width: u32,
    pub height: u32,
}

impl DisplayDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Checks whether this display matches the given aspect ratio.
    ///
    /// Uses integer division on both axes: `width / ratio.width` must equal
    /// `height / ratio.height`.
    pub fn matches_ratio(&self, ratio: AspectRatio) -> bool {
        self.width / ratio.width == self.height / ratio.height
    }
}

/// Integer aspect ratio declared on a background candidate. Both sides are
/// always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Returns `None` when either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }
}

/// Which background slot an image is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Wallpaper,
    LockScreen,
}

/// The background image chosen for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundAsset {
    pub asset_name: String,
    /// Ratio the winning candidate declared, if any
    pub ratio: Option<AspectRatio>,
}

/// Logical sound slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    Ringtone,
    Alarm,
    Notification,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [SoundKind::Ringtone, SoundKind::Alarm, SoundKind::Notification];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::Ringtone => "ringtone",
            SoundKind::Alarm => "alarm",
            SoundKind::Notification => "notification",
        }
    }
}

impl std::fmt::Display for SoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sound asset and the name shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundAsset {
    pub asset_name: String,
    pub display_name: String,
}

impl SoundAsset {
    /// Creates a sound asset. Without an explicit display name the file name
    /// up to its first `.` is used.
    pub fn new(asset_name: impl Into<String>, display_name: Option<String>) -> Self {
        let asset_name = asset_name.into();
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| match asset_name.split_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => asset_name.clone(),
            });
        Self {
            asset_name,
            display_name,
        }
    }
}

/// Presentation grouping of an overlay target. Has no effect on apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCategory {
    Background,
    Sound,
    Other,
    #[default]
    Application,
}

impl TargetCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "background" | "backgrounds" => Some(TargetCategory::Background),
            "sound" | "sounds" => Some(TargetCategory::Sound),
            "other" | "others" => Some(TargetCategory::Other),
            "application" | "applications" | "app" => Some(TargetCategory::Application),
            _ => None,
        }
    }
}

/// One switchable unit of visual overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayTarget {
    /// Names the packaged overlay asset and the selection key
    pub target_id: String,
    /// Human-readable name used in progress events
    pub label: String,
    /// Non-switchable targets are mandatory
    pub switchable: bool,
    pub category: TargetCategory,
}

impl OverlayTarget {
    pub fn new(target_id: impl Into<String>) -> Self {
        let target_id = target_id.into();
        Self {
            label: target_id.clone(),
            target_id,
            switchable: true,
            category: TargetCategory::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn switchable(mut self, switchable: bool) -> Self {
        self.switchable = switchable;
        self
    }

    pub fn with_category(mut self, category: TargetCategory) -> Self {
        self.category = category;
        self
    }
}

/// Parsed representation of one theme bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeDescriptor {
    package_id: String,
    title: String,
    author: String,
    removable: bool,
    wallpaper: Option<BackgroundAsset>,
    lock_screen: Option<BackgroundAsset>,
    ringtone: Option<SoundAsset>,
    alarm: Option<SoundAsset>,
    notification: Option<SoundAsset>,
    has_boot_animation: bool,
    has_fonts: bool,
    overlay_targets: Vec<OverlayTarget>,
}

impl ThemeDescriptor {
    pub fn builder(package_id: impl Into<String>) -> ThemeDescriptorBuilder {
        ThemeDescriptorBuilder::new(package_id)
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn background(&self, kind: BackgroundKind) -> Option<&BackgroundAsset> {
        match kind {
            BackgroundKind::Wallpaper => self.wallpaper.as_ref(),
            BackgroundKind::LockScreen => self.lock_screen.as_ref(),
        }
    }

    pub fn wallpaper(&self) -> Option<&str> {
        self.wallpaper.as_ref().map(|asset| asset.asset_name.as_str())
    }

    pub fn lock_screen(&self) -> Option<&str> {
        self.lock_screen
            .as_ref()
            .map(|asset| asset.asset_name.as_str())
    }

    pub fn sound(&self, kind: SoundKind) -> Option<&SoundAsset> {
        match kind {
            SoundKind::Ringtone => self.ringtone.as_ref(),
            SoundKind::Alarm => self.alarm.as_ref(),
            SoundKind::Notification => self.notification.as_ref(),
        }
    }

    pub fn has_boot_animation(&self) -> bool {
        self.has_boot_animation
    }

    pub fn has_fonts(&self) -> bool {
        self.has_fonts
    }

    pub fn overlay_targets(&self) -> &[OverlayTarget] {
        &self.overlay_targets
    }
}

/// Accumulates descriptor fields while a manifest is being read.
#[derive(Debug, Clone)]
pub struct ThemeDescriptorBuilder {
    inner: ThemeDescriptor,
}

impl ThemeDescriptorBuilder {
    pub fn new(package_id: impl Into<String>) -> Self {
        let package_id = package_id.into();
        Self {
            inner: ThemeDescriptor {
                title: package_id.clone(),
                package_id,
                author: String::new(),
                removable: true,
                wallpaper: None,
                lock_screen: None,
                ringtone: None,
                alarm: None,
                notification: None,
                has_boot_animation: false,
                has_fonts: false,
                overlay_targets: Vec::new(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.inner.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.inner.author = author.into();
        self
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.inner.removable = removable;
        self
    }

    pub fn background(mut self, kind: BackgroundKind, asset: Option<BackgroundAsset>) -> Self {
        match kind {
            BackgroundKind::Wallpaper => self.inner.wallpaper = asset,
            BackgroundKind::LockScreen => self.inner.lock_screen = asset,
        }
        self
    }

    pub fn wallpaper(self, asset_name: impl Into<String>) -> Self {
        self.background(
            BackgroundKind::Wallpaper,
            Some(BackgroundAsset {
                asset_name: asset_name.into(),
                ratio: None,
            }),
        )
    }

    pub fn lock_screen(self, asset_name: impl Into<String>) -> Self {
        self.background(
            BackgroundKind::LockScreen,
            Some(BackgroundAsset {
                asset_name: asset_name.into(),
                ratio: None,
            }),
        )
    }

    pub fn sound(mut self, kind: SoundKind, sound: SoundAsset) -> Self {
        match kind {
            SoundKind::Ringtone => self.inner.ringtone = Some(sound),
            SoundKind::Alarm => self.inner.alarm = Some(sound),
            SoundKind::Notification => self.inner.notification = Some(sound),
        }
        self
    }

    pub fn boot_animation(mut self, present: bool) -> Self {
        self.inner.has_boot_animation = present;
        self
    }

    pub fn fonts(mut self, present: bool) -> Self {
        self.inner.has_fonts = present;
        self
    }

    pub fn overlay_target(mut self, target: OverlayTarget) -> Self {
        self.inner.overlay_targets.push(target);
        self
    }

    pub fn overlay_targets(mut self, targets: Vec<OverlayTarget>) -> Self {
        self.inner.overlay_targets = targets;
        self
    }

    pub fn build(self) -> ThemeDescriptor {
        self.inner
    }
}
