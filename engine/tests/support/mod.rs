//! Shared fakes for engine integration tests.
//!
//! `FakeDevice` plays the package installer, the overlay manager and the
//! wallpaper and sound appliers at once, so a test can inspect the device
//! state after a run. `BundleBuilder` writes a theme bundle into a temp dir.

#![allow(dead_code)]

use async_trait::async_trait;
use engine::appliers::{CropRect, OverlayInfo, OverlayManager, SoundApplier, WallpaperApplier};
use engine::bundle::DirectoryBundle;
use engine::errors::{InstallerError, OverlayError, ResourceError, STATUS_SUCCESS};
use engine::installer::{CompletionSink, InstallCompletion, OperationToken, PackageInstaller};
use engine::model::{ApplyStatus, ResourceKind, SoundAsset, SoundKind, UserId};
use engine::pipeline::Collaborators;
use engine::{DisplayDims, EngineConfig, ThemeManager};
use image::DynamicImage;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MARKER: &str = "org.thememgr.overlay.fakefonts";
pub const PORTRAIT: DisplayDims = DisplayDims {
    width: 1000,
    height: 2000,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundCall {
    pub lock_screen: bool,
    pub width: u32,
    pub height: u32,
    pub crop: Option<CropRect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundCall {
    pub kind: SoundKind,
    pub asset_name: String,
    pub data: Vec<u8>,
}

/// In-memory device with fault injection.
#[derive(Default)]
pub struct FakeDevice {
    overlays: Mutex<BTreeMap<String, OverlayInfo>>,
    toggles: Mutex<Vec<(String, bool)>>,
    refuse_toggle: Mutex<HashSet<String>>,
    fail_codes: Mutex<HashMap<String, i32>>,
    unmarked: Mutex<HashSet<String>>,
    installs: Mutex<Vec<String>>,
    uninstalls: Mutex<Vec<String>>,
    silent: AtomicBool,
    held: Mutex<HashMap<String, flume::Receiver<()>>>,
    backgrounds: Mutex<Vec<BackgroundCall>>,
    sounds: Mutex<Vec<SoundCall>>,
    reject_wallpaper: AtomicBool,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        let device = Self::default();
        device.register(OverlayInfo {
            package_id: MARKER.to_string(),
            target_id: "android".to_string(),
            enabled: false,
            has_code: false,
            theme_marker: false,
        });
        Arc::new(device)
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            installer: self.clone(),
            overlays: self.clone(),
            wallpaper: self.clone(),
            sounds: self.clone(),
        }
    }

    pub fn register(&self, info: OverlayInfo) {
        self.overlays
            .lock()
            .unwrap()
            .insert(info.package_id.clone(), info);
    }

    /// Pre-installs a theme overlay as if a previous theme had left it.
    pub fn preinstall_theme_overlay(&self, package_id: &str, target_id: &str, enabled: bool) {
        self.register(OverlayInfo {
            package_id: package_id.to_string(),
            target_id: target_id.to_string(),
            enabled,
            has_code: false,
            theme_marker: true,
        });
    }

    /// Installs of `package_id` complete with `code`.
    pub fn fail_install(&self, package_id: &str, code: i32) {
        self.fail_codes
            .lock()
            .unwrap()
            .insert(package_id.to_string(), code);
    }

    /// Installs of `package_id` succeed without the theme marker.
    pub fn install_unmarked(&self, package_id: &str) {
        self.unmarked.lock().unwrap().insert(package_id.to_string());
    }

    pub fn refuse_toggle(&self, package_id: &str) {
        self.refuse_toggle
            .lock()
            .unwrap()
            .insert(package_id.to_string());
    }

    /// Submissions are accepted but never completed.
    pub fn go_silent(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    /// The install of `package_id` completes only once the returned sender
    /// fires or is dropped.
    pub fn hold_install(&self, package_id: &str) -> flume::Sender<()> {
        let (release, held) = flume::bounded(1);
        self.held
            .lock()
            .unwrap()
            .insert(package_id.to_string(), held);
        release
    }

    pub fn reject_wallpaper(&self) {
        self.reject_wallpaper.store(true, Ordering::SeqCst);
    }

    pub fn overlay(&self, package_id: &str) -> Option<OverlayInfo> {
        self.overlays.lock().unwrap().get(package_id).cloned()
    }

    pub fn is_installed(&self, package_id: &str) -> bool {
        self.overlay(package_id).is_some()
    }

    pub fn enabled_theme_overlays(&self) -> Vec<String> {
        self.overlays
            .lock()
            .unwrap()
            .values()
            .filter(|info| info.enabled && info.is_theme_managed())
            .map(|info| info.package_id.clone())
            .collect()
    }

    pub fn toggles(&self) -> Vec<(String, bool)> {
        self.toggles.lock().unwrap().clone()
    }

    pub fn marker_toggles(&self) -> Vec<bool> {
        self.toggles()
            .into_iter()
            .filter(|(package, _)| package == MARKER)
            .map(|(_, enabled)| enabled)
            .collect()
    }

    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }

    pub fn uninstalls(&self) -> Vec<String> {
        self.uninstalls.lock().unwrap().clone()
    }

    pub fn backgrounds(&self) -> Vec<BackgroundCall> {
        self.backgrounds.lock().unwrap().clone()
    }

    pub fn sounds(&self) -> Vec<SoundCall> {
        self.sounds.lock().unwrap().clone()
    }
}

/// Overlay payloads are `<package id>\n<target id>`.
pub fn overlay_payload(package_id: &str, target_id: &str) -> String {
    format!("{package_id}\n{target_id}")
}

impl PackageInstaller for FakeDevice {
    fn submit_install(
        &self,
        token: &OperationToken,
        payload: Vec<u8>,
        sink: CompletionSink,
    ) -> Result<(), InstallerError> {
        let text = String::from_utf8(payload).map_err(|e| InstallerError::Rejected {
            reason: e.to_string(),
        })?;
        let (package_id, target_id) = text.split_once('\n').ok_or(InstallerError::Rejected {
            reason: "payload is not an overlay package".to_string(),
        })?;
        let (package_id, target_id) = (package_id.trim().to_string(), target_id.trim().to_string());

        if self.silent.load(Ordering::SeqCst) {
            return Ok(());
        }

        let code = self
            .fail_codes
            .lock()
            .unwrap()
            .get(&package_id)
            .copied()
            .unwrap_or(STATUS_SUCCESS);
        if code == STATUS_SUCCESS {
            let marked = !self.unmarked.lock().unwrap().contains(&package_id);
            self.installs.lock().unwrap().push(package_id.clone());
            self.register(OverlayInfo {
                package_id: package_id.clone(),
                target_id,
                enabled: false,
                has_code: false,
                theme_marker: marked,
            });
        }

        let held = self.held.lock().unwrap().remove(&package_id);
        let token = token.clone();
        std::thread::spawn(move || {
            if let Some(held) = held {
                let _ = held.recv();
            }
            sink.complete(InstallCompletion::new(token, Some(package_id), code));
        });
        Ok(())
    }

    fn submit_uninstall(
        &self,
        token: &OperationToken,
        package_id: &str,
        sink: CompletionSink,
    ) -> Result<(), InstallerError> {
        if self.silent.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.overlays.lock().unwrap().remove(package_id);
        self.uninstalls.lock().unwrap().push(package_id.to_string());

        let token = token.clone();
        let package_id = package_id.to_string();
        std::thread::spawn(move || {
            sink.complete(InstallCompletion::new(token, Some(package_id), STATUS_SUCCESS));
        });
        Ok(())
    }
}

#[async_trait]
impl OverlayManager for FakeDevice {
    async fn set_enabled(
        &self,
        package_id: &str,
        enabled: bool,
        _user: UserId,
    ) -> Result<(), OverlayError> {
        self.toggles
            .lock()
            .unwrap()
            .push((package_id.to_string(), enabled));
        if self.refuse_toggle.lock().unwrap().contains(package_id) {
            return Err(OverlayError::new(package_id, enabled, "refused by fake"));
        }
        match self.overlays.lock().unwrap().get_mut(package_id) {
            Some(info) => {
                info.enabled = enabled;
                Ok(())
            }
            None => Err(OverlayError::new(package_id, enabled, "not installed")),
        }
    }

    async fn overlay_info(&self, package_id: &str) -> Option<OverlayInfo> {
        self.overlay(package_id)
    }

    async fn installed_overlays(&self) -> Vec<OverlayInfo> {
        self.overlays.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WallpaperApplier for FakeDevice {
    async fn set_wallpaper(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        if self.reject_wallpaper.load(Ordering::SeqCst) {
            return Err(ResourceError::rejected(
                ResourceKind::Wallpaper,
                "wallpaper service unavailable",
            ));
        }
        self.backgrounds.lock().unwrap().push(BackgroundCall {
            lock_screen: false,
            width: image.width(),
            height: image.height(),
            crop,
        });
        Ok(())
    }

    async fn set_lock_screen(
        &self,
        image: &DynamicImage,
        crop: Option<CropRect>,
    ) -> Result<(), ResourceError> {
        self.backgrounds.lock().unwrap().push(BackgroundCall {
            lock_screen: true,
            width: image.width(),
            height: image.height(),
            crop,
        });
        Ok(())
    }
}

#[async_trait]
impl SoundApplier for FakeDevice {
    async fn set_sound(
        &self,
        kind: SoundKind,
        sound: &SoundAsset,
        mut data: Box<dyn Read + Send>,
    ) -> Result<(), ResourceError> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)
            .map_err(|e| ResourceError::io(&sound.asset_name, e))?;
        self.sounds.lock().unwrap().push(SoundCall {
            kind,
            asset_name: sound.asset_name.clone(),
            data: bytes,
        });
        Ok(())
    }
}

/// Writes a theme bundle into a temp dir.
pub struct BundleBuilder {
    dir: TempDir,
    package_id: String,
    manifest_body: Vec<String>,
    targets: Vec<String>,
}

impl BundleBuilder {
    pub fn new(package_id: &str) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            package_id: package_id.to_string(),
            manifest_body: vec![format!("<title>{package_id}</title>")],
            targets: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, data: &[u8]) {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn write_png(&self, name: &str, width: u32, height: u32) {
        let path = self.dir.path().join("backgrounds").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    pub fn wallpaper(mut self, name: &str, width: u32, height: u32) -> Self {
        self.write_png(name, width, height);
        self.manifest_body
            .push(format!("<wallpaper>{name}</wallpaper>"));
        self
    }

    pub fn lock_screen(mut self, name: &str, width: u32, height: u32) -> Self {
        self.write_png(name, width, height);
        self.manifest_body
            .push(format!("<lockscreen>{name}</lockscreen>"));
        self
    }

    /// Declares a wallpaper without shipping the asset.
    pub fn missing_wallpaper(mut self, name: &str) -> Self {
        self.manifest_body
            .push(format!("<wallpaper>{name}</wallpaper>"));
        self
    }

    pub fn sound(mut self, kind: SoundKind, name: &str, data: &[u8]) -> Self {
        self.write(&format!("sounds/{name}"), data);
        self.manifest_body
            .push(format!("<{kind}>{name}</{kind}>", kind = kind.as_str()));
        self
    }

    pub fn boot_animation(self) -> Self {
        self.write("media/bootanimation.zip", b"PK-boot");
        self
    }

    pub fn font(self, name: &str) -> Self {
        self.write(&format!("fonts/{name}"), name.as_bytes());
        self
    }

    /// Adds a switchable overlay target whose package id is derived from the
    /// theme and target ids.
    pub fn overlay(self, target_id: &str) -> Self {
        self.overlay_with(target_id, true)
    }

    pub fn overlay_with(mut self, target_id: &str, switchable: bool) -> Self {
        let package_id = overlay_package(&self.package_id, target_id);
        self.write(
            &format!("overlay/{target_id}"),
            overlay_payload(&package_id, target_id).as_bytes(),
        );
        self.targets.push(format!(
            "<target switchable=\"{switchable}\">{target_id}</target>"
        ));
        self
    }

    pub fn build(self) -> TestBundle {
        let mut manifest = String::from("<theme>\n");
        for line in &self.manifest_body {
            manifest.push_str(line);
            manifest.push('\n');
        }
        if !self.targets.is_empty() {
            manifest.push_str("<overlay>\n");
            for target in &self.targets {
                manifest.push_str(target);
                manifest.push('\n');
            }
            manifest.push_str("</overlay>\n");
        }
        manifest.push_str("</theme>\n");
        self.write("theme_data.xml", manifest.as_bytes());

        let bundle = Arc::new(DirectoryBundle::new(self.dir.path(), &self.package_id));
        TestBundle {
            _dir: self.dir,
            bundle,
        }
    }
}

pub fn overlay_package(theme_id: &str, target_id: &str) -> String {
    format!("{theme_id}.overlay.{target_id}")
}

pub struct TestBundle {
    _dir: TempDir,
    pub bundle: Arc<DirectoryBundle>,
}

impl TestBundle {
    pub fn descriptor(&self) -> engine::ThemeDescriptor {
        engine::parse_manifest(&*self.bundle, PORTRAIT).unwrap()
    }
}

/// Font and boot animation directories for one test.
pub struct SystemDirs {
    _root: TempDir,
    pub fonts: PathBuf,
    pub bootanimation: PathBuf,
}

impl SystemDirs {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let fonts = root.path().join("fonts");
        let bootanimation = root.path().join("theme");
        fs::create_dir_all(&fonts).unwrap();
        fs::create_dir_all(&bootanimation).unwrap();
        Self {
            _root: root,
            fonts,
            bootanimation,
        }
    }

    pub fn font_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.fonts)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn test_config(dirs: &SystemDirs) -> EngineConfig {
    EngineConfig::default()
        .with_installer_timeout(Duration::from_secs(5))
        .with_font_refresh_settle(Duration::from_millis(10))
        .with_font_refresh_marker(MARKER)
        .with_fonts_dir(&dirs.fonts)
        .with_bootanimation_dir(&dirs.bootanimation)
}

pub fn manager(device: &Arc<FakeDevice>, dirs: &SystemDirs) -> ThemeManager {
    ThemeManager::new(test_config(dirs), PORTRAIT, device.collaborators())
}

pub fn state_names(events: &[ApplyStatus]) -> Vec<&'static str> {
    events.iter().map(|event| event.state.name()).collect()
}

/// Reads the run's events up to and including the terminal one.
pub async fn collect_run(handle: &mut engine::ApplyHandle) -> Vec<ApplyStatus> {
    let mut events = Vec::new();
    while let Some(event) = handle.status().recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}
