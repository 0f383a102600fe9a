use claims::*;
use engine::appliers::{CropRect, OverlayInfo};
use engine::errors::InstallerError;
use engine::model::{ApplyState, ResourceKind, SoundKind};
use engine::{ApplyError, SelectionSet};
use std::fs;
use std::time::Duration;

mod support;
use support::*;

const THEME: &str = "org.example.ocean";

fn full_theme() -> TestBundle {
    BundleBuilder::new(THEME)
        .wallpaper("wall.png", 40, 80)
        .lock_screen("lock.png", 40, 80)
        .sound(SoundKind::Ringtone, "waves.ogg", b"waves")
        .boot_animation()
        .font("Ocean-Regular.ttf")
        .overlay("android")
        .overlay("com.android.systemui")
        .build()
}

#[tokio::test]
async fn test_full_apply_reports_every_stage_in_order() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let manager = manager(&device, &dirs);
    let theme = full_theme();

    let mut handle = assert_ok!(manager.apply_theme(
        theme.bundle.clone(),
        theme.descriptor(),
        SelectionSet::new()
    ));
    let events = collect_run(&mut handle).await;
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(
        state_names(&events),
        vec![
            "applying",
            "applying_wallpaper",
            "applying_lock_screen",
            "applying_ringtone",
            "applying_boot_animation",
            "applying_fonts",
            "installing_overlay",
            "applying_overlay",
            "applying_overlay",
            "cleaning",
            "succeeded",
        ]
    );
    assert_eq!(
        events[8].state,
        ApplyState::ApplyingOverlay {
            progress: 2,
            max: 2,
            current_label: "com.android.systemui".to_string(),
        }
    );
    for pair in events.windows(2) {
        assert!(pair[0].sequence < pair[1].sequence);
    }

    assert_eq!(
        applied.resources,
        vec![
            ResourceKind::Wallpaper,
            ResourceKind::LockScreen,
            ResourceKind::Ringtone,
            ResourceKind::BootAnimation,
            ResourceKind::Fonts,
        ]
    );
    assert_eq!(applied.overlays.len(), 2);

    let mut enabled = device.enabled_theme_overlays();
    enabled.sort();
    assert_eq!(
        enabled,
        vec![
            overlay_package(THEME, "android"),
            overlay_package(THEME, "com.android.systemui"),
        ]
    );
    assert_eq!(device.backgrounds().len(), 2);
    assert_eq!(device.sounds()[0].data, b"waves");
    assert_eq!(dirs.font_files(), vec!["Ocean-Regular.ttf"]);
    assert!(dirs.bootanimation.join("bootanimation.zip").exists());
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_theme_without_fonts_clears_fonts_and_refreshes_once() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    fs::write(dirs.fonts.join("Old-Regular.ttf"), b"old").unwrap();
    fs::write(dirs.bootanimation.join("bootanimation.zip"), b"old").unwrap();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .wallpaper("wall.png", 40, 80)
        .build();

    let mut handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let terminal = handle.status().wait_for_terminal().await.unwrap();
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(terminal.state, ApplyState::Succeeded);
    assert!(dirs.font_files().is_empty());
    assert_eq!(applied.fonts_cleared, 1);
    assert!(applied.boot_animation_cleared);
    assert!(!dirs.bootanimation.join("bootanimation.zip").exists());
    assert_eq!(device.marker_toggles(), vec![true, false]);
}

#[tokio::test]
async fn test_theme_with_fonts_refreshes_exactly_once() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    fs::write(dirs.fonts.join("Old-Regular.ttf"), b"old").unwrap();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).font("New-Regular.ttf").build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(applied.fonts_cleared, 0);
    assert_eq!(dirs.font_files(), vec!["New-Regular.ttf"]);
    assert_eq!(device.marker_toggles(), vec![true, false]);
}

#[tokio::test]
async fn test_overlay_install_failure_rolls_back_and_leaves_nothing_enabled() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.preinstall_theme_overlay("org.example.previous.clock", "com.example.clock", true);
    device.fail_install(&overlay_package(THEME, "com.example.calculator"), -2);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .overlay("android")
        .overlay("com.example.calculator")
        .overlay("com.example.clock")
        .build();

    let mut handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let events = collect_run(&mut handle).await;
    let err = assert_err!(handle.wait().await);

    match &err {
        ApplyError::Installer { subject, source } => {
            assert_eq!(subject, "com.example.calculator");
            assert_eq!(source.code(), -2);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let names = state_names(&events);
    assert_eq!(&names[names.len() - 2..], &["cleaning", "failed"]);
    let ApplyState::Failed { reason } = &events.last().unwrap().state else {
        panic!("run did not end in failure");
    };
    assert!(reason.contains("-2"));

    assert!(device.enabled_theme_overlays().is_empty());
    assert!(!device.is_installed(&overlay_package(THEME, "android")));
    assert!(!device.installs().contains(&overlay_package(THEME, "com.example.clock")));
    assert!(device.is_installed("org.example.previous.clock"));
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_second_apply_while_running_is_busy() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.go_silent();
    let manager = engine::ThemeManager::new(
        test_config(&dirs).with_installer_timeout(Duration::from_millis(200)),
        PORTRAIT,
        device.collaborators(),
    );
    let theme = BundleBuilder::new(THEME).overlay("android").build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    assert!(manager.is_busy());

    let second = manager.apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new());
    assert!(assert_err!(second).is_busy());
    let removal = manager.remove_overlays(&SelectionSet::new()).await;
    assert!(assert_err!(removal).is_busy());

    let err = assert_err!(handle.wait().await);
    assert!(matches!(
        err,
        ApplyError::Installer {
            source: InstallerError::Timeout { .. },
            ..
        }
    ));
    assert!(!manager.is_busy());
    assert_ok!(manager.remove_overlays(&SelectionSet::new()).await);
}

#[tokio::test]
async fn test_unmarked_package_is_rejected_and_removed() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let package = overlay_package(THEME, "android");
    device.install_unmarked(&package);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).overlay("android").build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let err = assert_err!(handle.wait().await);

    assert!(matches!(err, ApplyError::UnverifiedOverlay { ref package_id, .. } if *package_id == package));
    assert!(!device.is_installed(&package));
    assert!(!device.toggles().contains(&(package.clone(), true)));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_first_step() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let previous = "org.example.previous.overlay.android";
    device.preinstall_theme_overlay(previous, "android", true);
    let manager = manager(&device, &dirs);
    let theme = full_theme();

    let mut handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    handle.cancel();
    let events = collect_run(&mut handle).await;
    let err = assert_err!(handle.wait().await);

    assert!(matches!(err, ApplyError::Cancelled));
    assert_eq!(state_names(&events), vec!["applying", "failed"]);
    assert!(device.backgrounds().is_empty());
    assert!(device.sounds().is_empty());
    assert!(device.installs().is_empty());
    assert_eq!(device.enabled_theme_overlays(), vec![previous.to_string()]);
    assert!(device.toggles().is_empty());
}

#[tokio::test]
async fn test_cancel_during_overlay_install_rolls_back_run() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let first = overlay_package(THEME, "android");
    let release = device.hold_install(&first);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .overlay("android")
        .overlay("com.android.systemui")
        .build();

    let mut handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let mut events = Vec::new();
    while let Some(event) = handle.status().recv().await {
        let installing = matches!(event.state, ApplyState::ApplyingOverlay { .. });
        events.push(event);
        if installing {
            break;
        }
    }
    handle.cancel();
    drop(release);
    events.extend(collect_run(&mut handle).await);
    let err = assert_err!(handle.wait().await);

    assert!(matches!(err, ApplyError::Cancelled));
    let names = state_names(&events);
    assert_eq!(names.iter().filter(|name| **name == "applying_overlay").count(), 1);
    assert_eq!(&names[names.len() - 2..], &["cleaning", "failed"]);
    assert_eq!(device.installs(), vec![first.clone()]);
    assert!(device.toggles().contains(&(first.clone(), false)));
    assert_eq!(device.uninstalls(), vec![first.clone()]);
    assert!(!device.is_installed(&first));
    assert!(device.enabled_theme_overlays().is_empty());
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_reapplying_same_theme_is_idempotent() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let manager = manager(&device, &dirs);
    let theme = full_theme();
    let selection = SelectionSet::new().with_remove_stale_overlays(true);

    let mut first = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), selection.clone())
        .unwrap();
    let first_events = collect_run(&mut first).await;
    assert_ok!(first.wait().await);
    let mut enabled_after_first = device.enabled_theme_overlays();
    enabled_after_first.sort();

    let mut second = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), selection)
        .unwrap();
    let second_events = collect_run(&mut second).await;
    let applied = assert_ok!(second.wait().await);
    let mut enabled_after_second = device.enabled_theme_overlays();
    enabled_after_second.sort();

    assert_eq!(enabled_after_first, enabled_after_second);
    assert!(applied.stale_overlays.is_empty());
    assert_eq!(dirs.font_files(), vec!["Ocean-Regular.ttf"]);
    assert_eq!(second_events[0].state, ApplyState::Applying);
    assert!(second_events[0].sequence > first_events.last().unwrap().sequence);
}

#[tokio::test]
async fn test_stale_theme_overlays_are_uninstalled_and_others_untouched() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.preinstall_theme_overlay("org.example.old.calculator", "com.example.calculator", true);
    device.register(OverlayInfo {
        package_id: "com.vendor.overlay".to_string(),
        target_id: "com.example.calculator".to_string(),
        enabled: true,
        has_code: true,
        theme_marker: true,
    });
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).overlay("android").build();

    let handle = manager
        .apply_theme(
            theme.bundle.clone(),
            theme.descriptor(),
            SelectionSet::new().with_remove_stale_overlays(true),
        )
        .unwrap();
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(
        applied.stale_overlays.uninstalled,
        vec!["org.example.old.calculator".to_string()]
    );
    assert!(!device.is_installed("org.example.old.calculator"));
    assert!(device.overlay("com.vendor.overlay").unwrap().enabled);
    assert!(device.overlay(&overlay_package(THEME, "android")).unwrap().enabled);
}

#[tokio::test]
async fn test_stale_overlays_are_only_disabled_by_default() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.preinstall_theme_overlay("org.example.old.calculator", "com.example.calculator", true);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).overlay("android").build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(
        applied.stale_overlays.disabled,
        vec!["org.example.old.calculator".to_string()]
    );
    let old = device.overlay("org.example.old.calculator").unwrap();
    assert!(!old.enabled);
}

#[tokio::test]
async fn test_selection_skips_resources_but_not_mandatory_targets() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .wallpaper("wall.png", 40, 80)
        .lock_screen("lock.png", 40, 80)
        .overlay_with("android", false)
        .overlay("com.android.settings")
        .build();
    let selection = SelectionSet::new()
        .skip(ResourceKind::Wallpaper.key())
        .skip("android")
        .skip("com.android.settings");

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), selection)
        .unwrap();
    let applied = assert_ok!(handle.wait().await);

    assert_eq!(applied.resources, vec![ResourceKind::LockScreen]);
    let backgrounds = device.backgrounds();
    assert_eq!(backgrounds.len(), 1);
    assert!(backgrounds[0].lock_screen);
    assert_eq!(device.installs(), vec![overlay_package(THEME, "android")]);
}

#[tokio::test]
async fn test_force_center_crops_backgrounds_to_display() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .wallpaper("wide.png", 300, 200)
        .build();

    let handle = manager
        .apply_theme(
            theme.bundle.clone(),
            theme.descriptor(),
            SelectionSet::new().with_force_center_wallpaper(true),
        )
        .unwrap();
    assert_ok!(handle.wait().await);

    assert_eq!(
        device.backgrounds()[0].crop,
        Some(CropRect {
            x: 100,
            y: 0,
            width: 100,
            height: 200
        })
    );
}

#[tokio::test]
async fn test_missing_declared_asset_fails_the_apply() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .missing_wallpaper("gone.png")
        .overlay("android")
        .build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let err = assert_err!(handle.wait().await);

    assert!(matches!(err, ApplyError::Asset(ref e) if e.is_not_found()));
    assert!(device.installs().is_empty());
}

#[tokio::test]
async fn test_rejected_wallpaper_fails_the_apply() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.reject_wallpaper();
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .wallpaper("wall.png", 40, 80)
        .build();

    let mut handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let terminal = handle.status().wait_for_terminal().await.unwrap();

    assert!(matches!(terminal.state, ApplyState::Failed { .. }));
    assert!(matches!(
        assert_err!(handle.wait().await),
        ApplyError::Resource(_)
    ));
}

#[tokio::test]
async fn test_refused_font_refresh_fails_font_step() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.refuse_toggle(MARKER);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).font("New-Regular.ttf").build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();

    assert!(matches!(
        assert_err!(handle.wait().await),
        ApplyError::Overlay(ref e) if e.package_id == MARKER
    ));
    // unfinished font step is reset and refreshed again
    assert!(dirs.font_files().is_empty());
    assert_eq!(device.marker_toggles(), vec![true, true]);
}

#[tokio::test]
async fn test_failure_after_fonts_applied_keeps_fonts() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.fail_install(&overlay_package(THEME, "android"), -2);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME)
        .font("New-Regular.ttf")
        .overlay("android")
        .build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    assert_err!(handle.wait().await);

    assert_eq!(dirs.font_files(), vec!["New-Regular.ttf"]);
    assert_eq!(device.marker_toggles(), vec![true, false]);
}

#[tokio::test]
async fn test_refused_font_refresh_during_cleanup_is_logged_only() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    fs::write(dirs.fonts.join("Old-Regular.ttf"), b"old").unwrap();
    device.refuse_toggle(MARKER);
    let manager = manager(&device, &dirs);
    let theme = BundleBuilder::new(THEME).build();

    let handle = manager
        .apply_theme(theme.bundle.clone(), theme.descriptor(), SelectionSet::new())
        .unwrap();
    let applied = assert_ok!(handle.wait().await);
    assert_eq!(applied.fonts_cleared, 1);
}

#[tokio::test]
async fn test_remove_overlays_keeps_requested_targets() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.preinstall_theme_overlay("org.example.a", "android", true);
    device.preinstall_theme_overlay("org.example.b", "com.android.settings", true);
    device.preinstall_theme_overlay("org.example.c", "com.android.dialer", false);
    let manager = manager(&device, &dirs);

    let sweep = assert_ok!(
        manager
            .remove_overlays(&SelectionSet::new().keep_target("android"))
            .await
    );
    assert_eq!(sweep.disabled, vec!["org.example.b".to_string()]);
    assert!(sweep.uninstalled.is_empty());
    assert!(device.overlay("org.example.a").unwrap().enabled);

    let sweep = assert_ok!(
        manager
            .remove_overlays(
                &SelectionSet::new()
                    .keep_target("android")
                    .with_remove_stale_overlays(true)
            )
            .await
    );
    assert!(sweep.disabled.is_empty());
    assert_eq!(
        sweep.uninstalled,
        vec!["org.example.b".to_string(), "org.example.c".to_string()]
    );
    assert!(device.is_installed("org.example.a"));
}

#[tokio::test]
async fn test_strict_removal_stops_on_refused_disable() {
    let device = FakeDevice::new();
    let dirs = SystemDirs::new();
    device.preinstall_theme_overlay("org.example.b", "com.android.settings", true);
    device.refuse_toggle("org.example.b");
    let manager = manager(&device, &dirs);

    let err = assert_err!(
        manager
            .remove_overlays(&SelectionSet::new().with_remove_stale_overlays(true))
            .await
    );
    assert!(matches!(err, ApplyError::Overlay(_)));
    assert!(device.is_installed("org.example.b"));
}
