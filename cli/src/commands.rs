//! Subcommand implementations. Output goes to the given writer so the
//! commands can be driven from tests.

use crate::bundles::{discover_bundles, load_bundle};
use crate::cli::ApplyArgs;
use crate::config::AppConfig;
use crate::sandbox::{LOCK_SCREEN_FILE, SandboxDevice, WALLPAPER_FILE};
use anyhow::Context;
use engine::model::{BackgroundKind, SoundKind};
use engine::pipeline::{AppliedTheme, StaleSweep};
use engine::{SelectionSet, ThemeDescriptor, ThemeManager, list_descriptors, parse_manifest};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub fn inspect<W: Write>(
    config: &AppConfig,
    bundle_dir: &Path,
    json: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let bundle = load_bundle(bundle_dir)?;
    let descriptor = parse_manifest(&bundle, config.display().dims())
        .with_context(|| format!("Failed to read theme at {}", bundle_dir.display()))?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&descriptor)?)?;
    } else {
        print_descriptor(&descriptor, out)?;
    }
    Ok(())
}

fn print_descriptor<W: Write>(descriptor: &ThemeDescriptor, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "{} ({})", descriptor.title(), descriptor.package_id())?;
    if !descriptor.author().is_empty() {
        writeln!(out, "  author:         {}", descriptor.author())?;
    }
    writeln!(out, "  removable:      {}", descriptor.is_removable())?;

    for (label, kind) in [
        ("wallpaper", BackgroundKind::Wallpaper),
        ("lock screen", BackgroundKind::LockScreen),
    ] {
        if let Some(background) = descriptor.background(kind) {
            writeln!(out, "  {:<15} {}", format!("{label}:"), background.asset_name)?;
        }
    }
    for kind in SoundKind::ALL {
        if let Some(sound) = descriptor.sound(kind) {
            writeln!(
                out,
                "  {:<15} {} ({})",
                format!("{kind}:"),
                sound.display_name,
                sound.asset_name
            )?;
        }
    }
    writeln!(out, "  boot animation: {}", descriptor.has_boot_animation())?;
    writeln!(out, "  fonts:          {}", descriptor.has_fonts())?;

    let targets = descriptor.overlay_targets();
    writeln!(out, "  overlays:       {}", targets.len())?;
    for target in targets {
        let mandatory = if target.switchable { "" } else { " [required]" };
        writeln!(out, "    - {} ({}){}", target.label, target.target_id, mandatory)?;
    }
    Ok(())
}

pub fn list<W: Write>(config: &AppConfig, dir: &Path, out: &mut W) -> anyhow::Result<()> {
    let bundles = discover_bundles(dir)?;
    let descriptors = list_descriptors(&bundles, config.display().dims());
    if descriptors.is_empty() {
        writeln!(out, "No themes found in {}", dir.display())?;
        return Ok(());
    }
    for descriptor in descriptors {
        writeln!(
            out,
            "{}\t{}\t{}",
            descriptor.package_id(),
            descriptor.title(),
            descriptor.author()
        )?;
    }
    Ok(())
}

fn open_manager(config: &AppConfig, sandbox_root: &Path) -> anyhow::Result<(Arc<SandboxDevice>, ThemeManager)> {
    let device = SandboxDevice::open(sandbox_root, config.engine().font_refresh_marker())
        .with_context(|| format!("Failed to open sandbox at {}", sandbox_root.display()))?;
    let manager = ThemeManager::new(
        device.engine_config(config.engine()),
        config.display().dims(),
        device.collaborators(),
    );
    Ok((device, manager))
}

/// Applies a bundle, printing every status event. Returns `None` when the
/// run failed; the failure itself has already been printed.
pub async fn apply<W: Write>(
    config: &AppConfig,
    sandbox_root: &Path,
    args: &ApplyArgs,
    out: &mut W,
) -> anyhow::Result<Option<AppliedTheme>> {
    let bundle = Arc::new(load_bundle(&args.bundle)?);
    let descriptor = parse_manifest(&*bundle, config.display().dims())
        .with_context(|| format!("Failed to read theme at {}", args.bundle.display()))?;

    let mut selection = SelectionSet::new()
        .with_remove_stale_overlays(args.remove_stale || config.apply().remove_stale_overlays())
        .with_force_center_wallpaper(
            args.center_wallpaper || config.apply().force_center_wallpaper(),
        );
    for key in &args.skip {
        selection.set(key.clone(), false);
    }

    let (_device, manager) = open_manager(config, sandbox_root)?;
    log::info!("Applying {} to {}", descriptor.package_id(), sandbox_root.display());
    let mut handle = manager.apply_theme(bundle, descriptor, selection)?;

    while let Some(status) = handle.status().recv().await {
        if args.json {
            writeln!(out, "{}", serde_json::to_string(&status)?)?;
        } else {
            writeln!(out, "{status}")?;
        }
        if status.is_terminal() {
            break;
        }
    }

    match handle.wait().await {
        Ok(applied) => {
            if !args.json {
                print_applied(&applied, out)?;
            }
            Ok(Some(applied))
        }
        Err(e) => {
            log::error!("Apply failed: {}", e);
            Ok(None)
        }
    }
}

fn print_applied<W: Write>(applied: &AppliedTheme, out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Applied {}: {} resources, {} overlays",
        applied.package_id,
        applied.resources.len(),
        applied.overlays.len()
    )?;
    if applied.fonts_cleared > 0 {
        writeln!(out, "  removed {} previous font files", applied.fonts_cleared)?;
    }
    if applied.boot_animation_cleared {
        writeln!(out, "  removed previous boot animation")?;
    }
    print_sweep(&applied.stale_overlays, out)
}

fn print_sweep<W: Write>(sweep: &StaleSweep, out: &mut W) -> anyhow::Result<()> {
    for package in &sweep.disabled {
        writeln!(out, "  disabled {package}")?;
    }
    for package in &sweep.uninstalled {
        writeln!(out, "  uninstalled {package}")?;
    }
    for error in &sweep.errors {
        writeln!(out, "  warning: {error}")?;
    }
    Ok(())
}

/// Disables every theme overlay outside `keep`, uninstalling them too when
/// asked.
pub async fn reset<W: Write>(
    config: &AppConfig,
    sandbox_root: &Path,
    uninstall: bool,
    keep: &[String],
    out: &mut W,
) -> anyhow::Result<StaleSweep> {
    let (_device, manager) = open_manager(config, sandbox_root)?;
    let selection = keep.iter().fold(
        SelectionSet::new().with_remove_stale_overlays(uninstall || config.apply().remove_stale_overlays()),
        |selection, target| selection.keep_target(target.clone()),
    );

    let sweep = manager.remove_overlays(&selection).await?;
    if sweep.is_empty() {
        writeln!(out, "No theme overlays to remove")?;
    } else {
        print_sweep(&sweep, out)?;
    }
    Ok(sweep)
}

#[derive(Debug, Serialize)]
struct SandboxStatus<'a> {
    root: &'a Path,
    wallpaper: bool,
    lock_screen: bool,
    overlays: Vec<crate::sandbox::OverlayRecord>,
    sounds: Vec<crate::sandbox::SoundRecord>,
}

pub fn status<W: Write>(
    config: &AppConfig,
    sandbox_root: &Path,
    json: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let device = SandboxDevice::open(sandbox_root, config.engine().font_refresh_marker())?;
    let status = SandboxStatus {
        root: device.root(),
        wallpaper: device.root().join(WALLPAPER_FILE).is_file(),
        lock_screen: device.root().join(LOCK_SCREEN_FILE).is_file(),
        overlays: device.overlays(),
        sounds: device.sounds(),
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
        return Ok(());
    }

    writeln!(out, "Sandbox: {}", status.root.display())?;
    writeln!(out, "  wallpaper:   {}", status.wallpaper)?;
    writeln!(out, "  lock screen: {}", status.lock_screen)?;
    for sound in &status.sounds {
        writeln!(out, "  {}: {}", sound.kind, sound.display_name)?;
    }
    writeln!(out, "Overlays:")?;
    for overlay in &status.overlays {
        let state = if overlay.enabled { "enabled" } else { "disabled" };
        let kind = if overlay.theme_overlay { "theme" } else { "other" };
        writeln!(
            out,
            "  {:<8} {:<6} {} -> {}",
            state, kind, overlay.package, overlay.target
        )?;
    }
    Ok(())
}
