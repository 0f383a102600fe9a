//! Manifest parsing and catalog listing.
//!
//! [`parse_manifest`] turns one bundle into a [`ThemeDescriptor`] and
//! surfaces every failure. [`list_descriptors`] parses many bundles and skips
//! the broken ones.

pub mod parser;

pub use parser::{ManifestDocument, parse_document};

use crate::bundle::{BOOT_ANIMATION_ASSET, BundleAssetSource, FONTS_DIR, MANIFEST_ASSET};
use crate::errors::ManifestError;
use crate::model::{BackgroundKind, DisplayDims, ThemeDescriptor};

/// Parses the manifest of a single bundle.
///
/// The title falls back to the bundle label and the author to an empty
/// string. Boot animation and font availability are read from the bundle's
/// asset layout rather than the manifest.
pub fn parse_manifest<B>(bundle: &B, display: DisplayDims) -> Result<ThemeDescriptor, ManifestError>
where
    B: BundleAssetSource + ?Sized,
{
    let package_id = bundle.package_id();
    let bytes = bundle.read_asset(MANIFEST_ASSET).map_err(|source| {
        if source.is_not_found() {
            ManifestError::Missing {
                package_id: package_id.to_string(),
            }
        } else {
            ManifestError::Unreadable {
                package_id: package_id.to_string(),
                source,
            }
        }
    })?;

    let source = std::str::from_utf8(&bytes).map_err(|err| ManifestError::Malformed {
        package_id: package_id.to_string(),
        position: Some(err.valid_up_to() as u64),
        reason: "manifest is not valid UTF-8".to_string(),
    })?;

    let document = parse_document(package_id, source, display)?;

    let has_fonts = !bundle
        .list_assets(FONTS_DIR)
        .map_err(|source| ManifestError::Unreadable {
            package_id: package_id.to_string(),
            source,
        })?
        .is_empty();

    let mut builder = ThemeDescriptor::builder(package_id)
        .title(document.title.unwrap_or_else(|| bundle.label().to_string()))
        .author(document.author.unwrap_or_default())
        .removable(!bundle.is_system())
        .background(BackgroundKind::Wallpaper, document.wallpaper)
        .background(BackgroundKind::LockScreen, document.lock_screen)
        .boot_animation(bundle.has_asset(BOOT_ANIMATION_ASSET))
        .fonts(has_fonts)
        .overlay_targets(document.overlay_targets);
    for (kind, sound) in document.sounds {
        builder = builder.sound(kind, sound);
    }

    let descriptor = builder.build();
    log::debug!(
        "Parsed manifest of {}: {} overlay targets, fonts={}, bootanimation={}",
        descriptor.package_id(),
        descriptor.overlay_targets().len(),
        descriptor.has_fonts(),
        descriptor.has_boot_animation()
    );
    Ok(descriptor)
}

/// Parses every bundle, skipping those whose manifest is missing or broken.
pub fn list_descriptors<B>(bundles: &[B], display: DisplayDims) -> Vec<ThemeDescriptor>
where
    B: BundleAssetSource,
{
    bundles
        .iter()
        .filter_map(|bundle| match parse_manifest(bundle, display) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                log::warn!("Skipping theme bundle {}: {}", bundle.package_id(), e);
                None
            }
        })
        .collect()
}
