//! Manifest markup walk.
//!
//! The parsed element tree is visited once in document order with an
//! explicit stack. Attributes of an element bind to that element's own text
//! content; an `<overlay>` element discards any target collected so far.

use crate::errors::ManifestError;
use crate::model::{
    AspectRatio, BackgroundAsset, BackgroundKind, DisplayDims, OverlayTarget, SoundAsset,
    SoundKind, TargetCategory,
};
use std::collections::HashMap;
use xmltree::{Element, XMLNode};

const RATIO_WIDTH_KEYS: [&str; 3] = ["ratiowidth", "ratio_width", "ratiox"];
const RATIO_HEIGHT_KEYS: [&str; 3] = ["ratioheight", "ratio_height", "ratioy"];

/// Everything a manifest contributes to a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDocument {
    pub title: Option<String>,
    pub author: Option<String>,
    pub wallpaper: Option<BackgroundAsset>,
    pub lock_screen: Option<BackgroundAsset>,
    pub sounds: Vec<(SoundKind, SoundAsset)>,
    pub overlay_targets: Vec<OverlayTarget>,
}

impl ManifestDocument {
    fn background_mut(&mut self, kind: BackgroundKind) -> &mut Option<BackgroundAsset> {
        match kind {
            BackgroundKind::Wallpaper => &mut self.wallpaper,
            BackgroundKind::LockScreen => &mut self.lock_screen,
        }
    }

    fn set_sound(&mut self, kind: SoundKind, sound: SoundAsset) {
        self.sounds.retain(|(existing, _)| *existing != kind);
        self.sounds.push((kind, sound));
    }
}

/// Ratio declaration found on a background candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RatioDecl {
    Absent,
    Valid(AspectRatio),
    Invalid,
}

/// One element with lower-cased name and attribute keys and its own text.
struct Frame {
    name: String,
    attrs: HashMap<String, String>,
    text: String,
}

/// Parses manifest markup for a display of the given size.
pub fn parse_document(
    package_id: &str,
    source: &str,
    display: DisplayDims,
) -> Result<ManifestDocument, ManifestError> {
    let root = Element::parse(source.as_bytes()).map_err(|err| ManifestError::Malformed {
        package_id: package_id.to_string(),
        position: None,
        reason: err.to_string(),
    })?;

    let mut document = ManifestDocument::default();
    let mut pending: Vec<&Element> = vec![&root];
    while let Some(element) = pending.pop() {
        let frame = open_frame(element);
        if frame.name == "overlay" {
            document.overlay_targets.clear();
        }
        close_frame(&mut document, frame, display);

        pending.extend(element.children.iter().rev().filter_map(|node| match node {
            XMLNode::Element(child) => Some(child),
            _ => None,
        }));
    }

    Ok(document)
}

fn open_frame(element: &Element) -> Frame {
    let attrs = element
        .attributes
        .iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
        .collect();
    let text = element
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Text(text) | XMLNode::CData(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    Frame {
        name: element.name.to_ascii_lowercase(),
        attrs,
        text,
    }
}

fn close_frame(document: &mut ManifestDocument, frame: Frame, display: DisplayDims) {
    let text = frame.text.trim();
    if text.is_empty() {
        return;
    }

    match frame.name.as_str() {
        "title" => document.title = Some(text.to_string()),
        "author" => document.author = Some(text.to_string()),
        "ringtone" | "alarm" | "notification" => {
            let kind = match frame.name.as_str() {
                "ringtone" => SoundKind::Ringtone,
                "alarm" => SoundKind::Alarm,
                _ => SoundKind::Notification,
            };
            let display_name = frame.attrs.get("title").cloned();
            document.set_sound(kind, SoundAsset::new(text, display_name));
        }
        "wallpaper" | "lockscreen" => {
            let kind = if frame.name == "wallpaper" {
                BackgroundKind::Wallpaper
            } else {
                BackgroundKind::LockScreen
            };
            let slot = document.background_mut(kind);
            match ratio_declaration(&frame.attrs) {
                RatioDecl::Absent => {
                    if slot.is_none() {
                        *slot = Some(BackgroundAsset {
                            asset_name: text.to_string(),
                            ratio: None,
                        });
                    }
                }
                RatioDecl::Valid(ratio) => {
                    if display.matches_ratio(ratio) {
                        *slot = Some(BackgroundAsset {
                            asset_name: text.to_string(),
                            ratio: Some(ratio),
                        });
                    }
                }
                RatioDecl::Invalid => {
                    log::debug!("Ignoring {} candidate '{}' with invalid ratio", frame.name, text);
                }
            }
        }
        "target" => {
            let mut target = OverlayTarget::new(text)
                .switchable(parse_bool(frame.attrs.get("switchable"), true));
            if let Some(label) = frame.attrs.get("label").filter(|l| !l.trim().is_empty()) {
                target = target.with_label(label.trim());
            }
            if let Some(category) = frame
                .attrs
                .get("category")
                .and_then(|c| TargetCategory::parse(c))
            {
                target = target.with_category(category);
            }
            document.overlay_targets.push(target);
        }
        _ => {}
    }
}

fn ratio_declaration(attrs: &HashMap<String, String>) -> RatioDecl {
    let find = |keys: &[&str]| keys.iter().find_map(|key| attrs.get(*key));
    let width = find(&RATIO_WIDTH_KEYS);
    let height = find(&RATIO_HEIGHT_KEYS);

    match (width, height) {
        (None, None) => RatioDecl::Absent,
        (Some(width), Some(height)) => {
            let width = width.trim().parse::<u32>().ok();
            let height = height.trim().parse::<u32>().ok();
            match (width, height) {
                (Some(width), Some(height)) => AspectRatio::new(width, height)
                    .map(RatioDecl::Valid)
                    .unwrap_or(RatioDecl::Invalid),
                _ => RatioDecl::Invalid,
            }
        }
        _ => RatioDecl::Invalid,
    }
}

fn parse_bool(value: Option<&String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" => true,
        Some(v) if v == "false" || v == "0" => false,
        _ => default,
    }
}
