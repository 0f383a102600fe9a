use crate::errors::ResourceError;
use crate::model::DisplayDims;
use image::DynamicImage;
use serde::Serialize;

/// Visible region of a background image, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centered crop matching the display's aspect ratio.
///
/// When the image is relatively taller than the display, top and bottom are
/// cut symmetrically; otherwise left and right are. Returns `None` for empty
/// images or displays.
pub fn center_crop(image_width: u32, image_height: u32, display: DisplayDims) -> Option<CropRect> {
    if image_width == 0 || image_height == 0 || display.width == 0 || display.height == 0 {
        return None;
    }

    let ratio = display.height as f64 / display.width as f64;
    let image_ratio = image_height as f64 / image_width as f64;

    if ratio < image_ratio {
        let offset = ((image_height as f64 - image_width as f64 * ratio) / 2.0) as u32;
        Some(CropRect {
            x: 0,
            y: offset,
            width: image_width,
            height: image_height.saturating_sub(offset * 2),
        })
    } else {
        let offset = ((image_width as f64 - image_height as f64 / ratio) / 2.0) as u32;
        Some(CropRect {
            x: offset,
            y: 0,
            width: image_width.saturating_sub(offset * 2),
            height: image_height,
        })
    }
}

pub fn decode_background(asset: &str, bytes: &[u8]) -> Result<DynamicImage, ResourceError> {
    image::load_from_memory(bytes).map_err(|source| ResourceError::Decode {
        asset: asset.to_string(),
        source,
    })
}
