//! Page geometry: fit an image inside a page without cropping.
//!
//! The image is scaled uniformly by `min(page_w / img_w, page_h / img_h)`
//! and centred, leaving equal margins on the two sides that do not touch
//! the page edge. Coordinates are PDF points with the origin at the
//! bottom-left corner.

use serde::{Deserialize, Serialize};

/// Where one image lands on its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePlacement {
    pub page_width: f32,
    pub page_height: f32,
    /// Uniform scale applied to the image's pixel dimensions.
    pub scale: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit an `img_w × img_h` pixel image into a `page` of `(width, height)` points.
///
/// Both image dimensions must be non-zero.
pub fn place_image(img_w: u32, img_h: u32, page: (f32, f32)) -> PagePlacement {
    let (page_width, page_height) = page;
    let (w, h) = (img_w as f32, img_h as f32);
    let scale = (page_width / w).min(page_height / h);
    let width = w * scale;
    let height = h * scale;
    PagePlacement {
        page_width,
        page_height,
        scale,
        x: ((page_width - width) / 2.0).max(0.0),
        y: ((page_height - height) / 2.0).max(0.0),
        width,
        height,
    }
}
