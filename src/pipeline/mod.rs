//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ encode ──▶ layout ──▶ document
//! (bitmap)   (JPEG)     (fit)      (lopdf page)
//!    ╲                    ▲
//!     ╰──── embed ────────╯   original bytes, when re-encoding fails
//! ```
//!
//! 1. [`decode`]   — bytes to an upright bitmap, capped at the width ceiling
//! 2. [`encode`]   — JPEG re-encode into a reused [`encode::EncodeSurface`]
//! 3. [`embed`]    — JPEG/PNG passthrough without decoding
//! 4. [`layout`]   — scale-to-fit and centring geometry
//! 5. [`document`] — image XObjects, pages and final serialisation
//!
//! [`prepare_image`] chains the first three per [`EmbedMode`]; it is CPU-bound
//! and runs inside `spawn_blocking`.

pub mod decode;
pub mod document;
pub mod embed;
pub mod encode;
pub mod layout;

use crate::config::EmbedMode;
use crate::error::ItemError;
use crate::selection::SourceFile;
use encode::{EncodeSurface, EncodedImage};
use tracing::{debug, warn};

/// Turn one source file into bytes ready to embed.
///
/// `item` is the 1-indexed position used in error reports.
pub fn prepare_image(
    item: usize,
    source: &SourceFile,
    max_width: u32,
    quality: u8,
    mode: EmbedMode,
    surface: &mut EncodeSurface,
) -> Result<EncodedImage, ItemError> {
    let bytes = source.read().map_err(|e| ItemError::ReadFailed {
        item,
        name: source.name.clone(),
        detail: e.to_string(),
    })?;

    if mode == EmbedMode::PreferOriginal {
        match embed::embed_original(&bytes) {
            Ok(encoded) => {
                debug!("Image {} ({}): embedding original bytes", item, source.name);
                return Ok(encoded);
            }
            Err(e) => debug!("Image {} ({}): re-encoding ({})", item, source.name, e),
        }
        return reencode(item, &source.name, &bytes, max_width, quality, surface);
    }

    match reencode(item, &source.name, &bytes, max_width, quality, surface) {
        Ok(encoded) => Ok(encoded),
        Err(primary) => match embed::embed_original(&bytes) {
            Ok(encoded) => {
                warn!("{}; embedding original bytes instead", primary);
                Ok(encoded)
            }
            Err(fallback) => {
                debug!("Image {} fallback failed: {}", item, fallback);
                Err(primary)
            }
        },
    }
}

fn reencode(
    item: usize,
    name: &str,
    bytes: &[u8],
    max_width: u32,
    quality: u8,
    surface: &mut EncodeSurface,
) -> Result<EncodedImage, ItemError> {
    let img = decode::decode_image(bytes).map_err(|e| ItemError::DecodeFailed {
        item,
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    let img = decode::limit_width(img, max_width);
    surface
        .encode_jpeg(&img, quality)
        .map_err(|e| ItemError::EncodeFailed {
            item,
            name: name.to_string(),
            detail: e.to_string(),
        })
}
