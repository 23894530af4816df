//! JPEG re-encoding into a reusable buffer.
//!
//! PDF viewers decode `DCTDecode` streams natively, so a JPEG can be copied
//! into the document byte-for-byte. Re-encoding every source (PNG, WebP,
//! GIF, TIFF…) as JPEG at the configured quality gives a uniform, compact
//! output whatever the input mix.
//!
//! JPEG has no alpha channel; transparent pixels are flattened onto white.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageResult, RgbImage};
use tracing::debug;

/// Colour space of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PdfColorSpace {
    Gray,
    Rgb,
}

impl PdfColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            PdfColorSpace::Gray => "DeviceGray",
            PdfColorSpace::Rgb => "DeviceRGB",
        }
    }

    pub fn components(self) -> u8 {
        match self {
            PdfColorSpace::Gray => 1,
            PdfColorSpace::Rgb => 3,
        }
    }
}

/// How the embedded stream is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFilter {
    /// Baseline or progressive JPEG.
    Dct,
    /// A PNG's zlib IDAT data, still carrying per-row PNG predictors.
    FlatePng,
}

/// Which path produced the embedded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EmbedSource {
    /// Decoded and re-encoded as JPEG.
    Reencoded,
    /// Original file bytes, copied as-is.
    Original,
}

/// Encoded bytes plus everything needed to describe them as an image XObject.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color: PdfColorSpace,
    pub filter: StreamFilter,
    pub source: EmbedSource,
}

/// Scratch buffer reused across every image of a run.
///
/// The buffer keeps its capacity between images so large pages do not
/// reallocate from scratch each time. Only one run owns a surface.
#[derive(Debug, Default)]
pub struct EncodeSurface {
    buf: Vec<u8>,
    encoded: usize,
}

impl EncodeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images encoded through this surface so far.
    pub fn encoded_count(&self) -> usize {
        self.encoded
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Encode `img` as JPEG at `quality` (1–100).
    pub fn encode_jpeg(&mut self, img: &DynamicImage, quality: u8) -> ImageResult<EncodedImage> {
        self.buf.clear();
        let (width, height) = (img.width(), img.height());
        let color = if img.color().has_color() {
            PdfColorSpace::Rgb
        } else {
            PdfColorSpace::Gray
        };

        {
            let mut encoder = JpegEncoder::new_with_quality(&mut self.buf, quality.clamp(1, 100));
            match color {
                PdfColorSpace::Gray => encoder.encode_image(&flatten_gray(img))?,
                PdfColorSpace::Rgb => encoder.encode_image(&flatten_rgb(img))?,
            }
        }

        self.encoded += 1;
        debug!(
            "Encoded {}x{} {:?} → {} bytes JPEG (q={})",
            width,
            height,
            color,
            self.buf.len(),
            quality
        );

        Ok(EncodedImage {
            data: self.buf.clone(),
            width,
            height,
            color,
            filter: StreamFilter::Dct,
            source: EmbedSource::Reencoded,
        })
    }
}

fn flatten_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        image::Rgb([over_white(p[0], p[3]), over_white(p[1], p[3]), over_white(p[2], p[3])])
    })
}

fn flatten_gray(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }
    let la = img.to_luma_alpha8();
    GrayImage::from_fn(la.width(), la.height(), |x, y| {
        let p = la.get_pixel(x, y).0;
        image::Luma([over_white(p[0], p[1])])
    })
}

fn over_white(c: u8, a: u8) -> u8 {
    let a = a as u32;
    ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Luma, Rgba, RgbaImage};

    #[test]
    fn encodes_rgb_as_jpeg() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 8, Rgba([255, 0, 0, 255])));
        let mut surface = EncodeSurface::new();
        let out = surface.encode_jpeg(&img, 80).unwrap();
        assert_eq!((out.width, out.height), (16, 8));
        assert_eq!(out.color, PdfColorSpace::Rgb);
        assert_eq!(out.filter, StreamFilter::Dct);
        assert_eq!(&out.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn grayscale_stays_gray() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(9, 9, Luma([128])));
        let out = EncodeSurface::new().encode_jpeg(&img, 50).unwrap();
        assert_eq!(out.color, PdfColorSpace::Gray);
    }

    #[test]
    fn surface_is_reused_across_images() {
        let mut surface = EncodeSurface::new();
        let big = DynamicImage::ImageRgb8(RgbImage::new(256, 256));
        surface.encode_jpeg(&big, 90).unwrap();
        let cap = surface.capacity();
        let small = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let out = surface.encode_jpeg(&small, 90).unwrap();
        assert_eq!(surface.encoded_count(), 2);
        assert!(surface.capacity() >= cap);
        // the returned bytes are only the small image
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn transparent_pixels_become_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(200, 255), 200);
    }
}
