//! Bitmap decoding: source bytes → `DynamicImage`, upright and width-capped.
//!
//! Camera JPEGs usually store pixels in sensor order and record the
//! rotation in EXIF. The decoder's orientation is applied right after
//! decoding so width/height (and therefore page placement) match what a
//! viewer shows.

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, ImageResult};
use std::io::Cursor;
use tracing::debug;

/// Decode an image of any supported format, honouring EXIF orientation.
pub fn decode_image(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    debug!("Decoded {}x{} px ({:?})", img.width(), img.height(), orientation);
    Ok(img)
}

/// Downscale so the width does not exceed `max_width`, keeping the aspect ratio.
///
/// Both dimensions are multiplied by `max_width / width`; narrower images are
/// returned untouched.
pub fn limit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w <= max_width || max_width == 0 {
        return img;
    }
    let scale = max_width as f64 / w as f64;
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    debug!("Downscaling {}x{} → {}x{}", w, h, max_width, new_h);
    img.resize_exact(max_width, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_png() {
        let img = decode_image(&png_bytes(12, 7)).unwrap();
        assert_eq!((img.width(), img.height()), (12, 7));
    }

    /// Insert an APP1 Exif segment holding only an Orientation tag.
    fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\0\x2a\0\0\0\x08"); // big-endian, IFD0 at 8
        tiff.extend_from_slice(&1u16.to_be_bytes()); // one entry
        tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
        tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_rotation_is_applied() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 10, Rgb([90, 90, 90])));
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        // 6 = rotate 90° clockwise to display
        let rotated = decode_image(&with_exif_orientation(&jpeg, 6)).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (10, 40));

        let upright = decode_image(&with_exif_orientation(&jpeg, 1)).unwrap();
        assert_eq!((upright.width(), upright.height()), (40, 10));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn wide_images_are_scaled_proportionally() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4000, 1000));
        let out = limit_width(img, 2000);
        assert_eq!((out.width(), out.height()), (2000, 500));
    }

    #[test]
    fn narrow_images_are_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(800, 3000));
        let out = limit_width(img, 2000);
        assert_eq!((out.width(), out.height()), (800, 3000));
    }
}
