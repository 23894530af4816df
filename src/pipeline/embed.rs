//! Original-bytes embedding: place a JPEG or PNG in the document without
//! decoding it.
//!
//! * JPEG — the file already is a `DCTDecode` stream; only the frame header
//!   is read for dimensions and component count.
//! * PNG — the concatenated IDAT chunks are a zlib stream that PDF's
//!   `FlateDecode` understands, and PNG's per-row filters map onto
//!   `/Predictor 15`. Only 8-bit, non-interlaced, gray or RGB images qualify;
//!   alpha, palettes and 16-bit samples need the re-encode path.
//!
//! This is the fallback when re-encoding fails, and the first choice under
//! [`crate::config::EmbedMode::PreferOriginal`].

use crate::pipeline::encode::{EmbedSource, EncodedImage, PdfColorSpace, StreamFilter};
use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Why the original bytes cannot be embedded directly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PassthroughError {
    /// Neither JPEG nor PNG.
    #[error("format cannot be embedded without re-encoding")]
    UnsupportedFormat,

    /// A JPEG/PNG variant PDF cannot show as-is.
    #[error("unsupported {format} variant: {detail}")]
    UnsupportedVariant { format: &'static str, detail: String },

    /// Truncated or inconsistent header data.
    #[error("malformed {format}: {detail}")]
    Malformed { format: &'static str, detail: String },
}

/// Embed `bytes` as they are, if their format allows it.
pub fn embed_original(bytes: &[u8]) -> Result<EncodedImage, PassthroughError> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        jpeg_passthrough(bytes)
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        png_passthrough(bytes)
    } else {
        Err(PassthroughError::UnsupportedFormat)
    }
}

fn jpeg_passthrough(bytes: &[u8]) -> Result<EncodedImage, PassthroughError> {
    let frame = read_jpeg_frame(bytes)?;
    let color = match frame.components {
        1 => PdfColorSpace::Gray,
        3 => PdfColorSpace::Rgb,
        n => {
            return Err(PassthroughError::UnsupportedVariant {
                format: "JPEG",
                detail: format!("{n} colour components"),
            })
        }
    };
    if frame.precision != 8 {
        return Err(PassthroughError::UnsupportedVariant {
            format: "JPEG",
            detail: format!("{}-bit samples", frame.precision),
        });
    }
    Ok(EncodedImage {
        data: bytes.to_vec(),
        width: frame.width as u32,
        height: frame.height as u32,
        color,
        filter: StreamFilter::Dct,
        source: EmbedSource::Original,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    precision: u8,
    width: u16,
    height: u16,
    components: u8,
}

/// Walk the marker segments up to the first start-of-frame.
fn read_jpeg_frame(bytes: &[u8]) -> Result<JpegFrame, PassthroughError> {
    let malformed = |detail: &str| PassthroughError::Malformed {
        format: "JPEG",
        detail: detail.to_string(),
    };

    let mut pos = 2;
    loop {
        // markers may be padded with any number of 0xFF bytes
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&0xFF) {
            return Err(malformed("expected marker"));
        }
        let marker = *bytes.get(pos + 1).ok_or_else(|| malformed("truncated marker"))?;
        pos += 2;

        match marker {
            // standalone markers without a length field
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return Err(malformed("no frame header before scan data")),
            _ => {}
        }

        let len = bytes
            .get(pos..pos + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| malformed("truncated segment length"))?;
        if len < 2 {
            return Err(malformed("segment length below 2"));
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let seg = bytes
                .get(pos + 2..pos + len)
                .ok_or_else(|| malformed("truncated frame header"))?;
            if seg.len() < 6 {
                return Err(malformed("short frame header"));
            }
            let frame = JpegFrame {
                precision: seg[0],
                height: u16::from_be_bytes([seg[1], seg[2]]),
                width: u16::from_be_bytes([seg[3], seg[4]]),
                components: seg[5],
            };
            if frame.width == 0 || frame.height == 0 {
                return Err(malformed("zero image dimension"));
            }
            if matches!(marker, 0xC3 | 0xC7 | 0xCB | 0xCF) {
                return Err(PassthroughError::UnsupportedVariant {
                    format: "JPEG",
                    detail: "lossless coding".into(),
                });
            }
            return Ok(frame);
        }
        pos += len;
    }
}

fn png_passthrough(bytes: &[u8]) -> Result<EncodedImage, PassthroughError> {
    let malformed = |detail: String| PassthroughError::Malformed {
        format: "PNG",
        detail,
    };
    let variant = |detail: String| PassthroughError::UnsupportedVariant {
        format: "PNG",
        detail,
    };

    let mut pos = PNG_SIGNATURE.len();
    let mut header: Option<(u32, u32, u8, u8, u8)> = None;
    let mut idat = Vec::new();

    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data = bytes
            .get(pos + 8..pos + 8 + len)
            .ok_or_else(|| malformed(format!("truncated {} chunk", String::from_utf8_lossy(kind))))?;

        match kind {
            b"IHDR" => {
                if data.len() != 13 {
                    return Err(malformed("IHDR must be 13 bytes".into()));
                }
                let w = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                let h = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
                header = Some((w, h, data[8], data[9], data[12]));
            }
            b"IDAT" => idat.extend_from_slice(data),
            b"tRNS" => return Err(variant("transparency chunk".into())),
            b"IEND" => break,
            _ => {}
        }
        // length + type + data + crc
        pos += 12 + len;
    }

    let (width, height, depth, color_type, interlace) =
        header.ok_or_else(|| malformed("missing IHDR".into()))?;
    if width == 0 || height == 0 {
        return Err(malformed("zero image dimension".into()));
    }
    if idat.is_empty() {
        return Err(malformed("no image data".into()));
    }
    if depth != 8 {
        return Err(variant(format!("{depth}-bit samples")));
    }
    if interlace != 0 {
        return Err(variant("interlaced".into()));
    }
    let color = match color_type {
        0 => PdfColorSpace::Gray,
        2 => PdfColorSpace::Rgb,
        3 => return Err(variant("palette colour".into())),
        4 | 6 => return Err(variant("alpha channel".into())),
        other => return Err(malformed(format!("colour type {other}"))),
    };

    Ok(EncodedImage {
        data: idat,
        width,
        height,
        color,
        filter: StreamFilter::FlatePng,
        source: EmbedSource::Original,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn jpeg_header_is_read() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(33, 17, Rgb([1, 2, 3]))),
            ImageFormat::Jpeg,
        );
        let out = embed_original(&bytes).unwrap();
        assert_eq!((out.width, out.height), (33, 17));
        assert_eq!(out.color, PdfColorSpace::Rgb);
        assert_eq!(out.filter, StreamFilter::Dct);
        assert_eq!(out.source, EmbedSource::Original);
        assert_eq!(out.data, bytes);
    }

    #[test]
    fn gray_jpeg_is_device_gray() {
        let bytes = encode(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 6, Luma([9]))),
            ImageFormat::Jpeg,
        );
        assert_eq!(embed_original(&bytes).unwrap().color, PdfColorSpace::Gray);
    }

    #[test]
    fn rgb_png_passes_through() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([0, 128, 255]))),
            ImageFormat::Png,
        );
        let out = embed_original(&bytes).unwrap();
        assert_eq!((out.width, out.height), (20, 10));
        assert_eq!(out.color, PdfColorSpace::Rgb);
        assert_eq!(out.filter, StreamFilter::FlatePng);
        assert!(!out.data.is_empty());
    }

    #[test]
    fn png_with_alpha_needs_reencoding() {
        let bytes = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 10]))),
            ImageFormat::Png,
        );
        assert!(matches!(
            embed_original(&bytes),
            Err(PassthroughError::UnsupportedVariant { format: "PNG", .. })
        ));
    }

    #[test]
    fn other_formats_are_rejected() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            ImageFormat::Bmp,
        );
        assert!(matches!(
            embed_original(&bytes),
            Err(PassthroughError::UnsupportedFormat)
        ));
    }

    #[test]
    fn truncated_jpeg_is_malformed() {
        assert!(matches!(
            embed_original(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Err(PassthroughError::Malformed { .. })
        ));
    }
}
