//! PDF assembly on top of `lopdf`.
//!
//! Each image becomes one image XObject and one page whose content stream
//! draws it with a single `cm` transform:
//!
//! ```text
//! q  <w> 0 0 <h> <x> <y> cm  /Im<n> Do  Q
//! ```
//!
//! The page tree object id is reserved up front so pages can point at their
//! parent as they are added; the tree itself is written in [`PdfAssembler::finish`].

use crate::error::Img2PdfError;
use crate::pipeline::encode::{EncodedImage, StreamFilter};
use crate::pipeline::layout::PagePlacement;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

const PRODUCER: &str = concat!("img2pdf ", env!("CARGO_PKG_VERSION"));

/// An image registered with the document, ready to be drawn on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    id: ObjectId,
    name: String,
    pub width: u32,
    pub height: u32,
}

/// In-memory document that grows one page per image.
pub struct PdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    image_count: usize,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfAssembler {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            image_count: 0,
        }
    }

    /// Register encoded bytes as an image XObject.
    ///
    /// Fails for zero-sized images, which cannot be placed on a page.
    pub fn embed(&mut self, image: EncodedImage) -> Result<ImageHandle, String> {
        if image.width == 0 || image.height == 0 {
            return Err(format!("image has zero size ({}x{})", image.width, image.height));
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => image.color.pdf_name(),
            "BitsPerComponent" => 8,
        };
        match image.filter {
            StreamFilter::Dct => dict.set("Filter", "DCTDecode"),
            StreamFilter::FlatePng => {
                dict.set("Filter", "FlateDecode");
                dict.set(
                    "DecodeParms",
                    dictionary! {
                        "Predictor" => 15,
                        "Colors" => image.color.components() as i64,
                        "BitsPerComponent" => 8,
                        "Columns" => image.width as i64,
                    },
                );
            }
        }

        let bytes = image.data.len();
        let stream = Stream::new(dict, image.data).with_compression(false);
        let id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        debug!(
            "Embedded {} ({}x{}, {} bytes, {:?})",
            name, image.width, image.height, bytes, image.filter
        );

        Ok(ImageHandle {
            id,
            name,
            width: image.width,
            height: image.height,
        })
    }

    /// Append a page of the placement's page size showing `image`.
    ///
    /// Returns the 1-indexed page number.
    pub fn add_page(
        &mut self,
        image: &ImageHandle,
        placement: &PagePlacement,
    ) -> Result<usize, lopdf::Error> {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(placement.height),
                        Object::Real(placement.x),
                        Object::Real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image.name.clone().into_bytes())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(placement.page_width),
                Object::Real(placement.page_height),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    image.name.as_str() => image.id,
                },
            },
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        Ok(self.page_ids.len())
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Write the page tree, catalog and info dictionary and serialise.
    pub fn finish(mut self) -> Result<Vec<u8>, Img2PdfError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| Img2PdfError::DocumentFailed(e.to_string()))?;
        debug!("Serialised {} pages → {} bytes", self.page_ids.len(), buf.len());
        Ok(buf)
    }
}
