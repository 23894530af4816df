//! Error types for the img2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2PdfError`] — **Fatal**: the run cannot produce a document at all
//!   (empty selection, folder without images, document assembly failure,
//!   another run already active). Returned as `Err(Img2PdfError)` from the
//!   top-level `convert*` functions.
//!
//! * [`ItemError`] — **Non-fatal**: a single image could not be decoded or
//!   embedded. Stored inside [`crate::output::PageResult`]; the page is
//!   omitted and the run moves on to the next image.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the img2pdf library.
///
/// Item-level failures use [`ItemError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Img2PdfError {
    // ── Selection errors ──────────────────────────────────────────────────
    /// A folder was selected but none of its files is an image.
    #[error("No image files found in '{folder}'")]
    NoImagesFound { folder: String },

    /// A conversion was requested with an empty image list.
    #[error("No images selected; add files or a folder first")]
    EmptySelection,

    /// The selected folder does not exist or is not a directory.
    #[error("Folder not found: '{path}'")]
    FolderNotFound { path: PathBuf },

    /// Walking the selected folder failed part-way.
    #[error("Failed to read folder '{path}': {detail}")]
    FolderRead { path: PathBuf, detail: String },

    // ── Run errors ────────────────────────────────────────────────────────
    /// A conversion is already running on this converter.
    #[error("A conversion is already in progress")]
    RunInProgress,

    /// The run was cancelled through its [`crate::CancelToken`].
    #[error("Conversion cancelled after {completed}/{total} images")]
    Cancelled { completed: usize, total: usize },

    /// The PDF document could not be created or serialised.
    #[error("PDF document assembly failed: {0}")]
    DocumentFailed(String),

    /// Every image failed; there is nothing to put in the document.
    #[error("All {total} images failed to convert.\nFirst error: {first_error}")]
    NoPagesProduced { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lopdf::Error> for Img2PdfError {
    fn from(e: lopdf::Error) -> Self {
        Img2PdfError::DocumentFailed(e.to_string())
    }
}

/// A non-fatal error for a single image.
///
/// `item` is the 1-indexed position of the image in the run.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The source bytes could not be read.
    #[error("Image {item} ({name}): read failed: {detail}")]
    ReadFailed {
        item: usize,
        name: String,
        detail: String,
    },

    /// Decoding (and the original-bytes fallback) failed.
    #[error("Image {item} ({name}): decode failed: {detail}")]
    DecodeFailed {
        item: usize,
        name: String,
        detail: String,
    },

    /// JPEG re-encoding failed.
    #[error("Image {item} ({name}): JPEG encoding failed: {detail}")]
    EncodeFailed {
        item: usize,
        name: String,
        detail: String,
    },

    /// The encoded bytes could not be registered with the document.
    #[error("Image {item} ({name}): embed failed: {detail}")]
    EmbedFailed {
        item: usize,
        name: String,
        detail: String,
    },

    /// Decoding took longer than the configured per-item ceiling.
    #[error("Image {item} ({name}): processing timed out after {secs}s")]
    Timeout { item: usize, name: String, secs: u64 },
}

impl ItemError {
    /// 1-indexed position of the failed image within the run.
    pub fn item(&self) -> usize {
        match self {
            ItemError::ReadFailed { item, .. }
            | ItemError::DecodeFailed { item, .. }
            | ItemError::EncodeFailed { item, .. }
            | ItemError::EmbedFailed { item, .. }
            | ItemError::Timeout { item, .. } => *item,
        }
    }
}
