//! Output types: the finished PDF, per-image results and run statistics.

use crate::error::{Img2PdfError, ItemError};
use crate::pipeline::encode::EmbedSource;
use crate::pipeline::layout::PagePlacement;
use crate::selection::ImageId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome for one selected image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in the run.
    pub item: usize,
    pub id: ImageId,
    pub name: String,
    /// 1-indexed page in the output, `None` when the image was skipped.
    pub page_number: Option<usize>,
    pub placement: Option<PagePlacement>,
    /// Whether the page shows re-encoded or original bytes.
    pub embedded: Option<EmbedSource>,
    /// Size of the image stream written into the document.
    pub encoded_bytes: usize,
    pub error: Option<ItemError>,
    pub duration_ms: u64,
}

impl PageResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_items: usize,
    pub converted_items: usize,
    pub failed_items: usize,
    pub page_count: usize,
    pub output_bytes: usize,
    pub total_duration_ms: u64,
}

/// A finished document, kept in memory until the next run replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfOutput {
    /// Suggested file name, `<folder>.pdf` or `images_<ms>.pdf`.
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl PdfOutput {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the document to `dest`.
    ///
    /// An existing directory receives `dest/<file_name>`; anything else is
    /// taken as the file path. The bytes are written to a temporary file in
    /// the same directory and renamed into place, so a reader never sees a
    /// partial PDF. Can be called any number of times.
    pub fn save_to(&self, dest: impl AsRef<Path>) -> Result<PathBuf, Img2PdfError> {
        let dest = dest.as_ref();
        let path = if dest.is_dir() {
            dest.join(&self.file_name)
        } else {
            dest.to_path_buf()
        };
        let write_err = |source: std::io::Error| Img2PdfError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        std::io::Write::write_all(&mut tmp, &self.bytes).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Complete result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub pdf: PdfOutput,
    /// One entry per selected image, in list order.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// Name for the produced document.
///
/// Folder selections use the folder's name; loose files get a timestamp.
pub fn output_file_name(folder_label: Option<&str>, now_ms: u128) -> String {
    match folder_label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => format!("{label}.pdf"),
        None => format!("images_{now_ms}.pdf"),
    }
}

/// Milliseconds since the Unix epoch, for [`output_file_name`].
pub fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
