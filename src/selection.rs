//! Image selection: the ordered list of source images that becomes the PDF.
//!
//! Two ways to fill an [`ImageList`]:
//!
//! * [`ImageList::add_files`] — individual files. Non-image entries are
//!   dropped silently and the rest are **appended** in the order given.
//! * [`ImageList::select_folder`] — a whole directory tree. Entries are
//!   sorted by relative path with numeric-aware comparison and **replace**
//!   the current list; a folder with no images is rejected before anything
//!   changes.
//!
//! The list order is the page order. It can be changed with
//! [`ImageList::move_item`] or live, while dragging, through a
//! [`DragSession`].

use crate::error::Img2PdfError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const DEFAULT_FOLDER_LABEL: &str = "Selected folder";

/// Process-unique identifier of a selected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where the bytes of a source file live.
#[derive(Debug, Clone)]
pub enum SourceData {
    /// On disk; read when the image is processed.
    Path(PathBuf),
    /// Already in memory (drop events, tests, embedding applications).
    Memory(Arc<[u8]>),
}

/// A candidate file with its name, size and declared MIME type.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    /// `<folder>/<sub>/<file>` for folder selections.
    pub relative_path: Option<String>,
    pub size: u64,
    /// MIME type derived from the extension (or sniffed for in-memory data).
    pub mime: Option<String>,
    pub data: SourceData,
}

impl SourceFile {
    /// Describe a file on disk. Fails when its metadata cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            mime: mime_for_name(&name).map(str::to_string),
            name,
            relative_path: None,
            size: meta.len(),
            data: SourceData::Path(path.to_path_buf()),
        })
    }

    /// Wrap in-memory bytes. The MIME type comes from the name's extension,
    /// falling back to sniffing the magic bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        let mime = mime_for_name(&name)
            .or_else(|| image::guess_format(&bytes).ok().map(|f| f.to_mime_type()))
            .map(str::to_string);
        Self {
            name,
            relative_path: None,
            size: bytes.len() as u64,
            mime,
            data: SourceData::Memory(bytes),
        }
    }

    /// Override the declared MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn with_relative_path(mut self, rel: impl Into<String>) -> Self {
        self.relative_path = Some(rel.into());
        self
    }

    /// Whether the declared MIME type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.mime
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }

    /// Read the full contents.
    pub fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match &self.data {
            SourceData::Path(p) => Ok(std::fs::read(p)?.into()),
            SourceData::Memory(b) => Ok(Arc::clone(b)),
        }
    }

    fn sort_key(&self) -> &str {
        self.relative_path.as_deref().unwrap_or(&self.name)
    }
}

/// MIME type implied by a file name's extension, if it names an image format.
pub fn mime_for_name(name: &str) -> Option<&'static str> {
    ImageFormat::from_path(name).ok().map(|f| f.to_mime_type())
}

/// One entry of the ordered list.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub id: ImageId,
    pub source: SourceFile,
}

impl SelectedImage {
    pub fn new(source: SourceFile) -> Self {
        Self {
            id: ImageId::new(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Size in mebibytes, for list display.
    pub fn size_mb(&self) -> f64 {
        self.source.size as f64 / 1024.0 / 1024.0
    }
}

/// The ordered sequence of images; position `i` becomes page `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct ImageList {
    items: Vec<SelectedImage>,
    folder_label: Option<String>,
}

impl ImageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append image candidates, silently dropping non-images.
    ///
    /// Returns the number of entries appended.
    pub fn add_files<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let before = self.items.len();
        for file in candidates {
            if !file.is_image() {
                debug!("Skipping non-image '{}' ({:?})", file.name, file.mime);
                continue;
            }
            self.items.push(SelectedImage::new(file));
        }
        self.items.len() - before
    }

    /// Append files on disk. Paths whose metadata cannot be read are skipped
    /// with a warning, like non-image files.
    pub fn add_paths<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = paths
            .into_iter()
            .filter_map(|p| match SourceFile::from_path(p.as_ref()) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("Skipping '{}': {}", p.as_ref().display(), e);
                    None
                }
            })
            .collect::<Vec<_>>();
        self.add_files(files)
    }

    /// Replace the list with every image under `dir`, sorted by relative path.
    ///
    /// Relative paths start with the folder's own name, which becomes the
    /// [`folder_label`](Self::folder_label).
    ///
    /// # Errors
    /// * [`Img2PdfError::FolderNotFound`] — `dir` is not a directory
    /// * [`Img2PdfError::FolderRead`] — `dir` itself cannot be listed
    /// * [`Img2PdfError::NoImagesFound`] — nothing under `dir` is an image;
    ///   the current list is left untouched
    pub fn select_folder(&mut self, dir: impl AsRef<Path>) -> Result<usize, Img2PdfError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Img2PdfError::FolderNotFound {
                path: dir.to_path_buf(),
            });
        }
        let root = folder_name(dir);

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    return Err(Img2PdfError::FolderRead {
                        path: dir.to_path_buf(),
                        detail: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry in '{}': {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(dir) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let mut relative = root.clone();
            for part in rel.components() {
                relative.push('/');
                relative.push_str(&part.as_os_str().to_string_lossy());
            }
            match SourceFile::from_path(entry.path()) {
                Ok(f) => files.push(f.with_relative_path(relative)),
                Err(e) => warn!("Skipping '{}': {}", entry.path().display(), e),
            }
        }

        let count = self.select_folder_entries(files).map_err(|e| match e {
            Img2PdfError::NoImagesFound { .. } => Img2PdfError::NoImagesFound {
                folder: dir.display().to_string(),
            },
            other => other,
        })?;
        info!("Selected {} images from '{}'", count, dir.display());
        Ok(count)
    }

    /// Folder selection from caller-supplied entries carrying relative paths.
    pub fn select_folder_entries<I>(&mut self, entries: I) -> Result<usize, Img2PdfError>
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let mut valid: Vec<SourceFile> = entries.into_iter().filter(SourceFile::is_image).collect();
        if valid.is_empty() {
            return Err(Img2PdfError::NoImagesFound {
                folder: DEFAULT_FOLDER_LABEL.to_string(),
            });
        }

        valid.sort_by(|a, b| natural_cmp(a.sort_key(), b.sort_key()));

        let label = valid[0]
            .relative_path
            .as_deref()
            .and_then(|p| p.split('/').next())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FOLDER_LABEL)
            .to_string();

        self.items = valid.into_iter().map(SelectedImage::new).collect();
        self.folder_label = Some(label);
        Ok(self.items.len())
    }

    /// Remove the entry with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: ImageId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    pub fn remove_at(&mut self, index: usize) -> Option<SelectedImage> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Clear every entry and the folder label.
    pub fn reset(&mut self) {
        self.items.clear();
        self.folder_label = None;
    }

    /// Move the entry at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
        }
        true
    }

    /// Start dragging the entry at `index`.
    pub fn begin_drag(&self, index: usize) -> Option<DragSession> {
        self.items.get(index).map(|i| DragSession {
            id: i.id,
            index,
        })
    }

    /// The dragged entry passes over `index`: move it there immediately.
    ///
    /// Returns `true` when the list changed.
    pub fn drag_over(&mut self, session: &mut DragSession, index: usize) -> bool {
        if session.index == index {
            return false;
        }
        if self.items.get(session.index).map(|i| i.id) != Some(session.id) {
            // list changed under the drag; re-locate the entry
            match self.position(session.id) {
                Some(pos) => session.index = pos,
                None => return false,
            }
        }
        if self.move_item(session.index, index) {
            session.index = index;
            true
        } else {
            false
        }
    }

    pub fn position(&self, id: ImageId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&SelectedImage> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedImage> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<ImageId> {
        self.items.iter().map(|i| i.id).collect()
    }

    pub fn as_slice(&self) -> &[SelectedImage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display name of the selected folder, if the list came from one.
    pub fn folder_label(&self) -> Option<&str> {
        self.folder_label.as_deref()
    }
}

/// An in-progress drag of one list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    id: ImageId,
    index: usize,
}

impl DragSession {
    /// Current index of the dragged entry.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Finish the drag, returning the entry's final index.
    pub fn end(self) -> usize {
        self.index
    }
}

/// Last component of `dir` once `.` and `..` are resolved; only a
/// filesystem root falls back to the default label.
fn folder_name(dir: &Path) -> String {
    let resolved = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FOLDER_LABEL.to_string())
}

/// Case-insensitive comparison that orders digit runs by numeric value,
/// so `img2.png` sorts before `img10.png`.
///
/// Strings that only differ in case or leading zeros fall back to plain
/// byte order to keep the sort total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        let (ca, cb) = match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => (ca, cb),
        };

        let ord = if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let na = take_digits(&mut ai);
            let nb = take_digits(&mut bi);
            cmp_digit_runs(&na, &nb)
        } else {
            ai.next();
            bi.next();
            ca.to_lowercase().cmp(cb.to_lowercase())
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.cmp(b)
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(&c) = it.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        it.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
