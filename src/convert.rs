//! Eager (whole-document) conversion entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for the document, then return
//! it. Use [`crate::stream::convert_stream`] instead to observe each image as
//! it is processed. Both share [`run_conversion`], so their output is
//! identical for the same input.
//!
//! Images are processed strictly one after another in list order: read,
//! decode, re-encode (inside `spawn_blocking`), place and append a page.
//! A failed image is logged, reported and left out; only run-level problems
//! (nothing selected, nothing converted, cancellation, serialisation) are
//! returned as `Err`.

use crate::config::ConversionConfig;
use crate::error::{Img2PdfError, ItemError};
use crate::output::{
    output_file_name, unix_millis, ConversionOutput, ConversionStats, PageResult, PdfOutput,
};
use crate::pipeline::document::PdfAssembler;
use crate::pipeline::encode::{EncodeSurface, EncodedImage};
use crate::pipeline::layout::place_image;
use crate::pipeline;
use crate::progress::{percent, ProgressCallback};
use crate::run::CancelToken;
use crate::selection::{ImageList, SelectedImage, SourceFile};
use crate::stream::{ConversionEvent, EventSender};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert the selected images into one PDF.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some images were skipped
/// (check `output.stats.failed_items`).
///
/// # Errors
/// Returns `Err(Img2PdfError)` only for fatal errors:
/// - the list is empty
/// - every image failed
/// - the document could not be serialised
///
/// # Example
/// ```rust,no_run
/// use img2pdf::{convert, ConversionConfig, ImageList};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut list = ImageList::new();
/// list.add_paths(["cover.jpg", "page1.png", "page2.png"]);
/// let output = convert(&list, &ConversionConfig::default()).await?;
/// let path = output.pdf.save_to(".")?;
/// eprintln!("{} pages → {}", output.stats.page_count, path.display());
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    images: &ImageList,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError> {
    convert_with_cancel(images, config, &CancelToken::new()).await
}

/// [`convert`] with cooperative cancellation.
///
/// A cancelled run returns [`Img2PdfError::Cancelled`] and no document.
pub async fn convert_with_cancel(
    images: &ImageList,
    config: &ConversionConfig,
    cancel: &CancelToken,
) -> Result<ConversionOutput, Img2PdfError> {
    run_conversion(
        images.as_slice().to_vec(),
        images.folder_label().map(str::to_string),
        config,
        cancel,
        None,
    )
    .await
}

/// Convert and write the PDF to `output_path` (a directory or a file path).
///
/// Returns the path written and the run statistics.
pub async fn convert_to_file(
    images: &ImageList,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionStats), Img2PdfError> {
    let output = convert(images, config).await?;
    let dest = output_path.as_ref().to_path_buf();
    let pdf = output.pdf;
    let path = tokio::task::spawn_blocking(move || pdf.save_to(dest))
        .await
        .map_err(|e| Img2PdfError::Internal(format!("write task failed: {e}")))??;
    Ok((path, output.stats))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    images: &ImageList,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(images, config))
}

// ── Run driver ───────────────────────────────────────────────────────────

/// Fans run events out to the progress callback and, for streaming runs,
/// the event channel.
struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
    events: Option<&'a EventSender>,
}

impl Reporter<'_> {
    fn emit(&self, event: ConversionEvent) {
        if let Some(tx) = self.events {
            // a dropped receiver only means nobody is listening any more
            let _ = tx.send(Ok(event));
        }
    }

    fn started(&self, total: usize) {
        if let Some(cb) = self.callback {
            cb.on_conversion_start(total);
        }
        self.emit(ConversionEvent::Started { total });
    }

    fn item_started(&self, item: usize, total: usize, name: &str) {
        if let Some(cb) = self.callback {
            cb.on_item_start(item, total, name);
        }
        self.emit(ConversionEvent::ItemStarted {
            item,
            total,
            name: name.to_string(),
        });
    }

    fn item_finished(&self, result: &PageResult, total: usize) {
        match (&result.error, result.page_number, result.placement) {
            (None, Some(page_number), Some(placement)) => {
                if let Some(cb) = self.callback {
                    cb.on_item_complete(result.item, total, page_number);
                }
                self.emit(ConversionEvent::ItemCompleted {
                    item: result.item,
                    total,
                    page_number,
                    placement,
                });
            }
            (Some(error), _, _) => {
                if let Some(cb) = self.callback {
                    cb.on_item_error(result.item, total, &error.to_string());
                }
                self.emit(ConversionEvent::ItemFailed {
                    item: result.item,
                    total,
                    error: error.clone(),
                });
            }
            _ => {}
        }
    }

    fn progress(&self, done: usize, total: usize) {
        let percent = percent(done, total);
        if let Some(cb) = self.callback {
            cb.on_progress(percent);
        }
        self.emit(ConversionEvent::Progress {
            done,
            total,
            percent,
        });
    }

    fn assembling(&self, pages: usize) {
        if let Some(cb) = self.callback {
            cb.on_assembling(pages);
        }
        self.emit(ConversionEvent::Assembling { pages });
    }

    fn failed(&self, error: &Img2PdfError) {
        if let Some(cb) = self.callback {
            cb.on_conversion_failed(&error.to_string());
        }
    }
}

/// Run one conversion over a fixed snapshot of images.
///
/// Shared by the eager and streaming APIs. Fatal errors are reported to the
/// progress callback here; the stream forwards the returned `Err` itself.
pub(crate) async fn run_conversion(
    images: Vec<SelectedImage>,
    folder_label: Option<String>,
    config: &ConversionConfig,
    cancel: &CancelToken,
    events: Option<&EventSender>,
) -> Result<ConversionOutput, Img2PdfError> {
    if images.is_empty() {
        return Err(Img2PdfError::EmptySelection);
    }

    let reporter = Reporter {
        callback: config.progress_callback.as_ref(),
        events,
    };
    let result = drive(images, folder_label, config, cancel, &reporter).await;
    if let Err(ref e) = result {
        warn!("Conversion failed: {}", e);
        reporter.failed(e);
    }
    result
}

async fn drive(
    images: Vec<SelectedImage>,
    folder_label: Option<String>,
    config: &ConversionConfig,
    cancel: &CancelToken,
    reporter: &Reporter<'_>,
) -> Result<ConversionOutput, Img2PdfError> {
    let run_start = Instant::now();
    let total = images.len();
    let settings = config.settings;
    let page = settings.page_dimensions();
    let quality = settings.jpeg_quality();
    info!(
        "Starting conversion: {} images, {:?} {:?} ({:.2} × {:.2} pt), quality {}",
        total, settings.page_size, settings.orientation, page.0, page.1, quality
    );
    reporter.started(total);

    let mut assembler = PdfAssembler::new();
    let mut surface = Some(EncodeSurface::new());
    let mut pages: Vec<PageResult> = Vec::with_capacity(total);

    for (idx, image) in images.iter().enumerate() {
        let item = idx + 1;
        let cancelled = || Img2PdfError::Cancelled {
            completed: idx,
            total,
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        reporter.item_started(item, total, image.name());
        let item_start = Instant::now();

        let work = prepare_item(
            item,
            image.source.clone(),
            config,
            quality,
            surface.take().unwrap_or_default(),
        );
        let (prepared, returned) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            r = work => r,
        };
        // a timed-out or panicked worker keeps its surface; start a fresh one
        surface = Some(returned.unwrap_or_default());

        let mut result = PageResult {
            item,
            id: image.id,
            name: image.name().to_string(),
            page_number: None,
            placement: None,
            embedded: None,
            encoded_bytes: 0,
            error: None,
            duration_ms: 0,
        };

        match prepared.and_then(|encoded| {
            let source = encoded.source;
            let bytes = encoded.data.len();
            assembler
                .embed(encoded)
                .map(|handle| (handle, source, bytes))
                .map_err(|detail| ItemError::EmbedFailed {
                    item,
                    name: image.name().to_string(),
                    detail,
                })
        }) {
            Ok((handle, source, bytes)) => {
                let placement = place_image(handle.width, handle.height, page);
                let page_number = assembler.add_page(&handle, &placement)?;
                debug!(
                    "Image {} → page {}: {}x{} px at scale {:.4}, origin ({:.2}, {:.2})",
                    item,
                    page_number,
                    handle.width,
                    handle.height,
                    placement.scale,
                    placement.x,
                    placement.y
                );
                result.page_number = Some(page_number);
                result.placement = Some(placement);
                result.embedded = Some(source);
                result.encoded_bytes = bytes;
            }
            Err(e) => {
                warn!("Skipping image: {}", e);
                result.error = Some(e);
            }
        }
        result.duration_ms = item_start.elapsed().as_millis() as u64;

        let failed = result.error.is_some();
        reporter.item_finished(&result, total);
        pages.push(result);
        reporter.progress(item, total);

        if failed && !pause(config.error_pause_ms, cancel).await {
            return Err(cancelled());
        }
        if item < total && !pause(config.pacing_ms, cancel).await {
            return Err(Img2PdfError::Cancelled {
                completed: item,
                total,
            });
        }
    }

    let page_count = assembler.page_count();
    let failed_items = pages.iter().filter(|p| !p.is_ok()).count();
    if page_count == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Img2PdfError::NoPagesProduced { total, first_error });
    }

    reporter.assembling(page_count);
    let bytes = tokio::task::spawn_blocking(move || assembler.finish())
        .await
        .map_err(|e| Img2PdfError::Internal(format!("document task failed: {e}")))??;

    let file_name = output_file_name(folder_label.as_deref(), unix_millis());
    let stats = ConversionStats {
        total_items: total,
        converted_items: page_count,
        failed_items,
        page_count,
        output_bytes: bytes.len(),
        total_duration_ms: run_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {}/{} images, {} bytes, {}ms → {}",
        page_count, total, stats.output_bytes, stats.total_duration_ms, file_name
    );
    if let Some(cb) = reporter.callback {
        cb.on_conversion_complete(total, page_count);
    }

    Ok(ConversionOutput {
        pdf: PdfOutput { file_name, bytes },
        pages,
        stats,
    })
}

/// Decode and encode one image off the async runtime.
///
/// The surface comes back alongside the result unless the worker timed out
/// or panicked.
async fn prepare_item(
    item: usize,
    source: SourceFile,
    config: &ConversionConfig,
    quality: u8,
    mut surface: EncodeSurface,
) -> (Result<EncodedImage, ItemError>, Option<EncodeSurface>) {
    let name = source.name.clone();
    let max_width = config.max_image_width;
    let mode = config.embed_mode;
    let secs = config.item_timeout_secs;

    let task = tokio::task::spawn_blocking(move || {
        let result =
            pipeline::prepare_image(item, &source, max_width, quality, mode, &mut surface);
        (result, surface)
    });

    match tokio::time::timeout(Duration::from_secs(secs), task).await {
        Ok(Ok((result, surface))) => (result, Some(surface)),
        Ok(Err(join_err)) => (
            Err(ItemError::DecodeFailed {
                item,
                name,
                detail: format!("worker failed: {join_err}"),
            }),
            None,
        ),
        Err(_) => (Err(ItemError::Timeout { item, name, secs }), None),
    }
}

/// Sleep for `ms`, returning `false` if the run was cancelled meanwhile.
async fn pause(ms: u64, cancel: &CancelToken) -> bool {
    if ms == 0 {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn png(name: &str, w: u32, h: u32) -> SourceFile {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        SourceFile::from_bytes(name, buf)
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ConversionProgressCallback for Recorder {
        fn on_conversion_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_item_complete(&self, item: usize, _total: usize, page: usize) {
            self.0.lock().unwrap().push(format!("ok {item}->{page}"));
        }
        fn on_item_error(&self, item: usize, _total: usize, _error: &str) {
            self.0.lock().unwrap().push(format!("err {item}"));
        }
        fn on_conversion_complete(&self, total: usize, ok: usize) {
            self.0.lock().unwrap().push(format!("done {ok}/{total}"));
        }
        fn on_conversion_failed(&self, _error: &str) {
            self.0.lock().unwrap().push("failed".into());
        }
    }

    fn config_with(recorder: &Arc<Recorder>) -> ConversionConfig {
        ConversionConfig::builder()
            .pacing_ms(0)
            .error_pause_ms(0)
            .progress_callback(Arc::clone(recorder) as ProgressCallback)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_without_events() {
        let recorder = Arc::new(Recorder::default());
        let err = convert(&ImageList::new(), &config_with(&recorder))
            .await
            .unwrap_err();
        assert!(matches!(err, Img2PdfError::EmptySelection));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skipped_images_shift_page_numbers() {
        let recorder = Arc::new(Recorder::default());
        let mut list = ImageList::new();
        list.add_files([
            png("one.png", 10, 10),
            SourceFile::from_bytes("two.png", b"broken".to_vec()),
            png("three.png", 10, 10),
        ]);

        let out = convert(&list, &config_with(&recorder)).await.unwrap();
        assert_eq!(out.stats.page_count, 2);
        assert_eq!(out.stats.failed_items, 1);
        assert_eq!(out.pages.len(), 3);
        assert_eq!(out.pages[2].page_number, Some(2));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["start 3", "ok 1->1", "err 2", "ok 3->2", "done 2/3"]
        );
    }

    #[tokio::test]
    async fn all_failures_produce_no_document() {
        let recorder = Arc::new(Recorder::default());
        let mut list = ImageList::new();
        list.add_files([SourceFile::from_bytes("x.png", b"nope".to_vec())]);

        let err = convert(&list, &config_with(&recorder)).await.unwrap_err();
        match err {
            Img2PdfError::NoPagesProduced { total, first_error } => {
                assert_eq!(total, 1);
                assert!(first_error.contains("x.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(recorder.0.lock().unwrap().last().unwrap(), "failed");
    }

    #[tokio::test]
    async fn loose_files_get_timestamped_name() {
        let mut list = ImageList::new();
        list.add_files([png("a.png", 4, 4)]);
        let config = ConversionConfig::builder().pacing_ms(0).build().unwrap();
        let out = convert(&list, &config).await.unwrap();
        assert!(out.pdf.file_name.starts_with("images_"));
        assert!(out.pdf.file_name.ends_with(".pdf"));
        assert!(out.pdf.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn convert_to_file_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut list = ImageList::new();
        list.add_files([png("a.png", 4, 4), png("b.png", 4, 4)]);
        let config = ConversionConfig::builder().pacing_ms(0).build().unwrap();

        let (path, stats) = convert_to_file(&list, dir.path(), &config).await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(stats.page_count, 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, stats.output_bytes);
    }

    #[test]
    fn convert_sync_runs_without_a_runtime() {
        let mut list = ImageList::new();
        list.add_files([png("a.png", 4, 4)]);
        let config = ConversionConfig::builder().pacing_ms(0).build().unwrap();
        let out = convert_sync(&list, &config).unwrap();
        assert_eq!(out.stats.page_count, 1);
    }
}
