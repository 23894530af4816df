//! Streaming conversion API: emit events as each image is processed.
//!
//! Unlike the eager [`crate::convert::convert`] which returns only once the
//! document exists, [`convert_stream`] yields a [`ConversionEvent`] after
//! every step so callers can drive a progress display or log as they go.
//! The last item is either `Ok(ConversionEvent::Finished(..))` or the fatal
//! `Err(Img2PdfError)` that ended the run.
//!
//! The run executes on a spawned tokio task. Dropping the stream does not
//! stop it; cancel through the [`CancelToken`] instead.

use crate::config::ConversionConfig;
use crate::convert::run_conversion;
use crate::error::{Img2PdfError, ItemError};
use crate::output::ConversionOutput;
use crate::pipeline::layout::PagePlacement;
use crate::run::{CancelToken, RunGuard};
use crate::selection::ImageList;
use serde::Serialize;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::info;

/// One step of a run, in the order it happened.
#[derive(Debug, Clone, Serialize)]
pub enum ConversionEvent {
    /// The run accepted `total` images.
    Started { total: usize },
    /// Image `item` of `total` is being decoded.
    ItemStarted {
        item: usize,
        total: usize,
        name: String,
    },
    /// Image `item` became page `page_number`.
    ItemCompleted {
        item: usize,
        total: usize,
        page_number: usize,
        placement: PagePlacement,
    },
    /// Image `item` was skipped.
    ItemFailed {
        item: usize,
        total: usize,
        error: ItemError,
    },
    /// Emitted after every image, successful or not.
    Progress {
        done: usize,
        total: usize,
        percent: u8,
    },
    /// All images were attempted; `pages` pages are being serialised.
    Assembling { pages: usize },
    /// The document is ready.
    Finished(Box<ConversionOutput>),
}

pub(crate) type EventSender = mpsc::UnboundedSender<Result<ConversionEvent, Img2PdfError>>;

/// A boxed stream of conversion events.
pub type ConversionEventStream =
    Pin<Box<dyn Stream<Item = Result<ConversionEvent, Img2PdfError>> + Send>>;

/// Convert the list, streaming events as the run progresses.
///
/// The list and configuration are captured when this is called; later
/// edits do not affect the run.
///
/// # Example
/// ```rust,no_run
/// use img2pdf::{convert_stream, CancelToken, ConversionConfig, ConversionEvent, ImageList};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut list = ImageList::new();
/// list.select_folder("scans")?;
/// let mut events = convert_stream(&list, &ConversionConfig::default(), CancelToken::new());
/// while let Some(event) = events.next().await {
///     match event? {
///         ConversionEvent::Progress { percent, .. } => eprintln!("{percent}%"),
///         ConversionEvent::Finished(out) => {
///             out.pdf.save_to(".")?;
///         }
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream(
    images: &ImageList,
    config: &ConversionConfig,
    cancel: CancelToken,
) -> ConversionEventStream {
    spawn_stream(images, config, cancel, None)
}

/// Spawn the run; `guard` is held by the task until the run ends.
pub(crate) fn spawn_stream(
    images: &ImageList,
    config: &ConversionConfig,
    cancel: CancelToken,
    guard: Option<RunGuard>,
) -> ConversionEventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let items = images.as_slice().to_vec();
    let folder_label = images.folder_label().map(str::to_string);
    let config = config.clone();

    tokio::spawn(async move {
        let _guard = guard;
        let result = run_conversion(items, folder_label, &config, &cancel, Some(&tx)).await;
        let last = result.map(|output| ConversionEvent::Finished(Box::new(output)));
        if tx.send(last).is_err() {
            info!("Event stream dropped before the run finished");
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SourceFile;
    use futures::StreamExt;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(name: &str, w: u32, h: u32) -> SourceFile {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        SourceFile::from_bytes(name, buf)
    }

    fn fast_config() -> ConversionConfig {
        ConversionConfig::builder()
            .pacing_ms(0)
            .error_pause_ms(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn events_arrive_in_run_order() {
        let mut list = ImageList::new();
        list.add_files([png("a.png", 10, 20), png("b.png", 20, 10)]);

        let events: Vec<_> = convert_stream(&list, &fast_config(), CancelToken::new())
            .collect()
            .await;
        let events: Vec<ConversionEvent> = events.into_iter().map(Result::unwrap).collect();

        assert!(matches!(events.first(), Some(ConversionEvent::Started { total: 2 })));
        assert!(matches!(events.last(), Some(ConversionEvent::Finished(_))));

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ConversionEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 100]);

        let pages: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ConversionEvent::ItemCompleted { page_number, .. } => Some(*page_number),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_items_are_reported_and_skipped() {
        let mut list = ImageList::new();
        list.add_files([
            SourceFile::from_bytes("bad.png", b"garbage".to_vec()),
            png("good.png", 8, 8),
        ]);

        let events: Vec<_> = convert_stream(&list, &fast_config(), CancelToken::new())
            .collect()
            .await;
        let failed = events
            .iter()
            .filter(|e| matches!(e, Ok(ConversionEvent::ItemFailed { item: 1, .. })))
            .count();
        assert_eq!(failed, 1);
        match events.last() {
            Some(Ok(ConversionEvent::Finished(out))) => {
                assert_eq!(out.stats.page_count, 1);
                assert_eq!(out.stats.failed_items, 1);
            }
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_list_ends_with_error() {
        let events: Vec<_> = convert_stream(&ImageList::new(), &fast_config(), CancelToken::new())
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Img2PdfError::EmptySelection)));
    }

    #[tokio::test]
    async fn cancelled_before_start_produces_no_document() {
        let mut list = ImageList::new();
        list.add_files([png("a.png", 4, 4)]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let events: Vec<_> = convert_stream(&list, &fast_config(), cancel).collect().await;
        assert!(matches!(
            events.last(),
            Some(Err(Img2PdfError::Cancelled { completed: 0, total: 1 }))
        ));
        assert!(!events
            .iter()
            .any(|e| matches!(e, Ok(ConversionEvent::Finished(_)))));
    }
}
