//! Progress-callback trait for per-image conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each image.
//!
//! # Example
//!
//! ```rust
//! use img2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, item: usize, total: usize, _page: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} done", item, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Items are processed one at a time, so calls never
/// overlap within a run; the `Send + Sync` bound lets the callback be shared
/// with the task that drives the run.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first image is decoded.
    fn on_conversion_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an image is decoded.
    ///
    /// # Arguments
    /// * `item`  — 1-indexed position in the run
    /// * `total` — number of images in the run
    /// * `name`  — display name of the source file
    fn on_item_start(&self, item: usize, total: usize, name: &str) {
        let _ = (item, total, name);
    }

    /// Called when an image has been placed on a page.
    ///
    /// `page_number` is the 1-indexed page the image landed on; it is lower
    /// than `item` when earlier images were skipped.
    fn on_item_complete(&self, item: usize, total: usize, page_number: usize) {
        let _ = (item, total, page_number);
    }

    /// Called when an image is skipped after the fallback also failed.
    fn on_item_error(&self, item: usize, total: usize, error: &str) {
        let _ = (item, total, error);
    }

    /// Called after every image, successful or not, with
    /// `round(done / total × 100)`.
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called once all images were attempted, before the document is serialised.
    fn on_assembling(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called once after the document has been produced.
    fn on_conversion_complete(&self, total_items: usize, success_count: usize) {
        let _ = (total_items, success_count);
    }

    /// Called when the run aborts (document failure, cancellation, no pages).
    fn on_conversion_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Percentage of `done` out of `total`, rounded to the nearest integer.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_items: usize) {
            self.started_total.store(total_items, Ordering::SeqCst);
        }

        fn on_item_start(&self, _item: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _item: usize, _total: usize, _page: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _item: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_item_start(1, 5, "a.png");
        cb.on_item_complete(1, 5, 1);
        cb.on_item_error(2, 5, "some error");
        cb.on_progress(40);
        cb.on_assembling(4);
        cb.on_conversion_complete(5, 4);
        cb.on_conversion_failed("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(3);
        tracker.on_item_start(1, 3, "a.png");
        tracker.on_item_complete(1, 3, 1);
        tracker.on_item_start(2, 3, "b.png");
        tracker.on_item_complete(2, 3, 2);
        tracker.on_item_start(3, 3, "c.txt");
        tracker.on_item_error(3, 3, "decode failed");
        tracker.on_conversion_complete(3, 2);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
