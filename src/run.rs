//! Run control: cancellation, the single-active-run guard and observable
//! run state.
//!
//! * [`CancelToken`] — cloneable flag checked between images and raced
//!   against the image in flight.
//! * [`Converter`] — owns the "a run is active" flag. Starting a second run
//!   while one is active fails with [`Img2PdfError::RunInProgress`] and
//!   changes nothing.
//! * [`RunTracker`] — a [`ConversionProgressCallback`] that keeps a
//!   [`ConversionRun`] snapshot (status, percent, message) for display.

use crate::config::ConversionConfig;
use crate::convert;
use crate::error::Img2PdfError;
use crate::output::ConversionOutput;
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use crate::selection::ImageList;
use crate::stream::{self, ConversionEventStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

// ── Cancellation ─────────────────────────────────────────────────────────

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation for a run. Clones share the same flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // register before checking the flag so a concurrent cancel() is not missed
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ── Single active run ────────────────────────────────────────────────────

/// Entry point that allows at most one active run at a time.
///
/// Cheap to clone; clones share the run flag.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    active: Arc<AtomicBool>,
}

/// Marks a run as active until dropped.
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Run finished; converter idle");
    }
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Claim the converter for a run.
    pub fn try_begin(&self) -> Result<RunGuard, Img2PdfError> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Img2PdfError::RunInProgress)?;
        Ok(RunGuard {
            active: Arc::clone(&self.active),
        })
    }

    /// Run a conversion, rejecting it if another is active.
    pub async fn convert(
        &self,
        images: &ImageList,
        config: &ConversionConfig,
    ) -> Result<ConversionOutput, Img2PdfError> {
        self.convert_with_cancel(images, config, &CancelToken::new())
            .await
    }

    pub async fn convert_with_cancel(
        &self,
        images: &ImageList,
        config: &ConversionConfig,
        cancel: &CancelToken,
    ) -> Result<ConversionOutput, Img2PdfError> {
        let _guard = self.try_begin()?;
        convert::convert_with_cancel(images, config, cancel).await
    }

    /// Streaming variant; the converter stays busy until the stream's task ends.
    pub fn convert_stream(
        &self,
        images: &ImageList,
        config: &ConversionConfig,
        cancel: CancelToken,
    ) -> Result<ConversionEventStream, Img2PdfError> {
        let guard = self.try_begin()?;
        Ok(stream::spawn_stream(images, config, cancel, Some(guard)))
    }
}

// ── Observable run state ─────────────────────────────────────────────────

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Preparing,
    Processing {
        current: usize,
        total: usize,
    },
    Assembling,
    Done,
    Error,
}

/// Display state of the current (or last) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRun {
    pub status: RunStatus,
    pub progress_percent: u8,
    pub last_message: String,
}

impl ConversionRun {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Preparing | RunStatus::Processing { .. } | RunStatus::Assembling
        )
    }
}

/// Progress callback that records a [`ConversionRun`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    state: Arc<Mutex<ConversionRun>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConversionRun {
        self.lock().clone()
    }

    /// Back to `Idle` with no message.
    pub fn reset(&self) {
        *self.lock() = ConversionRun::default();
    }

    fn lock(&self) -> MutexGuard<'_, ConversionRun> {
        // state is plain data; a panic mid-update leaves it usable
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut ConversionRun)) {
        f(&mut *self.lock());
    }
}

impl ConversionProgressCallback for RunTracker {
    fn on_conversion_start(&self, _total_items: usize) {
        self.update(|run| {
            run.status = RunStatus::Preparing;
            run.progress_percent = 0;
            run.last_message = "Preparing conversion…".into();
        });
    }

    fn on_item_start(&self, item: usize, total: usize, name: &str) {
        self.update(|run| {
            run.status = RunStatus::Processing {
                current: item,
                total,
            };
            run.last_message = format!("Processing {item} / {total} ({name})…");
        });
    }

    fn on_item_error(&self, item: usize, _total: usize, error: &str) {
        self.update(|run| {
            run.last_message = format!("Image {item} failed, continuing… ({error})");
        });
    }

    fn on_progress(&self, percent: u8) {
        self.update(|run| run.progress_percent = percent);
    }

    fn on_assembling(&self, _page_count: usize) {
        self.update(|run| {
            run.status = RunStatus::Assembling;
            run.last_message = "Creating PDF…".into();
        });
    }

    fn on_conversion_complete(&self, total_items: usize, success_count: usize) {
        self.update(|run| {
            run.status = RunStatus::Done;
            run.progress_percent = 100;
            run.last_message = if success_count == total_items {
                "Conversion complete.".into()
            } else {
                format!(
                    "Conversion complete ({} of {} images skipped).",
                    total_items - success_count,
                    total_items
                )
            };
        });
    }

    fn on_conversion_failed(&self, error: &str) {
        self.update(|run| {
            run.status = RunStatus::Error;
            run.progress_percent = 0;
            run.last_message = format!("Conversion failed: {error}");
        });
    }
}

/// Forwards every event to several callbacks, in order.
pub struct FanOut(pub Vec<ProgressCallback>);

impl ConversionProgressCallback for FanOut {
    fn on_conversion_start(&self, total_items: usize) {
        self.0.iter().for_each(|cb| cb.on_conversion_start(total_items));
    }

    fn on_item_start(&self, item: usize, total: usize, name: &str) {
        self.0.iter().for_each(|cb| cb.on_item_start(item, total, name));
    }

    fn on_item_complete(&self, item: usize, total: usize, page_number: usize) {
        self.0
            .iter()
            .for_each(|cb| cb.on_item_complete(item, total, page_number));
    }

    fn on_item_error(&self, item: usize, total: usize, error: &str) {
        self.0.iter().for_each(|cb| cb.on_item_error(item, total, error));
    }

    fn on_progress(&self, percent: u8) {
        self.0.iter().for_each(|cb| cb.on_progress(percent));
    }

    fn on_assembling(&self, page_count: usize) {
        self.0.iter().for_each(|cb| cb.on_assembling(page_count));
    }

    fn on_conversion_complete(&self, total_items: usize, success_count: usize) {
        self.0
            .iter()
            .for_each(|cb| cb.on_conversion_complete(total_items, success_count));
    }

    fn on_conversion_failed(&self, error: &str) {
        self.0.iter().for_each(|cb| cb.on_conversion_failed(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_claim_is_rejected_until_guard_drops() {
        let converter = Converter::new();
        let guard = converter.try_begin().unwrap();
        assert!(converter.is_running());
        assert!(matches!(
            converter.clone().try_begin(),
            Err(Img2PdfError::RunInProgress)
        ));
        drop(guard);
        assert!(!converter.is_running());
        assert!(converter.try_begin().is_ok());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_set() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn tracker_follows_the_lifecycle() {
        let tracker = RunTracker::new();
        assert_eq!(tracker.snapshot().status, RunStatus::Idle);

        tracker.on_conversion_start(2);
        assert_eq!(tracker.snapshot().status, RunStatus::Preparing);

        tracker.on_item_start(1, 2, "a.png");
        tracker.on_progress(50);
        let run = tracker.snapshot();
        assert_eq!(run.status, RunStatus::Processing { current: 1, total: 2 });
        assert_eq!(run.progress_percent, 50);
        assert!(run.last_message.contains("a.png"));
        assert!(run.is_active());

        tracker.on_assembling(2);
        tracker.on_conversion_complete(2, 2);
        let run = tracker.snapshot();
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.progress_percent, 100);
        assert!(!run.is_active());
    }

    #[test]
    fn failure_resets_progress() {
        let tracker = RunTracker::new();
        tracker.on_conversion_start(3);
        tracker.on_progress(67);
        tracker.on_conversion_failed("disk full");
        let run = tracker.snapshot();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.progress_percent, 0);
        assert!(run.last_message.contains("disk full"));

        tracker.reset();
        assert_eq!(tracker.snapshot(), ConversionRun::default());
    }

    #[test]
    fn fan_out_reaches_every_callback() {
        let a = RunTracker::new();
        let b = RunTracker::new();
        let fan = FanOut(vec![Arc::new(a.clone()), Arc::new(b.clone())]);
        fan.on_progress(42);
        assert_eq!(a.snapshot().progress_percent, 42);
        assert_eq!(b.snapshot().progress_percent, 42);
    }
}
