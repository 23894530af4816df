//! A single user's working state: the image list, the settings being
//! edited, the run state and the last produced document.
//!
//! [`Session::convert`] snapshots the settings into the run's configuration,
//! so edits made while a run is active only apply to the next run. The
//! produced PDF is retained until the next run starts or [`Session::dismiss`]
//! is called, and [`Session::download`] can write it out any number of times.

use crate::config::{ConversionConfig, SettingsStore};
use crate::error::Img2PdfError;
use crate::output::{ConversionOutput, PdfOutput};
use crate::progress::ProgressCallback;
use crate::run::{CancelToken, ConversionRun, Converter, FanOut, RunTracker};
use crate::selection::ImageList;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct Session {
    pub images: ImageList,
    pub settings: SettingsStore,
    /// Pipeline knobs applied to every run; its `settings` field is
    /// overwritten with the store's snapshot at run start.
    base_config: ConversionConfig,
    converter: Converter,
    tracker: RunTracker,
    last_output: Option<PdfOutput>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose runs use `config`'s pipeline knobs and callback.
    pub fn with_config(config: ConversionConfig) -> Self {
        let mut settings = SettingsStore::default();
        settings.replace(config.settings);
        Self {
            settings,
            base_config: config,
            ..Self::default()
        }
    }

    /// Handle that can start runs on this session's converter from elsewhere.
    pub fn converter(&self) -> Converter {
        self.converter.clone()
    }

    pub fn run_state(&self) -> ConversionRun {
        self.tracker.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.converter.is_running()
    }

    /// The retained document, if the last run succeeded.
    pub fn output(&self) -> Option<&PdfOutput> {
        self.last_output.as_ref()
    }

    /// Convert the current list with a snapshot of the current settings.
    pub async fn convert(&mut self) -> Result<ConversionOutput, Img2PdfError> {
        self.convert_with_cancel(&CancelToken::new()).await
    }

    pub async fn convert_with_cancel(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<ConversionOutput, Img2PdfError> {
        if self.images.is_empty() {
            return Err(Img2PdfError::EmptySelection);
        }
        let guard = self.converter.try_begin()?;
        // a new run supersedes the previous document
        self.last_output = None;
        let config = self.run_config();

        let result = crate::convert::convert_with_cancel(&self.images, &config, cancel).await;
        drop(guard);

        if let Ok(ref output) = result {
            self.last_output = Some(output.pdf.clone());
        }
        result
    }

    /// Write the retained document to `dest` (a directory or a file path).
    pub fn download(&self, dest: impl AsRef<Path>) -> Result<PathBuf, Img2PdfError> {
        let pdf = self
            .last_output
            .as_ref()
            .ok_or_else(|| Img2PdfError::Internal("no converted document to download".into()))?;
        pdf.save_to(dest)
    }

    /// Drop the retained document and return the run state to idle.
    pub fn dismiss(&mut self) {
        if self.last_output.take().is_some() {
            info!("Dismissed converted document");
        }
        self.tracker.reset();
    }

    fn run_config(&self) -> ConversionConfig {
        let mut config = self.base_config.clone();
        config.settings = self.settings.snapshot();
        let tracker: ProgressCallback = Arc::new(self.tracker.clone());
        config.progress_callback = Some(match config.progress_callback.take() {
            Some(user) => Arc::new(FanOut(vec![tracker, user])),
            None => tracker,
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Orientation, PageSize};
    use crate::run::RunStatus;
    use crate::selection::SourceFile;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(name: &str) -> SourceFile {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(6, 3))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        SourceFile::from_bytes(name, buf)
    }

    fn session() -> Session {
        let config = ConversionConfig::builder()
            .pacing_ms(0)
            .error_pause_ms(0)
            .build()
            .unwrap();
        Session::with_config(config)
    }

    #[tokio::test]
    async fn settings_are_snapshotted_per_run() {
        let mut s = session();
        s.images.add_files([png("a.png")]);
        s.settings.set_page_size(PageSize::Letter);
        s.settings.set_orientation(Orientation::Landscape);

        let out = s.convert().await.unwrap();
        let placement = out.pages[0].placement.unwrap();
        assert_eq!((placement.page_width, placement.page_height), (792.0, 612.0));
        assert_eq!(s.run_state().status, RunStatus::Done);
        assert!(s.output().is_some());
    }

    #[tokio::test]
    async fn download_can_be_repeated_and_dismissed() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        s.images.add_files([png("a.png")]);
        s.convert().await.unwrap();

        let first = s.download(dir.path().join("one.pdf")).unwrap();
        let second = s.download(dir.path().join("two.pdf")).unwrap();
        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());

        s.dismiss();
        assert!(s.output().is_none());
        assert_eq!(s.run_state().status, RunStatus::Idle);
        assert!(s.download(dir.path()).is_err());
    }

    #[tokio::test]
    async fn failed_run_clears_previous_output() {
        let mut s = session();
        s.images.add_files([png("a.png")]);
        s.convert().await.unwrap();
        assert!(s.output().is_some());

        s.images.reset();
        s.images
            .add_files([SourceFile::from_bytes("bad.png", b"nope".to_vec())]);
        assert!(s.convert().await.is_err());
        assert!(s.output().is_none());
        let state = s.run_state();
        assert_eq!(state.status, RunStatus::Error);
        assert_eq!(state.progress_percent, 0);
    }

    #[tokio::test]
    async fn empty_list_keeps_previous_document() {
        let mut s = session();
        s.images.add_files([png("a.png")]);
        s.convert().await.unwrap();

        s.images.reset();
        assert!(matches!(s.convert().await, Err(Img2PdfError::EmptySelection)));
        assert!(s.output().is_some());
        assert_eq!(s.run_state().status, RunStatus::Done);
        assert!(!s.is_running());
    }

    #[tokio::test]
    async fn busy_converter_rejects_without_side_effects() {
        let mut s = session();
        s.images.add_files([png("a.png")]);
        s.convert().await.unwrap();

        let _held = s.converter().try_begin().unwrap();
        assert!(matches!(s.convert().await, Err(Img2PdfError::RunInProgress)));
        // previous output and state untouched
        assert!(s.output().is_some());
        assert_eq!(s.run_state().status, RunStatus::Done);
    }
}
