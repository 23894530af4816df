//! # img2pdf
//!
//! Combine image files into a single PDF, one image per page.
//!
//! Images are selected individually or as a whole folder, arranged in
//! order, and written to pages of a chosen paper size and orientation.
//! Each image is scaled to fit its page without cropping and centred.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files / folder
//!  │
//!  ├─ 1. Select    filter to image MIME types, natural-sort folders
//!  ├─ 2. Decode    any supported format → bitmap, EXIF orientation applied
//!  ├─ 3. Downscale widths above the ceiling (default 2000 px)
//!  ├─ 4. Encode    JPEG at the chosen quality (CPU-bound, spawn_blocking)
//!  ├─ 5. Place     scale = min(Pw/W, Ph/H), centred on the page
//!  └─ 6. Assemble  lopdf document → bytes → `<folder>.pdf` / `images_<ms>.pdf`
//! ```
//!
//! When decoding or encoding fails, JPEG and PNG sources are embedded from
//! their original bytes instead; anything else is skipped and the run
//! continues with the next image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use img2pdf::{convert, ConversionConfig, ImageList, Orientation, PageSize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut images = ImageList::new();
//!     images.select_folder("holiday")?;
//!
//!     let config = ConversionConfig::builder()
//!         .page_size(PageSize::A4)
//!         .orientation(Orientation::Landscape)
//!         .quality(0.9)
//!         .build()?;
//!
//!     let output = convert(&images, &config).await?;
//!     let path = output.pdf.save_to(".")?; // ./holiday.pdf
//!     eprintln!("{} pages → {}", output.stats.page_count, path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! img2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod selection;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, ConversionSettings, EmbedMode, Orientation,
    PageSize, QualityPreset, SettingsStore,
};
pub use convert::{convert, convert_sync, convert_to_file, convert_with_cancel};
pub use error::{Img2PdfError, ItemError};
pub use output::{output_file_name, ConversionOutput, ConversionStats, PageResult, PdfOutput};
pub use pipeline::layout::{place_image, PagePlacement};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{CancelToken, ConversionRun, Converter, RunGuard, RunStatus, RunTracker};
pub use selection::{natural_cmp, DragSession, ImageId, ImageList, SelectedImage, SourceFile};
pub use session::Session;
pub use stream::{convert_stream, ConversionEvent, ConversionEventStream};
