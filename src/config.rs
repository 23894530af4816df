//! Configuration types for image-to-PDF conversion.
//!
//! Two layers live here:
//!
//! * [`ConversionSettings`] — the user-facing record (page size, orientation,
//!   quality) edited through a [`SettingsStore`] before a run starts.
//! * [`ConversionConfig`] — the immutable per-run configuration: a snapshot
//!   of the settings plus the pipeline knobs (downscale ceiling, pacing,
//!   timeouts, progress callback). Built via [`ConversionConfigBuilder`].
//!
//! A run only ever reads the snapshot it was started with, so editing the
//! store mid-run cannot change the pages being produced.

use crate::error::Img2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Paper sizes offered for the output pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default)
    #[default]
    A4,
    /// 297 × 420 mm
    A3,
    /// 148 × 210 mm
    A5,
    /// 8.5 × 11 in
    Letter,
    /// 8.5 × 14 in
    Legal,
}

impl PageSize {
    pub const ALL: [PageSize; 5] = [
        PageSize::A4,
        PageSize::A3,
        PageSize::A5,
        PageSize::Letter,
        PageSize::Legal,
    ];

    /// Portrait `(width, height)` in PDF points.
    pub fn portrait_points(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }

    /// Human-readable label with physical dimensions.
    pub fn label(self) -> &'static str {
        match self {
            PageSize::A4 => "A4 (210 × 297mm)",
            PageSize::A3 => "A3 (297 × 420mm)",
            PageSize::A5 => "A5 (148 × 210mm)",
            PageSize::Letter => "Letter (8.5 × 11\")",
            PageSize::Legal => "Legal (8.5 × 14\")",
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    /// Width and height of the base size are swapped.
    Landscape,
}

/// Named JPEG quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl QualityPreset {
    pub fn value(self) -> f32 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 0.8,
            QualityPreset::High => 0.9,
            QualityPreset::Maximum => 1.0,
        }
    }
}

/// The user-editable conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// JPEG quality in `[0, 1]`. Default: 0.8.
    pub quality: f32,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            quality: QualityPreset::default().value(),
        }
    }
}

impl ConversionSettings {
    /// Oriented page `(width, height)` in points.
    pub fn page_dimensions(&self) -> (f32, f32) {
        let (w, h) = self.page_size.portrait_points();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Quality mapped onto the 1–100 scale the JPEG encoder expects.
    pub fn jpeg_quality(&self) -> u8 {
        let q = if self.quality.is_finite() {
            self.quality
        } else {
            QualityPreset::default().value()
        };
        (q * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Holder for the settings a user edits between runs.
///
/// Setters replace a single field and never validate beyond the enum types;
/// [`SettingsStore::snapshot`] hands a copy to the next run.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    settings: ConversionSettings,
}

impl SettingsStore {
    pub fn new(settings: ConversionSettings) -> Self {
        Self { settings }
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.settings.page_size = page_size;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.settings.orientation = orientation;
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.settings.quality = quality;
    }

    pub fn set_quality_preset(&mut self, preset: QualityPreset) {
        self.settings.quality = preset.value();
    }

    /// Replace the whole record at once.
    pub fn replace(&mut self, settings: ConversionSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Copy of the current settings, taken once per run.
    pub fn snapshot(&self) -> ConversionSettings {
        self.settings
    }
}

/// How source bytes reach the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmbedMode {
    /// Decode, downscale and re-encode every image as JPEG; embed the
    /// original bytes only when that fails. (default)
    #[default]
    Reencode,
    /// Embed JPEG and PNG sources as-is when their format allows it and
    /// re-encode everything else.
    PreferOriginal,
}

/// Immutable per-run configuration.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use img2pdf::{ConversionConfig, Orientation, PageSize};
///
/// let config = ConversionConfig::builder()
///     .page_size(PageSize::Letter)
///     .orientation(Orientation::Landscape)
///     .quality(0.9)
///     .build()
///     .unwrap();
/// assert_eq!(config.settings.page_dimensions(), (792.0, 612.0));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Settings snapshot for this run.
    pub settings: ConversionSettings,

    /// Images wider than this many pixels are downscaled proportionally
    /// before re-encoding. Default: 2000.
    pub max_image_width: u32,

    /// Re-encode or prefer original bytes. Default: [`EmbedMode::Reencode`].
    pub embed_mode: EmbedMode,

    /// Pause between items in milliseconds. Default: 50.
    pub pacing_ms: u64,

    /// Extra pause after a failed item so its status line stays visible. Default: 1000.
    pub error_pause_ms: u64,

    /// Ceiling for decoding and encoding a single image. Default: 60.
    pub item_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            settings: ConversionSettings::default(),
            max_image_width: 2000,
            embed_mode: EmbedMode::default(),
            pacing_ms: 50,
            error_pause_ms: 1000,
            item_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("settings", &self.settings)
            .field("max_image_width", &self.max_image_width)
            .field("embed_mode", &self.embed_mode)
            .field("pacing_ms", &self.pacing_ms)
            .field("error_pause_ms", &self.error_pause_ms)
            .field("item_timeout_secs", &self.item_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Config for the given settings snapshot with default pipeline knobs.
    pub fn from_settings(settings: ConversionSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn settings(mut self, settings: ConversionSettings) -> Self {
        self.config.settings = settings;
        self
    }

    pub fn page_size(mut self, page_size: PageSize) -> Self {
        self.config.settings.page_size = page_size;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.settings.orientation = orientation;
        self
    }

    pub fn quality(mut self, q: f32) -> Self {
        self.config.settings.quality = q.clamp(0.0, 1.0);
        self
    }

    pub fn quality_preset(mut self, preset: QualityPreset) -> Self {
        self.config.settings.quality = preset.value();
        self
    }

    pub fn max_image_width(mut self, px: u32) -> Self {
        self.config.max_image_width = px.max(16);
        self
    }

    pub fn embed_mode(mut self, mode: EmbedMode) -> Self {
        self.config.embed_mode = mode;
        self
    }

    pub fn pacing_ms(mut self, ms: u64) -> Self {
        self.config.pacing_ms = ms;
        self
    }

    pub fn error_pause_ms(mut self, ms: u64) -> Self {
        self.config.error_pause_ms = ms;
        self
    }

    pub fn item_timeout_secs(mut self, secs: u64) -> Self {
        self.config.item_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Img2PdfError> {
        let c = &self.config;
        if !c.settings.quality.is_finite() || !(0.0..=1.0).contains(&c.settings.quality) {
            return Err(Img2PdfError::InvalidConfig(format!(
                "quality must be within 0.0–1.0, got {}",
                c.settings.quality
            )));
        }
        if c.max_image_width == 0 {
            return Err(Img2PdfError::InvalidConfig(
                "max image width must be ≥ 1".into(),
            ));
        }
        if c.item_timeout_secs == 0 {
            return Err(Img2PdfError::InvalidConfig(
                "item timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_a4_swaps_dimensions() {
        let settings = ConversionSettings {
            page_size: PageSize::A4,
            orientation: Orientation::Landscape,
            quality: 0.8,
        };
        assert_eq!(settings.page_dimensions(), (841.89, 595.28));
    }

    #[test]
    fn portrait_keeps_base_dimensions() {
        for size in PageSize::ALL {
            let settings = ConversionSettings {
                page_size: size,
                ..ConversionSettings::default()
            };
            assert_eq!(settings.page_dimensions(), size.portrait_points());
        }
    }

    #[test]
    fn defaults_match_a4_portrait_medium() {
        let s = ConversionSettings::default();
        assert_eq!(s.page_size, PageSize::A4);
        assert_eq!(s.orientation, Orientation::Portrait);
        assert_eq!(s.quality, 0.8);
        assert_eq!(s.jpeg_quality(), 80);
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        let mut s = ConversionSettings::default();
        s.quality = 0.0;
        assert_eq!(s.jpeg_quality(), 1);
        s.quality = 1.7;
        assert_eq!(s.jpeg_quality(), 100);
        s.quality = f32::NAN;
        assert_eq!(s.jpeg_quality(), 80);
    }

    #[test]
    fn store_setters_replace_single_fields() {
        let mut store = SettingsStore::default();
        store.set_page_size(PageSize::Legal);
        store.set_orientation(Orientation::Landscape);
        store.set_quality_preset(QualityPreset::High);
        let snap = store.snapshot();
        assert_eq!(snap.page_size, PageSize::Legal);
        assert_eq!(snap.orientation, Orientation::Landscape);
        assert_eq!(snap.quality, 0.9);

        // the store does not clamp
        store.set_quality(1.5);
        assert_eq!(store.settings().quality, 1.5);
        // but the earlier snapshot is unaffected
        assert_eq!(snap.quality, 0.9);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let config = ConversionConfig::builder()
            .quality(3.0)
            .max_image_width(1)
            .build()
            .unwrap();
        assert_eq!(config.settings.quality, 1.0);
        assert_eq!(config.max_image_width, 16);

        let err = ConversionConfig::builder().item_timeout_secs(0).build();
        assert!(matches!(err, Err(Img2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn settings_roundtrip_json() {
        let s = ConversionSettings {
            page_size: PageSize::A5,
            orientation: Orientation::Landscape,
            quality: 0.5,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: ConversionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
