//! CLI binary for img2pdf.
//!
//! A thin shim over the library crate that builds an `ImageList` from the
//! command line, maps flags to `ConversionConfig` and writes the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use img2pdf::{
    convert, ConversionConfig, ConversionProgressCallback, EmbedMode, ImageList, Orientation,
    PageSize, ProgressCallback, QualityPreset,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-image wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, item: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&item))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_items: usize) {
        self.activate_bar(total_items);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_items} images…"))
        ));
    }

    fn on_item_start(&self, item: usize, _total: usize, name: &str) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(item, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, item: usize, total: usize, page_number: usize) {
        let elapsed = self.elapsed(item);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            item,
            total,
            dim(&format!("page {page_number}")),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, item: usize, total: usize, error: &str) {
        let elapsed = self.elapsed(item);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            item,
            total,
            red(&msg),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_assembling(&self, page_count: usize) {
        self.bar.set_prefix("Assembling");
        self.bar.set_message(format!("{page_count} pages"));
    }

    fn on_conversion_complete(&self, total_items: usize, success_count: usize) {
        let failed = total_items.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} images converted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images converted  ({} skipped)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_items,
                red(&failed.to_string()),
            );
        }
    }

    fn on_conversion_failed(&self, error: &str) {
        self.bar.abandon();
        eprintln!("{} {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Three files, in this order, to ./images_<timestamp>.pdf
  img2pdf cover.jpg p1.png p2.webp

  # A whole folder (sorted img2 before img10) to ./holiday.pdf
  img2pdf --folder ~/Pictures/holiday

  # Letter, landscape, high quality, into a chosen file
  img2pdf --folder scans --page-size letter --orientation landscape \
          --quality high -o out/scans.pdf

  # Move the 5th image to the front before converting
  img2pdf --folder scans --move 5:1

  # Keep JPEG/PNG bytes as they are instead of re-encoding
  img2pdf --keep-original *.jpg

PAGE SIZES (points, portrait):
  a4      595.28 × 841.89   (default)
  a3      841.89 × 1190.55
  a5      419.53 × 595.28
  letter  612    × 792
  legal   612    × 1008

QUALITY:
  low = 0.5   medium = 0.8 (default)   high = 0.9   max = 1.0
  or any number between 0 and 1.

ENVIRONMENT VARIABLES:
  Every option can also be set as IMG2PDF_<OPTION>, e.g. IMG2PDF_PAGE_SIZE=letter.
  RUST_LOG overrides the log filter.
"#;

/// Combine images into a single PDF, one image per page.
#[derive(Parser, Debug)]
#[command(
    name = "img2pdf",
    version,
    about = "Combine images into a single PDF, one image per page",
    long_about = "Combine image files (JPEG, PNG, WebP, GIF, BMP, TIFF, ICO) into a single PDF. \
Each image is scaled to fit its page without cropping and centred. Files are used in the \
order given; folders are sorted by path with numbers compared by value.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files, in page order. Non-image files are ignored.
    #[arg(conflicts_with = "folder")]
    files: Vec<PathBuf>,

    /// Use every image under this folder, sorted by path.
    #[arg(long, env = "IMG2PDF_FOLDER")]
    folder: Option<PathBuf>,

    /// Write the PDF to this directory or file.
    #[arg(short, long, env = "IMG2PDF_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Paper size.
    #[arg(long, env = "IMG2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Page orientation.
    #[arg(long, env = "IMG2PDF_ORIENTATION", value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    /// JPEG quality: low, medium, high, max, or a number in 0–1.
    #[arg(long, env = "IMG2PDF_QUALITY", default_value = "medium", value_parser = parse_quality)]
    quality: f32,

    /// Downscale images wider than this many pixels.
    #[arg(long, env = "IMG2PDF_MAX_WIDTH", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(16..))]
    max_width: u32,

    /// Embed JPEG/PNG files as they are when possible instead of re-encoding.
    #[arg(long, env = "IMG2PDF_KEEP_ORIGINAL")]
    keep_original: bool,

    /// Move image FROM to position TO (1-based) before converting. Repeatable.
    #[arg(long = "move", value_name = "FROM:TO", value_parser = parse_move)]
    moves: Vec<(usize, usize)>,

    /// Per-image processing timeout in seconds.
    #[arg(long, env = "IMG2PDF_ITEM_TIMEOUT", default_value_t = 60)]
    item_timeout: u64,

    /// Print a JSON report (ConversionOutput) to stdout.
    #[arg(long, env = "IMG2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    A3,
    A5,
    Letter,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::A3 => PageSize::A3,
            PageSizeArg::A5 => PageSize::A5,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep library
    // logs to errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Selection ────────────────────────────────────────────────────────
    let mut images = ImageList::new();
    if let Some(ref folder) = cli.folder {
        images
            .select_folder(folder)
            .with_context(|| format!("Cannot use folder {}", folder.display()))?;
    } else {
        let given = cli.files.len();
        let added = images.add_paths(&cli.files);
        if added < given && !cli.quiet {
            eprintln!(
                "{}",
                dim(&format!("Ignored {} non-image or unreadable files", given - added))
            );
        }
    }
    if images.is_empty() {
        anyhow::bail!("No images to convert; pass image files or --folder");
    }
    apply_moves(&mut images, &cli.moves)?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&images, &config)
        .await
        .context("Conversion failed")?;
    let path = output
        .pdf
        .save_to(&cli.output)
        .context("Failed to save PDF")?;

    if cli.json {
        let report = serde_json::json!({
            "path": path,
            "output": output,
        });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} images  {} KiB  {}ms  →  {}",
            if output.stats.failed_items == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.converted_items,
            output.stats.total_items,
            output.stats.output_bytes / 1024,
            output.stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_size(cli.page_size.into())
        .orientation(cli.orientation.into())
        .quality(cli.quality)
        .max_image_width(cli.max_width)
        .item_timeout_secs(cli.item_timeout)
        .embed_mode(if cli.keep_original {
            EmbedMode::PreferOriginal
        } else {
            EmbedMode::Reencode
        });

    // no one watches the per-image status line without a progress display
    if !cli.json && (cli.quiet || cli.no_progress) {
        builder = builder.error_pause_ms(0);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Apply `--move FROM:TO` pairs (1-based) in the order given.
fn apply_moves(images: &mut ImageList, moves: &[(usize, usize)]) -> Result<()> {
    let len = images.len();
    for &(from, to) in moves {
        if from == 0 || to == 0 || from > len || to > len {
            anyhow::bail!("--move {from}:{to} is outside 1..={len}");
        }
        images.move_item(from - 1, to - 1);
    }
    Ok(())
}

/// Parse `--quality`: a preset name or a number in `[0, 1]`.
fn parse_quality(s: &str) -> Result<f32, String> {
    let preset = match s.trim().to_lowercase().as_str() {
        "low" => Some(QualityPreset::Low),
        "medium" => Some(QualityPreset::Medium),
        "high" => Some(QualityPreset::High),
        "max" | "maximum" => Some(QualityPreset::Maximum),
        _ => None,
    };
    if let Some(p) = preset {
        return Ok(p.value());
    }
    let q: f32 = s
        .trim()
        .parse()
        .map_err(|_| format!("expected low, medium, high, max or 0–1, got '{s}'"))?;
    if !(0.0..=1.0).contains(&q) {
        return Err(format!("quality must be within 0–1, got {q}"));
    }
    Ok(q)
}

/// Parse `--move FROM:TO`.
fn parse_move(s: &str) -> Result<(usize, usize), String> {
    let (from, to) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid position '{}'", v.trim()))
    };
    Ok((parse(from)?, parse(to)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_presets_and_numbers() {
        assert_eq!(parse_quality("low").unwrap(), 0.5);
        assert_eq!(parse_quality("Max").unwrap(), 1.0);
        assert_eq!(parse_quality("0.65").unwrap(), 0.65);
        assert!(parse_quality("1.5").is_err());
        assert!(parse_quality("best").is_err());
    }

    #[test]
    fn move_pairs() {
        assert_eq!(parse_move("5:1").unwrap(), (5, 1));
        assert!(parse_move("5").is_err());
        assert!(parse_move("a:1").is_err());
    }

    #[test]
    fn cli_maps_onto_config() {
        let cli = Cli::parse_from([
            "img2pdf",
            "--page-size",
            "letter",
            "--orientation",
            "landscape",
            "--quality",
            "high",
            "--keep-original",
            "a.png",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.settings.page_dimensions(), (792.0, 612.0));
        assert_eq!(config.settings.jpeg_quality(), 90);
        assert_eq!(config.embed_mode, EmbedMode::PreferOriginal);
        assert_eq!(cli.files, vec![PathBuf::from("a.png")]);
    }

    #[test]
    fn files_and_folder_conflict() {
        assert!(Cli::try_parse_from(["img2pdf", "--folder", "dir", "a.png"]).is_err());
    }
}
