//! CLI binary for note2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use note2pdf::pipeline::input::{input_kind, InputKind};
use note2pdf::pipeline::mark::OverlayKind;
use note2pdf::{
    convert, convert_dir_stream, convert_mark, inspect, ColorConfig, ConversionConfig,
    ConversionProgressCallback, DocumentStatus, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
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

fn page_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {pos:>3}/{len} pages  \
         ⏱ {elapsed_precise}  ETA {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages complete out of order, so start times are kept per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner-only until `on_conversion_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading notebook…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(page_bar_style());
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting conversion of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, tone_layers: usize) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{tone_layers} layers")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(page_num);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, pdf_bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages converted  {}",
            green("✔"),
            bold(&total_pages.to_string()),
            dim(&format!("{} KiB", pdf_bytes.div_ceil(1024)))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (journal.pdf)
  note2pdf journal.note

  # Convert to a specific file, without the template layer
  note2pdf --no-bg journal.note -o out/journal.pdf

  # Convert a whole directory tree, skipping up-to-date outputs
  note2pdf ~/Supernote/Note -o ~/Documents/notes

  # Render the ink of an annotated PDF into overlay PDFs
  note2pdf book.pdf.mark -o overlays/

  # Inspect a notebook's container
  note2pdf --inspect-only journal.note

  # Custom palette
  note2pdf --dark-gray '#5A5A5A' --light-gray '#B0B0B0' journal.note

ENVIRONMENT VARIABLES:
  RUST_LOG             Overrides the log filter (e.g. note2pdf=debug)
  NOTE2PDF_*           Every flag can also be set as NOTE2PDF_<FLAG>
"#;

/// Convert handwritten notebooks (.note / .mark) to vector PDF.
#[derive(Parser, Debug)]
#[command(
    name = "note2pdf",
    version,
    about = "Convert handwritten notebooks (.note / .mark) to vector PDF",
    long_about = "Convert handwritten tablet notebooks to vector PDF. Each page's ink is \
split into tone layers, traced into outlines and drawn at the device's physical size; \
internal links stay clickable. A directory input converts every notebook beneath it.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A .note or .mark file, or a directory to convert recursively.
    input: PathBuf,

    /// Output PDF (file input) or output directory (directory or .mark input).
    #[arg(short, long, env = "NOTE2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Leave out the background (template) layer.
    #[arg(long, env = "NOTE2PDF_NO_BG")]
    no_bg: bool,

    /// Do not give vector-only pages a 1×1 white raster.
    #[arg(long, env = "NOTE2PDF_NO_OCR_FALLBACK")]
    no_ocr_fallback: bool,

    /// Pages (or documents, for directories) processed at once.
    #[arg(short, long, env = "NOTE2PDF_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Drop ink specks of at most this many pixels before tracing.
    #[arg(long, env = "NOTE2PDF_DESPECKLE", default_value_t = note2pdf::config::DEFAULT_DESPECKLE)]
    despeckle: usize,

    /// Marker ink opacity for notebooks (0.0–1.0).
    #[arg(long, env = "NOTE2PDF_MARKER_OPACITY",
          default_value_t = note2pdf::config::DEFAULT_NOTE_MARKER_OPACITY)]
    marker_opacity: f64,

    /// Black anchor color (#RRGGBB).
    #[arg(long, env = "NOTE2PDF_BLACK", default_value = "#000000")]
    black: String,

    /// Dark gray anchor color (#RRGGBB).
    #[arg(long, env = "NOTE2PDF_DARK_GRAY", default_value = "#9D9D9D")]
    dark_gray: String,

    /// Light gray anchor color (#RRGGBB).
    #[arg(long, env = "NOTE2PDF_LIGHT_GRAY", default_value = "#C9C9C9")]
    light_gray: String,

    /// White anchor color (#RRGGBB).
    #[arg(long, env = "NOTE2PDF_WHITE", default_value = "#FFFFFF")]
    white: String,

    /// Print container information only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print a JSON report on stdout.
    #[arg(long, env = "NOTE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NOTE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTE2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active;
    // verbose mode always wins.
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.input)
            .await
            .context("Failed to inspect notebook")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            println!("Signature:    {}", summary.signature);
            if !summary.file_id.is_empty() {
                println!("File ID:      {}", summary.file_id);
            }
            println!("Pages:        {}", summary.page_count);
            println!(
                "Device:       {}x{} px @ {} ppi ({:.2}x{:.2} pt)",
                summary.geometry.width,
                summary.geometry.height,
                summary.geometry.ppi,
                summary.page_width_pt,
                summary.page_height_pt
            );
            println!(
                "Links:        {} internal, {} external",
                summary.internal_links, summary.external_links
            );
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.input.is_dir() {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if cli.input.is_dir() {
        return run_batch(&cli, &config, show_progress).await;
    }
    match input_kind(&cli.input) {
        Some(InputKind::Mark { .. }) => run_mark(&cli, &config).await,
        _ => run_note(&cli, &config, show_progress).await,
    }
}

async fn run_note(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));

    let output = convert(&cli.input, config)
        .await
        .context("Conversion failed")?;
    write_output(&output_path, &output.pdf).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        // Without a bar nobody has reported the totals yet.
        if !show_progress {
            eprintln!(
                "Converted {} pages in {}ms",
                output.stats.total_pages, output.stats.total_duration_ms
            );
        }
        eprintln!(
            "   {} objects  /  {} tone layers  →  {}",
            dim(&output.stats.total_objects.to_string()),
            dim(&output.stats.total_tone_layers.to_string()),
            bold(&output_path.display().to_string()),
        );
    }
    Ok(())
}

async fn run_mark(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    let doc = convert_mark(&cli.input, config)
        .await
        .context("Mark conversion failed")?;

    if let Some(ref dir) = cli.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        for overlay in &doc.overlays {
            let kind = match overlay.kind {
                OverlayKind::Pen => "pen",
                OverlayKind::Marker => "marker",
            };
            let path = dir.join(format!("page-{:04}-{kind}.pdf", overlay.page_number));
            write_output(&path, &overlay.pdf).await?;
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} overlays, {} annotations over {} pages",
            green("✔"),
            doc.overlays.len(),
            doc.annotations.len(),
            doc.page_count
        );
    }
    Ok(())
}

async fn run_batch(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let out_dir = cli.output.clone().unwrap_or_else(|| cli.input.clone());
    let mut results = convert_dir_stream(&cli.input, &out_dir, config)
        .await
        .context("Failed to scan input directory")?;

    let bar = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  {pos} documents  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let (mut converted, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    let mut report = Vec::new();
    while let Some(doc) = results.next().await {
        let line = match &doc.result {
            Ok(DocumentStatus::Converted(stats)) => {
                converted += 1;
                format!(
                    "  {} {}  {}",
                    green("✓"),
                    doc.job.input.display(),
                    dim(&format!("{} pages", stats.total_pages))
                )
            }
            Ok(DocumentStatus::MarkRendered { overlays, applied, .. }) => {
                converted += 1;
                let note = if *applied { "applied" } else { "rendered only" };
                format!(
                    "  {} {}  {}",
                    green("✓"),
                    doc.job.input.display(),
                    dim(&format!("{overlays} overlays, {note}"))
                )
            }
            Ok(DocumentStatus::UpToDate) => {
                skipped += 1;
                format!("  {} {}  {}", dim("·"), doc.job.input.display(), dim("up to date"))
            }
            Err(e) => {
                failed += 1;
                format!("  {} {}  {}", red("✗"), doc.job.input.display(), red(&e.to_string()))
            }
        };
        report.push(serde_json::json!({
            "input": doc.job.input,
            "output": doc.job.output,
            "ok": doc.result.is_ok(),
            "error": doc.result.as_ref().err().map(|e| e.to_string()),
        }));
        match &bar {
            Some(bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None if !cli.quiet && !cli.json => eprintln!("{line}"),
            None => {}
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} converted, {} up to date, {} failed",
            if failed == 0 { green("✔") } else { red("✘") },
            converted,
            skipped,
            failed
        );
    }
    if failed > 0 {
        anyhow::bail!("{failed} documents failed to convert");
    }
    Ok(())
}

/// Write `bytes` via a temp file and rename, creating parent directories.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let colors = ColorConfig {
        black: cli.black.clone(),
        dark_gray: cli.dark_gray.clone(),
        light_gray: cli.light_gray.clone(),
        white: cli.white.clone(),
    };

    let mut builder = ConversionConfig::builder()
        .note_colors(colors)
        .note_marker_opacity(cli.marker_opacity)
        .include_background(!cli.no_bg)
        .ocr_fallback(!cli.no_ocr_fallback)
        .despeckle(cli.despeckle);
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
