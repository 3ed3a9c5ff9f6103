//! # note2pdf
//!
//! Convert handwritten tablet notebooks (`.note`) to vector PDF, and render
//! the ink of annotation files (`.mark`) into overlays for their PDFs.
//!
//! ## Why vectors?
//!
//! The device stores every page as run-length encoded bitmaps at 300 ppi.
//! Embedding those rasters makes large, blurry PDFs. Instead each page is
//! split into tone groups (black, grays, translucent marker), each group is
//! traced into filled outlines and drawn in its palette color. Output is
//! small, sharp at any zoom, and internal notebook links become clickable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .note
//!  │
//!  ├─ 1. Input      validate path, pick .note / .mark
//!  ├─ 2. Container  footer → header, pages, layers, links
//!  ├─ 3. Render     RLE → palette → tone masks → trace (spawn_blocking)
//!  ├─ 4. Vector     path fills, marker opacity, background, link rects
//!  └─ 5. PDF        number objects, resolve links, xref + trailer
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use note2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .include_background(false)
//!         .build()?;
//!     let output = convert("journal.note", &config).await?;
//!     std::fs::write("journal.pdf", &output.pdf)?;
//!     eprintln!("{} pages, {} objects",
//!         output.stats.total_pages,
//!         output.stats.total_objects);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `note2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! note2pdf = { version = "0.5", default-features = false }
//! ```
//!
//! ## Tracing
//!
//! The built-in [`RectTracer`] covers each tone mask with exact pixel
//! rectangles. Inject a curve-fitting tracer through
//! [`ConversionConfigBuilder::tracer`] for smoother output.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ColorConfig, ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    convert, convert_from_bytes, convert_mark, convert_mark_to_file, convert_sync,
    convert_to_file, inspect,
};
pub use error::{EditError, NoteError, PageError, TraceError};
pub use output::{ConversionOutput, ConversionStats, NotebookSummary, PageReport};
pub use pipeline::mark::{CompanionEdits, CompanionPdfEditor, MarkDocument, MarkOverlay};
pub use pipeline::trace::{Bitmap, PathNode, Point, RectTracer, Segment, TraceParams, Tracer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_dir_stream, DocumentResult, DocumentStatus};
