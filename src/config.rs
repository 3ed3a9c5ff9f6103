//! Configuration types for notebook-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared read-only across page workers and serialised for
//! logging.

use crate::error::NoteError;
use crate::pipeline::mark::CompanionPdfEditor;
use crate::pipeline::trace::Tracer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Marker opacity the device software uses for notebooks.
pub const DEFAULT_NOTE_MARKER_OPACITY: f64 = 0.2;
/// Marker opacity applied to `.mark` overlays.
pub const DEFAULT_MARK_MARKER_OPACITY: f64 = 0.38;
/// Despeckle threshold handed to the tracer.
pub const DEFAULT_DESPECKLE: usize = 2;

/// The four anchor colors of a palette, as `#RRGGBB` strings.
///
/// Anchors are bound to the fixed codes 0 (black), 157 (dark gray),
/// 201 (light gray) and 255 (white); every other code is interpolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorConfig {
    pub black: String,
    pub dark_gray: String,
    pub light_gray: String,
    pub white: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            black: "#000000".into(),
            dark_gray: "#9D9D9D".into(),
            light_gray: "#C9C9C9".into(),
            white: "#FFFFFF".into(),
        }
    }
}

impl ColorConfig {
    /// Parse all four anchors, darkest first.
    pub fn anchors(&self) -> Result<[[u8; 3]; 4], NoteError> {
        Ok([
            parse_hex_color(&self.black)?,
            parse_hex_color(&self.dark_gray)?,
            parse_hex_color(&self.light_gray)?,
            parse_hex_color(&self.white)?,
        ])
    }
}

/// Parse a `#RRGGBB` color. The leading `#` is optional.
pub fn parse_hex_color(hex: &str) -> Result<[u8; 3], NoteError> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(NoteError::InvalidConfig(format!(
            "invalid hex color '{hex}' (expected 6 hex digits)"
        )));
    }
    let mut rgb = [0u8; 3];
    for (i, slot) in rgb.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|e| {
            NoteError::InvalidConfig(format!("invalid hex color '{hex}': {e}"))
        })?;
    }
    Ok(rgb)
}

/// Configuration for a notebook conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use note2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .include_background(false)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Anchor colors used for `.note` documents.
    pub note_colors: ColorConfig,

    /// Anchor colors used for `.mark` overlays.
    pub mark_colors: ColorConfig,

    /// Opacity of marker ink in `.note` documents. Default: 0.2.
    ///
    /// Zero means "unset" and falls back to the palette default of ~15 %.
    pub note_marker_opacity: f64,

    /// Opacity of marker ink in `.mark` overlays. Default: 0.38.
    pub mark_marker_opacity: f64,

    /// Embed the background (template) layer as a raster image. Default: true.
    pub include_background: bool,

    /// Give vector-only pages a 1×1 white raster so viewers offer text
    /// recognition on them. Default: true.
    pub ocr_fallback: bool,

    /// Maximum number of pages rendered at once. Default: hardware parallelism.
    pub concurrency: usize,

    /// Connected regions of at most this many pixels are dropped before
    /// tracing. Default: 2.
    pub despeckle: usize,

    /// Tracing oracle. `None` selects the built-in
    /// [`crate::pipeline::trace::RectTracer`].
    pub tracer: Option<Arc<dyn Tracer>>,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Stamps `.mark` overlays and highlights onto companion PDFs. Without
    /// one, mark conversion only returns what it rendered.
    pub companion_editor: Option<Arc<dyn CompanionPdfEditor>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            note_colors: ColorConfig::default(),
            mark_colors: ColorConfig::default(),
            note_marker_opacity: DEFAULT_NOTE_MARKER_OPACITY,
            mark_marker_opacity: DEFAULT_MARK_MARKER_OPACITY,
            include_background: true,
            ocr_fallback: true,
            concurrency: default_concurrency(),
            despeckle: DEFAULT_DESPECKLE,
            tracer: None,
            progress_callback: None,
            companion_editor: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("note_colors", &self.note_colors)
            .field("mark_colors", &self.mark_colors)
            .field("note_marker_opacity", &self.note_marker_opacity)
            .field("mark_marker_opacity", &self.mark_marker_opacity)
            .field("include_background", &self.include_background)
            .field("ocr_fallback", &self.ocr_fallback)
            .field("concurrency", &self.concurrency)
            .field("despeckle", &self.despeckle)
            .field("tracer", &self.tracer.as_ref().map(|_| "<dyn Tracer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field(
                "companion_editor",
                &self.companion_editor.as_ref().map(|_| "<dyn CompanionPdfEditor>"),
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
}

/// Number of worker slots the machine offers, never less than one.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn note_colors(mut self, colors: ColorConfig) -> Self {
        self.config.note_colors = colors;
        self
    }

    pub fn mark_colors(mut self, colors: ColorConfig) -> Self {
        self.config.mark_colors = colors;
        self
    }

    pub fn note_marker_opacity(mut self, opacity: f64) -> Self {
        self.config.note_marker_opacity = opacity;
        self
    }

    pub fn mark_marker_opacity(mut self, opacity: f64) -> Self {
        self.config.mark_marker_opacity = opacity;
        self
    }

    pub fn include_background(mut self, v: bool) -> Self {
        self.config.include_background = v;
        self
    }

    pub fn ocr_fallback(mut self, v: bool) -> Self {
        self.config.ocr_fallback = v;
        self
    }

    /// Page workers per document. Zero is rejected by [`Self::build`].
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn despeckle(mut self, pixels: usize) -> Self {
        self.config.despeckle = pixels;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.config.tracer = Some(tracer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn companion_editor(mut self, editor: Arc<dyn CompanionPdfEditor>) -> Self {
        self.config.companion_editor = Some(editor);
        self
    }

    /// Build the configuration, validating colors and opacities.
    pub fn build(self) -> Result<ConversionConfig, NoteError> {
        let c = &self.config;
        c.note_colors.anchors()?;
        c.mark_colors.anchors()?;
        for (name, v) in [
            ("note marker opacity", c.note_marker_opacity),
            ("mark marker opacity", c.mark_marker_opacity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(NoteError::InvalidConfig(format!(
                    "{name} must be within 0.0–1.0, got {v}"
                )));
            }
        }
        if c.concurrency == 0 {
            return Err(NoteError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
