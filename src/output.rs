//! Result types returned by the conversion entry points.
//!
//! Everything here is plain data with `serde` derives so the CLI can print
//! it as JSON (`--json`) and library callers can log or persist it.

use crate::pipeline::container::{DeviceGeometry, Notebook};
use serde::{Deserialize, Serialize};

/// The complete result of converting one notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The finished PDF document.
    #[serde(skip)]
    pub pdf: Vec<u8>,

    /// One report per page, in page order.
    pub pages: Vec<PageReport>,

    /// What the container declared about itself.
    pub notebook: NotebookSummary,

    pub stats: ConversionStats,
}

/// What was emitted for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Traced tone layers drawn on the page.
    pub tone_layers: usize,
    /// Whether a real background raster was embedded (the OCR placeholder
    /// does not count).
    pub background: bool,
    /// Internal link annotations on the page.
    pub links: usize,
    /// Object id of the page object.
    pub page_object_id: usize,
    /// Number of object ids the page consumed.
    pub object_count: usize,
}

/// Container-level facts, available without rendering (see
/// [`crate::convert::inspect`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookSummary {
    /// The 20-byte signature string, e.g. `SN_FILE_VER_20230015`.
    pub signature: String,
    /// `FILE_ID` from the header block; empty when absent.
    pub file_id: String,
    pub page_count: usize,
    /// Links pointing into this same notebook.
    pub internal_links: usize,
    /// Links pointing at other files.
    pub external_links: usize,
    pub geometry: DeviceGeometry,
    /// Page size in PDF points.
    pub page_width_pt: f64,
    pub page_height_pt: f64,
}

impl NotebookSummary {
    pub fn from_notebook(nb: &Notebook) -> Self {
        let internal_links = nb.links.iter().filter(|l| l.same_file).count();
        let (page_width_pt, page_height_pt) = nb.geometry.page_size_pt();
        Self {
            signature: nb.signature.clone(),
            file_id: nb.file_id.clone(),
            page_count: nb.pages.len(),
            internal_links,
            external_links: nb.links.len() - internal_links,
            geometry: nb.geometry,
            page_width_pt,
            page_height_pt,
        }
    }
}

/// Aggregate statistics for a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,

    /// Highest object id in the document (the xref covers `0..=total_objects`).
    pub total_objects: usize,

    /// Tone layers across all pages.
    pub total_tone_layers: usize,

    /// Pages that embedded a real background raster.
    pub pages_with_background: usize,

    /// Wall-clock time for the whole conversion in milliseconds.
    pub total_duration_ms: u64,

    /// Time spent decoding and tracing pages in milliseconds.
    pub render_duration_ms: u64,

    /// Time spent compiling page objects and serializing the PDF.
    pub assembly_duration_ms: u64,

    /// Size of the finished PDF in bytes.
    pub pdf_bytes: usize,
}
