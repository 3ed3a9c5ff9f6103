//! Error types for the note2pdf library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`NoteError`]: **fatal** for the document being converted. The file is
//!   missing or unreadable, its signature or footer cannot be read, or the
//!   output cannot be written. Returned as `Err(NoteError)` from the
//!   top-level `convert*` functions.
//!
//! * [`PageError`]: raised while rendering a single page (layer read,
//!   embedded image decode, tracing). A page error still aborts the whole
//!   document: it is wrapped in [`NoteError::RenderFailed`] so that no
//!   partial PDF is ever written.
//!
//! Malformed metadata records, links and layers are *not* errors. They are
//! dropped during parsing and logged at debug level. A run-length stream
//! that ends early is not an error either: decoding stops at the shortfall.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the note2pdf library.
#[derive(Debug, Error)]
pub enum NoteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Notebook file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is not a `.note` or `.mark` file.
    #[error("Invalid input '{input}': expected a .note or .mark file")]
    InvalidInput { input: String },

    /// A `.mark` file has no companion PDF next to it.
    #[error("Companion PDF '{pdf}' not found for mark file '{mark}'")]
    CompanionMissing { mark: PathBuf, pdf: PathBuf },

    // ── Container errors ──────────────────────────────────────────────────
    /// Open, seek or read failed on the container.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Signature or footer could not be read; the file is not a notebook.
    #[error("'{path}' is not a readable notebook: {detail}")]
    Format { path: PathBuf, detail: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// A page failed to render; the whole document is aborted.
    #[error("Rendering page {page} failed: {source}")]
    RenderFailed {
        page: usize,
        #[source]
        source: PageError,
    },

    /// The tracing oracle failed outside of a page render (mark overlays).
    #[error("Tracing failed for {label} on page {page}: {detail}")]
    Tracing {
        label: String,
        page: usize,
        detail: String,
    },

    /// The companion PDF editor rejected an edit.
    #[error("Editing companion PDF '{pdf}' failed: {detail}")]
    CompanionEdit { pdf: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NoteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NoteError::Io {
            path: path.into(),
            source,
        }
    }
}

/// An error raised while rendering a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page task could not open its own handle on the container.
    #[error("opening container: {detail}")]
    Open { detail: String },

    /// A layer's bitmap block could not be read.
    #[error("reading layer {layer}: {detail}")]
    LayerRead { layer: String, detail: String },

    /// An embedded PNG layer could not be decoded.
    #[error("decoding image layer {layer}: {detail}")]
    ImageDecode { layer: String, detail: String },

    /// The tracing oracle failed for one tone group.
    #[error("tracing {group}: {detail}")]
    Tracing { group: String, detail: String },
}

/// Failure reported by a [`crate::pipeline::trace::Tracer`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TraceError(pub String);

/// Failure reported by a [`crate::pipeline::mark::CompanionPdfEditor`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EditError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failed_display_includes_page_and_cause() {
        let e = NoteError::RenderFailed {
            page: 3,
            source: PageError::Tracing {
                group: "dark gray".into(),
                detail: "out of memory".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("dark gray"), "got: {msg}");
    }

    #[test]
    fn format_error_display() {
        let e = NoteError::Format {
            path: PathBuf::from("a.note"),
            detail: "footer address out of range".into(),
        };
        assert!(e.to_string().contains("a.note"));
        assert!(e.to_string().contains("footer"));
    }

    #[test]
    fn companion_missing_display() {
        let e = NoteError::CompanionMissing {
            mark: PathBuf::from("book.pdf.mark"),
            pdf: PathBuf::from("book.pdf"),
        };
        assert!(e.to_string().contains("book.pdf.mark"));
    }

    #[test]
    fn page_error_roundtrips_through_json() {
        let e = PageError::LayerRead {
            layer: "MAINLAYER".into(),
            detail: "unexpected eof".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), e.to_string());
    }
}
