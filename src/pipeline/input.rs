//! Input resolution: validate a user-supplied path and decide what it is.
//!
//! ## Why check up front?
//!
//! Opening the container would surface a missing file as a generic I/O
//! error deep inside parsing. Checking existence and read permission here
//! gives callers the specific `FileNotFound` / `PermissionDenied` variants,
//! and the extension check rejects stray PDFs or images before any bytes
//! are interpreted as a notebook.

use crate::error::NoteError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What kind of container a path holds, decided by its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A standalone notebook (`.note`).
    Note,
    /// Annotations (`.mark`) over the PDF at `companion`.
    Mark { companion: PathBuf },
}

/// A validated local input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mark(&self) -> bool {
        matches!(self.kind, InputKind::Mark { .. })
    }
}

/// Classify `path` by extension without touching the file system.
///
/// The companion of `book.pdf.mark` is `book.pdf`.
pub fn input_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "note" => Some(InputKind::Note),
        "mark" => Some(InputKind::Mark {
            companion: path.with_extension(""),
        }),
        _ => None,
    }
}

/// Resolve a local file, validating existence, readability and extension.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<ResolvedInput, NoteError> {
    let path = input.as_ref().to_path_buf();

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(NoteError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(NoteError::FileNotFound { path });
        }
        Err(e) => return Err(NoteError::io(path, e)),
    }
    if path.is_dir() {
        return Err(NoteError::InvalidInput {
            input: path.display().to_string(),
        });
    }

    let kind = input_kind(&path).ok_or_else(|| NoteError::InvalidInput {
        input: path.display().to_string(),
    })?;
    debug!("Resolved {:?} input: {}", kind, path.display());
    Ok(ResolvedInput { path, kind })
}

/// Resolve a `.mark` input and require its companion PDF to exist.
pub fn resolve_mark(input: impl AsRef<Path>) -> Result<(ResolvedInput, PathBuf), NoteError> {
    let resolved = resolve_input(input)?;
    let InputKind::Mark { companion } = &resolved.kind else {
        return Err(NoteError::InvalidInput {
            input: format!("{} (expected a .mark file)", resolved.path.display()),
        });
    };
    if !companion.is_file() {
        return Err(NoteError::CompanionMissing {
            mark: resolved.path.clone(),
            pdf: companion.clone(),
        });
    }
    let companion = companion.clone();
    Ok((resolved, companion))
}
