//! Batch conversion API: emit one result per document as it completes.
//!
//! ## Why stream?
//!
//! A directory of notebooks can take minutes. Yielding each document's
//! result as soon as it finishes lets callers report progress, and it keeps
//! failures isolated: one unreadable notebook is reported as its own item
//! and never stops its siblings.
//!
//! Unlike the eager [`crate::convert::convert`], [`convert_dir_stream`]
//! returns a `Stream` of [`DocumentResult`]s in completion order (not
//! directory order).

use crate::config::ConversionConfig;
use crate::convert::{convert, convert_mark, convert_mark_to_file, write_atomic};
use crate::error::NoteError;
use crate::output::ConversionStats;
use crate::pipeline::input::{self, InputKind};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub kind: InputKind,
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentStatus {
    /// A notebook was converted and written.
    Converted(ConversionStats),
    /// A mark file was rendered; `applied` is false when no companion
    /// editor is configured and nothing was written.
    MarkRendered {
        overlays: usize,
        annotations: usize,
        applied: bool,
    },
    /// The output is at least as new as its inputs.
    UpToDate,
}

#[derive(Debug)]
pub struct DocumentResult {
    pub job: DocumentJob,
    pub result: Result<DocumentStatus, NoteError>,
}

/// Convert every `.note` and `.mark` file under `input_dir` into
/// `output_dir`, mirroring the directory structure.
///
/// * `dir/a.note` → `out/dir/a.pdf`
/// * `dir/book.pdf.mark` → `out/dir/book.pdf` (only when `dir/book.pdf`
///   exists)
///
/// # Errors
/// Only a failure to walk `input_dir` is returned directly; per-document
/// failures are items of the stream.
pub async fn convert_dir_stream(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentStream, NoteError> {
    let input_dir = input_dir.as_ref().to_path_buf();
    let output_dir = output_dir.as_ref().to_path_buf();
    info!(
        "Starting batch conversion: {} → {}",
        input_dir.display(),
        output_dir.display()
    );

    let jobs = tokio::task::spawn_blocking(move || plan_jobs(&input_dir, &output_dir))
        .await
        .map_err(|e| NoteError::Internal(format!("Directory walk panicked: {e}")))??;
    info!("Found {} documents", jobs.len());

    let concurrency = config.concurrency.max(1);
    let config = Arc::new(config.clone());
    let s = stream::iter(jobs.into_iter().map(move |job| {
        let config = Arc::clone(&config);
        async move {
            let result = run_job(&job, &config).await;
            match &result {
                Ok(status) => debug!("{}: {:?}", job.input.display(), status),
                Err(e) => warn!("{}: {}", job.input.display(), e),
            }
            DocumentResult { job, result }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Walk `input_dir` recursively and map every convertible file to its
/// output path. Jobs are returned in sorted path order.
pub fn plan_jobs(input_dir: &Path, output_dir: &Path) -> Result<Vec<DocumentJob>, NoteError> {
    let mut files = Vec::new();
    collect_files(input_dir, &mut files)?;
    files.sort();

    let mut jobs = Vec::new();
    for path in files {
        let Some(kind) = input::input_kind(&path) else {
            continue;
        };
        let Ok(rel) = path.strip_prefix(input_dir) else {
            continue;
        };
        let output = match &kind {
            InputKind::Note => output_dir.join(rel).with_extension("pdf"),
            InputKind::Mark { companion } => {
                if !companion.is_file() {
                    debug!("Skipping {}: no companion PDF", path.display());
                    continue;
                }
                output_dir.join(rel).with_extension("")
            }
        };
        jobs.push(DocumentJob {
            input: path,
            output,
            kind,
        });
    }
    Ok(jobs)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), NoteError> {
    let entries = std::fs::read_dir(dir).map_err(|e| NoteError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| NoteError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| NoteError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

/// True when `output` exists and is not older than any of `inputs`.
pub async fn is_up_to_date(output: &Path, inputs: &[&Path]) -> bool {
    let Some(out_time) = modified(output).await else {
        return false;
    };
    for input in inputs {
        if !modified(input).await.is_some_and(|t| t <= out_time) {
            return false;
        }
    }
    true
}

async fn run_job(job: &DocumentJob, config: &ConversionConfig) -> Result<DocumentStatus, NoteError> {
    match &job.kind {
        InputKind::Note => {
            if is_up_to_date(&job.output, &[job.input.as_path()]).await {
                return Ok(DocumentStatus::UpToDate);
            }
            let output = convert(&job.input, config).await?;
            write_atomic(&job.output, &output.pdf).await?;
            Ok(DocumentStatus::Converted(output.stats))
        }
        InputKind::Mark { companion } => {
            if config.companion_editor.is_none() {
                let doc = convert_mark(&job.input, config).await?;
                return Ok(DocumentStatus::MarkRendered {
                    overlays: doc.overlays.len(),
                    annotations: doc.annotations.len(),
                    applied: false,
                });
            }
            if is_up_to_date(&job.output, &[job.input.as_path(), companion.as_path()]).await {
                return Ok(DocumentStatus::UpToDate);
            }
            let doc = convert_mark_to_file(&job.input, &job.output, config).await?;
            Ok(DocumentStatus::MarkRendered {
                overlays: doc.overlays.len(),
                annotations: doc.annotations.len(),
                applied: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_mirrors_tree_and_requires_companions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::write(root.join("a.note"), b"").unwrap();
        std::fs::write(root.join("sub/deeper/b.note"), b"").unwrap();
        std::fs::write(root.join("sub/book.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("sub/book.pdf.mark"), b"").unwrap();
        std::fs::write(root.join("sub/orphan.pdf.mark"), b"").unwrap();
        std::fs::write(root.join("readme.txt"), b"").unwrap();

        let out = Path::new("/out");
        let jobs = plan_jobs(root, out).unwrap();
        let outputs: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                out.join("a.pdf"),
                out.join("sub/book.pdf"),
                out.join("sub/deeper/b.pdf"),
            ]
        );
        assert!(matches!(jobs[1].kind, InputKind::Mark { .. }));
    }

    #[tokio::test]
    async fn missing_output_is_never_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.note");
        std::fs::write(&input, b"").unwrap();
        assert!(!is_up_to_date(&dir.path().join("a.pdf"), &[input.as_path()]).await);
    }

    #[tokio::test]
    async fn newer_output_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.note");
        let output = dir.path().join("a.pdf");
        std::fs::write(&input, b"").unwrap();
        std::fs::write(&output, b"").unwrap();
        let older = SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&input)
            .unwrap()
            .set_modified(older)
            .unwrap();
        assert!(is_up_to_date(&output, &[input.as_path()]).await);
        assert!(!is_up_to_date(&input, &[output.as_path()]).await);
        // Any missing input forces a rebuild.
        let gone = dir.path().join("gone.pdf");
        assert!(!is_up_to_date(&output, &[input.as_path(), gone.as_path()]).await);
    }
}
