//! Eager (full-document) conversion entry points.
//!
//! ## Why render first, number later?
//!
//! Pages render concurrently and finish in any order, and a page's object
//! count is only known once its layers are traced. Object ids are therefore
//! assigned in a single sequential pass after every page is back: page `k`
//! starts where page `k-1` ended. Links are compiled against placeholders
//! and resolved in that same pass, once all page ids are final.

use crate::config::ConversionConfig;
use crate::error::NoteError;
use crate::output::{ConversionOutput, ConversionStats, NotebookSummary, PageReport};
use crate::pipeline::container::{Container, Notebook};
use crate::pipeline::input;
use crate::pipeline::mark::{self, MarkDocument};
use crate::pipeline::palette::Palette;
use crate::pipeline::pdf::{self, FIRST_PAGE_ID};
use crate::pipeline::render::{self, RenderContext, RenderedPage};
use crate::pipeline::trace::{RectTracer, TraceParams, Tracer};
use crate::pipeline::vector::{self, PageChunk, PageFrame};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a `.note` file to PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Any failure is fatal for the document and no PDF bytes are returned:
/// - File not found / permission denied / not a `.note` file
/// - Signature or footer unreadable
/// - Any page failing to render
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NoteError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input)?;
    if resolved.is_mark() {
        return Err(NoteError::InvalidInput {
            input: format!(
                "{} (annotation files are converted with convert_mark)",
                resolved.path.display()
            ),
        });
    }
    info!("Starting conversion: {}", resolved.path.display());

    // ── Step 2: Parse the container ──────────────────────────────────────
    let notebook = Arc::new(parse_notebook(resolved.path.clone()).await?);
    let total_pages = notebook.pages.len();
    info!(
        "Notebook has {} pages ({}x{} px)",
        total_pages, notebook.geometry.width, notebook.geometry.height
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 3: Render pages ─────────────────────────────────────────────
    let palette = Palette::from_config(&config.note_colors, config.note_marker_opacity)?;
    let ctx = Arc::new(RenderContext {
        path: resolved.path,
        notebook: Arc::clone(&notebook),
        palette,
        tracer: resolve_tracer(config),
        params: trace_params(config),
        include_background: config.include_background,
    });
    let render_start = Instant::now();
    let rendered =
        render::render_pages(ctx, config.concurrency, config.progress_callback.clone()).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 4: Number, link and serialize ───────────────────────────────
    let assembly_start = Instant::now();
    let ocr_fallback = config.ocr_fallback;
    let nb = Arc::clone(&notebook);
    let (pdf, pages, total_objects) =
        tokio::task::spawn_blocking(move || assemble_document(&nb, &rendered, ocr_fallback))
            .await
            .map_err(|e| NoteError::Internal(format!("Assembly task panicked: {e}")))??;
    let assembly_duration_ms = assembly_start.elapsed().as_millis() as u64;

    // ── Step 5: Compute stats ────────────────────────────────────────────
    let stats = ConversionStats {
        total_pages,
        total_objects,
        total_tone_layers: pages.iter().map(|p| p.tone_layers).sum(),
        pages_with_background: pages.iter().filter(|p| p.background).count(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        assembly_duration_ms,
        pdf_bytes: pdf.len(),
    };

    info!(
        "Conversion complete: {} pages, {} objects, {} bytes, {}ms total",
        total_pages, total_objects, stats.pdf_bytes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, pdf.len());
    }

    Ok(ConversionOutput {
        pdf,
        pages,
        notebook: NotebookSummary::from_notebook(&notebook),
        stats,
    })
}

/// Convert a notebook and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed conversion never
/// leaves a partial PDF behind.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, NoteError> {
    let output = convert(input, config).await?;
    write_atomic(output_path.as_ref(), &output.pdf).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NoteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NoteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Parse a notebook's container without rendering anything.
pub async fn inspect(input: impl AsRef<Path>) -> Result<NotebookSummary, NoteError> {
    let resolved = input::resolve_input(input)?;
    let notebook = parse_notebook(resolved.path).await?;
    Ok(NotebookSummary::from_notebook(&notebook))
}

/// Convert notebook bytes held in memory.
///
/// Page workers each open their own handle on the input, so the bytes are
/// written to a managed [`tempfile`] that is removed on return or panic.
///
/// # Example
/// ```rust,no_run
/// use note2pdf::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("journal.note")?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// std::fs::write("journal.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, NoteError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".note")
        .tempfile()
        .map_err(|e| NoteError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| NoteError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| NoteError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(tmp.path(), config).await
}

/// Render the overlays and highlights of a `.mark` file.
///
/// Nothing is written; see [`convert_mark_to_file`] to apply the result to
/// the companion PDF.
pub async fn convert_mark(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<MarkDocument, NoteError> {
    let resolved = input::resolve_input(input)?;
    if !resolved.is_mark() {
        return Err(NoteError::InvalidInput {
            input: format!("{} (expected a .mark file)", resolved.path.display()),
        });
    }
    info!("Rendering mark file: {}", resolved.path.display());

    let palette = Palette::from_config(&config.mark_colors, config.mark_marker_opacity)?;
    let tracer = resolve_tracer(config);
    let params = trace_params(config);
    let path = resolved.path;

    tokio::task::spawn_blocking(move || {
        let notebook = Notebook::open(&path)?;
        let mut c = Container::open(&path).map_err(|e| NoteError::io(&path, e))?;
        mark::render_mark_document(&mut c, &notebook, &palette, tracer.as_ref(), &params, &path)
    })
    .await
    .map_err(|e| NoteError::Internal(format!("Mark task panicked: {e}")))?
}

/// Render a `.mark` file and apply it to its companion PDF, writing the
/// edited PDF to `output_path`.
///
/// Requires [`ConversionConfig::companion_editor`].
pub async fn convert_mark_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<MarkDocument, NoteError> {
    let editor = config.companion_editor.clone().ok_or_else(|| {
        NoteError::InvalidConfig("no companion PDF editor configured for .mark output".into())
    })?;
    let (resolved, companion) = input::resolve_mark(input)?;
    let doc = convert_mark(&resolved.path, config).await?;

    let output = output_path.as_ref().to_path_buf();
    create_parent(&output).await?;
    tokio::task::spawn_blocking(move || {
        mark::apply_to_companion(&doc, editor.as_ref(), &companion, &output)?;
        info!(
            "Applied {} overlays and {} annotations to {}",
            doc.overlays.len(),
            doc.annotations.len(),
            output.display()
        );
        Ok(doc)
    })
    .await
    .map_err(|e| NoteError::Internal(format!("Companion edit task panicked: {e}")))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

pub(crate) fn resolve_tracer(config: &ConversionConfig) -> Arc<dyn Tracer> {
    config
        .tracer
        .clone()
        .unwrap_or_else(|| Arc::new(RectTracer))
}

pub(crate) fn trace_params(config: &ConversionConfig) -> TraceParams {
    TraceParams {
        despeckle: config.despeckle,
    }
}

/// Parse on the blocking pool; container reads are synchronous.
async fn parse_notebook(path: PathBuf) -> Result<Notebook, NoteError> {
    tokio::task::spawn_blocking(move || Notebook::open(&path))
        .await
        .map_err(|e| NoteError::Internal(format!("Parse task panicked: {e}")))?
}

/// Assign object ids in page order, resolve link targets and serialize.
///
/// Returns the PDF, one report per page and the highest object id.
fn assemble_document(
    notebook: &Notebook,
    rendered: &[RenderedPage],
    ocr_fallback: bool,
) -> Result<(Vec<u8>, Vec<PageReport>, usize), NoteError> {
    let total = rendered.len();
    let frame = PageFrame::from_geometry(&notebook.geometry);
    let links = vector::page_links(&notebook.links, &notebook.geometry, total);

    let mut next_id = FIRST_PAGE_ID;
    let mut chunks: Vec<PageChunk> = Vec::with_capacity(total);
    let mut reports = Vec::with_capacity(total);
    for page in rendered {
        let page_links = links.get(page.index).map_or(&[][..], Vec::as_slice);
        let chunk = vector::build_page_chunk(
            &page.layers,
            page.background.as_ref(),
            &frame,
            page_links,
            next_id,
            ocr_fallback,
        );
        reports.push(PageReport {
            page_num: page.index + 1,
            tone_layers: page.layers.len(),
            background: page.background.is_some(),
            links: page_links.len(),
            page_object_id: next_id,
            object_count: chunk.object_count(),
        });
        next_id += chunk.object_count();
        chunks.push(chunk);
    }

    let page_ids: Vec<usize> = chunks.iter().map(PageChunk::page_id).collect();
    for chunk in &mut chunks {
        if let Some(page_obj) = chunk.objects.first_mut() {
            page_obj.data = vector::resolve_page_refs(&page_obj.data, &page_ids);
        }
    }

    let total_objects = next_id - 1;
    let pdf = pdf::write_document(
        Vec::new(),
        &page_ids,
        chunks.iter().flat_map(|c| &c.objects),
        total_objects,
    )
    .map_err(|e| NoteError::Internal(format!("serializing PDF: {e}")))?;
    debug!("Assembled {} pages into {} objects", total, total_objects);
    Ok((pdf, reports, total_objects))
}

async fn create_parent(path: &Path) -> Result<(), NoteError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| NoteError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        _ => Ok(()),
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NoteError> {
    create_parent(path).await?;

    let tmp_path = path.with_extension("pdf.tmp");
    let fail = |e| NoteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
