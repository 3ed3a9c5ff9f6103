//! Per-page rendering: layers → tone masks → traced [`ToneLayer`]s, plus
//! the background raster.
//!
//! ## Why spawn_blocking?
//!
//! Run-length decoding, mask building and tracing are CPU-bound and the
//! container is read with blocking file I/O. Each page runs on the blocking
//! pool via `tokio::task::spawn_blocking`, at most `concurrency` at a time,
//! so the async workers never stall.
//!
//! ## Why one file handle per page?
//!
//! Every page task opens its own [`Container`] on the input path. Tasks
//! then share nothing mutable: the parsed [`Notebook`] and the [`Palette`]
//! are read-only, and each task writes only its own result slot.

use super::container::{Container, LayerKey, LayerKind, LayerProtocol, Notebook, Page};
use super::grouping::{self, ToneLayer};
use super::palette::{codes, Palette};
use super::rle;
use super::trace::{Bitmap, TraceParams, Tracer};
use super::vector::BackgroundImage;
use crate::error::{NoteError, PageError};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use image::RgbaImage;
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a page task needs, shared read-only across tasks.
pub struct RenderContext {
    pub path: PathBuf,
    pub notebook: Arc<Notebook>,
    pub palette: Palette,
    pub tracer: Arc<dyn Tracer>,
    pub params: TraceParams,
    pub include_background: bool,
}

/// Output of one page task.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// 0-based position in the notebook.
    pub index: usize,
    /// Marker layers first, then ink; never contains an empty layer.
    pub layers: Vec<ToneLayer>,
    /// `None` when disabled, absent or entirely white.
    pub background: Option<BackgroundImage>,
}

/// Render every page with bounded parallelism and return them in page order.
///
/// The first page error aborts the whole render; pages still in flight are
/// left to finish and their results are discarded.
pub async fn render_pages(
    ctx: Arc<RenderContext>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
) -> Result<Vec<RenderedPage>, NoteError> {
    let total = ctx.notebook.pages.len();
    let mut slots: Vec<Option<RenderedPage>> = vec![None; total];

    let mut tasks = stream::iter((0..total).map(|index| {
        let ctx = Arc::clone(&ctx);
        let progress = progress.clone();
        async move {
            if let Some(ref cb) = progress {
                cb.on_page_start(index + 1, total);
            }
            let joined = tokio::task::spawn_blocking(move || {
                let page = &ctx.notebook.pages[index];
                render_page_blocking(&ctx, index, page)
            })
            .await;
            (index, joined)
        }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some((index, joined)) = tasks.next().await {
        let result = joined
            .map_err(|e| NoteError::Internal(format!("Render task for page {} panicked: {e}", index + 1)))?;
        match result {
            Ok(page) => {
                if let Some(ref cb) = progress {
                    cb.on_page_complete(index + 1, total, page.layers.len());
                }
                slots[index] = Some(page);
            }
            Err(source) => {
                if let Some(ref cb) = progress {
                    cb.on_page_error(index + 1, total, &source.to_string());
                }
                return Err(NoteError::RenderFailed {
                    page: index + 1,
                    source,
                });
            }
        }
    }

    let pages: Vec<RenderedPage> = slots.into_iter().flatten().collect();
    if pages.len() != total {
        return Err(NoteError::Internal(format!(
            "{} of {} page results missing",
            total - pages.len(),
            total
        )));
    }
    info!("Rendered {} pages", total);
    Ok(pages)
}

/// Render one page on the current thread with its own file handle.
pub fn render_page_blocking(
    ctx: &RenderContext,
    index: usize,
    page: &Page,
) -> Result<RenderedPage, PageError> {
    let mut c = Container::open(&ctx.path).map_err(|e| PageError::Open {
        detail: e.to_string(),
    })?;

    let layers = content_layers(
        &mut c,
        page,
        &ctx.notebook,
        &ctx.palette,
        ctx.tracer.as_ref(),
        &ctx.params,
    )?;
    let background = if ctx.include_background {
        background_raster(&mut c, page, &ctx.notebook, &ctx.palette)?
    } else {
        None
    };

    debug!(
        "Page {}: {} tone layers, background: {}",
        page.number,
        layers.len(),
        background.is_some()
    );
    Ok(RenderedPage {
        index,
        layers,
        background,
    })
}

fn read_layer<R: Read + Seek>(
    c: &mut Container<R>,
    key: &LayerKey,
    addr: u64,
) -> Result<Vec<u8>, PageError> {
    c.read_block(addr).map_err(|e| PageError::LayerRead {
        layer: key.to_string(),
        detail: e.to_string(),
    })
}

fn read_png<R: Read + Seek>(
    c: &mut Container<R>,
    key: &LayerKey,
    addr: u64,
) -> Result<RgbaImage, PageError> {
    let data = read_layer(c, key, addr)?;
    grouping::decode_png(&data).map_err(|e| PageError::ImageDecode {
        layer: key.to_string(),
        detail: e.to_string(),
    })
}

/// Decode, group and trace the non-background layers of a page.
pub fn content_layers<R: Read + Seek>(
    c: &mut Container<R>,
    page: &Page,
    notebook: &Notebook,
    palette: &Palette,
    tracer: &dyn Tracer,
    params: &TraceParams,
) -> Result<Vec<ToneLayer>, PageError> {
    let (width, height) = (notebook.geometry.width, notebook.geometry.height);
    let mut code_map = vec![codes::WHITE; width * height];
    let mut images = Vec::new();

    for layer in &page.layers {
        if layer.bitmap_address == 0 || layer.key == LayerKey::Background {
            continue;
        }
        match layer.protocol {
            LayerProtocol::RunLength => {
                let data = read_layer(c, &layer.key, layer.bitmap_address)?;
                rle::decode_to_codes(&data, &mut code_map);
            }
            LayerProtocol::Png => images.push(read_png(c, &layer.key, layer.bitmap_address)?),
            LayerProtocol::Unknown(ref p) => {
                debug!("Skipping layer {} with protocol {:?}", layer.key, p)
            }
        }
    }

    let trace = |mask: Bitmap, label: String| {
        tracer.trace(&mask, params).map_err(|e| PageError::Tracing {
            group: label,
            detail: e.to_string(),
        })
    };

    let mut layers = Vec::new();
    for (group, mask) in grouping::group_masks(&code_map, width, height) {
        let paths = trace(mask, group.to_string())?;
        if !paths.is_empty() {
            layers.push(ToneLayer::for_group(group, palette, paths));
        }
    }
    drop(code_map);

    for img in &images {
        let paths = trace(grouping::luma_mask(img, width, height), "image layer".into())?;
        if !paths.is_empty() {
            layers.push(ToneLayer {
                rgb: palette.rgb(codes::BLACK),
                alpha: 0xFF,
                paths,
            });
        }
    }

    grouping::markers_first(&mut layers);
    Ok(layers)
}

/// Build the page's background raster from its `BGLAYER`.
///
/// Returns `None` when the result is entirely white.
pub fn background_raster<R: Read + Seek>(
    c: &mut Container<R>,
    page: &Page,
    notebook: &Notebook,
    palette: &Palette,
) -> Result<Option<BackgroundImage>, PageError> {
    let (width, height) = (notebook.geometry.width, notebook.geometry.height);
    let mut rgb = vec![0xFFu8; width * height * 3];

    for layer in &page.layers {
        if layer.key != LayerKey::Background
            || layer.bitmap_address == 0
            || layer.kind == LayerKind::Mark
        {
            continue;
        }
        match layer.protocol {
            LayerProtocol::RunLength => {
                let data = read_layer(c, &layer.key, layer.bitmap_address)?;
                rle::decode_to_rgb(&data, &mut rgb, palette);
            }
            LayerProtocol::Png => {
                let img = read_png(c, &layer.key, layer.bitmap_address)?;
                composite_over_rgb(&img, &mut rgb, width, height);
            }
            LayerProtocol::Unknown(_) => {}
        }
    }

    if rgb.iter().all(|&b| b == 0xFF) {
        return Ok(None);
    }
    Ok(Some(BackgroundImage { width, height, rgb }))
}

/// Source-over composite of a straight-alpha image onto an opaque RGB raster.
pub fn composite_over_rgb(img: &RgbaImage, rgb: &mut [u8], width: usize, height: usize) {
    let max_x = (img.width() as usize).min(width);
    let max_y = (img.height() as usize).min(height);
    for y in 0..max_y {
        for x in 0..max_x {
            let [r, g, b, a] = img.get_pixel(x as u32, y as u32).0;
            if a == 0 {
                continue;
            }
            let off = (y * width + x) * 3;
            let dst = &mut rgb[off..off + 3];
            if a == 0xFF {
                dst.copy_from_slice(&[r, g, b]);
                continue;
            }
            let (sa, da) = (a as u32, 255 - a as u32);
            for (d, s) in dst.iter_mut().zip([r, g, b]) {
                *d = ((s as u32 * sa + *d as u32 * da) / 255) as u8;
            }
        }
    }
}
