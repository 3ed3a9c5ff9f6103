//! Annotation (`.mark`) files.
//!
//! A `.mark` file shares the notebook container layout but annotates an
//! existing PDF (its *companion*, same path minus `.mark`). Two kinds of
//! content are extracted:
//!
//! * **Ink overlays**: `MARK` layers are rendered through the identity
//!   palette, split by gray level into pen and marker masks, traced and
//!   compiled into standalone one-page vector PDFs.
//! * **Text highlights**: `HIGHLIGHTINFO` in the header holds base64 JSON
//!   describing highlight and underline rectangles per page.
//!
//! Stamping either onto the companion PDF needs a PDF editor and is
//! delegated to a [`CompanionPdfEditor`] supplied by the caller.

use super::container::{Container, DeviceGeometry, LayerKind, LayerProtocol, Metadata, Notebook, Page};
use super::grouping::{self, ToneLayer};
use super::palette::{codes, Palette};
use super::pdf::{single_page_document, FIRST_PAGE_ID};
use super::rle;
use super::trace::{Bitmap, TraceParams, Tracer};
use super::vector::{build_page_chunk, PageFrame};
use crate::error::{EditError, NoteError, PageError};
use base64::Engine as _;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Mark pixels at or above this gray level are marker strokes.
pub const MARKER_GRAY_THRESHOLD: u8 = 196;

/// Aspect ratios closer than this are treated as equal.
const ASPECT_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    Pen,
    Marker,
}

/// A one-page vector PDF to stamp over a companion page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkOverlay {
    /// 1-indexed page of the companion PDF.
    pub page_number: usize,
    pub kind: OverlayKind,
    /// Marker overlays already carry their opacity in an ExtGState.
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

// ── Highlight records ───────────────────────────────────────────────────

/// Rectangle in top-left-origin page space, as stored in `HIGHLIGHTINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MupdfRect {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightRecord {
    #[serde(default)]
    annotation_type: i64,
    #[serde(default)]
    color_type: i64,
    #[serde(default)]
    page: i64,
    #[serde(default)]
    mupdf_rect_list: Vec<MupdfRect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Highlight,
    Underline,
}

impl AnnotationKind {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AnnotationKind::Highlight),
            1 => Some(AnnotationKind::Underline),
            _ => None,
        }
    }
}

/// A highlight or underline to insert into the companion PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDescriptor {
    /// 0-indexed page of the companion PDF.
    pub page_index: usize,
    pub kind: AnnotationKind,
    /// RGB in 0..=1.
    pub color: [f64; 3],
    pub rects: Vec<MupdfRect>,
}

impl AnnotationDescriptor {
    /// One `[x0, y0, x1, y1]` quad per rectangle, flipped to a bottom-left
    /// origin on a page `page_height` points tall.
    pub fn pdf_rects(&self, page_height: f64) -> Vec<[f64; 4]> {
        self.rects
            .iter()
            .map(|r| [r.x0, page_height - r.y1, r.x1, page_height - r.y0])
            .collect()
    }

    /// Bounding box of [`Self::pdf_rects`].
    pub fn bounding_rect(&self, page_height: f64) -> [f64; 4] {
        self.pdf_rects(page_height).iter().fold(
            [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
            |b, r| [b[0].min(r[0]), b[1].min(r[1]), b[2].max(r[2]), b[3].max(r[3])],
        )
    }
}

fn annotation_color(color_type: i64) -> [f64; 3] {
    match color_type {
        4 => [1.0, 0.0, 0.0],
        _ => [1.0, 1.0, 0.0],
    }
}

/// Read `HIGHLIGHTINFO` through the header block.
///
/// A missing field or an unreadable block yields no annotations; data that
/// is present but not valid base64 JSON is a format error.
pub fn read_highlights<R: Read + Seek>(
    c: &mut Container<R>,
    header: &Metadata,
    path: &Path,
) -> Result<Vec<AnnotationDescriptor>, NoteError> {
    let Some(addr) = header
        .get("HIGHLIGHTINFO")
        .and_then(|v| v.trim().parse::<u64>().ok())
    else {
        return Ok(Vec::new());
    };
    let raw = match c.read_block(addr) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Highlight block unreadable, skipping: {}", e);
            return Ok(Vec::new());
        }
    };
    decode_highlights(&raw).map_err(|detail| NoteError::Format {
        path: path.to_path_buf(),
        detail,
    })
}

/// Decode the base64 JSON payload of `HIGHLIGHTINFO`.
pub fn decode_highlights(raw: &[u8]) -> Result<Vec<AnnotationDescriptor>, String> {
    let json = base64::engine::general_purpose::STANDARD
        .decode(raw.trim_ascii())
        .map_err(|e| format!("decoding highlight base64: {e}"))?;
    let by_page: BTreeMap<String, Vec<HighlightRecord>> =
        serde_json::from_slice(&json).map_err(|e| format!("parsing highlight JSON: {e}"))?;

    let mut pages: Vec<(usize, Vec<HighlightRecord>)> = by_page
        .into_iter()
        .filter_map(|(k, v)| Some((k.trim().parse().ok()?, v)))
        .collect();
    pages.sort_by_key(|(idx, _)| *idx);

    let mut out = Vec::new();
    for (page_index, records) in pages {
        for rec in records {
            if rec.mupdf_rect_list.is_empty() {
                continue;
            }
            let Some(kind) = AnnotationKind::from_code(rec.annotation_type) else {
                debug!("Dropping annotation of type {}", rec.annotation_type);
                continue;
            };
            out.push(AnnotationDescriptor {
                page_index,
                kind,
                color: annotation_color(rec.color_type),
                rects: rec.mupdf_rect_list,
            });
        }
    }
    Ok(out)
}

// ── Ink overlays ────────────────────────────────────────────────────────

/// Composite the `MARK` layers of a page into a straight-alpha RGBA raster.
pub fn render_mark_rgba<R: Read + Seek>(
    c: &mut Container<R>,
    page: &Page,
    geometry: &DeviceGeometry,
) -> Result<Vec<u8>, PageError> {
    let (width, height) = (geometry.width, geometry.height);
    let mut rgba = vec![0u8; width * height * 4];

    for layer in &page.layers {
        if layer.bitmap_address == 0 || layer.kind != LayerKind::Mark {
            continue;
        }
        let data = c
            .read_block(layer.bitmap_address)
            .map_err(|e| PageError::LayerRead {
                layer: layer.key.to_string(),
                detail: e.to_string(),
            })?;
        match layer.protocol {
            LayerProtocol::RunLength => rle::decode_to_rgba(&data, &mut rgba, Palette::identity()),
            LayerProtocol::Png => {
                let img = grouping::decode_png(&data).map_err(|e| PageError::ImageDecode {
                    layer: layer.key.to_string(),
                    detail: e.to_string(),
                })?;
                composite_over_rgba(&img, &mut rgba, width, height);
            }
            LayerProtocol::Unknown(_) => {}
        }
    }
    Ok(rgba)
}

/// Source-over composite of a straight-alpha image onto an RGBA raster.
pub fn composite_over_rgba(img: &RgbaImage, rgba: &mut [u8], width: usize, height: usize) {
    let max_x = (img.width() as usize).min(width);
    let max_y = (img.height() as usize).min(height);
    for y in 0..max_y {
        for x in 0..max_x {
            let [r, g, b, a] = img.get_pixel(x as u32, y as u32).0;
            if a == 0 {
                continue;
            }
            let off = (y * width + x) * 4;
            let dst = &mut rgba[off..off + 4];
            if a == 0xFF {
                dst.copy_from_slice(&[r, g, b, 0xFF]);
                continue;
            }
            let sa = a as u32;
            let inv = 255 - sa;
            let da = dst[3] as u32;
            let out_a = sa + da * inv / 255;
            if out_a == 0 {
                continue;
            }
            for (i, s) in [r, g, b].into_iter().enumerate() {
                dst[i] = ((s as u32 * sa + dst[i] as u32 * da * inv / 255) / out_a) as u8;
            }
            dst[3] = out_a as u8;
        }
    }
}

pub fn has_visible_pixels(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4).any(|px| px[3] != 0)
}

/// Split visible pixels into pen (dark) and marker (light) masks.
/// A mask with no foreground is `None`.
pub fn split_pen_marker(rgba: &[u8], width: usize, height: usize) -> (Option<Bitmap>, Option<Bitmap>) {
    let mut pen = Bitmap::new(width, height);
    let mut marker = Bitmap::new(width, height);
    let (mut has_pen, mut has_marker) = (false, false);

    for (idx, px) in rgba.chunks_exact(4).enumerate().take(width * height) {
        if px[3] == 0 {
            continue;
        }
        if px[0] >= MARKER_GRAY_THRESHOLD {
            marker.set_index(idx, true);
            has_marker = true;
        } else {
            pen.set_index(idx, true);
            has_pen = true;
        }
    }
    (has_pen.then_some(pen), has_marker.then_some(marker))
}

/// Everything extracted from a `.mark` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkDocument {
    pub geometry: DeviceGeometry,
    pub page_count: usize,
    pub overlays: Vec<MarkOverlay>,
    pub annotations: Vec<AnnotationDescriptor>,
}

impl MarkDocument {
    /// Media box that fits a `page_w`×`page_h` companion page to this
    /// document's aspect ratio.
    pub fn media_box(&self, page_w: f64, page_h: f64) -> [f64; 4] {
        fit_media_box(page_w, page_h, self.geometry.width, self.geometry.height)
    }
}

/// Grow a page box symmetrically until it matches the `width`:`height`
/// aspect ratio. Returns `[llx, lly, urx, ury]`.
pub fn fit_media_box(page_w: f64, page_h: f64, width: usize, height: usize) -> [f64; 4] {
    let target = width as f64 / height as f64;
    let current = page_w / page_h;
    if (current - target).abs() < ASPECT_EPSILON {
        [0.0, 0.0, page_w, page_h]
    } else if current > target {
        let dy = (page_w / target - page_h) / 2.0;
        [0.0, -dy, page_w, page_h + dy]
    } else {
        let dx = (page_h * target - page_w) / 2.0;
        [-dx, 0.0, page_w + dx, page_h]
    }
}

/// Render, trace and compile the ink of every page, and decode highlights.
///
/// Runs on the calling thread; pages are processed in order.
pub fn render_mark_document<R: Read + Seek>(
    c: &mut Container<R>,
    notebook: &Notebook,
    palette: &Palette,
    tracer: &dyn Tracer,
    params: &TraceParams,
    path: &Path,
) -> Result<MarkDocument, NoteError> {
    let geometry = notebook.geometry;
    let frame = PageFrame::from_geometry(&geometry);
    let mut overlays = Vec::new();

    for page in &notebook.pages {
        let rgba = render_mark_rgba(c, page, &geometry).map_err(|source| NoteError::RenderFailed {
            page: page.number,
            source,
        })?;
        if !has_visible_pixels(&rgba) {
            continue;
        }
        let (pen, marker) = split_pen_marker(&rgba, geometry.width, geometry.height);
        drop(rgba);

        for (kind, mask) in [(OverlayKind::Pen, pen), (OverlayKind::Marker, marker)] {
            let Some(mask) = mask else {
                continue;
            };
            let label = match kind {
                OverlayKind::Pen => "pen",
                OverlayKind::Marker => "marker",
            };
            let paths = tracer
                .trace(&mask, params)
                .map_err(|e| NoteError::Tracing {
                    label: label.into(),
                    page: page.number,
                    detail: e.to_string(),
                })?;
            if paths.is_empty() {
                continue;
            }
            let alpha = match kind {
                OverlayKind::Pen => 0xFF,
                OverlayKind::Marker => palette.alpha(codes::MARKER_BLACK),
            };
            let layer = ToneLayer {
                rgb: palette.rgb(codes::BLACK),
                alpha,
                paths,
            };
            let chunk = build_page_chunk(&[layer], None, &frame, &[], FIRST_PAGE_ID, false);
            let pdf = single_page_document(&chunk.objects).map_err(|e| {
                NoteError::Internal(format!("serializing {label} overlay for page {}: {e}", page.number))
            })?;
            overlays.push(MarkOverlay {
                page_number: page.number,
                kind,
                pdf,
            });
        }
    }

    let annotations = read_highlights(c, &notebook.header, path)?;
    info!(
        "Mark file: {} overlays, {} annotations over {} pages",
        overlays.len(),
        annotations.len(),
        notebook.pages.len()
    );

    Ok(MarkDocument {
        geometry,
        page_count: notebook.pages.len(),
        overlays,
        annotations,
    })
}

// ── Companion editing ───────────────────────────────────────────────────

/// An annotation resolved against the companion PDF's page sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfAnnotation {
    /// 1-indexed page of the companion PDF.
    pub page_number: usize,
    /// Unique within one edit, `sn_1`, `sn_2`, …
    pub id: String,
    pub kind: AnnotationKind,
    pub color: [f64; 3],
    /// Bottom-left origin, one per highlighted line.
    pub quads: Vec<[f64; 4]>,
    pub rect: [f64; 4],
}

/// The full set of edits for one companion PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionEdits<'a> {
    /// Media and crop box applied to every page.
    pub media_box: [f64; 4],
    pub overlays: &'a [MarkOverlay],
    pub annotations: Vec<PdfAnnotation>,
}

/// A PDF editor able to read page sizes, resize boxes, stamp overlays and
/// insert annotations. Implemented outside this crate.
pub trait CompanionPdfEditor: Send + Sync {
    /// Page sizes in points, in page order.
    fn page_sizes(&self, pdf: &Path) -> Result<Vec<(f64, f64)>, EditError>;

    /// Write `pdf` with `edits` applied to `output`.
    fn apply(&self, pdf: &Path, output: &Path, edits: &CompanionEdits<'_>) -> Result<(), EditError>;
}

/// Resolve annotations against `page_sizes`. Pages past the end use the
/// first page's height.
pub fn resolve_annotations(
    annotations: &[AnnotationDescriptor],
    page_sizes: &[(f64, f64)],
) -> Vec<PdfAnnotation> {
    let Some(&(_, first_h)) = page_sizes.first() else {
        return Vec::new();
    };
    annotations
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let h = page_sizes.get(a.page_index).map_or(first_h, |&(_, h)| h);
            PdfAnnotation {
                page_number: a.page_index + 1,
                id: format!("sn_{}", i + 1),
                kind: a.kind,
                color: a.color,
                quads: a.pdf_rects(h),
                rect: a.bounding_rect(h),
            }
        })
        .collect()
}

/// Apply a rendered mark document to its companion PDF.
pub fn apply_to_companion(
    doc: &MarkDocument,
    editor: &dyn CompanionPdfEditor,
    companion: &Path,
    output: &Path,
) -> Result<(), NoteError> {
    let edit_err = |e: EditError| NoteError::CompanionEdit {
        pdf: companion.to_path_buf(),
        detail: e.to_string(),
    };
    let sizes = editor.page_sizes(companion).map_err(edit_err)?;
    let &(w, h) = sizes.first().ok_or_else(|| NoteError::CompanionEdit {
        pdf: companion.to_path_buf(),
        detail: "no pages found in PDF".into(),
    })?;

    let edits = CompanionEdits {
        media_box: doc.media_box(w, h),
        overlays: &doc.overlays,
        annotations: resolve_annotations(&doc.annotations, &sizes),
    };
    editor.apply(companion, output, &edits).map_err(edit_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::{rle_run, NoteBuilder};
    use crate::pipeline::trace::RectTracer;
    use base64::Engine;
    use image::Rgba;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn encode(json: &str) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .encode(json)
            .into_bytes()
    }

    #[test]
    fn highlights_decode_kinds_and_colors() {
        let json = r#"{
            "1": [{"annotationType":1,"colorType":4,"page":1,
                   "mupdfRectList":[{"x0":1,"x1":2,"y0":3,"y1":4}]}],
            "0": [{"annotationType":0,"colorType":0,"page":0,
                   "mupdfRectList":[{"x0":10,"x1":20,"y0":30,"y1":40}]},
                  {"annotationType":7,"colorType":0,"page":0,
                   "mupdfRectList":[{"x0":0,"x1":1,"y0":0,"y1":1}]},
                  {"annotationType":0,"colorType":0,"page":0,"mupdfRectList":[]}],
            "x": []
        }"#;
        let anns = decode_highlights(&encode(json)).unwrap();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].page_index, 0);
        assert_eq!(anns[0].kind, AnnotationKind::Highlight);
        assert_eq!(anns[0].color, [1.0, 1.0, 0.0]);
        assert_eq!(anns[1].page_index, 1);
        assert_eq!(anns[1].kind, AnnotationKind::Underline);
        assert_eq!(anns[1].color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_highlight_payloads_are_errors() {
        assert!(decode_highlights(b"!!not base64!!").is_err());
        assert!(decode_highlights(&encode("[1,2,3]")).is_err());
    }

    #[test]
    fn missing_or_truncated_highlights_are_empty() {
        let mut b = NoteBuilder::with_tag(b"mark");
        let footer = b.records(&[]);
        let mut c = b.finish_container(footer);
        let mut header = Metadata::new();
        assert!(read_highlights(&mut c, &header, Path::new("m.mark")).unwrap().is_empty());
        header.insert("HIGHLIGHTINFO".into(), "99999".into());
        assert!(read_highlights(&mut c, &header, Path::new("m.mark")).unwrap().is_empty());
    }

    #[test]
    fn annotation_rects_flip_to_bottom_left() {
        let a = AnnotationDescriptor {
            page_index: 0,
            kind: AnnotationKind::Highlight,
            color: [1.0, 1.0, 0.0],
            rects: vec![
                MupdfRect { x0: 10.0, x1: 50.0, y0: 100.0, y1: 112.0 },
                MupdfRect { x0: 5.0, x1: 30.0, y0: 114.0, y1: 126.0 },
            ],
        };
        assert_eq!(a.pdf_rects(800.0), vec![[10.0, 688.0, 50.0, 700.0], [5.0, 674.0, 30.0, 686.0]]);
        assert_eq!(a.bounding_rect(800.0), [5.0, 674.0, 50.0, 700.0]);
    }

    #[test]
    fn media_box_fits_aspect_ratio() {
        // 3:4 target on US letter: too wide, grow vertically.
        assert_eq!(fit_media_box(612.0, 792.0, 1404, 1872), [0.0, -12.0, 612.0, 804.0]);
        // Too tall: grow horizontally.
        assert_eq!(fit_media_box(300.0, 800.0, 3, 4), [-150.0, 0.0, 450.0, 800.0]);
        // Already matching.
        assert_eq!(fit_media_box(300.0, 400.0, 1404, 1872), [0.0, 0.0, 300.0, 400.0]);
    }

    #[test]
    fn pen_and_marker_split_on_gray_level() {
        let rgba = [
            0, 0, 0, 255, // pen
            200, 200, 200, 255, // marker
            50, 50, 50, 0, // invisible
            195, 195, 195, 255, // pen
        ];
        let (pen, marker) = split_pen_marker(&rgba, 4, 1);
        let pen = pen.unwrap();
        let marker = marker.unwrap();
        assert_eq!(pen.count_ones(), 2);
        assert!(pen.get(3, 0));
        assert_eq!(marker.count_ones(), 1);
        assert!(marker.get(1, 0));

        let (pen, marker) = split_pen_marker(&[0u8; 8], 2, 1);
        assert!(pen.is_none() && marker.is_none());
    }

    #[test]
    fn rgba_composite_blends_over_existing_alpha() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 51]));
        let mut rgba = vec![0u8; 8];
        composite_over_rgba(&img, &mut rgba, 2, 1);
        assert_eq!(rgba, vec![255, 0, 0, 255, 255, 255, 255, 51]);
        assert!(has_visible_pixels(&rgba));
        assert!(!has_visible_pixels(&[1, 2, 3, 0]));
    }

    fn mark_file(second_page_codes: &[u8]) -> Vec<u8> {
        let mut b = NoteBuilder::with_tag(b"mark");
        let empty = b.rle_layer("MARK", &rle_run(codes::TRANSPARENT, 16));
        let ink = b.rle_layer("MARK", second_page_codes);
        let not_mark = b.rle_layer("NOTE", &rle_run(codes::BLACK, 16));
        let p1 = b.records(&[("MAINLAYER", empty.to_string())]);
        let p2 = b.records(&[
            ("LAYERSEQ", "MAINLAYER,LAYER1".into()),
            ("MAINLAYER", ink.to_string()),
            ("LAYER1", not_mark.to_string()),
        ]);
        let footer = b.records(&[("PAGE1", p1.to_string()), ("PAGE2", p2.to_string())]);
        b.finish(footer)
    }

    #[test]
    fn mark_document_traces_pen_and_marker_overlays() {
        let mut ink = rle_run(codes::BLACK, 4);
        ink.extend(rle_run(codes::TRANSPARENT, 4));
        ink.extend(rle_run(0xE0, 8));
        let bytes = mark_file(&ink);

        let c = Container::new(Cursor::new(bytes.clone())).unwrap();
        let mut nb = Notebook::parse(c, Path::new("m.mark")).unwrap();
        nb.geometry = DeviceGeometry { width: 4, height: 4, ppi: 300.0 };
        let mut c = Container::new(Cursor::new(bytes)).unwrap();
        let palette = Palette::new([[0; 3], [157; 3], [201; 3], [255; 3]], 0.38);

        let doc = render_mark_document(
            &mut c,
            &nb,
            &palette,
            &RectTracer,
            &TraceParams { despeckle: 0 },
            Path::new("m.mark"),
        )
        .unwrap();

        assert_eq!(doc.page_count, 2);
        let kinds: Vec<_> = doc.overlays.iter().map(|o| (o.page_number, o.kind)).collect();
        assert_eq!(kinds, vec![(2, OverlayKind::Pen), (2, OverlayKind::Marker)]);

        let pen = String::from_utf8_lossy(&doc.overlays[0].pdf).into_owned();
        assert!(pen.contains("/Kids [ 3 0 R ]"));
        assert!(!pen.contains("ExtGState"));
        let marker = String::from_utf8_lossy(&doc.overlays[1].pdf).into_owned();
        assert!(marker.contains("<< /Type /ExtGState /ca 0.3765 >>"));
        assert!(doc.annotations.is_empty());
    }

    #[derive(Default)]
    struct RecordingEditor {
        applied: Mutex<Option<([f64; 4], usize, Vec<PdfAnnotation>)>>,
    }

    impl CompanionPdfEditor for RecordingEditor {
        fn page_sizes(&self, _pdf: &Path) -> Result<Vec<(f64, f64)>, EditError> {
            Ok(vec![(612.0, 792.0), (612.0, 500.0)])
        }

        fn apply(&self, _pdf: &Path, _out: &Path, edits: &CompanionEdits<'_>) -> Result<(), EditError> {
            *self.applied.lock().unwrap() =
                Some((edits.media_box, edits.overlays.len(), edits.annotations.clone()));
            Ok(())
        }
    }

    #[test]
    fn companion_edits_use_per_page_heights() {
        let ann = |page_index| AnnotationDescriptor {
            page_index,
            kind: AnnotationKind::Underline,
            color: [1.0, 0.0, 0.0],
            rects: vec![MupdfRect { x0: 0.0, x1: 10.0, y0: 0.0, y1: 10.0 }],
        };
        let doc = MarkDocument {
            geometry: DeviceGeometry::STANDARD,
            page_count: 3,
            overlays: Vec::new(),
            annotations: vec![ann(1), ann(5)],
        };
        let editor = RecordingEditor::default();
        apply_to_companion(&doc, &editor, Path::new("a.pdf"), Path::new("b.pdf")).unwrap();

        let (media_box, overlays, anns) = editor.applied.lock().unwrap().take().unwrap();
        assert_eq!(media_box, [0.0, -12.0, 612.0, 804.0]);
        assert_eq!(overlays, 0);
        assert_eq!(anns[0].page_number, 2);
        assert_eq!(anns[0].rect, [0.0, 490.0, 10.0, 500.0]);
        assert_eq!(anns[1].id, "sn_2");
        assert_eq!(anns[1].rect, [0.0, 782.0, 10.0, 792.0]);
    }
}
