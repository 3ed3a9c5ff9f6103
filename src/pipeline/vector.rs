//! Vector page compiler.
//!
//! Turns a page's traced tone layers, optional background raster and link
//! rectangles into the page's PDF objects, allocating ids sequentially
//! from a caller-supplied base in a fixed order:
//!
//! ```text
//! first_id        page
//! first_id + 1    content stream
//! ...             one ExtGState per distinct marker alpha, first-seen order
//! last            background image (if any)
//! ```
//!
//! ## Cross-page links
//!
//! A link's destination page object id is unknown while earlier pages are
//! still being compiled. Link annotations therefore carry a delimited
//! placeholder ([`page_placeholder`]) that [`resolve_page_refs`] swaps for
//! the real reference once every page's id is final. Matching is on the
//! whole token, so the placeholder for page 1 never matches inside the one
//! for page 12.
//!
//! ## Numbers
//!
//! Operands are fixed-point decimals: 4 digits for geometry and colors,
//! 2 for rectangles. Rounding is half away from zero and `-0` prints as `0`.

use super::container::{DeviceGeometry, NoteLink};
use super::grouping::ToneLayer;
use super::pdf::PdfObject;
use super::trace::{PathNode, Point, Segment};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Path trees nested deeper than this are cut off.
pub const MAX_PATH_DEPTH: usize = 256;

const PLACEHOLDER_OPEN: &str = "@PAGE";
const PLACEHOLDER_CLOSE: char = '@';

/// A link annotation in PDF point space, pointing at a 0-indexed page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    /// `[x0, y0, x1, y1]`, bottom-left origin.
    pub rect: [f64; 4],
    pub dest_page: usize,
}

/// An opaque RGB raster drawn under the ink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

impl BackgroundImage {
    /// The 1×1 white pixel used on vector-only pages so that viewers still
    /// offer text recognition.
    pub fn ocr_placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            rgb: vec![0xFF; 3],
        }
    }
}

/// Pixel and point dimensions of a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub width_px: usize,
    pub height_px: usize,
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PageFrame {
    pub fn from_geometry(g: &DeviceGeometry) -> Self {
        let (width_pt, height_pt) = g.page_size_pt();
        Self {
            width_px: g.width,
            height_px: g.height,
            width_pt,
            height_pt,
        }
    }
}

/// All objects of one compiled page. `objects[0]` is the page object.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk {
    pub objects: Vec<PdfObject>,
}

impl PageChunk {
    pub fn page_id(&self) -> usize {
        self.objects[0].id
    }

    /// Ids this chunk consumed.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Format `v` with `digits` fractional digits, rounding half away from zero.
pub fn fmt_fixed(v: f64, digits: usize) -> String {
    let scale = 10f64.powi(digits as i32);
    let rounded = (v * scale).round() / scale;
    // Adding 0.0 turns -0.0 into 0.0.
    format!("{:.*}", digits, rounded + 0.0)
}

#[inline]
fn fmt4(v: f64) -> String {
    fmt_fixed(v, 4)
}

#[inline]
fn fmt2(v: f64) -> String {
    fmt_fixed(v, 2)
}

/// Placeholder standing in for page `dest`'s object reference.
pub fn page_placeholder(dest: usize) -> String {
    format!("{PLACEHOLDER_OPEN}{dest}{PLACEHOLDER_CLOSE}")
}

/// Replace every placeholder whose page index is in `page_ids` with
/// `<id> 0 R`. Anything else, including near misses, is copied unchanged.
pub fn resolve_page_refs(data: &[u8], page_ids: &[usize]) -> Vec<u8> {
    let open = PLACEHOLDER_OPEN.as_bytes();
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i..].starts_with(open) {
            let digits_start = i + open.len();
            let digits_len = data[digits_start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let close = digits_start + digits_len;
            if digits_len > 0 && data.get(close) == Some(&(PLACEHOLDER_CLOSE as u8)) {
                let dest = std::str::from_utf8(&data[digits_start..close])
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok());
                if let Some(id) = dest.and_then(|d| page_ids.get(d)) {
                    out.extend_from_slice(format!("{id} 0 R").as_bytes());
                    i = close + 1;
                    continue;
                }
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

/// Group same-document links by source page and convert them to PDF
/// rectangles. Links whose source or destination is outside the document,
/// or whose rectangle edges overflow, are dropped.
pub fn page_links(links: &[NoteLink], geometry: &DeviceGeometry, total_pages: usize) -> Vec<Vec<PageLink>> {
    let mut out = vec![Vec::new(); total_pages];
    let scale = geometry.point_scale();
    let (_, page_h) = geometry.page_size_pt();
    let in_range = |p: i64| usize::try_from(p).ok().filter(|&p| p < total_pages);

    for l in links.iter().filter(|l| l.same_file) {
        let (Some(src), Some(dest)) = (in_range(l.source_page), in_range(l.dest_page)) else {
            debug!("Dropping link {} -> {}: page out of range", l.source_page, l.dest_page);
            continue;
        };
        let (Some(right), Some(bottom)) = (l.x.checked_add(l.w), l.y.checked_add(l.h)) else {
            debug!("Dropping link {} -> {}: rectangle overflows", l.source_page, l.dest_page);
            continue;
        };
        out[src].push(PageLink {
            rect: [
                l.x as f64 * scale,
                page_h - bottom as f64 * scale,
                right as f64 * scale,
                page_h - l.y as f64 * scale,
            ],
            dest_page: dest,
        });
    }
    out
}

/// Compress with zlib at the fastest level.
fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 4), Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}

struct PathWriter<'a> {
    buf: &'a mut String,
    sx: f64,
    sy: f64,
    page_h: f64,
}

impl PathWriter<'_> {
    fn point(&mut self, p: Point) {
        let _ = write!(
            self.buf,
            "{} {}",
            fmt4(p.x * self.sx),
            fmt4(self.page_h - p.y * self.sy)
        );
    }

    fn op(&mut self, p: Point, op: &str) {
        self.point(p);
        self.buf.push(' ');
        self.buf.push_str(op);
        self.buf.push('\n');
    }

    fn contour(&mut self, node: &PathNode) {
        let Some(last) = node.segments.last() else {
            return;
        };
        self.op(last.end(), "m");
        for seg in &node.segments {
            match seg {
                Segment::Curve(p) => {
                    self.point(p[0]);
                    self.buf.push(' ');
                    self.point(p[1]);
                    self.buf.push(' ');
                    self.op(p[2], "c");
                }
                Segment::Corner(p) => {
                    self.op(p[1], "l");
                    self.op(p[2], "l");
                }
            }
        }
        self.buf.push_str("h\n");
    }

    /// Depth-first: a contour, then each child subtree in order.
    fn tree(&mut self, root: &PathNode) {
        let mut stack = vec![(root, 0usize)];
        let mut truncated = false;
        while let Some((node, depth)) = stack.pop() {
            self.contour(node);
            if depth + 1 >= MAX_PATH_DEPTH {
                truncated |= !node.children.is_empty();
                continue;
            }
            stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        }
        if truncated {
            warn!("Path tree deeper than {} levels was truncated", MAX_PATH_DEPTH);
        }
    }
}

/// Compile one page into its objects, starting at `first_id`.
///
/// Layers with no paths are skipped and never allocate an object. When
/// `background` is `None` and `ocr_fallback` is set, a 1×1 white image is
/// used instead.
pub fn build_page_chunk(
    layers: &[ToneLayer],
    background: Option<&BackgroundImage>,
    frame: &PageFrame,
    links: &[PageLink],
    first_id: usize,
    ocr_fallback: bool,
) -> PageChunk {
    let placeholder;
    let background = match background {
        Some(bg) => Some(bg),
        None if ocr_fallback => {
            placeholder = BackgroundImage::ocr_placeholder();
            Some(&placeholder)
        }
        None => None,
    };
    let layers: Vec<&ToneLayer> = layers.iter().filter(|l| !l.paths.is_empty()).collect();

    // ExtGState per distinct marker alpha, first-seen order.
    let mut gs_alphas: Vec<u8> = Vec::new();
    for l in &layers {
        if l.is_marker() && !gs_alphas.contains(&l.alpha) {
            gs_alphas.push(l.alpha);
        }
    }
    let gs_name: HashMap<u8, String> = gs_alphas
        .iter()
        .enumerate()
        .map(|(i, &a)| (a, format!("/GS{}", i + 1)))
        .collect();

    // ── Content stream ──────────────────────────────────────────────────
    let mut content = String::with_capacity(16 * 1024);
    if background.is_some() {
        let _ = write!(
            content,
            "q\n{} 0 0 {} 0 0 cm\n/Im1 Do\nQ\n",
            fmt4(frame.width_pt),
            fmt4(frame.height_pt)
        );
    }

    let sx = frame.width_pt / frame.width_px as f64;
    let sy = frame.height_pt / frame.height_px as f64;
    for layer in &layers {
        content.push_str("q\n");
        if let Some(name) = gs_name.get(&layer.alpha).filter(|_| layer.is_marker()) {
            content.push_str(name);
            content.push_str(" gs\n");
        }
        let [r, g, b] = layer.rgb;
        let _ = writeln!(
            content,
            "{} {} {} rg",
            fmt4(r as f64 / 255.0),
            fmt4(g as f64 / 255.0),
            fmt4(b as f64 / 255.0)
        );
        let mut pw = PathWriter {
            buf: &mut content,
            sx,
            sy,
            page_h: frame.height_pt,
        };
        for path in &layer.paths {
            pw.tree(path);
        }
        content.push_str("f*\nQ\n");
    }

    // ── Id allocation ───────────────────────────────────────────────────
    let page_id = first_id;
    let contents_id = first_id + 1;
    let gs_ids: Vec<usize> = (0..gs_alphas.len()).map(|i| first_id + 2 + i).collect();
    let image_id = background.map(|_| first_id + 2 + gs_alphas.len());

    // ── Page object ─────────────────────────────────────────────────────
    let mut resources = String::from("<< ");
    if let Some(id) = image_id {
        let _ = write!(resources, "/XObject << /Im1 {id} 0 R >> ");
    }
    if !gs_alphas.is_empty() {
        resources.push_str("/ExtGState << ");
        for (alpha, id) in gs_alphas.iter().zip(&gs_ids) {
            let _ = write!(resources, "{} {id} 0 R ", gs_name[alpha]);
        }
        resources.push_str(">> ");
    }
    resources.push_str(">>");

    let mut annots = String::new();
    if !links.is_empty() {
        annots.push_str("\n   /Annots [\n");
        for l in links {
            let _ = writeln!(
                annots,
                "     << /Type /Annot /Subtype /Link /Rect [{} {} {} {}] /Border [0 0 0] /A << /S /GoTo /D [{} /Fit] >> >>",
                fmt2(l.rect[0]),
                fmt2(l.rect[1]),
                fmt2(l.rect[2]),
                fmt2(l.rect[3]),
                page_placeholder(l.dest_page)
            );
        }
        annots.push_str("   ]");
    }

    let page_obj = format!(
        "{page_id} 0 obj\n<< /Type /Page\n   /Parent 2 0 R\n   /MediaBox [0 0 {} {}]\n   /Contents {contents_id} 0 R\n   /Resources {resources}{annots}\n>>\nendobj\n",
        fmt2(frame.width_pt),
        fmt2(frame.height_pt),
    );
    let contents_obj = format!(
        "{contents_id} 0 obj\n<< /Length {} >>\nstream\n{content}endstream\nendobj\n",
        content.len()
    );

    let mut objects = vec![
        PdfObject::new(page_id, page_obj),
        PdfObject::new(contents_id, contents_obj),
    ];
    for (alpha, &id) in gs_alphas.iter().zip(&gs_ids) {
        objects.push(PdfObject::new(
            id,
            format!(
                "{id} 0 obj\n<< /Type /ExtGState /ca {} >>\nendobj\n",
                fmt4(*alpha as f64 / 255.0)
            ),
        ));
    }
    if let (Some(bg), Some(id)) = (background, image_id) {
        objects.push(image_object(id, bg));
    }

    PageChunk { objects }
}

fn image_object(id: usize, bg: &BackgroundImage) -> PdfObject {
    match deflate(&bg.rgb) {
        Ok(compressed) => encoded_image_object(id, bg, &compressed, true),
        Err(e) => {
            warn!("Background compression failed, embedding raw: {}", e);
            encoded_image_object(id, bg, &bg.rgb, false)
        }
    }
}

/// Image XObject around `data`; `/Filter` is present only when `flate`.
fn encoded_image_object(id: usize, bg: &BackgroundImage, data: &[u8], flate: bool) -> PdfObject {
    let filter = if flate { "   /Filter /FlateDecode\n" } else { "" };
    let header = format!(
        "{id} 0 obj\n<< /Type /XObject\n   /Subtype /Image\n   /Width {}\n   /Height {}\n   /ColorSpace /DeviceRGB\n   /BitsPerComponent 8\n{filter}   /Length {} >>\nstream\n",
        bg.width,
        bg.height,
        data.len()
    );
    let mut buf = Vec::with_capacity(header.len() + data.len() + 24);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\nendstream\nendobj\n");
    PdfObject::new(id, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    const FRAME: PageFrame = PageFrame {
        width_px: 100,
        height_px: 200,
        width_pt: 24.0,
        height_pt: 48.0,
    };

    fn square() -> PathNode {
        let c = |vx: f64, vy: f64, ex: f64, ey: f64| {
            Segment::Corner([Point::new(vx, vy), Point::new(vx, vy), Point::new(ex, ey)])
        };
        PathNode {
            segments: vec![c(10.0, 0.0, 10.0, 10.0), c(0.0, 10.0, 0.0, 0.0)],
            children: Vec::new(),
        }
    }

    fn layer(alpha: u8) -> ToneLayer {
        ToneLayer {
            rgb: [255, 0, 51],
            alpha,
            paths: vec![square()],
        }
    }

    fn text(obj: &PdfObject) -> String {
        String::from_utf8_lossy(&obj.data).into_owned()
    }

    #[test]
    fn fixed_point_formatting() {
        assert_eq!(fmt_fixed(0.5, 4), "0.5000");
        assert_eq!(fmt_fixed(1.0 / 3.0, 4), "0.3333");
        assert_eq!(fmt_fixed(2.0 / 3.0, 2), "0.67");
        assert_eq!(fmt_fixed(-0.00001, 4), "0.0000");
        assert_eq!(fmt_fixed(1e-12, 4), "0.0000");
        assert_eq!(fmt_fixed(123456789.0, 2), "123456789.00");
        assert_eq!(fmt_fixed(-2.5, 0), "-3");
    }

    #[test]
    fn placeholders_resolve_exactly() {
        let data = format!("[{} /Fit] [{} /Fit] @PAGE@ @PAGE7@", page_placeholder(1), page_placeholder(12));
        let mut ids = vec![0usize; 13];
        ids[1] = 5;
        ids[12] = 40;
        let out = String::from_utf8(resolve_page_refs(data.as_bytes(), &ids)).unwrap();
        assert_eq!(out, "[5 0 R /Fit] [40 0 R /Fit] @PAGE@ 0 0 R");

        // Out-of-range destinations are left alone.
        let out = resolve_page_refs(page_placeholder(3).as_bytes(), &[3]);
        assert_eq!(out, page_placeholder(3).as_bytes());
    }

    #[test]
    fn empty_page_without_fallback_has_no_resources() {
        let chunk = build_page_chunk(&[], None, &FRAME, &[], 3, false);
        assert_eq!(chunk.object_count(), 2);
        let page = text(&chunk.objects[0]);
        assert!(page.contains("/MediaBox [0 0 24.00 48.00]"));
        assert!(page.contains("/Resources << >>\n>>"));
        assert_eq!(text(&chunk.objects[1]), "4 0 obj\n<< /Length 0 >>\nstream\nendstream\nendobj\n");
    }

    #[test]
    fn ocr_fallback_adds_one_pixel_image() {
        let chunk = build_page_chunk(&[], None, &FRAME, &[], 3, true);
        assert_eq!(chunk.object_count(), 3);
        let image = text(&chunk.objects[2]);
        assert!(image.starts_with("5 0 obj\n<< /Type /XObject"));
        assert!(image.contains("/Width 1\n   /Height 1\n"));
        assert!(text(&chunk.objects[0]).contains("/XObject << /Im1 5 0 R >>"));
        assert!(text(&chunk.objects[1]).contains("q\n24.0000 0 0 48.0000 0 0 cm\n/Im1 Do\nQ\n"));
    }

    #[test]
    fn content_stream_scales_flips_and_fills_even_odd() {
        let chunk = build_page_chunk(&[layer(255)], None, &FRAME, &[], 10, false);
        let content = text(&chunk.objects[1]);
        let expected = "q\n1.0000 0.0000 0.2000 rg\n\
                        0.0000 48.0000 m\n\
                        2.4000 48.0000 l\n2.4000 45.6000 l\n\
                        0.0000 45.6000 l\n0.0000 48.0000 l\n\
                        h\nf*\nQ\n";
        assert!(content.contains(expected), "got:\n{content}");
        let len = format!("<< /Length {} >>", expected.len());
        assert!(content.contains(&len));
    }

    #[test]
    fn curves_emit_all_three_points() {
        let node = PathNode {
            segments: vec![Segment::Curve([
                Point::new(0.0, 0.0),
                Point::new(50.0, 100.0),
                Point::new(100.0, 200.0),
            ])],
            children: Vec::new(),
        };
        let l = ToneLayer {
            rgb: [0; 3],
            alpha: 255,
            paths: vec![node],
        };
        let chunk = build_page_chunk(&[l], None, &FRAME, &[], 3, false);
        let content = text(&chunk.objects[1]);
        assert!(content.contains("24.0000 0.0000 m\n0.0000 48.0000 12.0000 24.0000 24.0000 0.0000 c\nh\n"));
    }

    #[test]
    fn children_follow_parent_depth_first() {
        let mut inner = square();
        inner.segments[1] = Segment::Corner([Point::new(1.0, 1.0); 3]);
        let mut mid = square();
        mid.segments[1] = Segment::Corner([Point::new(2.0, 2.0); 3]);
        mid.children.push(inner);
        let mut root = square();
        root.children.push(mid);
        let mut sibling = square();
        sibling.segments[1] = Segment::Corner([Point::new(3.0, 3.0); 3]);
        root.children.push(sibling);

        let l = ToneLayer {
            rgb: [0; 3],
            alpha: 255,
            paths: vec![root],
        };
        let content = text(&build_page_chunk(&[l], None, &FRAME, &[], 3, false).objects[1]);
        let starts: Vec<&str> = content.lines().filter(|l| l.ends_with(" m")).collect();
        assert_eq!(starts, vec![
            "0.0000 48.0000 m",
            "0.4800 47.5200 m",
            "0.2400 47.7600 m",
            "0.7200 47.2800 m",
        ]);
    }

    #[test]
    fn deep_trees_are_truncated() {
        let mut node = square();
        for _ in 0..MAX_PATH_DEPTH + 10 {
            node = PathNode {
                segments: square().segments,
                children: vec![node],
            };
        }
        let l = ToneLayer {
            rgb: [0; 3],
            alpha: 255,
            paths: vec![node],
        };
        let content = text(&build_page_chunk(&[l], None, &FRAME, &[], 3, false).objects[1]);
        assert_eq!(content.matches("h\n").count(), MAX_PATH_DEPTH);
    }

    #[test]
    fn marker_alphas_share_graphics_states() {
        let layers = [layer(51), layer(255), layer(97), layer(51)];
        let chunk = build_page_chunk(&layers, None, &FRAME, &[], 3, false);
        assert_eq!(chunk.object_count(), 4);
        assert_eq!(text(&chunk.objects[2]), "5 0 obj\n<< /Type /ExtGState /ca 0.2000 >>\nendobj\n");
        assert_eq!(text(&chunk.objects[3]), "6 0 obj\n<< /Type /ExtGState /ca 0.3804 >>\nendobj\n");
        let page = text(&chunk.objects[0]);
        assert!(page.contains("/ExtGState << /GS1 5 0 R /GS2 6 0 R >> >>"));
        let content = text(&chunk.objects[1]);
        assert_eq!(content.matches("/GS1 gs").count(), 2);
        assert_eq!(content.matches("/GS2 gs").count(), 1);
        assert_eq!(content.matches("q\n").count(), 4);
    }

    #[test]
    fn empty_layers_allocate_nothing() {
        let empty = ToneLayer {
            rgb: [0; 3],
            alpha: 51,
            paths: Vec::new(),
        };
        let chunk = build_page_chunk(&[empty], None, &FRAME, &[], 3, false);
        assert_eq!(chunk.object_count(), 2);
        assert!(!text(&chunk.objects[0]).contains("ExtGState"));
    }

    #[test]
    fn background_is_compressed_and_ordered_last() {
        let bg = BackgroundImage {
            width: 2,
            height: 1,
            rgb: vec![1, 2, 3, 4, 5, 6],
        };
        let chunk = build_page_chunk(&[layer(51)], Some(&bg), &FRAME, &[], 3, true);
        assert_eq!(chunk.objects.iter().map(|o| o.id).collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        let image = &chunk.objects[3].data;
        let head = String::from_utf8_lossy(image);
        assert!(head.contains("/Filter /FlateDecode\n"));

        let start = image.windows(7).position(|w| w == b"stream\n").unwrap() + 7;
        let end = image.windows(10).rposition(|w| w == b"\nendstream").unwrap();
        let mut raw = Vec::new();
        ZlibDecoder::new(&image[start..end]).read_to_end(&mut raw).unwrap();
        assert_eq!(raw, bg.rgb);
    }

    #[test]
    fn link_annotations_use_placeholders() {
        let links = [PageLink {
            rect: [1.0, 2.125, 3.333, 4.0],
            dest_page: 7,
        }];
        let chunk = build_page_chunk(&[], None, &FRAME, &links, 3, false);
        let page = text(&chunk.objects[0]);
        assert!(page.contains(
            "     << /Type /Annot /Subtype /Link /Rect [1.00 2.13 3.33 4.00] /Border [0 0 0] /A << /S /GoTo /D [@PAGE7@ /Fit] >> >>\n   ]\n>>"
        ), "got:\n{page}");
    }

    #[test]
    fn raw_image_omits_filter() {
        let bg = BackgroundImage {
            width: 1,
            height: 1,
            rgb: vec![9, 8, 7],
        };
        let obj = encoded_image_object(6, &bg, &bg.rgb, false);
        let body = text(&obj);
        assert!(!body.contains("/Filter"));
        assert!(body.contains("/Length 3 >>\nstream\n"));
        assert!(obj.data.ends_with(b"\x09\x08\x07\nendstream\nendobj\n"));
    }

    #[test]
    fn overflowing_link_rect_is_dropped() {
        let link = |x, w, y, h| NoteLink {
            source_page: 0,
            x,
            y,
            w,
            h,
            dest_page: 0,
            same_file: true,
        };
        let grouped = page_links(
            &[link(i64::MAX, 1, 0, 1), link(0, 1, i64::MAX, 1), link(0, 1, 0, 1)],
            &DeviceGeometry::STANDARD,
            1,
        );
        assert_eq!(grouped[0].len(), 1);
        assert!(grouped[0][0].rect[2] > 0.0);
    }

    #[test]
    fn link_rects_flip_and_filter() {
        let g = DeviceGeometry::STANDARD;
        let link = |src, dest, same_file| NoteLink {
            source_page: src,
            x: 100,
            y: 200,
            w: 50,
            h: 25,
            dest_page: dest,
            same_file,
        };
        let grouped = page_links(
            &[link(0, 1, true), link(0, 5, true), link(1, 0, false), link(-1, 0, true)],
            &g,
            2,
        );
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].len(), 1);
        assert!(grouped[1].is_empty());
        let r = grouped[0][0].rect;
        let s = 72.0 / 300.0;
        let h = g.page_size_pt().1;
        assert!((r[0] - 100.0 * s).abs() < 1e-9);
        assert!((r[1] - (h - 225.0 * s)).abs() < 1e-9);
        assert!((r[2] - 150.0 * s).abs() < 1e-9);
        assert!((r[3] - (h - 200.0 * s)).abs() < 1e-9);
    }
}
