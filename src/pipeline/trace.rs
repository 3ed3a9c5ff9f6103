//! Bitmap-to-vector tracing seam.
//!
//! Tone masks are handed to a [`Tracer`], which returns a forest of closed
//! paths. The crate ships [`RectTracer`], a lossless blocky tracer; callers
//! who want smooth curves inject their own implementation through
//! [`crate::ConversionConfig::tracer`].
//!
//! ## Segment shape
//!
//! Every segment carries three points. A [`Segment::Curve`] is a cubic
//! Bézier with two control points and an end point. A [`Segment::Corner`]
//! ignores its first point: it is a straight line to the corner vertex
//! `points[1]` followed by a straight line to the end point `points[2]`.
//! A path starts at the end point of its last segment.

use crate::error::TraceError;
use serde::{Deserialize, Serialize};

/// A point in source-pixel space, origin top-left, y downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Corner([Point; 3]),
    Curve([Point; 3]),
}

impl Segment {
    pub fn end(&self) -> Point {
        match self {
            Segment::Corner(p) | Segment::Curve(p) => p[2],
        }
    }
}

/// A closed contour plus the holes and islands nested inside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathNode {
    pub segments: Vec<Segment>,
    pub children: Vec<PathNode>,
}

impl PathNode {
    /// Number of contours in this tree, including `self`.
    pub fn contour_count(&self) -> usize {
        1 + self.children.iter().map(PathNode::contour_count).sum::<usize>()
    }
}

/// Binary mask fed to a tracer. `true` marks foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Bitmap {
    /// An all-background mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x]
    }

    #[inline]
    pub fn set_index(&mut self, idx: usize, on: bool) {
        if let Some(b) = self.bits.get_mut(idx) {
            *b = on;
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x] = on;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_blank(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }
}

/// Parameters passed to every trace call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceParams {
    /// Foreground regions of at most this many pixels are suppressed.
    pub despeckle: usize,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            despeckle: crate::config::DEFAULT_DESPECKLE,
        }
    }
}

/// A bitmap-to-vector oracle. Must be deterministic for identical input.
pub trait Tracer: Send + Sync {
    fn trace(&self, mask: &Bitmap, params: &TraceParams) -> Result<Vec<PathNode>, TraceError>;
}

/// Built-in tracer: despeckle, then cover the foreground with axis-aligned
/// rectangles made of corner segments.
///
/// Horizontal runs are merged vertically while consecutive rows have a run
/// with the exact same span, so a solid block becomes a single rectangle.
/// Rectangles never overlap, which keeps even-odd filling exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct RectTracer;

impl Tracer for RectTracer {
    fn trace(&self, mask: &Bitmap, params: &TraceParams) -> Result<Vec<PathNode>, TraceError> {
        let cleaned;
        let mask = if params.despeckle > 0 {
            cleaned = despeckle(mask, params.despeckle);
            &cleaned
        } else {
            mask
        };
        Ok(cover_with_rects(mask))
    }
}

/// Drop 4-connected foreground components with at most `max_area` pixels.
pub fn despeckle(mask: &Bitmap, max_area: usize) -> Bitmap {
    let (w, h) = (mask.width, mask.height);
    let mut out = mask.clone();
    let mut seen = vec![false; w * h];
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for start in 0..w * h {
        if !mask.bits[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        component.clear();

        while let Some(idx) = stack.pop() {
            component.push(idx);
            let (x, y) = (idx % w, idx / w);
            let mut visit = |n: usize| {
                if mask.bits[n] && !seen[n] {
                    seen[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        if component.len() <= max_area {
            for &idx in &component {
                out.bits[idx] = false;
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct OpenRect {
    x0: usize,
    x1: usize,
    y0: usize,
}

fn cover_with_rects(mask: &Bitmap) -> Vec<PathNode> {
    let mut paths = Vec::new();
    let mut open: Vec<OpenRect> = Vec::new();

    for y in 0..=mask.height {
        let runs = if y < mask.height {
            row_runs(mask, y)
        } else {
            Vec::new()
        };

        let mut next_open = Vec::with_capacity(runs.len());
        for &(x0, x1) in &runs {
            match open.iter().position(|r| r.x0 == x0 && r.x1 == x1) {
                Some(i) => next_open.push(open.swap_remove(i)),
                None => next_open.push(OpenRect { x0, x1, y0: y }),
            }
        }
        // Whatever was not continued closes at this row.
        open.sort_by_key(|r| (r.y0, r.x0));
        paths.extend(open.drain(..).map(|r| rect_path(r.x0, r.y0, r.x1, y)));
        open = next_open;
    }
    paths
}

fn row_runs(mask: &Bitmap, y: usize) -> Vec<(usize, usize)> {
    let row = &mask.bits[y * mask.width..(y + 1) * mask.width];
    let mut runs = Vec::new();
    let mut x = 0;
    while x < row.len() {
        if !row[x] {
            x += 1;
            continue;
        }
        let start = x;
        while x < row.len() && row[x] {
            x += 1;
        }
        runs.push((start, x));
    }
    runs
}

fn rect_path(x0: usize, y0: usize, x1: usize, y1: usize) -> PathNode {
    let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);
    let corner = |vx, vy, ex, ey| {
        Segment::Corner([Point::new(vx, vy), Point::new(vx, vy), Point::new(ex, ey)])
    };
    PathNode {
        segments: vec![corner(x1, y0, x1, y1), corner(x0, y1, x0, y0)],
        children: Vec::new(),
    }
}
