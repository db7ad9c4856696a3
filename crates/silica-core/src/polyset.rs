//! Normalized rectilinear polygon sets.
//!
//! A `PolygonSet` is the kernel's canonical region representation: a set of
//! disjoint axis-aligned rectangles produced by a horizontal-band scanline
//! decomposition. Within any horizontal line the x-intervals are maximal, and
//! vertically adjacent rectangles with identical x-intervals are coalesced,
//! so two equal regions always have identical rectangle lists. Rectangles are
//! half-open (see `IRect`); a shared boundary is not an overlap.
//!
//! Rectangles connected by a boundary segment of positive length form a
//! *shape* (connected component); shapes are the per-polygon unit that
//! measurement operators report on. A corner-only touch does not connect.
//!
//! Zero-area input rectangles are dropped during normalization and counted,
//! never silently discarded; the count surfaces in the final report.

use thiserror::Error;

use crate::geometry::{Coord, IRect, Point};
use crate::spatial::{IndexEntry, RectIndex};

/// Malformed input geometry. Raised while converting raw layout polygons,
/// which is the only place unchecked geometry enters the kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeomError {
    #[error("polygon has {0} vertices; at least 4 required")]
    TooFewVertices(usize),

    #[error("zero-length edge at vertex {0}")]
    ZeroLengthEdge(usize),

    #[error("non-rectilinear edge at vertex {0}")]
    NotRectilinear(usize),

    #[error("malformed polygon outline: inconsistent edge parity (self-intersecting or unclosed)")]
    MalformedOutline,
}

/// Boolean operation over two regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// A connected component of a polygon set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Indices into the set's rectangle list.
    pub rects: Vec<usize>,
    pub bbox: IRect,
}

/// A normalized set of disjoint rectangles with connected-component labels.
#[derive(Debug, Clone, Default)]
pub struct PolygonSet {
    rects: Vec<IRect>,
    shapes: Vec<Shape>,
    dropped_slivers: u64,
}

impl PartialEq for PolygonSet {
    /// Region equality; the canonical form makes this a plain list compare.
    fn eq(&self, other: &Self) -> bool {
        self.rects == other.rects
    }
}

impl PolygonSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set holding a single rectangle.
    pub fn frame(rect: IRect) -> Self {
        Self::from_rects(vec![rect])
    }

    /// Normalize an arbitrary (possibly overlapping) rectangle list.
    pub fn from_rects(input: Vec<IRect>) -> Self {
        let (rects, dropped_slivers) = normalize(input);
        let shapes = label_shapes(&rects);
        Self {
            rects,
            shapes,
            dropped_slivers,
        }
    }

    /// Decompose raw rectilinear polygon outlines into a normalized set.
    /// Zero-width pinches in self-touching outlines count as dropped
    /// slivers.
    pub fn from_polygons(polygons: &[Vec<Point>]) -> Result<Self, GeomError> {
        let mut rects = Vec::new();
        let mut pinched = 0u64;
        for points in polygons {
            let (mut r, slivers) = polygon_rects(points)?;
            rects.append(&mut r);
            pinched += slivers;
        }
        let mut set = Self::from_rects(rects);
        set.dropped_slivers += pinched;
        Ok(set)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn rects(&self) -> &[IRect] {
        &self.rects
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Zero-area rectangles dropped while building this set.
    pub fn dropped_slivers(&self) -> u64 {
        self.dropped_slivers
    }

    pub fn bbox(&self) -> Option<IRect> {
        let mut it = self.rects.iter();
        let first = *it.next()?;
        Some(it.fold(first, |acc, r| acc.union_bbox(r)))
    }

    pub fn total_area(&self) -> i128 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    pub fn shape_rects(&self, shape: usize) -> impl Iterator<Item = &IRect> {
        self.shapes[shape].rects.iter().map(move |&i| &self.rects[i])
    }

    pub fn shape_area(&self, shape: usize) -> i128 {
        self.shape_rects(shape).map(|r| r.area()).sum()
    }

    /// A new set holding just one shape of this set.
    pub fn shape_set(&self, shape: usize) -> PolygonSet {
        Self::from_rects(self.shape_rects(shape).copied().collect())
    }

    /// Outline length of one shape.
    ///
    /// Disjoint normalized rectangles never share a vertical boundary
    /// segment (maximal x-intervals merge them), so only horizontal
    /// boundaries between vertically adjacent rectangles are interior.
    pub fn shape_perimeter(&self, shape: usize) -> i128 {
        let ids = &self.shapes[shape].rects;
        let mut perimeter: i128 = 0;
        for &i in ids {
            let r = self.rects[i];
            perimeter += 2 * (r.width() as i128 + r.height() as i128);
        }
        for (a, &i) in ids.iter().enumerate() {
            let r = self.rects[i];
            for &j in ids.iter().skip(a + 1) {
                let s = self.rects[j];
                if r.y2 == s.y1 || s.y2 == r.y1 {
                    let shared = r.x2.min(s.x2) - r.x1.max(s.x1);
                    if shared > 0 {
                        perimeter -= 2 * shared as i128;
                    }
                }
            }
        }
        perimeter
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.rects.iter().any(|r| r.contains_point(p))
    }

    /// The shape containing the given point, if any.
    pub fn shape_at(&self, p: &Point) -> Option<usize> {
        let rect = self.rects.iter().position(|r| r.contains_point(p))?;
        self.shapes.iter().position(|s| s.rects.contains(&rect))
    }

    /// True when `other` is a geometric subset of this set.
    pub fn covers(&self, other: &PolygonSet) -> bool {
        boolean(other, self, BoolOp::Not).is_empty()
    }

    // ── Boolean algebra ──────────────────────────────────────────────

    pub fn and(&self, other: &PolygonSet) -> PolygonSet {
        boolean(self, other, BoolOp::And)
    }

    pub fn or(&self, other: &PolygonSet) -> PolygonSet {
        boolean(self, other, BoolOp::Or)
    }

    pub fn not(&self, other: &PolygonSet) -> PolygonSet {
        boolean(self, other, BoolOp::Not)
    }

    // ── Sizing ───────────────────────────────────────────────────────

    /// Dilate every point of the region by `d` in the Chebyshev metric.
    pub fn grow(&self, d: Coord) -> PolygonSet {
        if d == 0 || self.is_empty() {
            return self.clone();
        }
        if d < 0 {
            return self.shrink(-d);
        }
        Self::from_rects(self.rects.iter().map(|r| r.inflate(d)).collect())
    }

    /// Erode the region by `d`: complement, grow, complement, inside a frame
    /// wide enough that the frame boundary cannot bleed into the result.
    pub fn shrink(&self, d: Coord) -> PolygonSet {
        if d == 0 || self.is_empty() {
            return self.clone();
        }
        if d < 0 {
            return self.grow(-d);
        }
        let Some(bbox) = self.bbox() else {
            return Self::empty();
        };
        let frame = Self::frame(bbox.inflate(2 * d));
        let complement = frame.not(self);
        frame.not(&complement.grow(d))
    }

    // ── Shape-level transforms ───────────────────────────────────────

    /// Keep only the shapes whose bounding box satisfies the predicate.
    pub fn filter_shapes<F: Fn(&IRect) -> bool>(&self, keep: F) -> PolygonSet {
        let mut rects = Vec::new();
        for shape in &self.shapes {
            if keep(&shape.bbox) {
                rects.extend(shape.rects.iter().map(|&i| self.rects[i]));
            }
        }
        Self::from_rects(rects)
    }

    /// The same region with x and y swapped. Used by the width measurement
    /// to scan vertical cross-sections with the horizontal-band machinery.
    pub fn transpose(&self) -> PolygonSet {
        Self::from_rects(self.rects.iter().map(|r| r.transpose()).collect())
    }
}

// ── Normalization ─────────────────────────────────────────────────────

/// Scanline band decomposition: split at every distinct y, merge x-intervals
/// per band, then coalesce vertically adjacent rectangles with identical
/// intervals. Output is disjoint, canonical, and sorted.
fn normalize(mut input: Vec<IRect>) -> (Vec<IRect>, u64) {
    let mut slivers = 0u64;
    input.retain(|r| {
        if r.is_degenerate() {
            slivers += 1;
            false
        } else {
            true
        }
    });
    if input.is_empty() {
        return (Vec::new(), slivers);
    }

    let mut events: Vec<Coord> = Vec::with_capacity(input.len() * 2);
    for r in &input {
        events.push(r.y1);
        events.push(r.y2);
    }
    events.sort_unstable();
    events.dedup();

    input.sort_unstable_by_key(|r| r.y1);

    let mut next = 0usize;
    let mut active: Vec<IRect> = Vec::new();
    let mut open: Vec<IRect> = Vec::new();
    let mut out: Vec<IRect> = Vec::new();

    for w in events.windows(2) {
        let (ya, yb) = (w[0], w[1]);
        while next < input.len() && input[next].y1 <= ya {
            active.push(input[next]);
            next += 1;
        }
        active.retain(|r| r.y2 > ya);

        // Every active rectangle spans the full band: its y-bounds are events.
        let mut xs: Vec<(Coord, Coord)> = active.iter().map(|r| (r.x1, r.x2)).collect();
        xs.sort_unstable();
        let mut merged: Vec<(Coord, Coord)> = Vec::with_capacity(xs.len());
        for (x1, x2) in xs {
            if let Some(last) = merged.last_mut() {
                if x1 <= last.1 {
                    last.1 = last.1.max(x2);
                    continue;
                }
            }
            merged.push((x1, x2));
        }

        let mut new_open: Vec<IRect> = Vec::with_capacity(merged.len());
        for (x1, x2) in merged {
            let mut rect = IRect { x1, y1: ya, x2, y2: yb };
            if let Some(pos) = open
                .iter()
                .position(|o| o.x1 == x1 && o.x2 == x2 && o.y2 == ya)
            {
                rect.y1 = open.swap_remove(pos).y1;
            }
            new_open.push(rect);
        }
        out.append(&mut open);
        open = new_open;
    }
    out.append(&mut open);
    out.sort_unstable();
    (out, slivers)
}

/// Union-find labeling of connected rectangles (shared boundary of positive
/// length). The R-tree prunes the candidate pairs.
fn label_shapes(rects: &[IRect]) -> Vec<Shape> {
    if rects.is_empty() {
        return Vec::new();
    }
    let mut parent: Vec<usize> = (0..rects.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let index = RectIndex::build(
        rects
            .iter()
            .enumerate()
            .map(|(id, &rect)| IndexEntry { id, rect })
            .collect(),
    );
    for (i, r) in rects.iter().enumerate() {
        for entry in index.query(r) {
            if entry.id > i && r.touches(&entry.rect) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, entry.id));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut shape_of_root: std::collections::HashMap<usize, usize> = Default::default();
    let mut shapes: Vec<Shape> = Vec::new();
    for i in 0..rects.len() {
        let root = find(&mut parent, i);
        let sid = *shape_of_root.entry(root).or_insert_with(|| {
            shapes.push(Shape {
                rects: Vec::new(),
                bbox: rects[i],
            });
            shapes.len() - 1
        });
        shapes[sid].rects.push(i);
        shapes[sid].bbox = shapes[sid].bbox.union_bbox(&rects[i]);
    }
    shapes
}

// ── Polygon outline decomposition ─────────────────────────────────────

/// Crossing-parity fill of one simple rectilinear outline (either winding).
fn polygon_rects(points: &[Point]) -> Result<(Vec<IRect>, u64), GeomError> {
    let n = points.len();
    if n < 4 {
        return Err(GeomError::TooFewVertices(n));
    }

    let mut vedges: Vec<(Coord, Coord, Coord)> = Vec::new(); // (x, y_lo, y_hi)
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        if p == q {
            return Err(GeomError::ZeroLengthEdge(i));
        }
        if p.x == q.x {
            vedges.push((p.x, p.y.min(q.y), p.y.max(q.y)));
        } else if p.y != q.y {
            return Err(GeomError::NotRectilinear(i));
        }
    }

    let mut events: Vec<Coord> = points.iter().map(|p| p.y).collect();
    events.sort_unstable();
    events.dedup();

    let mut out = Vec::new();
    let mut slivers = 0u64;
    for w in events.windows(2) {
        let (ya, yb) = (w[0], w[1]);
        let mut xs: Vec<Coord> = vedges
            .iter()
            .filter(|e| e.1 <= ya && e.2 >= yb)
            .map(|e| e.0)
            .collect();
        if xs.is_empty() {
            continue;
        }
        if xs.len() % 2 != 0 {
            return Err(GeomError::MalformedOutline);
        }
        xs.sort_unstable();
        for pair in xs.chunks_exact(2) {
            // A self-touching outline yields zero-width pairs.
            if pair[0] < pair[1] {
                out.push(IRect {
                    x1: pair[0],
                    y1: ya,
                    x2: pair[1],
                    y2: yb,
                });
            } else {
                slivers += 1;
            }
        }
    }
    Ok((out, slivers))
}

// ── Boolean sweep ─────────────────────────────────────────────────────

/// Band sweep over both operands, combining their per-band x-intervals.
pub fn boolean(a: &PolygonSet, b: &PolygonSet, op: BoolOp) -> PolygonSet {
    let mut events: Vec<Coord> = Vec::with_capacity((a.rects.len() + b.rects.len()) * 2);
    for r in a.rects.iter().chain(b.rects.iter()) {
        events.push(r.y1);
        events.push(r.y2);
    }
    if events.is_empty() {
        return PolygonSet::empty();
    }
    events.sort_unstable();
    events.dedup();

    let mut a_sorted: Vec<IRect> = a.rects.clone();
    a_sorted.sort_unstable_by_key(|r| r.y1);
    let mut b_sorted: Vec<IRect> = b.rects.clone();
    b_sorted.sort_unstable_by_key(|r| r.y1);

    let mut out: Vec<IRect> = Vec::new();
    let (mut na, mut nb) = (0usize, 0usize);
    let mut active_a: Vec<IRect> = Vec::new();
    let mut active_b: Vec<IRect> = Vec::new();

    for w in events.windows(2) {
        let (ya, yb) = (w[0], w[1]);
        while na < a_sorted.len() && a_sorted[na].y1 <= ya {
            active_a.push(a_sorted[na]);
            na += 1;
        }
        while nb < b_sorted.len() && b_sorted[nb].y1 <= ya {
            active_b.push(b_sorted[nb]);
            nb += 1;
        }
        active_a.retain(|r| r.y2 > ya);
        active_b.retain(|r| r.y2 > ya);

        // Rectangles of one set are disjoint, so intervals need sorting only.
        let mut ia: Vec<(Coord, Coord)> = active_a
            .iter()
            .filter(|r| r.y2 >= yb)
            .map(|r| (r.x1, r.x2))
            .collect();
        ia.sort_unstable();
        let mut ib: Vec<(Coord, Coord)> = active_b
            .iter()
            .filter(|r| r.y2 >= yb)
            .map(|r| (r.x1, r.x2))
            .collect();
        ib.sort_unstable();

        for (x1, x2) in combine_intervals(&ia, &ib, op) {
            out.push(IRect { x1, y1: ya, x2, y2: yb });
        }
    }
    PolygonSet::from_rects(out)
}

/// Combine two sorted disjoint interval lists under a boolean operation.
fn combine_intervals(
    a: &[(Coord, Coord)],
    b: &[(Coord, Coord)],
    op: BoolOp,
) -> Vec<(Coord, Coord)> {
    let mut xs: Vec<Coord> = Vec::with_capacity((a.len() + b.len()) * 2);
    for &(x1, x2) in a.iter().chain(b.iter()) {
        xs.push(x1);
        xs.push(x2);
    }
    xs.sort_unstable();
    xs.dedup();

    let mut out: Vec<(Coord, Coord)> = Vec::new();
    let (mut pa, mut pb) = (0usize, 0usize);
    for w in xs.windows(2) {
        let (x1, x2) = (w[0], w[1]);
        while pa < a.len() && a[pa].1 <= x1 {
            pa += 1;
        }
        while pb < b.len() && b[pb].1 <= x1 {
            pb += 1;
        }
        let in_a = pa < a.len() && a[pa].0 <= x1;
        let in_b = pb < b.len() && b[pb].0 <= x1;
        let keep = match op {
            BoolOp::And => in_a && in_b,
            BoolOp::Or => in_a || in_b,
            BoolOp::Not => in_a && !in_b,
        };
        if keep {
            if let Some(last) = out.last_mut() {
                if last.1 == x1 {
                    last.1 = x2;
                    continue;
                }
            }
            out.push((x1, x2));
        }
    }
    out
}
