//! Measurement operators over normalized polygon sets.
//!
//! Each operator is a pure function from polygon sets (plus dbu thresholds)
//! to measurement records; rule codes and comparators live upstream in the
//! evaluator. Distances are compared as squared dbu in `i128`, areas as
//! `i128` dbu², so results are exact and bit-reproducible.

use std::collections::BTreeMap;

use crate::geometry::{Coord, IRect, Point};
use crate::polyset::PolygonSet;
use crate::spatial::{IndexEntry, RectIndex};

/// A per-shape scalar measurement. `value` is dbu for widths and lengths,
/// dbu² for areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMeasure {
    pub shape: usize,
    pub bbox: IRect,
    /// The geometry that realized the measurement (e.g. the narrowest neck).
    pub marker: IRect,
    pub value: i128,
}

/// An under-limit gap between two distinct shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpacingMeasure {
    pub dist_sq: i128,
    /// Box spanning the gap at the closest approach.
    pub marker: IRect,
}

/// Enclosure margin of one inner shape. `margin_sq == 0` when the inner
/// shape is not contained or touches the outer boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosureMeasure {
    pub inner_shape: usize,
    pub margin_sq: i128,
    pub marker: IRect,
    pub contained: bool,
}

/// Extension of a conductor past a reference-layer edge at one gate end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMeasure {
    pub extent: Coord,
    pub marker: IRect,
}

/// Coverage fraction of one density window.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityWindow {
    pub window: IRect,
    pub coverage: f64,
}

/// Antenna ratio of one conductor shape against its gate region.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaMeasure {
    pub shape: usize,
    pub bbox: IRect,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntennaMetric {
    Area,
    Perimeter,
}

// ── Width / length / area ─────────────────────────────────────────────

/// Per-shape minimum local width: the smallest axis-aligned cross-section,
/// taken over both the horizontal bands and (via transposition) the vertical
/// columns of the shape. Exact for rectangles and rectilinear necks.
pub fn min_width(set: &PolygonSet) -> Vec<ShapeMeasure> {
    let mut best: Vec<Option<(Coord, IRect)>> = vec![None; set.shape_count()];

    for sid in 0..set.shape_count() {
        for r in set.shape_rects(sid) {
            let w = r.width();
            if best[sid].map_or(true, |(bw, _)| w < bw) {
                best[sid] = Some((w, *r));
            }
        }
    }

    let transposed = set.transpose();
    for tsid in 0..transposed.shape_count() {
        for r in transposed.shape_rects(tsid) {
            let w = r.width(); // vertical extent in the original orientation
            let marker = r.transpose();
            let anchor = Point::new(marker.x1, marker.y1);
            let Some(sid) = set.shape_at(&anchor) else {
                continue;
            };
            if best[sid].map_or(true, |(bw, _)| w < bw) {
                best[sid] = Some((w, marker));
            }
        }
    }

    set.shapes()
        .iter()
        .enumerate()
        .filter_map(|(sid, shape)| {
            best[sid].map(|(w, marker)| ShapeMeasure {
                shape: sid,
                bbox: shape.bbox,
                marker,
                value: w as i128,
            })
        })
        .collect()
}

/// Per-shape dimension along the long axis of the bounding box.
pub fn shape_lengths(set: &PolygonSet) -> Vec<ShapeMeasure> {
    set.shapes()
        .iter()
        .enumerate()
        .map(|(sid, shape)| ShapeMeasure {
            shape: sid,
            bbox: shape.bbox,
            marker: shape.bbox,
            value: shape.bbox.width().max(shape.bbox.height()) as i128,
        })
        .collect()
}

/// Per-shape area in dbu².
pub fn shape_areas(set: &PolygonSet) -> Vec<ShapeMeasure> {
    set.shapes()
        .iter()
        .enumerate()
        .map(|(sid, shape)| ShapeMeasure {
            shape: sid,
            bbox: shape.bbox,
            marker: shape.bbox,
            value: set.shape_area(sid),
        })
        .collect()
}

// ── External distance ─────────────────────────────────────────────────

/// Minimum euclidean gap per distinct shape pair, reported only when the
/// gap is positive and below `limit`. Pairs that touch or overlap are
/// excluded entirely (those are boolean violations, not spacing). With
/// `same_set`, a shape is never compared against itself and each unordered
/// pair is reported once.
pub fn external_distance(
    a: &PolygonSet,
    b: &PolygonSet,
    limit: Coord,
    same_set: bool,
) -> Vec<SpacingMeasure> {
    if limit <= 0 || a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let limit_sq = limit as i128 * limit as i128;

    let mut entries = Vec::new();
    for sid in 0..b.shape_count() {
        for r in b.shape_rects(sid) {
            entries.push(IndexEntry { id: sid, rect: *r });
        }
    }
    let index = RectIndex::build(entries);

    // None marks a pair disqualified by touching or overlapping.
    let mut pairs: BTreeMap<(usize, usize), Option<(i128, IRect)>> = BTreeMap::new();
    for sid in 0..a.shape_count() {
        for r in a.shape_rects(sid) {
            let probe = r.inflate(limit);
            for entry in index.query(&probe) {
                if same_set && entry.id == sid {
                    continue;
                }
                let key = if same_set {
                    (sid.min(entry.id), sid.max(entry.id))
                } else {
                    (sid, entry.id)
                };
                let gap = r.gap_sq(&entry.rect);
                let slot = pairs.entry(key).or_insert(Some((i128::MAX, *r)));
                let Some((best, marker)) = *slot else {
                    continue;
                };
                if gap == 0 {
                    *slot = None;
                } else if gap < limit_sq {
                    let m = r.gap_box(&entry.rect);
                    if gap < best || (gap == best && m < marker) {
                        *slot = Some((gap, m));
                    }
                }
            }
        }
    }

    pairs
        .into_values()
        .flatten()
        .filter(|&(dist_sq, _)| dist_sq < limit_sq)
        .map(|(dist_sq, marker)| SpacingMeasure { dist_sq, marker })
        .collect()
}

// ── External enclosure ────────────────────────────────────────────────

/// Enclosure margin of every inner shape by the outer region. A shape that
/// is not a geometric subset of `outer` is flagged with margin 0; contained
/// shapes report the minimum euclidean distance to the outer complement,
/// but only when it is below `limit`.
pub fn external_enclosure(
    outer: &PolygonSet,
    inner: &PolygonSet,
    limit: Coord,
) -> Vec<EnclosureMeasure> {
    let limit_sq = limit as i128 * limit as i128;
    let mut out = Vec::new();

    for sid in 0..inner.shape_count() {
        let shape = inner.shape_set(sid);
        let bbox = inner.shapes()[sid].bbox;
        if !outer.covers(&shape) {
            out.push(EnclosureMeasure {
                inner_shape: sid,
                margin_sq: 0,
                marker: bbox,
                contained: false,
            });
            continue;
        }

        let frame = PolygonSet::frame(bbox.inflate(limit + 1));
        let complement = frame.not(outer);
        if complement.is_empty() {
            continue; // margin exceeds the search frame
        }
        let mut best: Option<(i128, IRect)> = None;
        for r in shape.rects() {
            for c in complement.rects() {
                let gap = r.gap_sq(c);
                if gap >= limit_sq {
                    continue;
                }
                let m = r.gap_box(c);
                if best.map_or(true, |(bg, bm)| gap < bg || (gap == bg && m < bm)) {
                    best = Some((gap, m));
                }
            }
        }
        if let Some((margin_sq, marker)) = best {
            out.push(EnclosureMeasure {
                inner_shape: sid,
                margin_sq,
                marker,
                contained: true,
            });
        }
    }
    out
}

// ── External extension ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Left,
    Right,
    Down,
    Up,
}

/// Extension of `l` past the `reference` boundary at each gate end, reported
/// when under `limit`. Gate boundary edges are classified by sampling just
/// outside the edge midpoint: interior gate edges and edges where the
/// reference continues (conductor side walls) are skipped; the rest are ends
/// whose outward run through `l` is measured exactly by band ray-casting.
pub fn external_extension(
    l: &PolygonSet,
    gate: &PolygonSet,
    reference: &PolygonSet,
    limit: Coord,
) -> Vec<ExtensionMeasure> {
    let mut out = Vec::new();
    for sid in 0..gate.shape_count() {
        for r in gate.shape_rects(sid) {
            for dir in [Dir::Left, Dir::Right, Dir::Down, Dir::Up] {
                let q = outward_sample(r, dir);
                if gate.contains_point(&q) || reference.contains_point(&q) {
                    continue;
                }
                let extent = if l.contains_point(&q) {
                    ray_extent(l, r, dir)
                } else {
                    0 // the conductor stops flush with the reference edge
                };
                if extent < limit {
                    out.push(ExtensionMeasure {
                        extent,
                        marker: extrude(r, dir, limit),
                    });
                }
            }
        }
    }
    out.sort_unstable_by_key(|m| (m.marker, m.extent));
    out
}

/// First point outside the given edge, at the edge midpoint (half-open
/// coordinates make the max edge itself the outside).
fn outward_sample(r: &IRect, dir: Dir) -> Point {
    let xmid = r.x1 + (r.x2 - r.x1) / 2;
    let ymid = r.y1 + (r.y2 - r.y1) / 2;
    match dir {
        Dir::Left => Point::new(r.x1 - 1, ymid),
        Dir::Right => Point::new(r.x2, ymid),
        Dir::Down => Point::new(xmid, r.y1 - 1),
        Dir::Up => Point::new(xmid, r.y2),
    }
}

/// The edge extruded outward by `d`; used as the violation marker.
fn extrude(r: &IRect, dir: Dir, d: Coord) -> IRect {
    match dir {
        Dir::Left => IRect::new(r.x1 - d, r.y1, r.x1, r.y2),
        Dir::Right => IRect::new(r.x2, r.y1, r.x2 + d, r.y2),
        Dir::Down => IRect::new(r.x1, r.y1 - d, r.x2, r.y1),
        Dir::Up => IRect::new(r.x1, r.y2, r.x2, r.y2 + d),
    }
}

/// Minimum outward run of `l` from one edge of `g`, 0 when any part of the
/// edge span is uncovered. Relies on per-line x-intervals being maximal in
/// the normalized form, so one rectangle gives the whole run at its lines.
fn ray_extent(l: &PolygonSet, g: &IRect, dir: Dir) -> Coord {
    let (lo, hi, at) = match dir {
        Dir::Right => (g.y1, g.y2, g.x2),
        Dir::Left => (g.y1, g.y2, -g.x1),
        Dir::Up => (g.x1, g.x2, g.y2),
        Dir::Down => (g.x1, g.x2, -g.y1),
    };
    let span = (hi - lo) as i128;
    let mut covered: i128 = 0;
    let mut min_run = Coord::MAX;
    for r in l.rects() {
        let (perp_lo, perp_hi, start, end) = match dir {
            Dir::Right => (r.y1, r.y2, r.x1, r.x2),
            Dir::Left => (r.y1, r.y2, -r.x2, -r.x1),
            Dir::Up => (r.x1, r.x2, r.y1, r.y2),
            Dir::Down => (r.x1, r.x2, -r.y2, -r.y1),
        };
        let overlap = perp_hi.min(hi) - perp_lo.max(lo);
        if overlap <= 0 {
            continue;
        }
        if start <= at && at < end {
            covered += overlap as i128;
            min_run = min_run.min(end - at);
        }
    }
    if covered < span {
        0
    } else {
        min_run
    }
}

// ── Density ───────────────────────────────────────────────────────────

/// Sliding-window density scan. Windows step by half the window dimension,
/// anchored at the extent origin; the final window on each axis is clamped
/// to end at the extent edge, and an extent smaller than the window yields a
/// single clipped window. Coverage is exact rational area in dbu².
pub fn density(l: &PolygonSet, extent: &IRect, win_w: Coord, win_h: Coord) -> Vec<DensityWindow> {
    let mut entries = Vec::new();
    for (i, r) in l.rects().iter().enumerate() {
        entries.push(IndexEntry { id: i, rect: *r });
    }
    let index = RectIndex::build(entries);

    let mut out = Vec::new();
    for wy in window_origins(extent.y1, extent.y2, win_h) {
        for wx in window_origins(extent.x1, extent.x2, win_w) {
            let window = IRect::new(
                wx,
                wy,
                (wx + win_w).min(extent.x2),
                (wy + win_h).min(extent.y2),
            );
            if window.is_degenerate() {
                continue;
            }
            let mut covered: i128 = 0;
            for entry in index.query(&window) {
                if let Some(clip) = entry.rect.intersect(&window) {
                    covered += clip.area();
                }
            }
            out.push(DensityWindow {
                window,
                coverage: covered as f64 / window.area() as f64,
            });
        }
    }
    out
}

fn window_origins(lo: Coord, hi: Coord, win: Coord) -> Vec<Coord> {
    if hi - lo <= win {
        return vec![lo];
    }
    let step = (win / 2).max(1);
    let mut origins = Vec::new();
    let mut x = lo;
    while x + win < hi {
        origins.push(x);
        x += step;
    }
    origins.push(hi - win);
    origins.dedup();
    origins
}

// ── Antenna ratio ─────────────────────────────────────────────────────

/// Per connected conductor shape: the ratio of the shape's metric to the
/// metric of its gate region (the shape clipped to `reference`). Shapes
/// with no gate overlap carry no charging risk and are skipped.
pub fn antenna_ratio(
    l: &PolygonSet,
    reference: &PolygonSet,
    metric: AntennaMetric,
) -> Vec<AntennaMeasure> {
    let mut out = Vec::new();
    for sid in 0..l.shape_count() {
        let shape = l.shape_set(sid);
        let gate = shape.and(reference);
        if gate.is_empty() {
            continue;
        }
        let (num, den) = match metric {
            AntennaMetric::Area => (l.shape_area(sid) as f64, gate.total_area() as f64),
            AntennaMetric::Perimeter => {
                let gate_perimeter: i128 =
                    (0..gate.shape_count()).map(|g| gate.shape_perimeter(g)).sum();
                (l.shape_perimeter(sid) as f64, gate_perimeter as f64)
            }
        };
        out.push(AntennaMeasure {
            shape: sid,
            bbox: l.shapes()[sid].bbox,
            ratio: num / den,
        });
    }
    out
}
