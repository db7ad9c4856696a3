use serde::{Deserialize, Serialize};

/// Layout coordinate in integer database units.
pub type Coord = i64;

/// Scale between micrometers and database units.
///
/// All geometry inside the kernel is integer dbu so that boolean and
/// measurement results are bit-reproducible across runs and machines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Units {
    pub dbu_per_um: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self { dbu_per_um: 1000.0 } // 1 dbu = 1 nm
    }
}

impl Units {
    pub fn new(dbu_per_um: f64) -> Self {
        Self { dbu_per_um }
    }

    /// Convert a micrometer length to dbu. Returns `None` when the value
    /// does not land on the dbu grid (within 1e-6 dbu).
    pub fn length_to_dbu(&self, um: f64) -> Option<Coord> {
        let scaled = um * self.dbu_per_um;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return None;
        }
        Some(rounded as Coord)
    }

    /// Convert a square-micrometer area to dbu².
    pub fn area_to_dbu2(&self, um2: f64) -> Option<i128> {
        let scaled = um2 * self.dbu_per_um * self.dbu_per_um;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-3 {
            return None;
        }
        Some(rounded as i128)
    }

    pub fn dbu_to_um(&self, dbu: Coord) -> f64 {
        dbu as f64 / self.dbu_per_um
    }

    pub fn dbu2_to_um2(&self, dbu2: i128) -> f64 {
        dbu2 as f64 / (self.dbu_per_um * self.dbu_per_um)
    }
}

/// A 2D point in database units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle, half-open on both axes: `[x1, x2) × [y1, y2)`.
///
/// The half-open convention is applied uniformly across the kernel: two
/// rectangles that share only a boundary do not overlap, and a point on the
/// max edge is outside.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IRect {
    pub x1: Coord,
    pub y1: Coord,
    pub x2: Coord,
    pub y2: Coord,
}

impl IRect {
    /// Build a rectangle from two corners in any order.
    pub fn new(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> Coord {
        self.x2 - self.x1
    }

    pub fn height(&self) -> Coord {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Positive-area intersection, or `None` when the rectangles only touch
    /// or are disjoint.
    pub fn intersect(&self, other: &IRect) -> Option<IRect> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x1 < x2 && y1 < y2 {
            Some(IRect { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn overlaps(&self, other: &IRect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// True when the rectangles share a boundary segment of positive length
    /// but no area. A corner-only touch does not count.
    pub fn touches(&self, other: &IRect) -> bool {
        if self.overlaps(other) {
            return false;
        }
        let x_overlap = self.x2.min(other.x2) - self.x1.max(other.x1);
        let y_overlap = self.y2.min(other.y2) - self.y1.max(other.y1);
        (x_overlap == 0 && y_overlap > 0) || (y_overlap == 0 && x_overlap > 0)
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x1 && p.x < self.x2 && p.y >= self.y1 && p.y < self.y2
    }

    pub fn contains_rect(&self, other: &IRect) -> bool {
        other.x1 >= self.x1 && other.x2 <= self.x2 && other.y1 >= self.y1 && other.y2 <= self.y2
    }

    pub fn union_bbox(&self, other: &IRect) -> IRect {
        IRect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Grow (or shrink, for negative `d`) on all four sides.
    pub fn inflate(&self, d: Coord) -> IRect {
        IRect {
            x1: self.x1 - d,
            y1: self.y1 - d,
            x2: self.x2 + d,
            y2: self.y2 + d,
        }
    }

    /// Squared euclidean gap between two rectangles, 0 when they touch or
    /// overlap. Exact in integer arithmetic.
    pub fn gap_sq(&self, other: &IRect) -> i128 {
        let dx = (other.x1 - self.x2).max(self.x1 - other.x2).max(0) as i128;
        let dy = (other.y1 - self.y2).max(self.y1 - other.y2).max(0) as i128;
        dx * dx + dy * dy
    }

    /// The marker box spanning the gap between two disjoint rectangles.
    /// Degenerate (zero width or height) when the rectangles are aligned.
    pub fn gap_box(&self, other: &IRect) -> IRect {
        let (gx1, gx2) = if self.x2 <= other.x1 {
            (self.x2, other.x1)
        } else if other.x2 <= self.x1 {
            (other.x2, self.x1)
        } else {
            (self.x1.max(other.x1), self.x2.min(other.x2))
        };
        let (gy1, gy2) = if self.y2 <= other.y1 {
            (self.y2, other.y1)
        } else if other.y2 <= self.y1 {
            (other.y2, self.y1)
        } else {
            (self.y1.max(other.y1), self.y2.min(other.y2))
        };
        IRect {
            x1: gx1,
            y1: gy1,
            x2: gx2,
            y2: gy2,
        }
    }

    /// Swap the axes, mapping `[x1,x2)×[y1,y2)` to `[y1,y2)×[x1,x2)`.
    pub fn transpose(&self) -> IRect {
        IRect {
            x1: self.y1,
            y1: self.x1,
            x2: self.y2,
            y2: self.x2,
        }
    }
}
