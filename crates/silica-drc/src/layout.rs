//! Flat layout input: named design, database units, and rectilinear shapes
//! tagged with their (GDS layer, datatype) pair.

use serde::{Deserialize, Serialize};
use silica_core::{Point, Units};

/// One rectilinear outline on a mask layer. Vertices are dbu, closed
/// implicitly (last connects back to first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePolygon {
    pub gds_layer: u16,
    pub gds_datatype: u16,
    pub points: Vec<Point>,
}

/// A flat layout ready for checking. Hierarchy is assumed to be flattened
/// upstream; the engine only sees shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub units: Units,
    pub shapes: Vec<SourcePolygon>,
}

impl Layout {
    pub fn new(name: &str, units: Units) -> Self {
        Self {
            name: name.to_string(),
            units,
            shapes: Vec::new(),
        }
    }

    /// Add an axis-aligned rectangle in dbu.
    pub fn add_rect(&mut self, gds_layer: u16, gds_datatype: u16, x1: i64, y1: i64, x2: i64, y2: i64) {
        self.shapes.push(SourcePolygon {
            gds_layer,
            gds_datatype,
            points: vec![
                Point::new(x1, y1),
                Point::new(x2, y1),
                Point::new(x2, y2),
                Point::new(x1, y2),
            ],
        });
    }

    /// Add a rectangle in micrometers, snapped to the database grid.
    /// Off-grid input rounds to the nearest dbu.
    pub fn add_rect_um(&mut self, gds_layer: u16, gds_datatype: u16, x1: f64, y1: f64, x2: f64, y2: f64) {
        let s = self.units.dbu_per_um;
        self.add_rect(
            gds_layer,
            gds_datatype,
            (x1 * s).round() as i64,
            (y1 * s).round() as i64,
            (x2 * s).round() as i64,
            (y2 * s).round() as i64,
        );
    }

    /// Outlines on one (layer, datatype) pair, in insertion order.
    pub fn polygons_on(&self, gds_layer: u16, gds_datatype: u16) -> Vec<Vec<Point>> {
        self.shapes
            .iter()
            .filter(|s| s.gds_layer == gds_layer && s.gds_datatype == gds_datatype)
            .map(|s| s.points.clone())
            .collect()
    }

    /// Bounding box over every shape on every layer, as (min, max) corners.
    /// `None` for an empty layout.
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let mut min: Option<Point> = None;
        let mut max: Option<Point> = None;
        for shape in &self.shapes {
            for p in &shape.points {
                min = Some(match min {
                    Some(m) => Point::new(m.x.min(p.x), m.y.min(p.y)),
                    None => *p,
                });
                max = Some(match max {
                    Some(m) => Point::new(m.x.max(p.x), m.y.max(p.y)),
                    None => *p,
                });
            }
        }
        min.zip(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_um_snaps_to_grid() {
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect_um(1, 0, 0.0, 0.0, 0.1, 0.25);
        assert_eq!(
            layout.shapes[0].points,
            vec![
                Point::new(0, 0),
                Point::new(100, 0),
                Point::new(100, 250),
                Point::new(0, 250),
            ]
        );
    }

    #[test]
    fn test_polygons_on_filters_by_pair() {
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect(1, 0, 0, 0, 10, 10);
        layout.add_rect(1, 1, 0, 0, 20, 20);
        layout.add_rect(2, 0, 0, 0, 30, 30);
        assert_eq!(layout.polygons_on(1, 0).len(), 1);
        assert_eq!(layout.polygons_on(1, 1).len(), 1);
        assert!(layout.polygons_on(3, 0).is_empty());
    }

    #[test]
    fn test_bounding_box() {
        let mut layout = Layout::new("top", Units::default());
        assert!(layout.bounding_box().is_none());
        layout.add_rect(1, 0, -5, 0, 10, 10);
        layout.add_rect(2, 0, 0, -3, 8, 40);
        let (min, max) = layout.bounding_box().unwrap();
        assert_eq!(min, Point::new(-5, -3));
        assert_eq!(max, Point::new(10, 40));
    }
}
