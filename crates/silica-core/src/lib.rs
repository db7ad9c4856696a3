//! # Silica Core
//!
//! Geometry kernel for the Silica DRC engine: integer-dbu scalar types,
//! normalized rectilinear polygon sets with boolean algebra and sizing, and
//! the measurement operators (width, spacing, area, enclosure, extension,
//! density windowing, antenna ratio) that rule checks are built from.
//!
//! Everything here is a pure function of its inputs; rule codes, thresholds
//! in micrometers, and violation records live in `silica-drc`.

pub mod geometry;
pub mod measure;
pub mod polyset;
pub mod spatial;

pub use geometry::{Coord, IRect, Point, Units};
pub use polyset::{BoolOp, GeomError, PolygonSet, Shape};
