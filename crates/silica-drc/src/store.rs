//! # Layer Store
//!
//! Memoized layer derivation. Primary layers are rasterized from the layout
//! once; derived layers evaluate their expression over already-derived
//! inputs. Each layer is computed at most once per run and shared by `Arc`,
//! so checks running in parallel never duplicate geometry work.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use silica_core::{Coord, GeomError, PolygonSet, Units};
use silica_deck::{BboxAxis, BboxPred, BoolOp, LayerExpr, LayerKind, PredCmp, RuleGraph};

use crate::error::DrcError;
use crate::layout::Layout;

pub struct LayerStore<'a> {
    graph: &'a RuleGraph,
    layout: &'a Layout,
    slots: Vec<OnceCell<Result<Arc<PolygonSet>, GeomError>>>,
}

impl<'a> LayerStore<'a> {
    pub fn new(graph: &'a RuleGraph, layout: &'a Layout) -> Self {
        Self {
            graph,
            layout,
            slots: (0..graph.layers.len()).map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn units(&self) -> &Units {
        &self.layout.units
    }

    /// The derived geometry of layer `idx`, memoized.
    pub fn layer(&self, idx: usize) -> Result<Arc<PolygonSet>, DrcError> {
        self.raw(idx).map_err(|source| DrcError::InvalidLayer {
            layer: self.graph.layers[idx].name.clone(),
            source,
        })
    }

    /// Evaluate a check operand. Operands reuse the same memoized layers a
    /// derived-layer definition would.
    pub fn eval(&self, expr: &LayerExpr) -> Result<Arc<PolygonSet>, DrcError> {
        match expr {
            // Bare references share the memoized Arc directly.
            LayerExpr::Ref(name) => match self.graph.layer(name) {
                Some((idx, _)) => self.layer(idx),
                None => Ok(Arc::new(PolygonSet::empty())),
            },
            _ => self
                .eval_expr(expr)
                .map(Arc::new)
                .map_err(|source| DrcError::InvalidLayer {
                    layer: "<expression>".to_string(),
                    source,
                }),
        }
    }

    /// Sliver rectangles dropped across every layer derived so far.
    pub fn dropped_slivers(&self) -> u64 {
        self.slots
            .iter()
            .filter_map(|slot| slot.get())
            .filter_map(|res| res.as_ref().ok())
            .map(|set| set.dropped_slivers())
            .sum()
    }

    fn raw(&self, idx: usize) -> Result<Arc<PolygonSet>, GeomError> {
        self.slots[idx]
            .get_or_init(|| self.derive(idx).map(Arc::new))
            .clone()
    }

    fn derive(&self, idx: usize) -> Result<PolygonSet, GeomError> {
        let def = &self.graph.layers[idx];
        let set = match &def.kind {
            LayerKind::Primary {
                gds_layer,
                gds_datatype,
            } => {
                // A (layer, datatype) pair absent from the layout is an
                // empty layer, not an error.
                let polygons = self.layout.polygons_on(*gds_layer, *gds_datatype);
                PolygonSet::from_polygons(&polygons)?
            }
            LayerKind::Derived(expr) => self.eval_expr(expr)?,
        };
        log::debug!(
            "layer '{}': {} shapes, {} rects",
            def.name,
            set.shape_count(),
            set.rects().len()
        );
        Ok(set)
    }

    fn eval_expr(&self, expr: &LayerExpr) -> Result<PolygonSet, GeomError> {
        match expr {
            LayerExpr::Ref(name) => match self.graph.layer(name) {
                Some((idx, _)) => self.raw(idx).map(|set| (*set).clone()),
                // Graph construction resolves every reference; an unknown
                // name here means the graph and expression are mismatched.
                None => {
                    log::error!("unresolved layer reference '{name}'");
                    Ok(PolygonSet::empty())
                }
            },
            LayerExpr::Bool { op, lhs, rhs } => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                Ok(match op {
                    BoolOp::And => a.and(&b),
                    BoolOp::Or => a.or(&b),
                    BoolOp::Not => a.not(&b),
                })
            }
            LayerExpr::Sized { arg, amount_um } => {
                let set = self.eval_expr(arg)?;
                // Sizing amounts snap to the dbu grid like layout input.
                let d = (amount_um * self.layout.units.dbu_per_um).round() as Coord;
                Ok(set.grow(d))
            }
            LayerExpr::SizedRectangles { arg, pred } => {
                let set = self.eval_expr(arg)?;
                let units = &self.layout.units;
                Ok(set.filter_shapes(|bbox| {
                    pred_holds(pred, units.dbu_to_um(bbox.width()), units.dbu_to_um(bbox.height()))
                }))
            }
        }
    }
}

fn pred_holds(pred: &BboxPred, w_um: f64, h_um: f64) -> bool {
    match pred {
        BboxPred::Cmp {
            axis,
            cmp,
            value_um,
        } => {
            let dim = match axis {
                BboxAxis::X => w_um,
                BboxAxis::Y => h_um,
            };
            match cmp {
                PredCmp::Lt => dim < *value_um,
                PredCmp::Gt => dim > *value_um,
                PredCmp::Le => dim <= *value_um,
                PredCmp::Ge => dim >= *value_um,
            }
        }
        BboxPred::Any(terms) => terms.iter().any(|t| pred_holds(t, w_um, h_um)),
        BboxPred::All(terms) => terms.iter().all(|t| pred_holds(t, w_um, h_um)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_deck::{load_deck, MemResolver};
    use std::collections::HashSet;

    fn graph(deck: &str) -> RuleGraph {
        load_deck("test", deck, &MemResolver::default(), &HashSet::new()).unwrap()
    }

    #[test]
    fn test_primary_layer_from_layout() {
        let g = graph("DIFF = layer(1, 0);\n");
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect(1, 0, 0, 0, 100, 100);
        layout.add_rect(2, 0, 0, 0, 999, 999); // other layer, ignored

        let store = LayerStore::new(&g, &layout);
        let diff = store.layer(0).unwrap();
        assert_eq!(diff.shape_count(), 1);
        assert_eq!(diff.total_area(), 100 * 100);
    }

    #[test]
    fn test_absent_primary_layer_is_empty() {
        let g = graph("METAL9 = layer(99, 0);\n");
        let layout = Layout::new("top", Units::default());
        let store = LayerStore::new(&g, &layout);
        assert!(store.layer(0).unwrap().is_empty());
    }

    #[test]
    fn test_derived_boolean_chain() {
        let g = graph(
            "DIFF = layer(1, 0);\n\
             POLY = layer(2, 0);\n\
             GATE = POLY and DIFF;\n\
             FIELD_POLY = POLY not GATE;\n",
        );
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect(1, 0, 0, 0, 100, 100);
        layout.add_rect(2, 0, 50, -50, 80, 150);

        let store = LayerStore::new(&g, &layout);
        let gate = store.layer(g.layer("GATE").unwrap().0).unwrap();
        assert_eq!(gate.total_area(), 30 * 100);
        let field = store.layer(g.layer("FIELD_POLY").unwrap().0).unwrap();
        assert_eq!(field.total_area(), 30 * 200 - 30 * 100);
    }

    #[test]
    fn test_memoized_arc_shared() {
        let g = graph(
            "M1 = layer(8, 0);\n\
             A = M1 or M1;\n\
             B = M1 or M1;\n",
        );
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect(8, 0, 0, 0, 10, 10);

        let store = LayerStore::new(&g, &layout);
        let first = store.layer(0).unwrap();
        let again = store.layer(0).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_sized_rectangles_filter() {
        let g = graph(
            "M2 = layer(10, 0);\n\
             M2_wide = sized_rectangles(M2, x > 1.0 || y > 1.0);\n",
        );
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect(10, 0, 0, 0, 500, 500); // 0.5um square: narrow
        layout.add_rect(10, 0, 2000, 0, 3500, 200); // 1.5um long: wide

        let store = LayerStore::new(&g, &layout);
        let wide = store.layer(g.layer("M2_wide").unwrap().0).unwrap();
        assert_eq!(wide.shape_count(), 1);
        assert_eq!(wide.bbox().unwrap().x1, 2000);
    }

    #[test]
    fn test_grow_and_shrink() {
        let g = graph(
            "M1 = layer(8, 0);\n\
             M1_halo = grow(M1, 0.05);\n\
             M1_core = shrink(M1, 0.05);\n",
        );
        let mut layout = Layout::new("top", Units::default());
        layout.add_rect_um(8, 0, 0.0, 0.0, 0.2, 0.2);

        let store = LayerStore::new(&g, &layout);
        let halo = store.layer(g.layer("M1_halo").unwrap().0).unwrap();
        assert_eq!(halo.total_area(), 300 * 300);
        let core = store.layer(g.layer("M1_core").unwrap().0).unwrap();
        assert_eq!(core.total_area(), 100 * 100);
    }

    #[test]
    fn test_malformed_outline_is_layer_error() {
        let g = graph("DIFF = layer(1, 0);\n");
        let mut layout = Layout::new("top", Units::default());
        layout.shapes.push(crate::layout::SourcePolygon {
            gds_layer: 1,
            gds_datatype: 0,
            points: vec![
                silica_core::Point::new(0, 0),
                silica_core::Point::new(10, 10), // diagonal edge
                silica_core::Point::new(0, 10),
            ],
        });
        let store = LayerStore::new(&g, &layout);
        assert!(matches!(
            store.layer(0),
            Err(DrcError::InvalidLayer { ref layer, .. }) if layer == "DIFF"
        ));
    }
}
