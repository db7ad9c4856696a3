//! # Evaluator
//!
//! Runs every rule binding of a deck against a layout. Checks execute in
//! parallel but results keep deck declaration order; a geometry failure in
//! one check becomes a diagnostic in the report instead of aborting the run.
//! Threshold unit mismatches are validated up front and abort immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use silica_core::{measure, Coord, Units};
use silica_deck::{
    AntennaMetric, BindingTarget, CheckDef, CheckOp, Comparator, RuleBinding, RuleGraph,
};
use uuid::Uuid;

use crate::error::DrcError;
use crate::layout::Layout;
use crate::report::DrcReport;
use crate::store::LayerStore;
use crate::violation::{CheckDiagnostic, Violation, ViolationKind};

/// Cooperative cancellation shared with the caller. Checked between rule
/// bindings; a running check finishes its current binding.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What to do with zero-area rectangles dropped while normalizing layer
/// geometry. They never contribute to measurements either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliverPolicy {
    /// Record the count in the report.
    #[default]
    Count,
    /// Also emit a diagnostic, so a clean-report gate rejects the run.
    Diagnose,
}

/// Threshold converted to kernel units, per check.
#[derive(Debug, Clone, Copy)]
enum Threshold {
    Length(Coord),
    Area(i128),
    Fraction(f64),
}

struct BindingOutcome {
    violations: Vec<Violation>,
    diagnostic: Option<CheckDiagnostic>,
}

pub struct Evaluator<'a> {
    graph: &'a RuleGraph,
    layout: &'a Layout,
    store: LayerStore<'a>,
    thresholds: Vec<Threshold>,
    sliver_policy: SliverPolicy,
}

impl<'a> Evaluator<'a> {
    /// Prepare a run: converts every check threshold into database units.
    /// A threshold off the dbu grid fails here, before any geometry work.
    pub fn new(graph: &'a RuleGraph, layout: &'a Layout) -> Result<Self, DrcError> {
        let units = layout.units;
        let thresholds = graph
            .checks
            .iter()
            .map(|check| convert_threshold(check, &units))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            graph,
            layout,
            store: LayerStore::new(graph, layout),
            thresholds,
            sliver_policy: SliverPolicy::default(),
        })
    }

    pub fn with_sliver_policy(mut self, policy: SliverPolicy) -> Self {
        self.sliver_policy = policy;
        self
    }

    /// Run every binding; violations come back sorted deterministically.
    pub fn run(&self, cancel: &CancelToken) -> Result<DrcReport, DrcError> {
        let outcomes: Vec<Result<BindingOutcome, DrcError>> = self
            .graph
            .bindings
            .par_iter()
            .map(|binding| {
                if cancel.is_cancelled() {
                    return Err(DrcError::Cancelled);
                }
                Ok(self.run_binding(binding))
            })
            .collect();

        let mut report = DrcReport::new(Uuid::new_v4(), &self.layout.name);
        for outcome in outcomes {
            let outcome = outcome?;
            report.violations.extend(outcome.violations);
            report.diagnostics.extend(outcome.diagnostic);
        }
        report.dropped_slivers = self.store.dropped_slivers();
        if self.sliver_policy == SliverPolicy::Diagnose && report.dropped_slivers > 0 {
            report.diagnostics.push(CheckDiagnostic {
                rule_code: "GEOM.SLIVER".to_string(),
                check: "<normalization>".to_string(),
                message: format!(
                    "{} zero-area sliver(s) dropped during layer derivation",
                    report.dropped_slivers
                ),
            });
        }
        report.finalize();
        log::info!(
            "run {}: {} violations, {} diagnostics",
            report.run_id,
            report.violations.len(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    fn run_binding(&self, binding: &RuleBinding) -> BindingOutcome {
        match binding.target {
            BindingTarget::Layer(idx) => self.run_layer_binding(binding, idx),
            BindingTarget::Check(idx) => {
                let check = &self.graph.checks[idx];
                match self.run_check(binding, check, self.thresholds[idx]) {
                    Ok(violations) => BindingOutcome {
                        violations,
                        diagnostic: None,
                    },
                    Err(err) => {
                        log::warn!("check '{}' skipped: {err}", check.name);
                        BindingOutcome {
                            violations: Vec::new(),
                            diagnostic: Some(CheckDiagnostic {
                                rule_code: binding.code.clone(),
                                check: check.name.clone(),
                                message: err.to_string(),
                            }),
                        }
                    }
                }
            }
        }
    }

    /// A layer bound directly to a rule flags every shape on it.
    fn run_layer_binding(&self, binding: &RuleBinding, idx: usize) -> BindingOutcome {
        match self.store.layer(idx) {
            Ok(set) => BindingOutcome {
                violations: set
                    .shapes()
                    .iter()
                    .map(|shape| {
                        Violation::new(
                            &binding.code,
                            &binding.message,
                            ViolationKind::ForbiddenGeometry,
                            vec![shape.bbox],
                        )
                    })
                    .collect(),
                diagnostic: None,
            },
            Err(err) => BindingOutcome {
                violations: Vec::new(),
                diagnostic: Some(CheckDiagnostic {
                    rule_code: binding.code.clone(),
                    check: self.graph.layers[idx].name.clone(),
                    message: err.to_string(),
                }),
            },
        }
    }

    fn run_check(
        &self,
        binding: &RuleBinding,
        check: &CheckDef,
        threshold: Threshold,
    ) -> Result<Vec<Violation>, DrcError> {
        let units = &self.layout.units;
        let code = binding.code.as_str();
        let msg = binding.message.as_str();

        let violations = match (&check.op, threshold) {
            (CheckOp::Width(expr), Threshold::Length(limit)) => {
                let set = self.store.eval(expr)?;
                dimension_violations(
                    measure::min_width(&set),
                    check.cmp,
                    limit,
                    dimension_kind(check.cmp, ViolationKind::MinWidth),
                    code,
                    msg,
                    units,
                )
            }
            (CheckOp::Length(expr), Threshold::Length(limit)) => {
                let set = self.store.eval(expr)?;
                dimension_violations(
                    measure::shape_lengths(&set),
                    check.cmp,
                    limit,
                    dimension_kind(check.cmp, ViolationKind::MinLength),
                    code,
                    msg,
                    units,
                )
            }
            (CheckOp::Area(expr), Threshold::Area(limit)) => {
                let set = self.store.eval(expr)?;
                measure::shape_areas(&set)
                    .into_iter()
                    .filter(|m| check.cmp.holds(m.value, limit))
                    .map(|m| {
                        Violation::new(code, msg, ViolationKind::MinArea, vec![m.bbox])
                            .with_values(units.dbu2_to_um2(m.value), units.dbu2_to_um2(limit))
                    })
                    .collect()
            }
            (CheckOp::ExternalDistance(a, b), Threshold::Length(limit)) => {
                let same_set = a == b;
                let sa = self.store.eval(a)?;
                let sb = self.store.eval(b)?;
                measure::external_distance(&sa, &sb, limit, same_set)
                    .into_iter()
                    .map(|m| {
                        Violation::new(code, msg, ViolationKind::MinSpacing, vec![m.marker])
                            .with_values(
                                (m.dist_sq as f64).sqrt() / units.dbu_per_um,
                                units.dbu_to_um(limit),
                            )
                    })
                    .collect()
            }
            (CheckOp::ExternalEnclosure { outer, inner }, Threshold::Length(limit)) => {
                let so = self.store.eval(outer)?;
                let si = self.store.eval(inner)?;
                measure::external_enclosure(&so, &si, limit)
                    .into_iter()
                    .map(|m| {
                        Violation::new(code, msg, ViolationKind::Enclosure, vec![m.marker])
                            .with_values(
                                (m.margin_sq as f64).sqrt() / units.dbu_per_um,
                                units.dbu_to_um(limit),
                            )
                    })
                    .collect()
            }
            (
                CheckOp::ExternalExtension {
                    conductor,
                    gate,
                    reference,
                },
                Threshold::Length(limit),
            ) => {
                let sc = self.store.eval(conductor)?;
                let sg = self.store.eval(gate)?;
                let sr = self.store.eval(reference)?;
                measure::external_extension(&sc, &sg, &sr, limit)
                    .into_iter()
                    .map(|m| {
                        Violation::new(code, msg, ViolationKind::Extension, vec![m.marker])
                            .with_values(units.dbu_to_um(m.extent), units.dbu_to_um(limit))
                    })
                    .collect()
            }
            (
                CheckOp::Density {
                    layer,
                    win_w_um,
                    win_h_um,
                },
                Threshold::Fraction(limit),
            ) => {
                let set = self.store.eval(layer)?;
                let Some(extent) = self.layout_extent() else {
                    return Ok(Vec::new());
                };
                let win_w = units.length_to_dbu(*win_w_um).ok_or_else(|| {
                    DrcError::ThresholdUnitMismatch {
                        check: check.name.clone(),
                        value: *win_w_um,
                        dbu_per_um: units.dbu_per_um,
                    }
                })?;
                let win_h = units.length_to_dbu(*win_h_um).ok_or_else(|| {
                    DrcError::ThresholdUnitMismatch {
                        check: check.name.clone(),
                        value: *win_h_um,
                        dbu_per_um: units.dbu_per_um,
                    }
                })?;
                measure::density(&set, &extent, win_w, win_h)
                    .into_iter()
                    .filter(|w| check.cmp.holds(w.coverage, limit))
                    .map(|w| {
                        Violation::new(code, msg, ViolationKind::Density, vec![w.window])
                            .with_values(w.coverage, limit)
                    })
                    .collect()
            }
            (
                CheckOp::AntennaRatio {
                    layer,
                    reference,
                    metric,
                },
                Threshold::Fraction(limit),
            ) => {
                let set = self.store.eval(layer)?;
                let sr = self.store.eval(reference)?;
                let metric = match metric {
                    AntennaMetric::Area => measure::AntennaMetric::Area,
                    AntennaMetric::Perimeter => measure::AntennaMetric::Perimeter,
                };
                measure::antenna_ratio(&set, &sr, metric)
                    .into_iter()
                    .filter(|m| check.cmp.holds(m.ratio, limit))
                    .map(|m| {
                        Violation::new(code, msg, ViolationKind::Antenna, vec![m.bbox])
                            .with_values(m.ratio, limit)
                    })
                    .collect()
            }
            // convert_threshold pairs every op with its threshold form.
            (op, _) => {
                log::error!("check '{}': threshold form mismatch for {}", check.name, op.name());
                Vec::new()
            }
        };
        Ok(violations)
    }

    /// Density extent: the bounding box of everything in the layout.
    fn layout_extent(&self) -> Option<silica_core::IRect> {
        let (min, max) = self.layout.bounding_box()?;
        let extent = silica_core::IRect::new(min.x, min.y, max.x, max.y);
        (!extent.is_degenerate()).then_some(extent)
    }
}

fn convert_threshold(check: &CheckDef, units: &Units) -> Result<Threshold, DrcError> {
    let mismatch = || DrcError::ThresholdUnitMismatch {
        check: check.name.clone(),
        value: check.threshold,
        dbu_per_um: units.dbu_per_um,
    };
    match check.op {
        CheckOp::Width(_)
        | CheckOp::Length(_)
        | CheckOp::ExternalDistance(..)
        | CheckOp::ExternalEnclosure { .. }
        | CheckOp::ExternalExtension { .. } => units
            .length_to_dbu(check.threshold)
            .map(Threshold::Length)
            .ok_or_else(mismatch),
        CheckOp::Area(_) => units
            .area_to_dbu2(check.threshold)
            .map(Threshold::Area)
            .ok_or_else(mismatch),
        CheckOp::Density { .. } | CheckOp::AntennaRatio { .. } => {
            Ok(Threshold::Fraction(check.threshold))
        }
    }
}

/// Exact-dimension comparators reclassify width/length checks.
fn dimension_kind(cmp: Comparator, base: ViolationKind) -> ViolationKind {
    match cmp {
        Comparator::Eq | Comparator::Ne => ViolationKind::ExactDimension,
        _ => base,
    }
}

fn dimension_violations(
    measures: Vec<measure::ShapeMeasure>,
    cmp: Comparator,
    limit: Coord,
    kind: ViolationKind,
    code: &str,
    msg: &str,
    units: &Units,
) -> Vec<Violation> {
    measures
        .into_iter()
        .filter(|m| cmp.holds(m.value, limit as i128))
        .map(|m| {
            Violation::new(code, msg, kind, vec![m.marker]).with_values(
                units.dbu_to_um(m.value as Coord),
                units.dbu_to_um(limit),
            )
        })
        .collect()
}

/// One-call convenience: build the evaluator and run to a report.
pub fn run_drc(
    graph: &RuleGraph,
    layout: &Layout,
    cancel: &CancelToken,
) -> Result<DrcReport, DrcError> {
    Evaluator::new(graph, layout)?.run(cancel)
}
