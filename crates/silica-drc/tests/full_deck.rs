//! End-to-end runs of the bundled 40nm deck against small hand-built cells.
//!
//! The base cell is constructed to pass every rule; each test then adds the
//! geometry that trips exactly the rule under test and asserts on that rule
//! code only, since extra shapes legitimately shift layout-wide results
//! like density.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use silica_core::Units;
use silica_deck::{load_deck, load_deck_file, MemResolver, RuleGraph};
use silica_drc::{run_drc, CancelToken, DrcError, DrcReport, Layout, Violation, ViolationKind};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn deck_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/decks/example_40nm.drc")
}

fn load(defines: &[&str]) -> RuleGraph {
    let defines: HashSet<String> = defines.iter().map(|s| s.to_string()).collect();
    load_deck_file(&deck_path(), &defines).unwrap()
}

fn run(graph: &RuleGraph, layout: &Layout) -> DrcReport {
    run_drc(graph, layout, &CancelToken::new()).unwrap()
}

fn violations_for<'r>(report: &'r DrcReport, code: &str) -> Vec<&'r Violation> {
    report
        .violations
        .iter()
        .filter(|v| v.rule_code == code)
        .collect()
}

/// A minimal transistor-like cell that satisfies the whole deck: one
/// diffusion strip, a poly gate crossing it with generous endcaps, a
/// contact landed on diffusion under a metal1 plate sized to keep density
/// in range.
fn base_cell() -> Layout {
    let mut layout = Layout::new("base", Units::default());
    layout.add_rect_um(1, 0, 0.0, 0.0, 0.5, 0.2); // DIFF
    layout.add_rect_um(5, 0, 0.2, -0.2, 0.3, 0.4); // POLY
    layout.add_rect_um(6, 0, 0.05, 0.05, 0.11, 0.11); // CONTACT
    layout.add_rect_um(10, 0, 0.0, -0.2, 0.5, 0.15); // METAL1
    layout
}

#[test]
fn test_base_cell_is_clean() {
    init();
    let report = run(&load(&[]), &base_cell());
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.dropped_slivers, 0);
}

#[test]
fn test_diff_min_width() {
    init();
    let mut layout = base_cell();
    // 0.08um wide, tall enough to keep DIFF.A.1 quiet.
    layout.add_rect_um(1, 0, 2.0, 0.0, 2.08, 0.8);
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "DIFF.W.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::MinWidth);
    assert!((hits[0].measured_value.unwrap() - 0.08).abs() < 1e-9);
    assert!((hits[0].threshold.unwrap() - 0.1).abs() < 1e-9);
    assert!(violations_for(&report, "DIFF.A.1").is_empty());
}

#[test]
fn test_contact_spacing() {
    init();
    let mut layout = base_cell();
    layout.add_rect_um(6, 0, 2.0, 0.0, 2.06, 0.06);
    layout.add_rect_um(6, 0, 2.11, 0.0, 2.17, 0.06);
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "CONT.S.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::MinSpacing);
    assert!((hits[0].measured_value.unwrap() - 0.05).abs() < 1e-9);
    // The 0.06um squares themselves are on-dimension.
    assert!(violations_for(&report, "CONT.W.1").is_empty());
    assert!(violations_for(&report, "CONT.L.1").is_empty());
}

#[test]
fn test_exact_contact_dimension() {
    init();
    let mut layout = base_cell();
    layout.add_rect_um(6, 0, 2.0, 0.0, 2.061, 0.061); // off by 1nm
    let report = run(&load(&[]), &layout);
    let widths = violations_for(&report, "CONT.W.1");
    assert_eq!(widths.len(), 1);
    assert_eq!(widths[0].kind, ViolationKind::ExactDimension);
    assert!((widths[0].measured_value.unwrap() - 0.061).abs() < 1e-9);
    assert_eq!(violations_for(&report, "CONT.L.1").len(), 1);
}

#[test]
fn test_custom_rules_gated_by_define() {
    init();
    let mut layout = base_cell();
    // 0.18um gap: legal for DIFF.S.1 (0.14), illegal for the custom 0.20.
    layout.add_rect_um(1, 0, 2.0, 0.0, 2.3, 0.3);
    layout.add_rect_um(1, 0, 2.48, 0.0, 2.78, 0.3);

    let plain = run(&load(&[]), &layout);
    assert!(violations_for(&plain, "DIFF.S.1").is_empty());
    assert!(violations_for(&plain, "DIFF.S.CUSTOM").is_empty());

    let custom = run(&load(&["CUSTOM_RULES"]), &layout);
    assert!(violations_for(&custom, "DIFF.S.1").is_empty());
    let hits = violations_for(&custom, "DIFF.S.CUSTOM");
    assert_eq!(hits.len(), 1);
    assert!((hits[0].measured_value.unwrap() - 0.18).abs() < 1e-9);
}

#[test]
fn test_enclosure_margin() {
    init();
    let mut layout = Layout::new("encl", Units::default());
    layout.add_rect_um(1, 0, 0.0, 0.0, 0.5, 0.2); // DIFF
    layout.add_rect_um(6, 0, 0.02, 0.07, 0.08, 0.13); // contact 0.02 off the edge
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "CONT.EN.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::Enclosure);
    assert!((hits[0].measured_value.unwrap() - 0.02).abs() < 1e-9);
}

#[test]
fn test_poly_endcap_extension() {
    init();
    let mut layout = Layout::new("endcap", Units::default());
    layout.add_rect_um(1, 0, 0.0, 0.0, 0.5, 0.2); // DIFF
    layout.add_rect_um(5, 0, 0.2, -0.05, 0.3, 0.4); // short bottom endcap
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "POLY.EX.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::Extension);
    assert!((hits[0].measured_value.unwrap() - 0.05).abs() < 1e-9);
}

#[test]
fn test_well_overlap_flags_layer_geometry() {
    init();
    let mut layout = Layout::new("wells", Units::default());
    layout.add_rect_um(2, 0, 0.0, 0.0, 2.0, 2.0); // NWELL
    layout.add_rect_um(3, 0, 1.0, 0.0, 3.0, 2.0); // PWELL
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "WELL.S.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::ForbiddenGeometry);
    assert_eq!(hits[0].bbox, silica_core::IRect::new(1000, 0, 2000, 2000));
}

#[test]
fn test_density_windows() {
    init();
    let graph = load(&[]);

    // One 100um x 100um window; the DIFF plate pins the extent and the
    // metal1 stripe sets the coverage fraction.
    let cell = |metal_frac: f64| {
        let mut layout = Layout::new("density", Units::default());
        layout.add_rect_um(1, 0, 0.0, 0.0, 100.0, 100.0); // DIFF
        if metal_frac > 0.0 {
            layout.add_rect_um(10, 0, 0.0, 0.0, 100.0 * metal_frac, 100.0);
        }
        layout
    };

    let report = run(&graph, &cell(0.15));
    let hits = violations_for(&report, "METAL1.D.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::Density);
    assert!((hits[0].measured_value.unwrap() - 0.15).abs() < 1e-9);
    assert!(violations_for(&report, "METAL1.D.2").is_empty());
    assert_eq!(report.violations.len(), 1);

    let report = run(&graph, &cell(0.85));
    assert!(violations_for(&report, "METAL1.D.1").is_empty());
    let hits = violations_for(&report, "METAL1.D.2");
    assert_eq!(hits.len(), 1);
    assert!((hits[0].measured_value.unwrap() - 0.85).abs() < 1e-9);

    let report = run(&graph, &cell(0.50));
    assert!(violations_for(&report, "METAL1.D.1").is_empty());
    assert!(violations_for(&report, "METAL1.D.2").is_empty());
}

#[test]
fn test_antenna_ratio() {
    init();
    let mut layout = Layout::new("antenna", Units::default());
    layout.add_rect_um(1, 0, 1.0, 1.0, 1.4, 1.4); // gate diffusion
    layout.add_rect_um(5, 0, 0.0, 0.0, 10.0, 10.0); // huge poly plate
    let report = run(&load(&[]), &layout);
    let hits = violations_for(&report, "ANT.1");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, ViolationKind::Antenna);
    // 100um^2 of poly over a 0.16um^2 gate.
    assert!((hits[0].measured_value.unwrap() - 625.0).abs() < 1e-6);
}

#[test]
fn test_wide_metal_spacing() {
    init();
    let mut layout = base_cell();
    // A 1.5um-wide metal2 plate with a narrow line 0.15um away: legal for
    // METAL2.S.1 (0.10) but inside the wide-metal 0.20 window.
    layout.add_rect_um(11, 0, 2.0, 0.0, 3.5, 1.5);
    layout.add_rect_um(11, 0, 3.65, 0.0, 3.8, 1.5);
    let report = run(&load(&[]), &layout);
    assert!(violations_for(&report, "METAL2.S.1").is_empty());
    let hits = violations_for(&report, "METAL2.S.2");
    assert_eq!(hits.len(), 1);
    assert!((hits[0].measured_value.unwrap() - 0.15).abs() < 1e-9);
}

#[test]
fn test_malformed_layer_becomes_diagnostic() {
    init();
    let mut layout = base_cell();
    // Diagonal edge on DIFF: every check touching DIFF is skipped with a
    // diagnostic, the rest of the run continues.
    layout.shapes.push(silica_drc::SourcePolygon {
        gds_layer: 1,
        gds_datatype: 0,
        points: vec![
            silica_core::Point::new(3000, 0),
            silica_core::Point::new(3500, 500),
            silica_core::Point::new(3000, 500),
        ],
    });
    // And a metal1 width violation that must still be reported.
    layout.add_rect_um(10, 0, 2.0, 0.0, 2.05, 0.5);

    let report = run(&load(&[]), &layout);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.rule_code == "DIFF.W.1"));
    assert!(violations_for(&report, "DIFF.W.1").is_empty());
    assert_eq!(violations_for(&report, "METAL1.W.1").len(), 1);
}

#[test]
fn test_cancelled_run_aborts() {
    init();
    let token = CancelToken::new();
    token.cancel();
    let result = run_drc(&load(&[]), &base_cell(), &token);
    assert!(matches!(result, Err(DrcError::Cancelled)));
}

#[test]
fn test_runs_are_deterministic() {
    init();
    let graph = load(&["CUSTOM_RULES"]);
    let mut layout = base_cell();
    layout.add_rect_um(1, 0, 2.0, 0.0, 2.08, 0.8);
    layout.add_rect_um(6, 0, 2.5, 0.0, 2.56, 0.06);
    layout.add_rect_um(6, 0, 2.61, 0.0, 2.67, 0.06);

    let first = run(&graph, &layout);
    let second = run(&graph, &layout);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.violations, second.violations);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.dropped_slivers, second.dropped_slivers);
}

#[test]
fn test_tighter_threshold_superset() {
    init();
    // Loosening a width threshold can only add violations.
    let deck = |limit: &str| {
        format!(
            "M1 = layer(10, 0);\n\
             w = width(M1) < {limit};\n\
             drc_deck(w, \"M1.W\", \"min width\");\n"
        )
    };
    let tight = load_deck("t", &deck("0.09"), &MemResolver::default(), &HashSet::new()).unwrap();
    let loose = load_deck("l", &deck("0.15"), &MemResolver::default(), &HashSet::new()).unwrap();

    let mut layout = Layout::new("wires", Units::default());
    layout.add_rect_um(10, 0, 0.0, 0.0, 0.08, 1.0);
    layout.add_rect_um(10, 0, 1.0, 0.0, 1.12, 1.0);
    layout.add_rect_um(10, 0, 2.0, 0.0, 2.2, 1.0);

    let tight_report = run(&tight, &layout);
    let loose_report = run(&loose, &layout);
    assert_eq!(tight_report.violations.len(), 1);
    assert_eq!(loose_report.violations.len(), 2);
    for v in &tight_report.violations {
        assert!(loose_report.violations.iter().any(|w| w.bbox == v.bbox));
    }
}

#[test]
fn test_off_grid_threshold_rejected() {
    init();
    let deck = "M1 = layer(10, 0);\n\
                w = width(M1) < 0.0901234567;\n\
                drc_deck(w, \"M1.W\", \"min width\");\n";
    let graph = load_deck("t", deck, &MemResolver::default(), &HashSet::new()).unwrap();
    let result = run_drc(&graph, &base_cell(), &CancelToken::new());
    assert!(matches!(
        result,
        Err(DrcError::ThresholdUnitMismatch { ref check, .. }) if check == "w"
    ));
}

#[test]
fn test_sliver_policy() {
    init();
    let graph = load(&[]);
    let mut layout = base_cell();
    // DIFF rectangle with a zero-width spike: the spike normalizes away
    // and is accounted as a dropped sliver.
    layout.shapes.push(silica_drc::SourcePolygon {
        gds_layer: 1,
        gds_datatype: 0,
        points: vec![
            silica_core::Point::new(3000, 0),
            silica_core::Point::new(3500, 0),
            silica_core::Point::new(3500, 200),
            silica_core::Point::new(3250, 200),
            silica_core::Point::new(3250, 500),
            silica_core::Point::new(3250, 200),
            silica_core::Point::new(3000, 200),
        ],
    });

    let report = run(&graph, &layout);
    assert_eq!(report.dropped_slivers, 1);
    assert!(report.diagnostics.is_empty());

    let strict = silica_drc::Evaluator::new(&graph, &layout)
        .unwrap()
        .with_sliver_policy(silica_drc::SliverPolicy::Diagnose)
        .run(&CancelToken::new())
        .unwrap();
    assert_eq!(strict.dropped_slivers, 1);
    assert!(strict
        .diagnostics
        .iter()
        .any(|d| d.rule_code == "GEOM.SLIVER"));
}

#[test]
fn test_report_json_round_trip() {
    init();
    let mut layout = base_cell();
    layout.add_rect_um(1, 0, 2.0, 0.0, 2.08, 0.8);
    let report = run(&load(&[]), &layout);
    let back = DrcReport::from_json(&report.to_json().unwrap()).unwrap();
    assert_eq!(back.run_id, report.run_id);
    assert_eq!(back.violations, report.violations);
}
