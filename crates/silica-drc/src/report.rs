//! Run results. Violations are sorted by (rule code, bounding box) so two
//! runs over the same inputs produce byte-identical reports apart from the
//! run id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::violation::{CheckDiagnostic, Violation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrcReport {
    pub run_id: Uuid,
    pub layout: String,
    pub violations: Vec<Violation>,
    /// Checks skipped because their geometry could not be evaluated.
    pub diagnostics: Vec<CheckDiagnostic>,
    /// Zero-area rectangles discarded during layer derivation.
    pub dropped_slivers: u64,
}

impl DrcReport {
    pub fn new(run_id: Uuid, layout: &str) -> Self {
        Self {
            run_id,
            layout: layout.to_string(),
            violations: Vec::new(),
            diagnostics: Vec::new(),
            dropped_slivers: 0,
        }
    }

    /// Impose the canonical ordering.
    pub fn finalize(&mut self) {
        self.violations.sort_by(|a, b| {
            (a.rule_code.as_str(), a.bbox).cmp(&(b.rule_code.as_str(), b.bbox))
        });
        self.diagnostics
            .sort_by(|a, b| a.rule_code.cmp(&b.rule_code));
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.diagnostics.is_empty()
    }

    /// Violation count per rule code, for summary output.
    pub fn counts_by_rule(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.violations {
            *counts.entry(v.rule_code.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationKind;
    use silica_core::IRect;

    #[test]
    fn test_finalize_orders_by_code_then_position() {
        let mut report = DrcReport::new(Uuid::nil(), "top");
        report.violations.push(Violation::new(
            "M1.W.1",
            "w",
            ViolationKind::MinWidth,
            vec![IRect::new(50, 0, 60, 10)],
        ));
        report.violations.push(Violation::new(
            "DIFF.W.1",
            "w",
            ViolationKind::MinWidth,
            vec![IRect::new(0, 0, 10, 10)],
        ));
        report.violations.push(Violation::new(
            "M1.W.1",
            "w",
            ViolationKind::MinWidth,
            vec![IRect::new(5, 0, 15, 10)],
        ));
        report.finalize();
        assert_eq!(report.violations[0].rule_code, "DIFF.W.1");
        assert_eq!(report.violations[1].bbox.x1, 5);
        assert_eq!(report.violations[2].bbox.x1, 50);
    }

    #[test]
    fn test_json_round_trip() {
        let mut report = DrcReport::new(Uuid::nil(), "top");
        report.violations.push(
            Violation::new(
                "DIFF.A.1",
                "min area",
                ViolationKind::MinArea,
                vec![IRect::new(0, 0, 10, 10)],
            )
            .with_values(0.0001, 0.05),
        );
        let text = report.to_json().unwrap();
        let back = DrcReport::from_json(&text).unwrap();
        assert_eq!(back.violations, report.violations);
        assert_eq!(back.layout, "top");
    }

    #[test]
    fn test_counts_by_rule() {
        let mut report = DrcReport::new(Uuid::nil(), "top");
        for _ in 0..3 {
            report.violations.push(Violation::new(
                "M1.S.1",
                "s",
                ViolationKind::MinSpacing,
                vec![IRect::new(0, 0, 1, 1)],
            ));
        }
        assert_eq!(report.counts_by_rule().get("M1.S.1"), Some(&3));
    }
}
