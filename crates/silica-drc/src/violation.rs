use serde::{Deserialize, Serialize};
use silica_core::IRect;

/// Category of a reported violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    MinWidth,
    MinLength,
    MinArea,
    ExactDimension,
    MinSpacing,
    Enclosure,
    Extension,
    Density,
    Antenna,
    /// Non-empty geometry on a layer bound directly to a rule.
    ForbiddenGeometry,
}

/// A single violation: the rule that fired, where, and by how much.
/// Geometry is dbu; measured value and threshold are deck units (um, um²,
/// or a dimensionless fraction/ratio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_code: String,
    pub message: String,
    pub kind: ViolationKind,
    /// Marker rectangle(s) pinpointing the failure.
    pub geometry: Vec<IRect>,
    /// Bounding box over the markers, used for deterministic ordering.
    pub bbox: IRect,
    pub measured_value: Option<f64>,
    pub threshold: Option<f64>,
}

/// A check that could not be evaluated. The run continues; the report
/// carries the diagnostic so sign-off can see what was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDiagnostic {
    pub rule_code: String,
    pub check: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        rule_code: &str,
        message: &str,
        kind: ViolationKind,
        geometry: Vec<IRect>,
    ) -> Self {
        let bbox = match geometry.split_first() {
            Some((first, rest)) => rest.iter().fold(*first, |acc, r| acc.union_bbox(r)),
            None => IRect::new(0, 0, 0, 0),
        };
        Self {
            rule_code: rule_code.to_string(),
            message: message.to_string(),
            kind,
            geometry,
            bbox,
            measured_value: None,
            threshold: None,
        }
    }

    pub fn with_values(mut self, measured: f64, threshold: f64) -> Self {
        self.measured_value = Some(measured);
        self.threshold = Some(threshold);
        self
    }
}
