use serde::{Deserialize, Serialize};

/// Boolean combinator in a derived-layer expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// Comparator binding a measurement to its threshold. `Ne` flags both sides
/// of a nominal dimension (fixed-size contacts and vias).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Lt,
    Gt,
    Eq,
    Ne,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }

    pub fn holds<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            Comparator::Lt => lhs < rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Eq => lhs == rhs,
            Comparator::Ne => lhs != rhs,
        }
    }
}

/// A derived-layer expression over previously declared layer names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerExpr {
    Ref(String),
    Bool {
        op: BoolOp,
        lhs: Box<LayerExpr>,
        rhs: Box<LayerExpr>,
    },
    /// Shape filter on bounding-box dimensions, e.g.
    /// `sized_rectangles(METAL2, x > 1.0 || y > 1.0)`.
    SizedRectangles {
        arg: Box<LayerExpr>,
        pred: BboxPred,
    },
    /// Uniform sizing: `grow(L, d)` / `shrink(L, d)`. A negative amount
    /// shrinks; the amount is micrometers.
    Sized {
        arg: Box<LayerExpr>,
        amount_um: f64,
    },
}

impl LayerExpr {
    /// All layer names referenced by this expression, in source order.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            LayerExpr::Ref(name) => out.push(name),
            LayerExpr::Bool { lhs, rhs, .. } => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
            LayerExpr::SizedRectangles { arg, .. } => arg.collect_refs(out),
            LayerExpr::Sized { arg, .. } => arg.collect_refs(out),
        }
    }
}

/// Bounding-box predicate of `sized_rectangles`: comparisons on the bbox
/// width (`x`) and height (`y`) in micrometers, joined by `||` and `&&`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BboxPred {
    Cmp {
        axis: BboxAxis,
        cmp: PredCmp,
        value_um: f64,
    },
    Any(Vec<BboxPred>),
    All(Vec<BboxPred>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BboxAxis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredCmp {
    Lt,
    Gt,
    Le,
    Ge,
}

/// Metric of an antenna-ratio check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AntennaMetric {
    Area,
    Perimeter,
}

/// Measurement operator of a check expression. Thresholds and window sizes
/// are micrometers as written in the deck; conversion to dbu happens at
/// evaluation time against the layout's declared units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckOp {
    Width(LayerExpr),
    Length(LayerExpr),
    Area(LayerExpr),
    ExternalDistance(LayerExpr, LayerExpr),
    ExternalEnclosure {
        outer: LayerExpr,
        inner: LayerExpr,
    },
    ExternalExtension {
        conductor: LayerExpr,
        gate: LayerExpr,
        reference: LayerExpr,
    },
    Density {
        layer: LayerExpr,
        win_w_um: f64,
        win_h_um: f64,
    },
    AntennaRatio {
        layer: LayerExpr,
        reference: LayerExpr,
        metric: AntennaMetric,
    },
}

impl CheckOp {
    pub fn name(&self) -> &'static str {
        match self {
            CheckOp::Width(_) => "width",
            CheckOp::Length(_) => "length",
            CheckOp::Area(_) => "area",
            CheckOp::ExternalDistance(..) => "external_distance",
            CheckOp::ExternalEnclosure { .. } => "external_enclosure",
            CheckOp::ExternalExtension { .. } => "external_extension",
            CheckOp::Density { .. } => "density",
            CheckOp::AntennaRatio { .. } => "antenna_ratio",
        }
    }

    pub fn operands(&self) -> Vec<&LayerExpr> {
        match self {
            CheckOp::Width(l) | CheckOp::Length(l) | CheckOp::Area(l) => vec![l],
            CheckOp::ExternalDistance(a, b) => vec![a, b],
            CheckOp::ExternalEnclosure { outer, inner } => vec![outer, inner],
            CheckOp::ExternalExtension {
                conductor,
                gate,
                reference,
            } => vec![conductor, gate, reference],
            CheckOp::Density { layer, .. } => vec![layer],
            CheckOp::AntennaRatio {
                layer, reference, ..
            } => vec![layer, reference],
        }
    }

    /// Comparators that make sense for this operator. Spacing, enclosure,
    /// and extension are minimum rules with a bounded candidate search;
    /// only `<` is meaningful there.
    pub fn allowed_comparators(&self) -> &'static [Comparator] {
        match self {
            CheckOp::Width(_) | CheckOp::Length(_) | CheckOp::Area(_) => {
                &[Comparator::Lt, Comparator::Gt, Comparator::Eq, Comparator::Ne]
            }
            CheckOp::ExternalDistance(..)
            | CheckOp::ExternalEnclosure { .. }
            | CheckOp::ExternalExtension { .. } => &[Comparator::Lt],
            CheckOp::Density { .. } => &[Comparator::Lt, Comparator::Gt],
            CheckOp::AntennaRatio { .. } => &[Comparator::Gt],
        }
    }
}

/// A parsed deck statement with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub loc: crate::preprocess::SourceLoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    /// `NAME = layer(gdsLayer, gdsDatatype);`
    PrimaryLayer {
        name: String,
        gds_layer: u16,
        gds_datatype: u16,
    },
    /// `NAME = <boolean/sizing expression>;`
    DerivedLayer { name: String, expr: LayerExpr },
    /// `NAME = op(args) CMP threshold;`
    Check {
        name: String,
        op: CheckOp,
        cmp: Comparator,
        threshold: f64,
    },
    /// `drc_deck(checkName, "RULE.CODE", "message");`
    RuleBinding {
        target: String,
        code: String,
        message: String,
    },
}
