//! # Rule Graph
//!
//! Turns the parsed statement list into an executable rule graph: an ordered
//! table of layer definitions, an ordered table of checks, and the rule
//! bindings that give checks their sign-off identity.
//!
//! Names become visible in declaration order. A statement may only reference
//! names declared before it, so a well-formed deck can never contain a
//! dependency cycle; the builder still runs a depth-first scan afterwards as
//! a structural sanity check.

use std::collections::HashMap;

use crate::ast::{CheckOp, Comparator, LayerExpr, Statement, StatementKind};
use crate::error::DeckError;
use crate::preprocess::SourceLoc;

/// How a layer's geometry is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Read from the layout on a (layer, datatype) pair.
    Primary { gds_layer: u16, gds_datatype: u16 },
    /// Computed from previously defined layers.
    Derived(LayerExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDef {
    pub name: String,
    pub kind: LayerKind,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckDef {
    pub name: String,
    pub op: CheckOp,
    pub cmp: Comparator,
    pub threshold: f64,
    pub loc: SourceLoc,
}

/// What a `drc_deck` binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    Check(usize),
    /// Binding a bare layer reports every shape on it. Used for decks that
    /// flag a derived layer directly (e.g. a well-overlap region).
    Layer(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleBinding {
    pub code: String,
    pub message: String,
    pub target: BindingTarget,
    pub loc: SourceLoc,
}

/// The fully resolved deck: every name bound, every comparator validated.
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    pub layers: Vec<LayerDef>,
    pub checks: Vec<CheckDef>,
    pub bindings: Vec<RuleBinding>,
    layer_index: HashMap<String, usize>,
    check_index: HashMap<String, usize>,
}

impl RuleGraph {
    /// Build the graph from statements in source order.
    pub fn build(statements: Vec<Statement>) -> Result<Self, DeckError> {
        let mut graph = RuleGraph::default();
        // Layers and checks share one namespace; remember where each name
        // was first defined for duplicate diagnostics.
        let mut defined_at: HashMap<String, SourceLoc> = HashMap::new();

        for Statement { kind, loc } in statements {
            match kind {
                StatementKind::PrimaryLayer {
                    name,
                    gds_layer,
                    gds_datatype,
                } => {
                    graph.define(&mut defined_at, &name, &loc)?;
                    graph.layer_index.insert(name.clone(), graph.layers.len());
                    graph.layers.push(LayerDef {
                        name,
                        kind: LayerKind::Primary {
                            gds_layer,
                            gds_datatype,
                        },
                        loc,
                    });
                }
                StatementKind::DerivedLayer { name, expr } => {
                    graph.define(&mut defined_at, &name, &loc)?;
                    graph.resolve_refs(&expr, &loc)?;
                    graph.layer_index.insert(name.clone(), graph.layers.len());
                    graph.layers.push(LayerDef {
                        name,
                        kind: LayerKind::Derived(expr),
                        loc,
                    });
                }
                StatementKind::Check {
                    name,
                    op,
                    cmp,
                    threshold,
                } => {
                    graph.define(&mut defined_at, &name, &loc)?;
                    for operand in op.operands() {
                        graph.resolve_refs(operand, &loc)?;
                    }
                    if !op.allowed_comparators().contains(&cmp) {
                        return Err(DeckError::UnsupportedComparator {
                            op: op.name(),
                            cmp: cmp.symbol(),
                            loc,
                        });
                    }
                    graph.check_index.insert(name.clone(), graph.checks.len());
                    graph.checks.push(CheckDef {
                        name,
                        op,
                        cmp,
                        threshold,
                        loc,
                    });
                }
                StatementKind::RuleBinding {
                    target,
                    code,
                    message,
                } => {
                    let target = if let Some(&idx) = graph.check_index.get(&target) {
                        BindingTarget::Check(idx)
                    } else if let Some(&idx) = graph.layer_index.get(&target) {
                        BindingTarget::Layer(idx)
                    } else {
                        return Err(DeckError::UndefinedName { name: target, loc });
                    };
                    graph.bindings.push(RuleBinding {
                        code,
                        message,
                        target,
                        loc,
                    });
                }
            }
        }

        graph.assert_acyclic()?;
        log::info!(
            "rule graph built: {} layers, {} checks, {} bindings",
            graph.layers.len(),
            graph.checks.len(),
            graph.bindings.len()
        );
        Ok(graph)
    }

    pub fn layer(&self, name: &str) -> Option<(usize, &LayerDef)> {
        self.layer_index.get(name).map(|&i| (i, &self.layers[i]))
    }

    pub fn check(&self, name: &str) -> Option<(usize, &CheckDef)> {
        self.check_index.get(name).map(|&i| (i, &self.checks[i]))
    }

    /// Layer indices an expression depends on.
    pub fn expr_deps(&self, expr: &LayerExpr) -> Vec<usize> {
        let mut names = Vec::new();
        expr.collect_refs(&mut names);
        names
            .iter()
            .filter_map(|name| self.layer_index.get(*name).copied())
            .collect()
    }

    fn define(
        &self,
        defined_at: &mut HashMap<String, SourceLoc>,
        name: &str,
        loc: &SourceLoc,
    ) -> Result<(), DeckError> {
        if let Some(first) = defined_at.get(name) {
            return Err(DeckError::DuplicateDefinition {
                name: name.to_string(),
                first: first.clone(),
                loc: loc.clone(),
            });
        }
        defined_at.insert(name.to_string(), loc.clone());
        Ok(())
    }

    /// Every name an expression references must already be a layer.
    fn resolve_refs(&self, expr: &LayerExpr, loc: &SourceLoc) -> Result<(), DeckError> {
        let mut names = Vec::new();
        expr.collect_refs(&mut names);
        for name in names {
            if !self.layer_index.contains_key(name) {
                return Err(DeckError::UndefinedName {
                    name: name.to_string(),
                    loc: loc.clone(),
                });
            }
        }
        Ok(())
    }

    /// Declaration-order visibility already rules cycles out; verify the
    /// invariant anyway so a future builder change cannot silently break it.
    fn assert_acyclic(&self) -> Result<(), DeckError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }
        let mut marks = vec![Mark::White; self.layers.len()];
        for start in 0..self.layers.len() {
            if marks[start] != Mark::White {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Grey;
            while let Some(&mut (node, ref mut edge)) = stack.last_mut() {
                let deps = match &self.layers[node].kind {
                    LayerKind::Primary { .. } => Vec::new(),
                    LayerKind::Derived(expr) => self.expr_deps(expr),
                };
                if *edge >= deps.len() {
                    marks[node] = Mark::Black;
                    stack.pop();
                    continue;
                }
                let next = deps[*edge];
                *edge += 1;
                match marks[next] {
                    Mark::Grey => {
                        return Err(DeckError::CycleDetected {
                            name: self.layers[next].name.clone(),
                        })
                    }
                    Mark::White => {
                        marks[next] = Mark::Grey;
                        stack.push((next, 0));
                    }
                    Mark::Black => {}
                }
            }
        }
        Ok(())
    }
}
