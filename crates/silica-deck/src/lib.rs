//! # Silica Deck
//!
//! Rule-deck front end: preprocessing (`#include`, `#ifdef`), tokenizing,
//! parsing, and rule-graph construction. This crate knows nothing about
//! geometry; it produces a [`RuleGraph`] for the evaluation engine to run.

pub mod ast;
pub mod error;
pub mod graph;
pub mod parser;
pub mod preprocess;
pub mod token;

use std::collections::HashSet;
use std::path::Path;

pub use ast::{
    AntennaMetric, BboxAxis, BboxPred, BoolOp, CheckOp, Comparator, LayerExpr, PredCmp, Statement,
    StatementKind,
};
pub use error::DeckError;
pub use graph::{BindingTarget, CheckDef, LayerDef, LayerKind, RuleBinding, RuleGraph};
pub use preprocess::{FsResolver, IncludeResolver, MemResolver, SourceLine, SourceLoc};

/// Load a deck from source text, resolving includes through `resolver`.
pub fn load_deck(
    file: &str,
    text: &str,
    resolver: &dyn IncludeResolver,
    defines: &HashSet<String>,
) -> Result<RuleGraph, DeckError> {
    let lines = preprocess::preprocess(file, text, resolver, defines)?;
    let tokens = token::tokenize(&lines)?;
    let statements = parser::parse(&tokens)?;
    RuleGraph::build(statements)
}

/// Load a deck from disk; includes resolve relative to the deck's directory.
pub fn load_deck_file(path: &Path, defines: &HashSet<String>) -> Result<RuleGraph, DeckError> {
    let text = std::fs::read_to_string(path).map_err(|source| DeckError::Include {
        loc: SourceLoc::new("<load>", 0),
        path: path.display().to_string(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_deck(&name, &text, &FsResolver::new(base), defines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_deck_end_to_end() {
        let resolver = MemResolver::default().with(
            "extra.drc",
            "EXTRA_w = width(DIFF) < 0.2;\n\
             drc_deck(EXTRA_w, \"DIFF.W.X\", \"extra width\");\n",
        );
        let text = "DIFF = layer(1, 0);\n\
                    #ifdef EXTRA\n\
                    #include \"extra.drc\"\n\
                    #endif\n\
                    DIFF_w = width(DIFF) < 0.1;\n\
                    drc_deck(DIFF_w, \"DIFF.W.1\", \"min width\");\n";

        let plain = load_deck("main", text, &resolver, &HashSet::new()).unwrap();
        assert_eq!(plain.bindings.len(), 1);

        let defines: HashSet<String> = ["EXTRA".to_string()].into();
        let gated = load_deck("main", text, &resolver, &defines).unwrap();
        assert_eq!(gated.bindings.len(), 2);
        assert_eq!(gated.bindings[0].code, "DIFF.W.X");
        assert_eq!(gated.bindings[1].code, "DIFF.W.1");
    }
}
