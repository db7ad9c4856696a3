//! # Silica DRC
//!
//! Design-rule-check evaluation engine: takes a rule graph from
//! `silica-deck` and a flat layout, derives layers on demand, runs every
//! bound check, and produces a deterministic violation report.
//!
//! ```no_run
//! use std::collections::HashSet;
//! use silica_drc::{run_drc, CancelToken, Layout};
//! use silica_core::Units;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = silica_deck::load_deck_file("rules.drc".as_ref(), &HashSet::new())?;
//! let mut layout = Layout::new("top", Units::default());
//! layout.add_rect_um(1, 0, 0.0, 0.0, 0.08, 1.0);
//! let report = run_drc(&graph, &layout, &CancelToken::new())?;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod eval;
pub mod layout;
pub mod report;
pub mod store;
pub mod violation;

pub use error::DrcError;
pub use eval::{run_drc, CancelToken, Evaluator, SliverPolicy};
pub use layout::{Layout, SourcePolygon};
pub use report::DrcReport;
pub use store::LayerStore;
pub use violation::{CheckDiagnostic, Violation, ViolationKind};
