use silica_core::GeomError;
use silica_deck::DeckError;
use thiserror::Error;

/// Run-level errors. Per-check geometry failures are downgraded to
/// diagnostics inside the report; only these abort the whole run.
#[derive(Error, Debug)]
pub enum DrcError {
    #[error("deck error: {0}")]
    Deck(#[from] DeckError),

    #[error("layer '{layer}' has invalid geometry: {source}")]
    InvalidLayer {
        layer: String,
        #[source]
        source: GeomError,
    },

    #[error(
        "check '{check}': threshold {value} um is off the {dbu_per_um} dbu/um database grid"
    )]
    ThresholdUnitMismatch {
        check: String,
        value: f64,
        dbu_per_um: f64,
    },

    #[error("run cancelled")]
    Cancelled,
}
