use thiserror::Error;

use crate::preprocess::SourceLoc;

/// Errors raised while loading a rule deck. All of these are fatal to the
/// whole run: a deck that fails to build cannot be trusted for sign-off.
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("{loc}: {message}")]
    Parse { loc: SourceLoc, message: String },

    #[error("{loc}: cannot resolve #include \"{path}\"")]
    Include {
        loc: SourceLoc,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{loc}: '{name}' is not defined at this point in the deck")]
    UndefinedName { name: String, loc: SourceLoc },

    #[error("{loc}: '{name}' is already defined at {first}")]
    DuplicateDefinition {
        name: String,
        first: SourceLoc,
        loc: SourceLoc,
    },

    #[error("layer dependency cycle through '{name}'")]
    CycleDetected { name: String },

    #[error("{loc}: {op} does not support the '{cmp}' comparator")]
    UnsupportedComparator {
        op: &'static str,
        cmp: &'static str,
        loc: SourceLoc,
    },
}
