//! Source-level deck preprocessing: `#include` splicing, `#ifdef`/`#endif`
//! conditional blocks, and comment stripping.
//!
//! Everything here runs before tokenization; the parser and rule graph never
//! see a directive. Line provenance (file, line) is preserved through
//! splicing so later errors point at the original source.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DeckError;

/// Source position carried through preprocessing for error context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One logical line surviving preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub text: String,
    pub loc: SourceLoc,
}

/// Resolves `#include` paths to file contents.
pub trait IncludeResolver {
    fn resolve(&self, path: &str) -> io::Result<String>;
}

/// Filesystem resolver rooted at a base directory.
pub struct FsResolver {
    base: PathBuf,
}

impl FsResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl IncludeResolver for FsResolver {
    fn resolve(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.base.join(path))
    }
}

/// In-memory resolver for tests and embedded decks.
#[derive(Debug, Default)]
pub struct MemResolver {
    files: HashMap<String, String>,
}

impl MemResolver {
    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.files.insert(name.to_string(), text.to_string());
        self
    }
}

impl IncludeResolver for MemResolver {
    fn resolve(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such include"))
    }
}

const MAX_INCLUDE_DEPTH: usize = 16;

/// Expand a deck source into its preprocessed line stream.
pub fn preprocess(
    file: &str,
    text: &str,
    resolver: &dyn IncludeResolver,
    defines: &HashSet<String>,
) -> Result<Vec<SourceLine>, DeckError> {
    let mut out = Vec::new();
    expand(file, text, resolver, defines, 0, &mut out)?;
    Ok(out)
}

fn expand(
    file: &str,
    text: &str,
    resolver: &dyn IncludeResolver,
    defines: &HashSet<String>,
    depth: usize,
    out: &mut Vec<SourceLine>,
) -> Result<(), DeckError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(DeckError::Parse {
            loc: SourceLoc::new(file, 0),
            message: format!("#include nesting deeper than {MAX_INCLUDE_DEPTH} (cycle?)"),
        });
    }

    let mut if_stack: Vec<bool> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let loc = SourceLoc::new(file, idx as u32 + 1);
        let line = strip_comment(raw);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let emitting = if_stack.iter().all(|&keep| keep);
        if let Some(directive) = trimmed.split_whitespace().next().filter(|d| d.starts_with('#')) {
            match directive {
                "#ifdef" => {
                    let symbol = trimmed["#ifdef".len()..].trim();
                    if symbol.is_empty() || symbol.split_whitespace().count() != 1 {
                        return Err(DeckError::Parse {
                            loc,
                            message: "#ifdef requires exactly one symbol name".into(),
                        });
                    }
                    if_stack.push(defines.contains(symbol));
                }
                "#endif" => {
                    if if_stack.pop().is_none() {
                        return Err(DeckError::Parse {
                            loc,
                            message: "#endif without matching #ifdef".into(),
                        });
                    }
                }
                "#include" => {
                    if !emitting {
                        continue;
                    }
                    let rest = trimmed["#include".len()..].trim();
                    let path = parse_include_path(rest).ok_or_else(|| DeckError::Parse {
                        loc: loc.clone(),
                        message: format!("malformed #include argument '{rest}'"),
                    })?;
                    log::debug!("{loc}: splicing include '{path}'");
                    let included =
                        resolver
                            .resolve(&path)
                            .map_err(|source| DeckError::Include {
                                loc: loc.clone(),
                                path: path.clone(),
                                source,
                            })?;
                    expand(&path, &included, resolver, defines, depth + 1, out)?;
                }
                other => {
                    return Err(DeckError::Parse {
                        loc,
                        message: format!("unknown preprocessor directive '{other}'"),
                    });
                }
            }
            continue;
        }

        if emitting {
            out.push(SourceLine {
                text: line.to_string(),
                loc,
            });
        }
    }

    if !if_stack.is_empty() {
        return Err(DeckError::Parse {
            loc: SourceLoc::new(file, text.lines().count() as u32),
            message: "unterminated #ifdef at end of file".into(),
        });
    }
    Ok(())
}

/// `<path>` or `"path"`.
fn parse_include_path(arg: &str) -> Option<String> {
    if arg.len() >= 2 && arg.starts_with('<') && arg.ends_with('>') {
        return Some(arg[1..arg.len() - 1].to_string());
    }
    if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        return Some(arg[1..arg.len() - 1].to_string());
    }
    None
}

/// Truncate at `//`, ignoring occurrences inside string literals.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                return &line[..i];
            }
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines(symbols: &[&str]) -> HashSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_comments_and_blanks_dropped() {
        let text = "A = layer(1, 0); // diffusion\n\n// full-line comment\nB = layer(2, 0);\n";
        let lines = preprocess("deck", text, &MemResolver::default(), &defines(&[])).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text.trim(), "A = layer(1, 0);");
        assert_eq!(lines[0].loc, SourceLoc::new("deck", 1));
        assert_eq!(lines[1].loc, SourceLoc::new("deck", 4));
    }

    #[test]
    fn test_comment_inside_string_kept() {
        let text = "drc_deck(x, \"C.1\", \"see http://example\"); // trailing\n";
        let lines = preprocess("deck", text, &MemResolver::default(), &defines(&[])).unwrap();
        assert!(lines[0].text.contains("http://example"));
        assert!(!lines[0].text.contains("trailing"));
    }

    #[test]
    fn test_ifdef_gating() {
        let text = "A = layer(1, 0);\n#ifdef EXTRA\nB = layer(2, 0);\n#endif\n";
        let without = preprocess("deck", text, &MemResolver::default(), &defines(&[])).unwrap();
        assert_eq!(without.len(), 1);
        let with = preprocess("deck", text, &MemResolver::default(), &defines(&["EXTRA"])).unwrap();
        assert_eq!(with.len(), 2);
    }

    #[test]
    fn test_nested_ifdef() {
        let text = "#ifdef A\n#ifdef B\ninner;\n#endif\nouter;\n#endif\n";
        let only_a = preprocess("deck", text, &MemResolver::default(), &defines(&["A"])).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].text, "outer;");
        let both =
            preprocess("deck", text, &MemResolver::default(), &defines(&["A", "B"])).unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_unterminated_ifdef() {
        let err = preprocess("deck", "#ifdef A\nx;\n", &MemResolver::default(), &defines(&[]))
            .unwrap_err();
        assert!(matches!(err, DeckError::Parse { .. }));
    }

    #[test]
    fn test_include_splicing_preserves_provenance() {
        let resolver = MemResolver::default().with("common.drc", "B = layer(2, 0);\n");
        let text = "A = layer(1, 0);\n#include \"common.drc\"\nC = layer(3, 0);\n";
        let lines = preprocess("main", text, &resolver, &defines(&[])).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].loc, SourceLoc::new("common.drc", 1));
        assert_eq!(lines[2].loc, SourceLoc::new("main", 3));
    }

    #[test]
    fn test_missing_include() {
        let err = preprocess(
            "main",
            "#include <nope.rh>\n",
            &MemResolver::default(),
            &defines(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, DeckError::Include { .. }));
    }

    #[test]
    fn test_include_cycle_detected() {
        let resolver = MemResolver::default().with("a.drc", "#include \"a.drc\"\n");
        let err =
            preprocess("main", "#include \"a.drc\"\n", &resolver, &defines(&[])).unwrap_err();
        assert!(matches!(err, DeckError::Parse { .. }));
    }

    #[test]
    fn test_suppressed_include_not_resolved() {
        // The resolver would fail, but the block is inactive.
        let text = "#ifdef NEVER\n#include <missing.rh>\n#endif\n";
        let lines = preprocess("deck", text, &MemResolver::default(), &defines(&[])).unwrap();
        assert!(lines.is_empty());
    }
}
