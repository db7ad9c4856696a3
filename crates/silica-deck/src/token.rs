use crate::error::DeckError;
use crate::preprocess::{SourceLine, SourceLoc};

/// A lexical token of the rule language.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Assign,
    Semi,
    Comma,
    LParen,
    RParen,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    OrOr,
    AndAnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub loc: SourceLoc,
}

/// Tokenize the preprocessed line stream. Comments and directives are
/// already gone; every remaining byte must belong to the grammar.
pub fn tokenize(lines: &[SourceLine]) -> Result<Vec<Token>, DeckError> {
    let mut out = Vec::new();
    for line in lines {
        tokenize_line(line, &mut out)?;
    }
    Ok(out)
}

fn tokenize_line(line: &SourceLine, out: &mut Vec<Token>) -> Result<(), DeckError> {
    let bytes = line.text.as_bytes();
    let loc = &line.loc;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' => i += 1,
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i] as char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
                {
                    i += 1;
                }
                out.push(Token {
                    tok: Tok::Ident(line.text[start..i].to_string()),
                    loc: loc.clone(),
                });
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && matches!(bytes[i] as char, '0'..='9' | '.') {
                    i += 1;
                }
                let text = &line.text[start..i];
                let value: f64 = text.parse().map_err(|_| DeckError::Parse {
                    loc: loc.clone(),
                    message: format!("malformed number '{text}'"),
                })?;
                out.push(Token {
                    tok: Tok::Number(value),
                    loc: loc.clone(),
                });
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b'"' {
                    end += 1;
                }
                if end == bytes.len() {
                    return Err(DeckError::Parse {
                        loc: loc.clone(),
                        message: "unterminated string literal".into(),
                    });
                }
                out.push(Token {
                    tok: Tok::Str(line.text[start..end].to_string()),
                    loc: loc.clone(),
                });
                i = end + 1;
            }
            _ => {
                let next = if i + 1 < bytes.len() {
                    Some(bytes[i + 1] as char)
                } else {
                    None
                };
                let (tok, width) = match (c, next) {
                    ('=', Some('=')) => (Tok::EqEq, 2),
                    ('=', _) => (Tok::Assign, 1),
                    ('!', Some('=')) => (Tok::Ne, 2),
                    ('<', Some('=')) => (Tok::Le, 2),
                    ('<', _) => (Tok::Lt, 1),
                    ('>', Some('=')) => (Tok::Ge, 2),
                    ('>', _) => (Tok::Gt, 1),
                    ('|', Some('|')) => (Tok::OrOr, 2),
                    ('&', Some('&')) => (Tok::AndAnd, 2),
                    (';', _) => (Tok::Semi, 1),
                    (',', _) => (Tok::Comma, 1),
                    ('(', _) => (Tok::LParen, 1),
                    (')', _) => (Tok::RParen, 1),
                    _ => {
                        return Err(DeckError::Parse {
                            loc: loc.clone(),
                            message: format!("unexpected character '{c}'"),
                        });
                    }
                };
                out.push(Token {
                    tok,
                    loc: loc.clone(),
                });
                i += width;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Result<Vec<Tok>, DeckError> {
        let line = SourceLine {
            text: text.to_string(),
            loc: SourceLoc::new("test", 1),
        };
        Ok(tokenize(&[line])?.into_iter().map(|t| t.tok).collect())
    }

    #[test]
    fn test_layer_statement() {
        let toks = lex("DIFF = layer(1, 0);").unwrap();
        assert_eq!(
            toks,
            vec![
                Tok::Ident("DIFF".into()),
                Tok::Assign,
                Tok::Ident("layer".into()),
                Tok::LParen,
                Tok::Number(1.0),
                Tok::Comma,
                Tok::Number(0.0),
                Tok::RParen,
                Tok::Semi,
            ]
        );
    }

    #[test]
    fn test_comparators() {
        let toks = lex("a < 0.1 b != 2 c == 3 d >= 4 || &&").unwrap();
        assert!(toks.contains(&Tok::Lt));
        assert!(toks.contains(&Tok::Ne));
        assert!(toks.contains(&Tok::EqEq));
        assert!(toks.contains(&Tok::Ge));
        assert!(toks.contains(&Tok::OrOr));
        assert!(toks.contains(&Tok::AndAnd));
    }

    #[test]
    fn test_string_literal() {
        let toks = lex("drc_deck(w, \"DIFF.W.1\", \"min width\");").unwrap();
        assert!(toks.contains(&Tok::Str("DIFF.W.1".into())));
        assert!(toks.contains(&Tok::Str("min width".into())));
    }

    #[test]
    fn test_bad_character() {
        assert!(lex("a = b @ c;").is_err());
    }

    #[test]
    fn test_bad_number() {
        assert!(lex("w = width(L) < 0.1.2;").is_err());
    }
}
