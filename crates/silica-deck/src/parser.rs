//! Recursive-descent parser for the preprocessed rule language.
//!
//! Statement forms:
//!   `NAME = layer(gdsLayer, gdsDatatype);`
//!   `NAME = <boolean/sizing expression>;`
//!   `NAME = op(args) CMP threshold;`
//!   `drc_deck(name, "RULE.CODE", "message");`

use crate::ast::{
    AntennaMetric, BboxAxis, BboxPred, BoolOp, CheckOp, Comparator, LayerExpr, PredCmp, Statement,
    StatementKind,
};
use crate::error::DeckError;
use crate::preprocess::SourceLoc;
use crate::token::{Tok, Token};

const CHECK_OPS: &[&str] = &[
    "width",
    "length",
    "area",
    "external_distance",
    "external_enclosure",
    "external_extension",
    "density",
    "antenna_ratio",
];

/// Parse a token stream into deck statements, in source order.
pub fn parse(tokens: &[Token]) -> Result<Vec<Statement>, DeckError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !parser.at_end() {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn loc(&self) -> SourceLoc {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.loc.clone())
            .unwrap_or_else(|| SourceLoc::new("<empty deck>", 0))
    }

    fn err<T>(&self, message: impl Into<String>) -> Result<T, DeckError> {
        Err(DeckError::Parse {
            loc: self.loc(),
            message: message.into(),
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Tok::Ident(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn peek2(&self) -> Option<&Tok> {
        self.tokens.get(self.pos + 1).map(|t| &t.tok)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Tok, what: &str) -> Result<(), DeckError> {
        match self.peek() {
            Some(tok) if tok == expected => {
                self.bump();
                Ok(())
            }
            Some(tok) => self.err(format!("expected {what}, found {tok:?}")),
            None => self.err(format!("expected {what}, found end of deck")),
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, DeckError> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => self.err(format!("expected {what}")),
        }
    }

    fn number(&mut self, what: &str) -> Result<f64, DeckError> {
        match self.peek() {
            Some(Tok::Number(value)) => {
                let value = *value;
                self.bump();
                Ok(value)
            }
            _ => self.err(format!("expected {what}")),
        }
    }

    fn string(&mut self, what: &str) -> Result<String, DeckError> {
        match self.peek() {
            Some(Tok::Str(text)) => {
                let text = text.clone();
                self.bump();
                Ok(text)
            }
            _ => self.err(format!("expected {what}")),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Statement, DeckError> {
        let loc = self.loc();
        let name = self.ident("a statement")?;

        if name == "drc_deck" {
            self.expect(&Tok::LParen, "'('")?;
            let target = self.ident("a check or layer name")?;
            self.expect(&Tok::Comma, "','")?;
            let code = self.string("a rule code string")?;
            self.expect(&Tok::Comma, "','")?;
            let message = self.string("a rule message string")?;
            self.expect(&Tok::RParen, "')'")?;
            self.expect(&Tok::Semi, "';'")?;
            return Ok(Statement {
                kind: StatementKind::RuleBinding {
                    target,
                    code,
                    message,
                },
                loc,
            });
        }

        self.expect(&Tok::Assign, "'='")?;

        let head = self.peek_ident().map(str::to_string);
        let head_call = matches!(self.peek2(), Some(Tok::LParen));
        let kind = match head.as_deref() {
            Some("layer") if head_call => {
                self.bump();
                self.expect(&Tok::LParen, "'('")?;
                let gds_layer = self.gds_number()?;
                self.expect(&Tok::Comma, "','")?;
                let gds_datatype = self.gds_number()?;
                self.expect(&Tok::RParen, "')'")?;
                self.expect(&Tok::Semi, "';'")?;
                StatementKind::PrimaryLayer {
                    name,
                    gds_layer,
                    gds_datatype,
                }
            }
            Some(op) if head_call && CHECK_OPS.contains(&op) => {
                let op = self.check_op()?;
                let cmp = self.comparator()?;
                let threshold = self.number("a threshold value")?;
                self.expect(&Tok::Semi, "';'")?;
                StatementKind::Check {
                    name,
                    op,
                    cmp,
                    threshold,
                }
            }
            _ => {
                let expr = self.layer_expr()?;
                self.expect(&Tok::Semi, "';'")?;
                StatementKind::DerivedLayer { name, expr }
            }
        };
        Ok(Statement { kind, loc })
    }

    fn gds_number(&mut self) -> Result<u16, DeckError> {
        let value = self.number("a GDS layer/datatype number")?;
        if value.fract() != 0.0 || !(0.0..=65535.0).contains(&value) {
            return self.err(format!("'{value}' is not a valid GDS layer/datatype number"));
        }
        Ok(value as u16)
    }

    fn comparator(&mut self) -> Result<Comparator, DeckError> {
        match self.peek() {
            Some(Tok::Lt) => {
                self.bump();
                Ok(Comparator::Lt)
            }
            Some(Tok::Gt) => {
                self.bump();
                Ok(Comparator::Gt)
            }
            Some(Tok::EqEq) => {
                self.bump();
                Ok(Comparator::Eq)
            }
            Some(Tok::Ne) => {
                self.bump();
                Ok(Comparator::Ne)
            }
            Some(Tok::Le) | Some(Tok::Ge) => {
                self.err("checks use the strict comparators <, >, ==, !=")
            }
            _ => self.err("expected a comparator"),
        }
    }

    fn check_op(&mut self) -> Result<CheckOp, DeckError> {
        let op_name = self.ident("an operator")?;
        self.expect(&Tok::LParen, "'('")?;
        let op = match op_name.as_str() {
            "width" => CheckOp::Width(self.layer_expr()?),
            "length" => CheckOp::Length(self.layer_expr()?),
            "area" => CheckOp::Area(self.layer_expr()?),
            "external_distance" => {
                let a = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let b = self.layer_expr()?;
                CheckOp::ExternalDistance(a, b)
            }
            "external_enclosure" => {
                let outer = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let inner = self.layer_expr()?;
                CheckOp::ExternalEnclosure { outer, inner }
            }
            "external_extension" => {
                let conductor = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let gate = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let reference = self.layer_expr()?;
                CheckOp::ExternalExtension {
                    conductor,
                    gate,
                    reference,
                }
            }
            "density" => {
                let layer = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let win_w_um = self.number("a window width")?;
                self.expect(&Tok::Comma, "','")?;
                let win_h_um = self.number("a window height")?;
                CheckOp::Density {
                    layer,
                    win_w_um,
                    win_h_um,
                }
            }
            "antenna_ratio" => {
                let layer = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let reference = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let metric = match self.string("a metric string")?.as_str() {
                    "area" => AntennaMetric::Area,
                    "perimeter" => AntennaMetric::Perimeter,
                    other => {
                        return self
                            .err(format!("unknown antenna metric '{other}' (area, perimeter)"))
                    }
                };
                CheckOp::AntennaRatio {
                    layer,
                    reference,
                    metric,
                }
            }
            other => return self.err(format!("unknown operator '{other}'")),
        };
        self.expect(&Tok::RParen, "')'")?;
        Ok(op)
    }

    // ── Layer expressions ────────────────────────────────────────────

    fn layer_expr(&mut self) -> Result<LayerExpr, DeckError> {
        let mut lhs = self.layer_primary()?;
        loop {
            let op = match self.peek_ident() {
                Some("and") => BoolOp::And,
                Some("or") => BoolOp::Or,
                Some("not") => BoolOp::Not,
                _ => break,
            };
            self.bump();
            let rhs = self.layer_primary()?;
            lhs = LayerExpr::Bool {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn layer_primary(&mut self) -> Result<LayerExpr, DeckError> {
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.bump();
            let expr = self.layer_expr()?;
            self.expect(&Tok::RParen, "')'")?;
            return Ok(expr);
        }
        match self.peek_ident() {
            Some("sized_rectangles") => {
                self.bump();
                self.expect(&Tok::LParen, "'('")?;
                let arg = self.layer_expr()?;
                self.expect(&Tok::Comma, "','")?;
                let pred = self.bbox_pred()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(LayerExpr::SizedRectangles {
                    arg: Box::new(arg),
                    pred,
                })
            }
            Some("grow") => self.sizing_call(1.0),
            Some("shrink") => self.sizing_call(-1.0),
            Some(_) => Ok(LayerExpr::Ref(self.ident("a layer name")?)),
            None => self.err("expected a layer expression"),
        }
    }

    fn sizing_call(&mut self, sign: f64) -> Result<LayerExpr, DeckError> {
        self.bump();
        self.expect(&Tok::LParen, "'('")?;
        let arg = self.layer_expr()?;
        self.expect(&Tok::Comma, "','")?;
        let amount = self.number("a sizing amount")?;
        self.expect(&Tok::RParen, "')'")?;
        Ok(LayerExpr::Sized {
            arg: Box::new(arg),
            amount_um: sign * amount,
        })
    }

    // ── Bounding-box predicates ──────────────────────────────────────

    fn bbox_pred(&mut self) -> Result<BboxPred, DeckError> {
        let mut terms = vec![self.bbox_and()?];
        while matches!(self.peek(), Some(Tok::OrOr)) {
            self.bump();
            terms.push(self.bbox_and()?);
        }
        if terms.len() == 1 {
            Ok(terms.swap_remove(0))
        } else {
            Ok(BboxPred::Any(terms))
        }
    }

    fn bbox_and(&mut self) -> Result<BboxPred, DeckError> {
        let mut terms = vec![self.bbox_term()?];
        while matches!(self.peek(), Some(Tok::AndAnd)) {
            self.bump();
            terms.push(self.bbox_term()?);
        }
        if terms.len() == 1 {
            Ok(terms.swap_remove(0))
        } else {
            Ok(BboxPred::All(terms))
        }
    }

    fn bbox_term(&mut self) -> Result<BboxPred, DeckError> {
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.bump();
            let pred = self.bbox_pred()?;
            self.expect(&Tok::RParen, "')'")?;
            return Ok(pred);
        }
        let axis = match self.ident("'x' or 'y'")?.as_str() {
            "x" => BboxAxis::X,
            "y" => BboxAxis::Y,
            other => return self.err(format!("expected 'x' or 'y', found '{other}'")),
        };
        let cmp = match self.peek() {
            Some(Tok::Lt) => PredCmp::Lt,
            Some(Tok::Gt) => PredCmp::Gt,
            Some(Tok::Le) => PredCmp::Le,
            Some(Tok::Ge) => PredCmp::Ge,
            _ => return self.err("expected a comparator in a bbox predicate"),
        };
        self.bump();
        let value_um = self.number("a dimension value")?;
        Ok(BboxPred::Cmp {
            axis,
            cmp,
            value_um,
        })
    }
}
