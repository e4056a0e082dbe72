//! Recursive-descent parser over the restricted mapping-file grammar.
//!
//! The grammar permits exactly two top-level assignments (`header` and
//! `selector`), whose right-hand sides are literals, dict literals, tuples
//! of literals, or single-argument calls to a registered constructor name.
//! There is no way to express anything else — no imports, no control flow,
//! no attribute access — so "structural validation" and "parsing" are the
//! same pass: anything the grammar doesn't accept is a `FormatError`.

use super::ast::Expr;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{CrdsError, Result, SourcePos};

pub struct ParsedFile {
    pub header: Expr,
    pub selector: Expr,
}

pub fn parse_file(file: &str, source: &str) -> Result<ParsedFile> {
    let tokens = Lexer::new(file, source).tokenize()?;
    let mut p = Parser { file, tokens, idx: 0 };
    p.parse_top_level()
}

struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Token>,
    idx: usize,
}

impl<'a> Parser<'a> {
    fn parse_top_level(&mut self) -> Result<ParsedFile> {
        let mut header = None;
        let mut selector = None;

        while !self.at_eof() {
            let pos = self.peek().pos;
            let name = self.expect_ident()?;
            if name != "header" && name != "selector" {
                return Err(self.err(
                    pos,
                    format!("only 'header' and 'selector' may be assigned at top level, found '{name}'"),
                ));
            }
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            match name.as_str() {
                "header" if header.is_none() => header = Some(value),
                "selector" if selector.is_none() => selector = Some(value),
                other => {
                    return Err(self.err(pos, format!("duplicate top-level assignment to '{other}'")));
                }
            }
        }

        let header = header.ok_or_else(|| {
            self.err(SourcePos { line: 1, column: 1 }, "missing top-level 'header' assignment".to_string())
        })?;
        let selector = selector.ok_or_else(|| {
            self.err(SourcePos { line: 1, column: 1 }, "missing top-level 'selector' assignment".to_string())
        })?;
        Ok(ParsedFile { header, selector })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            TokenKind::LBrace => self.parse_dict(),
            TokenKind::LParen => self.parse_tuple(),
            TokenKind::Ident(name) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let arg = self.parse_expr()?;
                if matches!(self.peek().kind, TokenKind::Comma) {
                    return Err(self.err(
                        self.peek().pos,
                        "selector constructors accept exactly one argument".to_string(),
                    ));
                }
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Call { name, arg: Box::new(arg) })
            }
            other => Err(self.err(tok.pos, format!("unexpected token {other}"))),
        }
    }

    fn parse_dict(&mut self) -> Result<Expr> {
        self.expect(&TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RBrace) {
            let key = self.parse_expr()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr()?;
            pairs.push((key, value));
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Dict(pairs))
    }

    fn parse_tuple(&mut self) -> Result<Expr> {
        self.expect(&TokenKind::LParen)?;
        let mut items = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RParen) {
            items.push(self.parse_expr()?);
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::Tuple(items))
    }

    fn expect_ident(&mut self) -> Result<String> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err(tok.pos, format!("expected identifier, found {other}"))),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        let tok = self.peek().clone();
        if &tok.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.err(tok.pos, format!("expected {kind}, found {}", tok.kind)))
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.idx]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) {
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
    }

    fn err(&self, pos: SourcePos, message: String) -> CrdsError {
        CrdsError::FormatError { file: self.file.to_string(), pos, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_pipeline_style_file() {
        let src = "header = { 'observatory': 'hst', 'mapping': 'pipeline', 'parkey': ('INSTRUME',), 'sha1sum': 'abc' }\nselector = { 'ACS': 'hst_acs.imap' }\n";
        let parsed = parse_file("hst.pmap", src).unwrap();
        assert!(parsed.header.as_dict().is_some());
        assert!(parsed.selector.as_dict().is_some());
    }

    #[test]
    fn parses_a_match_call() {
        let src = "header = {'mapping': 'reference'}\nselector = Match({('1.0', '*'): 'file.fits'})\n";
        let parsed = parse_file("x.rmap", src).unwrap();
        assert!(matches!(parsed.selector, Expr::Call { ref name, .. } if name == "Match"));
    }

    #[test]
    fn rejects_assignment_to_unknown_name() {
        let src = "foo = 1\n";
        let err = parse_file("x.rmap", src).unwrap_err();
        assert!(matches!(err, CrdsError::FormatError { .. }));
    }

    #[test]
    fn rejects_trailing_garbage_after_tuple() {
        let src = "header = {'parkey': ('A', 'B')}\nselector = {}\n";
        assert!(parse_file("x.rmap", src).is_ok());
    }
}
