//! Tokenizer for the restricted mapping-file grammar (§4.1 of the governing
//! design): literals, dicts, tuples, and single-call constructor
//! invocations only. No identifiers resolve to variables; the only bare
//! words permitted are constructor names and boolean-like literals.

use crate::error::{CrdsError, SourcePos, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Comma,
    Eq,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{s}'"),
            TokenKind::Str(s) => write!(f, "string '{s}'"),
            TokenKind::Num(n) => write!(f, "number {n}"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

pub struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a str, source: &str) -> Self {
        Lexer { file, chars: source.chars().collect(), idx: 0, line: 1, column: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let pos = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, pos });
                break;
            };
            let kind = match c {
                '{' => { self.advance(); TokenKind::LBrace }
                '}' => { self.advance(); TokenKind::RBrace }
                '(' => { self.advance(); TokenKind::LParen }
                ')' => { self.advance(); TokenKind::RParen }
                ':' => { self.advance(); TokenKind::Colon }
                ',' => { self.advance(); TokenKind::Comma }
                '=' => { self.advance(); TokenKind::Eq }
                '\'' | '"' => self.lex_string(c, pos)?,
                c if c.is_ascii_digit() || c == '-' || c == '+' => self.lex_number(pos)?,
                c if c.is_alphabetic() || c == '_' => self.lex_ident(),
                other => {
                    return Err(self.err(pos, format!("unexpected character '{other}'")));
                }
            };
            tokens.push(Token { kind, pos });
        }
        Ok(tokens)
    }

    fn lex_string(&mut self, quote: char, pos: SourcePos) -> Result<TokenKind> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err(pos, "unterminated string literal".to_string())),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::Str(s))
    }

    fn lex_number(&mut self, pos: SourcePos) -> Result<TokenKind> {
        let start = self.idx;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }
        let mut saw_digit = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                saw_digit = saw_digit || c.is_ascii_digit();
                self.advance();
            } else {
                break;
            }
        }
        if !saw_digit {
            return Err(self.err(pos, "malformed numeric literal".to_string()));
        }
        let text: String = self.chars[start..self.idx].iter().collect();
        text.parse::<f64>().map(TokenKind::Num).map_err(|_| {
            self.err(pos, format!("malformed numeric literal '{text}'"))
        })
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.idx;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Ident(self.chars[start..self.idx].iter().collect())
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.idx += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos { line: self.line, column: self.column }
    }

    fn err(&self, pos: SourcePos, message: String) -> CrdsError {
        CrdsError::FormatError { file: self.file.to_string(), pos, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_small_header_dict() {
        let src = "{'observatory': 'hst', 'parkey': ('INSTRUME',)}";
        let tokens = Lexer::new("t.pmap", src).tokenize().unwrap();
        assert_eq!(tokens.first().unwrap().kind, TokenKind::LBrace);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Str("observatory".to_string())));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn comments_are_skipped() {
        let src = "# a comment\n{'a': 1}";
        let tokens = Lexer::new("t.pmap", src).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LBrace);
    }

    #[test]
    fn unterminated_string_is_a_format_error() {
        let err = Lexer::new("t.pmap", "{'a").tokenize().unwrap_err();
        assert!(matches!(err, CrdsError::FormatError { .. }));
    }
}
