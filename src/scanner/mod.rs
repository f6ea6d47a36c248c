//! The Scanner (spec.md EXPANSION A). `spec.md` §1 calls the lexical
//! scanner an external collaborator, but a crate that cannot turn source
//! text into tokens cannot be exercised end-to-end, so EXPANSION A asks
//! for one grounded on the teacher's `compiler::lex` module: greedy
//! longest-token matching producing a `Spanned<Token>` stream with a
//! single-token lookahead.
//!
//! Symbolic operator runs are capped at two characters (spec.md §4.1's
//! `Category::SingleChar` / `Category::DoubleChar`), and because which
//! spelling is "the" operator depends on what has been declared so far,
//! the scanner consults the live [`OperatorTable`] while greedily
//! preferring a two-character match over two one-character tokens.

pub mod token;

use std::rc::Rc;

use crate::common::source::Source;
use crate::common::span::Span;
use crate::error::{Error, Result};
use crate::operator::{Category, OperatorTable};

pub use token::{Spanned, Token};

#[derive(Debug)]
pub struct Lexer {
    source: Rc<Source>,
    offset: usize,
    line_start: bool,
}

impl Lexer {
    pub fn new(source: Rc<Source>) -> Lexer {
        Lexer { source, offset: 0, line_start: true }
    }

    fn remaining(&self) -> &str {
        &self.source.contents[self.offset..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_char_at(&self, skip_bytes: usize) -> Option<char> {
        self.remaining()[skip_bytes..].chars().next()
    }

    fn span(&self, start: usize) -> Span {
        Span::new(&self.source, start, self.offset - start)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line_start = true;
        }
        Some(c)
    }

    /// Skips whitespace and `..`-to-end-of-line comments. Returns once a
    /// significant character (or EOF) is next.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('.') if self.peek_char_at(1) == Some('.') => {
                    while !matches!(self.peek_char(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produces the next token, consulting `ops` to disambiguate
    /// single/double-character operator runs (spec.md §4.1).
    pub fn next(&mut self, ops: &OperatorTable) -> Result<Spanned> {
        self.skip_trivia();
        let start = self.offset;
        let at_line_start = self.line_start;

        let c = match self.peek_char() {
            None => return Ok(Spanned::new(Token::Eof, self.span(start))),
            Some(c) => c,
        };

        if c == '#' && at_line_start {
            self.line_start = false;
            self.advance();
            let text_start = self.offset;
            while !matches!(self.peek_char(), None | Some('\n')) {
                self.advance();
            }
            let line = self.source.contents[text_start..self.offset].trim().to_string();
            return Ok(Spanned::new(Token::Directive(line), self.span(start)));
        }
        self.line_start = false;

        if c == '{' {
            self.advance();
            return Ok(Spanned::new(Token::OpenBrace, self.span(start)));
        }
        if c == '}' {
            self.advance();
            return Ok(Spanned::new(Token::CloseBrace, self.span(start)));
        }
        if c == '"' {
            return self.lex_string(start);
        }
        if c == '\'' {
            return self.lex_type(start);
        }
        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == '.' {
            if self.peek_char_at(1).is_some_and(|n| n.is_ascii_digit()) {
                return self.lex_number(start);
            }
            self.advance();
            return Ok(Spanned::new(Token::Dot, self.span(start)));
        }
        if is_identifier_start(c) {
            return self.lex_identifier(start);
        }
        if is_symbolic(c) {
            return self.lex_operator(start, ops);
        }

        Err(Error::lexical(format!("bad character '{}'", c), &self.span_point(start)))
    }

    fn span_point(&self, start: usize) -> Span {
        Span::point(&self.source, start)
    }

    fn lex_identifier(&mut self, start: usize) -> Result<Spanned> {
        while self.peek_char().is_some_and(is_identifier_continue) {
            self.advance();
        }
        let text = self.source.contents[start..self.offset].to_string();
        Ok(Spanned::new(Token::Identifier(text), self.span(start)))
    }

    fn lex_type(&mut self, start: usize) -> Result<Spanned> {
        self.advance(); // consume leading '
        let name_start = self.offset;
        if !self.peek_char().is_some_and(is_identifier_start) {
            return Err(Error::lexical("expected a type name after '\''", &self.span_point(start)));
        }
        while self.peek_char().is_some_and(is_identifier_continue) {
            self.advance();
        }
        let text = self.source.contents[name_start..self.offset].to_string();
        Ok(Spanned::new(Token::Type(text), self.span(start)))
    }

    fn lex_number(&mut self, start: usize) -> Result<Spanned> {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') && self.peek_char_at(1).is_some_and(|n| n.is_ascii_digit()) {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.source.contents[start..self.offset];
        let value: f64 = text
            .parse()
            .map_err(|_| Error::lexical(format!("number overflow '{}'", text), &self.span(start)))?;
        Ok(Spanned::new(Token::Number(value), self.span(start)))
    }

    fn lex_string(&mut self, start: usize) -> Result<Spanned> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(Error::lexical("unterminated string", &self.span(start))),
                Some('"') => break,
                Some('\\') => {
                    let escaped = self
                        .advance()
                        .ok_or_else(|| Error::lexical("unterminated string", &self.span(start)))?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'b' => '\u{8}',
                        'r' => '\r',
                        'f' => '\u{c}',
                        '"' => '"',
                        '\\' => '\\',
                        other => {
                            return Err(Error::lexical(
                                format!("unknown string escape '\\{}'", other),
                                &self.span(start),
                            ))
                        }
                    });
                }
                Some(c) => value.push(c),
            }
        }
        Ok(Spanned::new(Token::String(value), self.span(start)))
    }

    fn lex_operator(&mut self, start: usize, ops: &OperatorTable) -> Result<Spanned> {
        self.advance();
        let one = self.source.contents[start..self.offset].to_string();

        if let Some(second) = self.peek_char().filter(|&c| is_symbolic(c)) {
            let mut two = one.clone();
            two.push(second);
            if ops.find(Category::DoubleChar, &two).is_some() {
                self.advance();
                return Ok(Spanned::new(Token::Operator(two), self.span(start)));
            }
        }

        Ok(Spanned::new(Token::Operator(one), self.span(start)))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Symbolic characters usable in operator spellings: anything that is not
/// whitespace, alphanumeric/underscore, or one of the reserved characters
/// `{ } . ' " #` (spec.md §1, §6).
fn is_symbolic(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_alphanumeric()
        && !matches!(c, '_' | '{' | '}' | '.' | '\'' | '"' | '#')
}
