//! Core parser struct and helper methods.
//!
//! The parser pulls tokens from the scanner on demand and keeps only the
//! `previous`/`current` pair, so the token stream is never materialized.

use crate::ast::Program;
use crate::error::ParserError;
use crate::lexer::{Scanner, Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Rill.
pub struct Parser<'a> {
    pub(crate) scanner: Scanner<'a>,
    pub(crate) current: Token,
    pub(crate) previous: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
            current: Token::eof(0, 1, 1),
            previous: Token::eof(0, 1, 1),
        }
    }

    /// Parse a complete program.
    ///
    /// The first error is recorded, the parser synchronizes to a statement
    /// boundary and keeps going; a parse that recorded any error yields no
    /// program and surfaces that first error.
    pub fn parse(&mut self) -> ParseResult<Program> {
        self.advance()?;

        let mut statements = Vec::new();
        let mut first_error: Option<ParserError> = None;

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    self.synchronize();
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(Program::new(statements)),
        }
    }

    /// Skip forward to a likely statement boundary: just past the next `;`
    /// or up to a token that can begin a declaration.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {}
            }
            if self.advance().is_err() {
                return;
            }
        }
    }

    // ===== Token manipulation =====

    pub(crate) fn advance(&mut self) -> ParseResult<()> {
        let next = self.scanner.next_token()?;
        self.previous = std::mem::replace(&mut self.current, next);
        Ok(())
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> ParseResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            self.advance()?;
            Ok(self.previous.clone())
        } else {
            Err(ParserError::unexpected_token(
                expected,
                format!("{}", self.current.kind),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self, expected: &str) -> ParseResult<String> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(ParserError::unexpected_token(
                expected,
                format!("{}", self.current.kind),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current.span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous.span
    }
}
