//! Statement parsing.

use crate::ast::{Stmt, StmtKind};
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::If) {
            self.if_statement()
        } else if self.check(&TokenKind::While) {
            self.while_statement()
        } else if self.check(&TokenKind::Return) {
            self.return_statement()
        } else if self.check(&TokenKind::LeftBrace) {
            self.block_statement()
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `if`
        self.expect(&TokenKind::LeftParen, "'(' after 'if'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenKind::Else)? {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `while`
        self.expect(&TokenKind::LeftParen, "'(' after 'while'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after condition")?;
        let body = Box::new(self.statement()?);

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `return`
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after return value")?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    pub(crate) fn block_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::LeftBrace, "'{'")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.expect(&TokenKind::RightBrace, "'}' after block")?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Block(statements), span))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.expect(&TokenKind::Semicolon, "';' after expression")?;
        let span = expr.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
