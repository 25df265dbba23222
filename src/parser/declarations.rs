//! Declaration parsing: classes, functions and `let` bindings.

use crate::ast::{ClassDecl, FunctionDecl, MethodDecl, Stmt, StmtKind};
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::Class) {
            self.class_declaration()
        } else if self.check(&TokenKind::Function) {
            self.function_declaration()
        } else if self.check(&TokenKind::Let) {
            self.let_declaration()
        } else {
            self.statement()
        }
    }

    fn let_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `let`
        let name = self.expect_identifier("variable name")?;

        let initializer = if self.match_token(&TokenKind::Equal)? {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, "';' after variable declaration")?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Let { name, initializer }, span))
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `function`
        let name = self.expect_identifier("function name")?;
        self.expect(&TokenKind::LeftParen, "'(' after function name")?;
        let params = self.parse_parameter_list()?;
        let body = self.function_body()?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                body,
                span,
            }),
            span,
        ))
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.advance()?; // consume `class`
        let name = self.expect_identifier("class name")?;
        self.expect(&TokenKind::LeftBrace, "'{' before class body")?;

        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.method_declaration()?);
        }
        self.expect(&TokenKind::RightBrace, "'}' after class body")?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Class(ClassDecl {
                name,
                methods,
                span,
            }),
            span,
        ))
    }

    fn method_declaration(&mut self) -> ParseResult<MethodDecl> {
        let start_span = self.current_span();
        let (name, is_constructor) = if self.match_token(&TokenKind::Constructor)? {
            ("constructor".to_string(), true)
        } else {
            (self.expect_identifier("method name")?, false)
        };
        self.expect(&TokenKind::LeftParen, "'(' after method name")?;
        let params = self.parse_parameter_list()?;
        let body = self.function_body()?;

        let span = start_span.merge(&self.previous_span());
        Ok(MethodDecl {
            name,
            params,
            body,
            is_constructor,
            span,
        })
    }

    /// Parameter names up to the closing `)`; the opening `(` has already
    /// been consumed.
    fn parse_parameter_list(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= u8::MAX as usize {
                    return Err(ParserError::general(
                        "Too many parameters",
                        self.current_span(),
                    ));
                }
                params.push(self.expect_identifier("parameter name")?);
                if !self.match_token(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')' after parameters")?;
        Ok(params)
    }

    fn function_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let block = self.block_statement()?;
        match block.kind {
            StmtKind::Block(statements) => Ok(statements),
            _ => unreachable!("block_statement always yields a block"),
        }
    }
}
