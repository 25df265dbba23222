//! Expression parsing using Pratt precedence.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{get_precedence, Precedence};

impl<'a> Parser<'a> {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.current.kind);
            if precedence < min_precedence {
                break;
            }
            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        self.advance()?;

        match &self.previous.kind {
            TokenKind::NumberLiteral(n) => Ok(Expr::new(ExprKind::NumberLiteral(*n), start_span)),
            TokenKind::StringLiteral(s) => {
                Ok(Expr::new(ExprKind::StringLiteral(s.clone()), start_span))
            }
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(*b), start_span)),
            TokenKind::Null => Ok(Expr::new(ExprKind::Null, start_span)),
            TokenKind::This => Ok(Expr::new(ExprKind::This, start_span)),

            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Variable(name.clone()), start_span))
            }

            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "')' after expression")?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(ExprKind::Grouping(Box::new(expr)), span))
            }

            TokenKind::LeftBracket => self.parse_array_literal(start_span),

            TokenKind::Minus => {
                let operand = self.parse_precedence(Precedence::Unary)?;
                let span = start_span.merge(&operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        operator: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }

            TokenKind::Bang => {
                let operand = self.parse_precedence(Precedence::Unary)?;
                let span = start_span.merge(&operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        operator: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }

            kind => Err(ParserError::unexpected_token(
                "expression",
                format!("{}", kind),
                start_span,
            )),
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let operator_span = self.current_span();
        self.advance()?;
        let operator = self.previous.kind.clone();

        match operator {
            TokenKind::Equal => self.parse_assignment(left, operator_span),
            TokenKind::PlusEqual => self.parse_compound_assignment(left, operator_span),

            TokenKind::LeftParen => self.parse_call(left),
            TokenKind::Dot => self.parse_property(left),
            TokenKind::LeftBracket => self.parse_index(left),

            _ => {
                let op = match operator {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Subtract,
                    TokenKind::Star => BinaryOp::Multiply,
                    TokenKind::Slash => BinaryOp::Divide,
                    TokenKind::EqualEqual => BinaryOp::Equal,
                    TokenKind::BangEqual => BinaryOp::NotEqual,
                    TokenKind::Less => BinaryOp::Less,
                    TokenKind::LessEqual => BinaryOp::LessEqual,
                    TokenKind::Greater => BinaryOp::Greater,
                    TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                    kind => {
                        return Err(ParserError::unexpected_token(
                            "operator",
                            format!("{}", kind),
                            operator_span,
                        ));
                    }
                };
                let right = self.parse_precedence(precedence.next())?;
                let span = left.span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(left),
                        operator: op,
                        right: Box::new(right),
                    },
                    span,
                ))
            }
        }
    }

    /// `target = value`, right-associative. Valid targets are identifiers
    /// (variable assignment) and property accesses (property store).
    fn parse_assignment(&mut self, target: Expr, operator_span: Span) -> ParseResult<Expr> {
        let value = self.parse_precedence(Precedence::Assignment)?;
        let span = target.span.merge(&value.span);

        match target.kind {
            ExprKind::Variable(name) => Ok(Expr::new(
                ExprKind::Assign {
                    name,
                    value: Box::new(value),
                },
                span,
            )),
            ExprKind::GetProperty { object, name } => Ok(Expr::new(
                ExprKind::SetProperty {
                    object,
                    name,
                    value: Box::new(value),
                },
                span,
            )),
            _ => Err(ParserError::invalid_assignment_target(operator_span)),
        }
    }

    /// `x += e` desugars to `x = x + e` by duplicating the identifier.
    fn parse_compound_assignment(&mut self, target: Expr, operator_span: Span) -> ParseResult<Expr> {
        let value = self.parse_precedence(Precedence::Assignment)?;
        let span = target.span.merge(&value.span);

        let ExprKind::Variable(name) = target.kind else {
            return Err(ParserError::invalid_assignment_target(operator_span));
        };
        let sum = Expr::new(
            ExprKind::Binary {
                left: Box::new(Expr::new(ExprKind::Variable(name.clone()), target.span)),
                operator: BinaryOp::Add,
                right: Box::new(value),
            },
            span,
        );
        Ok(Expr::new(
            ExprKind::Assign {
                name,
                value: Box::new(sum),
            },
            span,
        ))
    }

    fn parse_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let arguments = self.parse_argument_list()?;
        let span = callee.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    /// `obj.name` or, when an argument list follows, the fused `obj.name(args)`.
    fn parse_property(&mut self, object: Expr) -> ParseResult<Expr> {
        let name = self.expect_identifier("property name after '.'")?;

        if self.match_token(&TokenKind::LeftParen)? {
            let arguments = self.parse_argument_list()?;
            let span = object.span.merge(&self.previous_span());
            return Ok(Expr::new(
                ExprKind::Invoke {
                    object: Box::new(object),
                    name,
                    arguments,
                },
                span,
            ));
        }

        let span = object.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::GetProperty {
                object: Box::new(object),
                name,
            },
            span,
        ))
    }

    fn parse_index(&mut self, object: Expr) -> ParseResult<Expr> {
        let index = self.expression()?;
        self.expect(&TokenKind::RightBracket, "']' after index")?;
        let span = object.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn parse_array_literal(&mut self, start_span: Span) -> ParseResult<Expr> {
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket, "']' after array elements")?;
        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    /// Parse a comma-separated argument list; the opening `(` has already
    /// been consumed.
    pub(crate) fn parse_argument_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')' after arguments")?;
        Ok(arguments)
    }
}
