//! Pratt expression parsing.

use crate::ast::{Expr, ExprKind};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::precedence::{get_precedence, Precedence};

impl Parser {
    /// Parse an expression with the given minimum binding power.
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.check(&TokenKind::Semicolon) && precedence < get_precedence(&self.peek().kind) {
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;

        match token.kind {
            TokenKind::IntLiteral(value) => Ok(Expr::new(ExprKind::IntLiteral(value), span)),
            TokenKind::StringLiteral(value) => Ok(Expr::new(ExprKind::StringLiteral(value), span)),
            TokenKind::True => Ok(Expr::new(ExprKind::BoolLiteral(true), span)),
            TokenKind::False => Ok(Expr::new(ExprKind::BoolLiteral(false), span)),
            TokenKind::Identifier(name) => Ok(Expr::new(ExprKind::Identifier(name), span)),

            TokenKind::Bang | TokenKind::Minus => {
                let operator = token.kind.to_string();
                let right = self.parse_expression(Precedence::Prefix)?;
                let span = span.to(right.span);
                Ok(Expr::new(
                    ExprKind::Prefix {
                        operator,
                        right: Box::new(right),
                    },
                    span,
                ))
            }

            TokenKind::LeftParen => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::If => self.parse_if_expression(span),
            TokenKind::Fn => self.parse_function_literal(span),

            TokenKind::LeftBracket => {
                let elements =
                    self.parse_expression_list(&TokenKind::RightBracket)?;
                let span = span.to(self.previous_span());
                Ok(Expr::new(ExprKind::Array(elements), span))
            }

            TokenKind::LeftBrace => self.parse_hash_literal(span),

            other => Err(ParserError::NoPrefixRule(other.to_string())),
        }
    }

    fn parse_infix(&mut self, left: Expr) -> ParseResult<Expr> {
        let token = self.advance();

        match token.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Less
            | TokenKind::Greater
            | TokenKind::EqualEqual
            | TokenKind::BangEqual => {
                let operator = token.kind.to_string();
                let precedence = get_precedence(&token.kind);
                let right = self.parse_expression(precedence)?;
                let span = left.span.to(right.span);
                Ok(Expr::new(
                    ExprKind::Infix {
                        left: Box::new(left),
                        operator,
                        right: Box::new(right),
                    },
                    span,
                ))
            }

            TokenKind::LeftParen => {
                let arguments = self.parse_expression_list(&TokenKind::RightParen)?;
                let span = left.span.to(self.previous_span());
                Ok(Expr::new(
                    ExprKind::Call {
                        function: Box::new(left),
                        arguments,
                    },
                    span,
                ))
            }

            TokenKind::LeftBracket => {
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(&TokenKind::RightBracket)?;
                let span = left.span.to(self.previous_span());
                Ok(Expr::new(
                    ExprKind::Index {
                        left: Box::new(left),
                        index: Box::new(index),
                    },
                    span,
                ))
            }

            other => Err(ParserError::unexpected_token(
                "an infix operator",
                other.to_string(),
            )),
        }
    }

    fn parse_if_expression(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect(&TokenKind::RightParen)?;

        self.expect(&TokenKind::LeftBrace)?;
        let consequence = self.parse_block_statement()?;

        let alternative = if self.match_token(&TokenKind::Else) {
            self.expect(&TokenKind::LeftBrace)?;
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        let span = start.to(self.previous_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence,
                alternative,
            },
            span,
        ))
    }

    fn parse_function_literal(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;

        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            parameters.push(self.expect_identifier()?);
            while self.match_token(&TokenKind::Comma) {
                parameters.push(self.expect_identifier()?);
            }
        }
        self.expect(&TokenKind::RightParen)?;

        self.expect(&TokenKind::LeftBrace)?;
        let body = self.parse_block_statement()?;

        let span = start.to(self.previous_span());
        Ok(Expr::new(
            ExprKind::Function {
                parameters,
                body,
                name: None,
            },
            span,
        ))
    }

    fn parse_hash_literal(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        let mut pairs = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start.to(self.previous_span());
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }

    /// Parse a comma-separated expression list up to and including `end`.
    fn parse_expression_list(&mut self, end: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();

        if !self.check(end) {
            items.push(self.parse_expression(Precedence::Lowest)?);
            while self.match_token(&TokenKind::Comma) {
                items.push(self.parse_expression(Precedence::Lowest)?);
            }
        }
        self.expect(end)?;

        Ok(items)
    }
}
