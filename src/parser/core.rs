//! Core parser struct, token cursor, and statement parsing.

use crate::ast::{BlockStatement, ExprKind, Program, Stmt, StmtKind};
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::parser::precedence::Precedence;
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Tamarin.
///
/// Statement-level errors are collected rather than aborting the parse, so
/// callers (notably the REPL) can report every problem in the input.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) current: usize,
    pub(crate) errors: Vec<ParserError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse a complete program. Returns the accumulated errors if any
    /// statement failed to parse.
    pub fn parse(mut self) -> Result<Program, Vec<ParserError>> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program::new(statements))
        } else {
            Err(self.errors)
        }
    }

    // ===== Statements =====

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // let

        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Assign)?;

        let mut value = self.parse_expression(Precedence::Lowest)?;

        // A function literal bound by `let` learns its own name so its
        // body can refer to it.
        if let ExprKind::Function {
            name: fn_name @ None,
            ..
        } = &mut value.kind
        {
            *fn_name = Some(name.clone());
        }

        self.match_token(&TokenKind::Semicolon);
        let span = start.to(self.previous_span());
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.advance(); // return

        let value = self.parse_expression(Precedence::Lowest)?;
        self.match_token(&TokenKind::Semicolon);

        let span = start.to(self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.match_token(&TokenKind::Semicolon);

        let span = start.to(self.previous_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse statements until the closing brace of a block.
    pub(crate) fn parse_block_statement(&mut self) -> ParseResult<BlockStatement> {
        let start = self.previous_span();
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(BlockStatement::new(
            statements,
            start.to(self.previous_span()),
        ))
    }

    /// Skip forward to the next likely statement boundary after an error.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                return;
            }
            match self.peek().kind {
                TokenKind::Let | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ===== Token cursor =====

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParserError::unexpected_token(
                kind.to_string(),
                self.peek().kind.to_string(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(ParserError::unexpected_token(
                "identifier",
                other.to_string(),
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous().span
    }
}

/// Convenience: lex and parse a source string.
pub fn parse_source(source: &str) -> Result<Program, Vec<ParserError>> {
    let tokens = crate::lexer::Scanner::new(source)
        .scan_tokens()
        .map_err(|e| vec![ParserError::from(e)])?;
    Parser::new(tokens).parse()
}
