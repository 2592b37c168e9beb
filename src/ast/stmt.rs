//! Statement AST nodes.

use std::fmt;

use crate::ast::expr::Expr;
use crate::span::Span;

/// A complete program: the root of the AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Binding: let name = value;
    Let { name: String, value: Expr },
    /// Early return: return value;
    Return(Expr),
    /// An expression evaluated for its value: expr;
    Expression(Expr),
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Let { name, value } => write!(f, "let {} = {};", name, value),
            StmtKind::Return(value) => write!(f, "return {};", value),
            StmtKind::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

/// A brace-delimited sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl BlockStatement {
    pub fn new(statements: Vec<Stmt>, span: Span) -> Self {
        Self { statements, span }
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}
