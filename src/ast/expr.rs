//! Expression AST nodes.

use std::fmt;

use crate::ast::stmt::BlockStatement;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
///
/// Operators are kept textual (`"+"`, `"=="`, ...); the compiler and the
/// evaluator reject anything they do not recognize.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: 42
    IntLiteral(i64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),

    /// Variable reference: foo
    Identifier(String),

    /// Prefix operation: !x, -x
    Prefix { operator: String, right: Box<Expr> },

    /// Infix operation: a + b
    Infix {
        left: Box<Expr>,
        operator: String,
        right: Box<Expr>,
    },

    /// Conditional expression: if (cond) { ... } else { ... }
    If {
        condition: Box<Expr>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },

    /// Function literal: fn(x, y) { ... }
    ///
    /// `name` is filled in when the literal is the right-hand side of a
    /// `let`, enabling self-reference inside the body.
    Function {
        parameters: Vec<String>,
        body: BlockStatement,
        name: Option<String>,
    },

    /// Function call: callee(a, b)
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Hash literal: {"key": "value"}
    Hash(Vec<(Expr, Expr)>),

    /// Index expression: arr[0]
    Index { left: Box<Expr>, index: Box<Expr> },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::IntLiteral(n) => write!(f, "{}", n),
            ExprKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            ExprKind::BoolLiteral(b) => write!(f, "{}", b),
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            ExprKind::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            ExprKind::Function {
                parameters, body, ..
            } => write!(f, "fn({}) {}", parameters.join(", "), body),
            ExprKind::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            ExprKind::Array(elements) => {
                let elems: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elems.join(", "))
            }
            ExprKind::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            ExprKind::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
