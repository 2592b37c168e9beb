//! AST node definitions.

pub mod expr;
pub mod stmt;

pub use expr::{Expr, ExprKind};
pub use stmt::{BlockStatement, Program, Stmt, StmtKind};
