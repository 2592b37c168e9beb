//! Error types for all pipeline phases.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors. The parser accumulates these so the REPL can report
/// every problem in a line before discarding it.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("expected next token to be {expected}, got {found} instead")]
    UnexpectedToken { expected: String, found: String },

    #[error("no prefix parse rule for {0}")]
    NoPrefixRule(String),

    #[error("could not parse {0} as integer")]
    InvalidInteger(String),

    #[error("{0}")]
    Lexer(#[from] LexerError),
}

impl ParserError {
    pub fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error("too many constants in one compilation unit")]
    TooManyConstants,

    #[error("too many locals in one function")]
    TooManyLocals,
}

/// Runtime errors surfaced by the virtual machine or the evaluator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack empty")]
    StackEmpty,

    #[error("unsupported types for binary operation: {0} {1}")]
    UnsupportedBinaryTypes(&'static str, &'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown operator: {0} ({1} {2})")]
    UnknownOperator(String, &'static str, &'static str),

    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(String),

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(String),

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),

    #[error("calling non-function (and non-builtin)")]
    NotCallable,

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArity { want: usize, got: usize },

    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("not a function: constant {0}")]
    NotAFunction(u16),

    #[error("{0}")]
    Message(String),
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum TamarinError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
