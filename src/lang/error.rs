use thiserror::Error;

use crate::lang::token::Token;

/// Lexing stops at the first malformed lexeme
///
/// `partial` holds every token produced before the failure, terminated by a `Bad` token.
#[derive(Debug, Error, PartialEq)]
#[error("{message} on line {line}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub partial: Vec<Token>,
}

#[derive(Debug, Error, PartialEq, Clone)]
#[error("{message} on line {line}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

/// Errors local to a single top-level statement
#[derive(Debug, Error, PartialEq, Clone)]
pub enum EvalError {
    #[error("'{0}' is already declared in this scope")]
    Redeclaration(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} overflows")]
    Overflow(String),
    #[error("cannot '{0}' outside of a loop")]
    JumpOutsideLoop(&'static str),
    #[error("cannot 'return' outside of a function")]
    ReturnOutsideFunction,
}
