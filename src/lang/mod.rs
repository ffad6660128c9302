pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parse;
pub mod runtime;
pub mod token;
pub mod value;
pub mod variables;
