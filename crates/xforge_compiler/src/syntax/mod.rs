//! Lexing and parsing of XScript source.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse, MAX_NESTING};
