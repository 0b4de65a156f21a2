//! jadeite Lexer
//!
//! Turns whitespace-structured template source into a pull-based stream of
//! tokens. Tracks indentation levels (two spaces per level), supports
//! one-token push-back, deferred synthetic tokens and bounded lookahead.
//!
//! # Example
//!
//! ```
//! use jadeite_lexer::{Lexer, TokenKind};
//!
//! let tokens = Lexer::tokenize("").unwrap();
//! assert_eq!(tokens.len(), 1); // Just EOS
//! assert_eq!(tokens[0].kind, TokenKind::Eos);
//! ```

pub mod attributes;
pub mod lexer;
pub mod token;

pub use lexer::{Lexer, INDENT_WIDTH};
pub use token::{is_self_closing, AttrValue, Attributes, Token, TokenKind, SELF_CLOSING};

/// Lexer error with the source line it was raised on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error(
        "Invalid indentation at line {line}: spaces count must be a multiple of two, but {spaces} got"
    )]
    InvalidIndentation { line: usize, spaces: usize },

    #[error("Invalid indentation at line {line}: got level {got}, but expected {expected}")]
    UnexpectedIndent {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("Unclosed attribute list at line {line}")]
    UnclosedAttributes { line: usize },
}

impl LexError {
    /// Source line the error was raised on.
    pub fn line(&self) -> usize {
        match self {
            LexError::InvalidIndentation { line, .. }
            | LexError::UnexpectedIndent { line, .. }
            | LexError::UnclosedAttributes { line } => *line,
        }
    }
}
