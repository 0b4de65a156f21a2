//! jadeite Parser
//!
//! Parses the token stream of `jadeite-lexer` into a tree of owned nodes.
//! The parser drives the lexer directly: one-token lookahead for most
//! decisions, two tokens to tell a filter's text block from a markup block,
//! and push-back to desugar `#id` / `.class` lines into `div` tags.

pub mod ast;
pub mod parser;

pub use ast::{
    BlockNode, CodeNode, CommentNode, DoctypeNode, FilterNode, Node, NodeKind, TagNode, TextNode,
};
pub use parser::{Parser, ParserOptions};

use jadeite_lexer::LexError;

/// Parser error. Every variant carries the source line it was raised on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Expected {expected}, but got {got} at line {line}")]
    UnexpectedToken {
        expected: &'static str,
        got: &'static str,
        line: usize,
    },

    #[error("Unknown filter \"{name}\" at line {line}")]
    UnknownFilter { name: String, line: usize },

    #[error("Unknown doctype \"{name}\" at line {line}")]
    UnknownDoctype { name: String, line: usize },
}

impl ParseError {
    /// Source line the error was raised on.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.line(),
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnknownFilter { line, .. }
            | ParseError::UnknownDoctype { line, .. } => *line,
        }
    }
}
