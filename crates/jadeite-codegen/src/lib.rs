//! jadeite Code Generator
//!
//! Renders the jadeite document tree into markup with embedded host-language
//! statements (PHP by default), and chains the whole pipeline behind
//! [`Compiler`].
//!
//! ```text
//! source → Lexer → Parser → BlockNode → Dumper (+ filters, visitors) → String
//! ```

pub mod config;
pub mod dumper;
pub mod filters;
pub mod visitors;

pub use config::{ControlConstruct, HostSyntax, Options};
pub use dumper::Dumper;
pub use filters::{BlockFilter, Filter, TextFilter};
pub use visitors::{AutotagsVisitor, Visitor};

use jadeite_parser::{NodeKind, ParseError, Parser, ParserOptions};

/// Rendering error. Every variant tied to a node carries its source line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DumpError {
    #[error("Filter \"{name}\" is not registered at line {line}")]
    UnregisteredFilter { name: String, line: usize },

    #[error("Visitors cannot be registered for {kind} nodes")]
    UnregisteredVisitorTarget { kind: &'static str },

    #[error("Unknown doctype \"{name}\" at line {line}")]
    UnknownDoctype { name: String, line: usize },

    #[error("Filter \"{name}\" is already registered")]
    DuplicateFilter { name: String },
}

/// Error of a whole compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Render error: {0}")]
    Dump(#[from] DumpError),
}

impl CompileError {
    /// Source line of the error, when it is tied to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Parse(e) => Some(e.line()),
            CompileError::Dump(
                DumpError::UnregisteredFilter { line, .. } | DumpError::UnknownDoctype { line, .. },
            ) => Some(*line),
            CompileError::Dump(_) => None,
        }
    }
}

/// Lexer, parser and dumper behind one call.
///
/// The tables in [`Options`] drive both the parser (known doctypes, known
/// filters, self-closing tags) and the dumper. A compiler holds no state
/// between calls; compiling the same source twice gives identical output.
#[derive(Debug)]
pub struct Compiler {
    dumper: Dumper,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Compiler {
    /// A compiler with no filters and no visitors.
    pub fn new(options: Options) -> Self {
        Self {
            dumper: Dumper::new(options),
        }
    }

    /// A compiler with the default tables, the built-in filters and the
    /// autotags visitor.
    pub fn with_defaults() -> Self {
        Self::with_builtins(Options::default())
    }

    /// A compiler with the given tables, the built-in filters and the
    /// autotags visitor.
    pub fn with_builtins(options: Options) -> Self {
        Self {
            dumper: Dumper::with_builtins(options),
        }
    }

    pub fn options(&self) -> &Options {
        self.dumper.options()
    }

    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        filter: Filter,
    ) -> Result<(), DumpError> {
        self.dumper.register_filter(name, filter)
    }

    pub fn register_visitor(
        &mut self,
        kind: NodeKind,
        visitor: impl Visitor + 'static,
    ) -> Result<(), DumpError> {
        self.dumper.register_visitor(kind, visitor)
    }

    /// Compile template source into markup.
    #[tracing::instrument(skip_all)]
    pub fn compile(&self, source: &str) -> Result<String, CompileError> {
        let options = self.dumper.options();
        let parser_options = ParserOptions {
            filters: Some(self.dumper.filter_names().map(str::to_string).collect()),
            doctypes: Some(options.doctypes.keys().cloned().collect()),
            self_closing: options.self_closing.clone(),
        };

        let mut root = Parser::new(source, parser_options).parse_document()?;
        let html = self.dumper.dump(&mut root)?;
        tracing::debug!(bytes = html.len(), "rendered document");

        Ok(html)
    }
}
