use indexmap::IndexMap;

/// Value of a single attribute.
///
/// `Bool(true)` is a presence-only attribute (`checked`), `Bool(false)` an
/// attribute that renders nothing. `List` only ever holds the accumulated
/// `class` contributions of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl AttrValue {
    /// Build a value from attribute source text, coercing the literal
    /// spellings `true`, `false`, `null` and the empty string to booleans.
    pub fn from_literal(value: &str) -> Self {
        match value {
            "true" => AttrValue::Bool(true),
            "" | "false" | "null" => AttrValue::Bool(false),
            _ => AttrValue::Str(value.to_string()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Ordered attribute map, in source order.
pub type Attributes = IndexMap<String, AttrValue>;

/// Token classification for template source.
///
/// Data-carrying variants embed exactly the payload their kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `div`, `fb:user`, `input:text`
    Tag(String),
    /// `#name`
    Id(String),
    /// `.name`
    Class(String),
    /// `( ... )` with the raw group text and the parsed map.
    Attributes { raw: String, attributes: Attributes },
    /// `!!! strict`; `None` when no version follows the marker.
    Doctype(Option<String>),
    /// `:name`
    Filter(String),
    /// `- stmt`, `= expr`, `!= expr`
    Code { code: String, buffered: bool },
    /// `// text` (buffered) or `//- text` (silent)
    Comment { text: String, buffered: bool },
    /// `| text` or inline text after a tag
    Text(String),

    // Structure
    Indent,
    Newline,
    Outdent,
    Eos,
}

impl TokenKind {
    /// Short kind name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Tag(_) => "tag",
            TokenKind::Id(_) => "id",
            TokenKind::Class(_) => "class",
            TokenKind::Attributes { .. } => "attributes",
            TokenKind::Doctype(_) => "doctype",
            TokenKind::Filter(_) => "filter",
            TokenKind::Code { .. } => "code",
            TokenKind::Comment { .. } => "comment",
            TokenKind::Text(_) => "text",
            TokenKind::Indent => "indent",
            TokenKind::Newline => "newline",
            TokenKind::Outdent => "outdent",
            TokenKind::Eos => "eos",
        }
    }
}

/// A token produced by the lexer, stamped with the source line it was read on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// Elements that never have a closing tag or children.
pub const SELF_CLOSING: &[&str] = &["meta", "img", "link", "br", "hr", "input", "area", "base"];

/// Check if a tag name is in the built-in self-closing set.
pub fn is_self_closing(tag: &str) -> bool {
    SELF_CLOSING.contains(&tag)
}
