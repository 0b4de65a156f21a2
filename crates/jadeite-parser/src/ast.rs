//! Abstract Syntax Tree for templates.
//!
//! A closed set of node kinds. Block-like nodes own their children outright;
//! there are no parent or sibling back-references.

use jadeite_lexer::{AttrValue, Attributes};

/// Discriminant of a [`Node`], used to register visitors per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Block,
    Tag,
    Text,
    Code,
    Comment,
    Doctype,
    Filter,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Block => "block",
            NodeKind::Tag => "tag",
            NodeKind::Text => "text",
            NodeKind::Code => "code",
            NodeKind::Comment => "comment",
            NodeKind::Doctype => "doctype",
            NodeKind::Filter => "filter",
        }
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An ordered run of sibling nodes.
    Block(BlockNode),

    /// A markup element with attributes, optional inline content and children.
    Tag(TagNode),

    /// Literal text lines (may contain `{{expr}}` placeholders).
    Text(TextNode),

    /// An embedded host-language statement or output expression.
    Code(CodeNode),

    /// A `//` comment.
    Comment(CommentNode),

    /// A `!!!` doctype declaration.
    Doctype(DoctypeNode),

    /// A `:name` filter applied to an indented block.
    Filter(FilterNode),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Block(_) => NodeKind::Block,
            Node::Tag(_) => NodeKind::Tag,
            Node::Text(_) => NodeKind::Text,
            Node::Code(_) => NodeKind::Code,
            Node::Comment(_) => NodeKind::Comment,
            Node::Doctype(_) => NodeKind::Doctype,
            Node::Filter(_) => NodeKind::Filter,
        }
    }

    /// Source line the node starts on.
    pub fn line(&self) -> usize {
        match self {
            Node::Block(n) => n.line,
            Node::Tag(n) => n.line,
            Node::Text(n) => n.line,
            Node::Code(n) => n.line,
            Node::Comment(n) => n.line,
            Node::Doctype(n) => n.line,
            Node::Filter(n) => n.line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockNode {
    pub line: usize,
    pub children: Vec<Node>,
}

impl BlockNode {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            children: Vec::new(),
        }
    }
}

/// A markup element.
///
/// Attributes keep source order, except that the `id` slot always comes
/// first. `class` contributions accumulate into a single [`AttrValue::List`].
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub line: usize,
    pub name: String,
    pub attributes: Attributes,
    pub text: Option<TextNode>,
    pub code: Option<CodeNode>,
    pub children: Vec<Node>,
}

impl TagNode {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), AttrValue::Bool(false));

        Self {
            line,
            name: name.into(),
            attributes,
            text: None,
            code: None,
            children: Vec::new(),
        }
    }

    /// Set an attribute. `class` values are appended to the class list;
    /// every other key is overwritten in place (last writer wins). A bare
    /// `class` adds the class `class`, as any boolean renders `key="key"`.
    pub fn set_attribute(&mut self, key: &str, value: AttrValue) {
        if key != "class" {
            self.attributes.insert(key.to_string(), value);
            return;
        }

        match value {
            AttrValue::Str(class) => self.add_classes([class]),
            AttrValue::List(list) => self.add_classes(list),
            AttrValue::Bool(true) => self.add_classes(["class".to_string()]),
            AttrValue::Bool(false) => self.add_classes([]),
        }
    }

    /// Append classes to the `class` list. The `class` slot is created at
    /// the current end of the map on first use and keeps that position.
    pub fn add_classes<I: IntoIterator<Item = String>>(&mut self, classes: I) {
        let slot = self
            .attributes
            .entry("class".to_string())
            .or_insert(AttrValue::List(Vec::new()));

        let mut list = match std::mem::replace(slot, AttrValue::Bool(false)) {
            AttrValue::List(list) => list,
            AttrValue::Str(class) => vec![class],
            AttrValue::Bool(_) => Vec::new(),
        };
        list.extend(classes);
        *slot = AttrValue::List(list);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextNode {
    pub line: usize,
    pub lines: Vec<String>,
}

impl TextNode {
    /// A text node from a source string; an empty string yields no lines.
    pub fn new(text: &str, line: usize) -> Self {
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };
        Self { line, lines }
    }

    pub fn add_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeNode {
    pub line: usize,
    pub code: String,
    /// `true` when the statement's result is written to the output.
    pub buffered: bool,
    pub block: Option<BlockNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub line: usize,
    pub string: String,
    /// `false` for silent (`//-`) comments, which produce no output.
    pub buffered: bool,
    pub block: Option<BlockNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoctypeNode {
    pub line: usize,
    pub version: String,
}

/// A filter application. The block is a [`Node::Text`] for `|` line blocks
/// and a [`Node::Block`] for nested markup.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub line: usize,
    pub name: String,
    pub attributes: Attributes,
    pub block: Box<Node>,
}
