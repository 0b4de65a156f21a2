//! Document parser for templates.
//!
//! Recursive descent over a pull-based [`Lexer`]. The grammar:
//!
//! ```text
//! Document   := Expression* Eos
//! Expression := Tag | Doctype | Filter | Comment | Text | Code
//!             | (Id | Class)              replayed as Tag("div") + same token
//! Tag        := TagName (Id | Class | Attributes)* (Text | Code)? Block?
//! Code       := Code Block?
//! Comment    := Comment Block?
//! Filter     := FilterName Attributes? (TextBlock | Block)?
//! Block      := Indent (Expression | Newline)* Outdent
//! TextBlock  := Indent (Text | Newline)* Outdent
//! ```

use std::collections::HashSet;

use jadeite_lexer::{AttrValue, Lexer, Token, TokenKind, SELF_CLOSING};

use crate::ast::{
    BlockNode, CodeNode, CommentNode, DoctypeNode, FilterNode, Node, TagNode, TextNode,
};
use crate::ParseError;

/// Tables the parser validates against.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Registered filter names. `None` accepts any name.
    pub filters: Option<HashSet<String>>,
    /// Known doctype keys (lowercase). `None` accepts any key.
    pub doctypes: Option<HashSet<String>>,
    /// Tags that never own text, code or children.
    pub self_closing: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            filters: None,
            doctypes: None,
            self_closing: SELF_CLOSING.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Template parser.
///
/// Owns its lexer for one pass over one source string.
pub struct Parser {
    lexer: Lexer,
    options: ParserOptions,
}

impl Parser {
    /// Create a parser for the given source.
    pub fn new(source: &str, options: ParserOptions) -> Self {
        Self {
            lexer: Lexer::new(source),
            options,
        }
    }

    /// Parse source with default options into the root block.
    pub fn parse(source: &str) -> Result<BlockNode, ParseError> {
        Parser::new(source, ParserOptions::default()).parse_document()
    }

    /// Parse the whole source into the root block.
    pub fn parse_document(&mut self) -> Result<BlockNode, ParseError> {
        let mut root = BlockNode::new(self.lexer.line());

        loop {
            match self.peek()?.kind {
                TokenKind::Eos => break,
                TokenKind::Newline => {
                    self.lexer.next()?;
                }
                _ => root.children.push(self.parse_expression()?),
            }
        }

        tracing::debug!(nodes = root.children.len(), "parsed document");
        Ok(root)
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        match self.peek()?.kind {
            TokenKind::Tag(_) => self.parse_tag().map(Node::Tag),
            TokenKind::Doctype(_) => self.parse_doctype().map(Node::Doctype),
            TokenKind::Filter(_) => self.parse_filter().map(Node::Filter),
            TokenKind::Comment { .. } => self.parse_comment().map(Node::Comment),
            TokenKind::Text(_) => self.parse_text(false).map(Node::Text),
            TokenKind::Code { .. } => self.parse_code().map(Node::Code),
            TokenKind::Id(_) | TokenKind::Class(_) => {
                // `#id` / `.class` alone on a line is shorthand for a div
                let token = self.lexer.next()?;
                let div = Token::new(TokenKind::Tag("div".to_string()), token.line);
                self.lexer.stash(token);
                self.lexer.stash(div);
                self.parse_expression()
            }
            _ => {
                let token = self.lexer.next()?;
                Err(unexpected("expression", &token))
            }
        }
    }

    // =========================================================================
    // Tags
    // =========================================================================

    fn parse_tag(&mut self) -> Result<TagNode, ParseError> {
        let (name, line) = match self.lexer.next()? {
            Token {
                kind: TokenKind::Tag(name),
                line,
            } => (name, line),
            other => return Err(unexpected("tag", &other)),
        };
        let mut tag = TagNode::new(name, line);

        // Shorthand classes go after every explicit class value
        let mut classes = Vec::new();
        loop {
            let token = self.lexer.next()?;
            match token.kind {
                TokenKind::Id(id) => tag.set_attribute("id", AttrValue::Str(id)),
                TokenKind::Class(class) => {
                    tag.add_classes([]);
                    classes.push(class);
                }
                TokenKind::Attributes { attributes, .. } => {
                    for (key, value) in attributes {
                        tag.set_attribute(&key, value);
                    }
                }
                _ => {
                    self.lexer.stash(token);
                    break;
                }
            }
        }
        if !classes.is_empty() {
            tag.add_classes(classes);
        }

        match self.peek()?.kind {
            TokenKind::Text(_) => {
                let text = self.parse_text(true)?;
                if !text.lines.is_empty() {
                    tag.text = Some(text);
                }
            }
            TokenKind::Code { .. } => tag.code = Some(self.parse_inline_code()?),
            _ => {}
        }

        self.skip_newlines()?;

        if self.peek()?.kind == TokenKind::Indent {
            tag.children = self.parse_block()?.children;
        }

        if self.is_self_closing(&tag.name)
            && (tag.text.is_some() || tag.code.is_some() || !tag.children.is_empty())
        {
            tracing::warn!(tag = %tag.name, line, "dropping content of self-closing tag");
            tag.text = None;
            tag.code = None;
            tag.children.clear();
        }

        Ok(tag)
    }

    fn is_self_closing(&self, name: &str) -> bool {
        self.options.self_closing.iter().any(|tag| tag == name)
    }

    // =========================================================================
    // Text, code, comments, doctypes
    // =========================================================================

    /// Parse one text token. Inline tag text drops its leading spaces.
    fn parse_text(&mut self, trim: bool) -> Result<TextNode, ParseError> {
        match self.lexer.next()? {
            Token {
                kind: TokenKind::Text(text),
                line,
            } => {
                let text = if trim {
                    text.trim_start_matches(' ')
                } else {
                    text.as_str()
                };
                Ok(TextNode::new(text, line))
            }
            other => Err(unexpected("text", &other)),
        }
    }

    /// Parse a code token and the block nested under it, if any.
    fn parse_code(&mut self) -> Result<CodeNode, ParseError> {
        let mut node = self.parse_inline_code()?;

        self.skip_newlines()?;
        if self.peek()?.kind == TokenKind::Indent {
            node.block = Some(self.parse_block()?);
        }

        Ok(node)
    }

    /// Parse a code token on its own. Used for `p= expr`, where an indented
    /// block belongs to the tag rather than to the code.
    fn parse_inline_code(&mut self) -> Result<CodeNode, ParseError> {
        match self.lexer.next()? {
            Token {
                kind: TokenKind::Code { code, buffered },
                line,
            } => Ok(CodeNode {
                line,
                code,
                buffered,
                block: None,
            }),
            other => Err(unexpected("code", &other)),
        }
    }

    fn parse_comment(&mut self) -> Result<CommentNode, ParseError> {
        let (string, buffered, line) = match self.lexer.next()? {
            Token {
                kind: TokenKind::Comment { text, buffered },
                line,
            } => (text.trim_matches(' ').to_string(), buffered, line),
            other => return Err(unexpected("comment", &other)),
        };

        self.skip_newlines()?;
        let block = if self.peek()?.kind == TokenKind::Indent {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(CommentNode {
            line,
            string,
            buffered,
            block,
        })
    }

    /// `!!!` without a key is the `default` doctype. Keys are lowercased.
    fn parse_doctype(&mut self) -> Result<DoctypeNode, ParseError> {
        let (version, line) = match self.lexer.next()? {
            Token {
                kind: TokenKind::Doctype(version),
                line,
            } => (version, line),
            other => return Err(unexpected("doctype", &other)),
        };
        let version = version.map_or_else(|| "default".to_string(), |v| v.to_lowercase());

        if let Some(doctypes) = &self.options.doctypes {
            if !doctypes.contains(&version) {
                return Err(ParseError::UnknownDoctype {
                    name: version,
                    line,
                });
            }
        }

        Ok(DoctypeNode { line, version })
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn parse_filter(&mut self) -> Result<FilterNode, ParseError> {
        let (name, line) = match self.lexer.next()? {
            Token {
                kind: TokenKind::Filter(name),
                line,
            } => (name, line),
            other => return Err(unexpected("filter", &other)),
        };

        if let Some(filters) = &self.options.filters {
            if !filters.contains(&name) {
                return Err(ParseError::UnknownFilter { name, line });
            }
        }

        let token = self.lexer.next()?;
        let attributes = match token.kind {
            TokenKind::Attributes { attributes, .. } => attributes,
            _ => {
                self.lexer.stash(token);
                Default::default()
            }
        };

        let block = if self.peek()?.kind != TokenKind::Indent {
            Node::Text(TextNode::new("", line))
        } else if matches!(self.lexer.peek(2)?.kind, TokenKind::Text(_)) {
            Node::Text(self.parse_text_block(line)?)
        } else {
            Node::Block(self.parse_block()?)
        };

        Ok(FilterNode {
            line,
            name,
            attributes,
            block: Box::new(block),
        })
    }

    /// An indented run of text lines with no nested markup.
    fn parse_text_block(&mut self, line: usize) -> Result<TextNode, ParseError> {
        let mut node = TextNode::new("", line);

        self.expect_structure(TokenKind::Indent)?;
        loop {
            let token = self.lexer.next()?;
            match token.kind {
                TokenKind::Newline => {}
                TokenKind::Text(text) => node.add_line(text),
                _ => {
                    self.lexer.stash(token);
                    break;
                }
            }
        }
        self.expect_structure(TokenKind::Outdent)?;

        Ok(node)
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    fn parse_block(&mut self) -> Result<BlockNode, ParseError> {
        let mut block = BlockNode::new(self.lexer.line());

        self.expect_structure(TokenKind::Indent)?;
        loop {
            match self.peek()?.kind {
                TokenKind::Outdent => break,
                TokenKind::Newline => {
                    self.lexer.next()?;
                }
                _ => block.children.push(self.parse_expression()?),
            }
        }
        self.expect_structure(TokenKind::Outdent)?;

        Ok(block)
    }

    // =========================================================================
    // Token navigation helpers
    // =========================================================================

    fn peek(&mut self) -> Result<&Token, ParseError> {
        Ok(self.lexer.peek(1)?)
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while self.peek()?.kind == TokenKind::Newline {
            self.lexer.next()?;
        }
        Ok(())
    }

    /// Consume a payload-free structural token of the given kind, or fail.
    fn expect_structure(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.lexer.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(kind.name(), &token))
        }
    }
}

fn unexpected(expected: &'static str, got: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        got: got.kind.name(),
        line: got.line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> BlockNode {
        Parser::parse(source).unwrap()
    }

    fn tag(node: &Node) -> &TagNode {
        match node {
            Node::Tag(tag) => tag,
            other => panic!("Expected Tag, got {other:?}"),
        }
    }

    fn code(node: &Node) -> &CodeNode {
        match node {
            Node::Code(code) => code,
            other => panic!("Expected Code, got {other:?}"),
        }
    }

    fn first_tag(source: &str) -> TagNode {
        tag(&parse(source).children[0]).clone()
    }

    fn keys(tag: &TagNode) -> Vec<&str> {
        tag.attributes.keys().map(String::as_str).collect()
    }

    fn classes(tag: &TagNode) -> Vec<String> {
        match tag.attributes.get("class") {
            Some(AttrValue::List(list)) => list.clone(),
            other => panic!("Expected class list, got {other:?}"),
        }
    }

    // =========================================================================
    // Empty / simple
    // =========================================================================

    #[test]
    fn test_empty_document() {
        assert!(parse("").children.is_empty());
        assert!(parse("\n\n\n").children.is_empty());
    }

    #[test]
    fn test_single_tag() {
        let tag = first_tag("div");
        assert_eq!(tag.name, "div");
        assert_eq!(keys(&tag), vec!["id"]);
        assert_eq!(tag.attributes["id"], AttrValue::Bool(false));
        assert!(tag.children.is_empty());
    }

    #[test]
    fn test_multiple_tags() {
        assert_eq!(parse("div\nspan\np").children.len(), 3);
    }

    #[test]
    fn test_namespaced_tag() {
        assert_eq!(first_tag("fb:user").name, "fb:user");
        assert_eq!(first_tag("input:text").name, "input:text");
    }

    // =========================================================================
    // Id and class
    // =========================================================================

    #[test]
    fn test_shorthand_id_class() {
        let tag = first_tag("div#foo.bar.baz");
        assert_eq!(tag.attributes["id"], AttrValue::Str("foo".into()));
        assert_eq!(classes(&tag), vec!["bar", "baz"]);
    }

    #[test]
    fn test_bare_id_is_div() {
        let tag = first_tag("#something");
        assert_eq!(tag.name, "div");
        assert_eq!(tag.attributes["id"], AttrValue::Str("something".into()));
    }

    #[test]
    fn test_bare_class_is_div() {
        let tag = first_tag(".foo.bar");
        assert_eq!(tag.name, "div");
        assert_eq!(classes(&tag), vec!["foo", "bar"]);
    }

    #[test]
    fn test_explicit_classes_before_shorthand() {
        let tag = first_tag("div.foo(class=\"bar\").baz");
        assert_eq!(classes(&tag), vec!["bar", "foo", "baz"]);
    }

    #[test]
    fn test_boolean_class_attribute() {
        let tag = first_tag("p.note(class)");
        assert_eq!(classes(&tag), vec!["class", "note"]);

        let tag = first_tag("p(class=false)");
        assert_eq!(classes(&tag), Vec::<String>::new());
    }

    #[test]
    fn test_id_attribute_last_writer_wins() {
        let tag = first_tag("div#foo(id=\"bar\")");
        assert_eq!(tag.attributes["id"], AttrValue::Str("bar".into()));
        assert_eq!(keys(&tag), vec!["id"]);
    }

    #[test]
    fn test_id_slot_first() {
        let tag = first_tag("a(href=\"#\")#top.link");
        assert_eq!(keys(&tag), vec!["id", "href", "class"]);
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_attributes_in_source_order() {
        let tag = first_tag("img(src=\"/foo.png\", alt=\"just some foo\")");
        assert_eq!(keys(&tag), vec!["id", "src", "alt"]);
        assert_eq!(tag.attributes["alt"], AttrValue::Str("just some foo".into()));
    }

    #[test]
    fn test_multiple_attribute_groups() {
        let tag = first_tag("a(href=\"/\")(title=\"home\")");
        assert_eq!(keys(&tag), vec!["id", "href", "title"]);
    }

    // =========================================================================
    // Inline text and code
    // =========================================================================

    #[test]
    fn test_inline_text_trimmed() {
        let tag = first_tag("li  one");
        assert_eq!(tag.text.unwrap().lines, vec!["one"]);
    }

    #[test]
    fn test_inline_text_after_attributes() {
        let tag = first_tag("a(href=\"#\") foo");
        assert_eq!(tag.text.unwrap().lines, vec!["foo"]);
    }

    #[test]
    fn test_inline_code() {
        let tag = first_tag("p= $name");
        let code = tag.code.unwrap();
        assert_eq!(code.code, " $name");
        assert!(code.buffered);
        assert!(code.block.is_none());
    }

    #[test]
    fn test_inline_code_block_belongs_to_tag() {
        let tag = first_tag("p= $name\n  span");
        assert!(tag.code.unwrap().block.is_none());
        assert_eq!(tag.children.len(), 1);
    }

    // =========================================================================
    // Nesting
    // =========================================================================

    #[test]
    fn test_nested_children() {
        let ul = first_tag("ul\n  li a\n  li b");
        assert_eq!(ul.children.len(), 2);
        assert_eq!(tag(&ul.children[1]).text.as_ref().unwrap().lines, vec!["b"]);
    }

    #[test]
    fn test_deep_nesting_and_siblings() {
        let root = parse("ul\n  li\n    ul\n      li three\nfooter");
        assert_eq!(root.children.len(), 2);
        let inner = tag(&tag(&tag(&root.children[0]).children[0]).children[0]);
        assert_eq!(inner.name, "ul");
        assert_eq!(tag(&root.children[1]).name, "footer");
    }

    #[test]
    fn test_blank_lines_inside_block() {
        let ul = first_tag("ul\n  li a\n\n  li b\n\n");
        assert_eq!(ul.children.len(), 2);
    }

    #[test]
    fn test_text_lines() {
        let p = first_tag("p\n  | foo\n  |    bar");
        let lines: Vec<_> = p
            .children
            .iter()
            .map(|n| match n {
                Node::Text(t) => t.lines.clone(),
                other => panic!("Expected Text, got {other:?}"),
            })
            .collect();
        assert_eq!(lines, vec![vec!["foo".to_string()], vec!["   bar".to_string()]]);
    }

    // =========================================================================
    // Self-closing tags
    // =========================================================================

    #[test]
    fn test_self_closing_drops_content() {
        let img = first_tag("img foo\n  p bar");
        assert!(img.text.is_none());
        assert!(img.children.is_empty());
    }

    #[test]
    fn test_custom_self_closing_table() {
        let options = ParserOptions {
            self_closing: vec!["widget".into()],
            ..ParserOptions::default()
        };
        let root = Parser::new("widget hello", options).parse_document().unwrap();
        assert!(tag(&root.children[0]).text.is_none());
    }

    // =========================================================================
    // Code blocks
    // =========================================================================

    #[test]
    fn test_code_with_block() {
        let root = parse("- if ($x):\n  p yes\n- else:\n  p no");
        assert_eq!(root.children.len(), 2);
        let branch = code(&root.children[0]);
        assert_eq!(branch.code, " if ($x):");
        assert!(!branch.buffered);
        assert_eq!(branch.block.as_ref().unwrap().children.len(), 1);
        assert!(code(&root.children[1]).block.is_some());
    }

    #[test]
    fn test_code_block_after_blank_lines() {
        let root = parse("- foreach ($a as $b):\n\n  p= $b");
        assert!(code(&root.children[0]).block.is_some());
    }

    #[test]
    fn test_unbuffered_and_buffered_code() {
        let root = parse("- $a = 1\n= $a\n!= $a");
        assert!(!code(&root.children[0]).buffered);
        assert!(code(&root.children[1]).buffered);
        assert!(code(&root.children[2]).buffered);
    }

    // =========================================================================
    // Comments and doctypes
    // =========================================================================

    #[test]
    fn test_comments() {
        let root = parse("// hello  \n//- hidden\n// [if IE]\n  p old");
        let comments: Vec<_> = root
            .children
            .iter()
            .map(|n| match n {
                Node::Comment(c) => (c.string.clone(), c.buffered, c.block.is_some()),
                other => panic!("Expected Comment, got {other:?}"),
            })
            .collect();
        assert_eq!(
            comments,
            vec![
                ("hello".to_string(), true, false),
                ("hidden".to_string(), false, false),
                ("[if IE]".to_string(), true, true),
            ]
        );
    }

    #[test]
    fn test_doctype_default_and_lowercased() {
        let root = parse("!!!\n!!! XML");
        let versions: Vec<_> = root
            .children
            .iter()
            .map(|n| match n {
                Node::Doctype(d) => d.version.clone(),
                other => panic!("Expected Doctype, got {other:?}"),
            })
            .collect();
        assert_eq!(versions, vec!["default", "xml"]);
    }

    #[test]
    fn test_unknown_doctype() {
        let options = ParserOptions {
            doctypes: Some(["5".to_string()].into_iter().collect()),
            ..ParserOptions::default()
        };
        let err = Parser::new("p\n!!! nope", options).parse_document().unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDoctype {
                name: "nope".into(),
                line: 2
            }
        );
    }

    // =========================================================================
    // Filters
    // =========================================================================

    #[test]
    fn test_filter_text_block() {
        let root = parse(":cdata\n  | foo\n\n  | bar");
        let Node::Filter(filter) = &root.children[0] else {
            panic!("Expected Filter");
        };
        assert_eq!(filter.name, "cdata");
        assert_eq!(
            *filter.block,
            Node::Text(TextNode {
                line: 1,
                lines: vec!["foo".into(), "bar".into()]
            })
        );
    }

    #[test]
    fn test_filter_markup_block_and_attributes() {
        let root = parse(":javascript(cdata)\n  p foo");
        let Node::Filter(filter) = &root.children[0] else {
            panic!("Expected Filter");
        };
        assert_eq!(filter.attributes["cdata"], AttrValue::Bool(true));
        assert!(matches!(*filter.block, Node::Block(_)));
    }

    #[test]
    fn test_filter_without_block() {
        let root = parse(":cdata\np");
        let Node::Filter(filter) = &root.children[0] else {
            panic!("Expected Filter");
        };
        assert_eq!(*filter.block, Node::Text(TextNode::new("", 1)));
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_unknown_filter() {
        let options = ParserOptions {
            filters: Some(["cdata".to_string()].into_iter().collect()),
            ..ParserOptions::default()
        };
        let err = Parser::new("div\n  :markdown\n    | foo", options)
            .parse_document()
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownFilter {
                name: "markdown".into(),
                line: 2
            }
        );
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_nested_text_block_is_error() {
        let err = Parser::parse(":cdata\n  | a\n    | b").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: "outdent",
                got: "indent",
                line: 3
            }
        );
    }

    #[test]
    fn test_lex_error_propagates() {
        let err = Parser::parse("ul\n   li").unwrap_err();
        assert!(matches!(err, ParseError::Lex(_)));
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_stray_attributes_is_error() {
        let err = Parser::parse("p\n(a=\"b\")").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: "expression",
                got: "attributes",
                line: 2
            }
        );
    }
}
