//! Output generator.
//!
//! Walks the document tree depth-first and renders markup interleaved with
//! host-language statements. Each nesting level indents by two spaces.

use std::sync::LazyLock;

use indexmap::IndexMap;
use jadeite_lexer::{AttrValue, Attributes};
use jadeite_parser::ast::{
    BlockNode, CodeNode, CommentNode, DoctypeNode, FilterNode, Node, NodeKind, TagNode, TextNode,
};
use regex::Regex;

use crate::config::Options;
use crate::filters::{self, replace_placeholders, Filter};
use crate::visitors::{AutotagsVisitor, Visitor};
use crate::DumpError;

/// `// [if IE]` style conditional comments.
static CONDITIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[ *if").expect("valid conditional comment pattern"));

/// Renders document trees against a fixed set of tables, filters and visitors.
pub struct Dumper {
    options: Options,
    filters: IndexMap<String, Filter>,
    visitors: Vec<(NodeKind, Box<dyn Visitor>)>,
}

impl Dumper {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            filters: IndexMap::new(),
            visitors: Vec::new(),
        }
    }

    /// A dumper with the built-in filters and the autotags visitor for tags.
    pub fn with_builtins(options: Options) -> Self {
        let filters = filters::builtins(&options.host)
            .into_iter()
            .map(|(name, filter)| (name.to_string(), filter))
            .collect();
        let autotags: Box<dyn Visitor> = Box::new(AutotagsVisitor::new());

        Self {
            options,
            filters,
            visitors: vec![(NodeKind::Tag, autotags)],
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Register a filter under an alias. Aliases are unique.
    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        filter: Filter,
    ) -> Result<(), DumpError> {
        let name = name.into();
        if self.filters.contains_key(&name) {
            return Err(DumpError::DuplicateFilter { name });
        }

        self.filters.insert(name, filter);
        Ok(())
    }

    /// Register a visitor for one node kind. Visitors of the same kind run
    /// in registration order. Blocks cannot be visited.
    pub fn register_visitor(
        &mut self,
        kind: NodeKind,
        visitor: impl Visitor + 'static,
    ) -> Result<(), DumpError> {
        if kind == NodeKind::Block {
            return Err(DumpError::UnregisteredVisitorTarget { kind: kind.name() });
        }

        self.visitors.push((kind, Box::new(visitor)));
        Ok(())
    }

    /// Aliases of every registered filter.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Render a document. Visitors may rewrite nodes of the tree in place.
    pub fn dump(&self, root: &mut BlockNode) -> Result<String, DumpError> {
        let mut pass = Pass {
            dumper: self,
            html5: false,
        };
        let html = pass.dump_block(&mut root.children, 0)?;

        let html = html.strip_prefix('\n').unwrap_or(&html);
        let html = html.strip_suffix('\n').unwrap_or(html);
        Ok(html.trim_matches(' ').to_string())
    }

    fn visitors(&self, kind: NodeKind) -> impl Iterator<Item = &dyn Visitor> {
        self.visitors
            .iter()
            .filter(move |(target, _)| *target == kind)
            .map(|(_, visitor)| &**visitor)
    }
}

impl std::fmt::Debug for Dumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dumper")
            .field("options", &self.options)
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("visitors", &self.visitors.len())
            .finish()
    }
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// State of one `dump` call.
struct Pass<'d> {
    dumper: &'d Dumper,
    /// Set once an html5 doctype has been rendered.
    html5: bool,
}

impl<'d> Pass<'d> {
    /// Render sibling nodes, one per line. Nodes rendering to nothing
    /// (silent comments) leave no blank line behind.
    fn dump_block(&mut self, children: &mut [Node], level: usize) -> Result<String, DumpError> {
        let mut parts = Vec::with_capacity(children.len());

        for i in 0..children.len() {
            let next_closer = self.continuing_closer(children.get(i + 1));
            let html = self.dump_node(&mut children[i], level, next_closer)?;
            if !html.is_empty() {
                parts.push(html);
            }
        }

        Ok(parts.join("\n"))
    }

    /// Closer shared with the node, when it is an `else`-like branch.
    fn continuing_closer(&self, node: Option<&Node>) -> Option<&'d str> {
        let dumper = self.dumper;
        match node {
            Some(Node::Code(code)) => dumper
                .options
                .construct(&code.code)
                .filter(|construct| construct.continues)
                .map(|construct| construct.closer.as_str()),
            _ => None,
        }
    }

    fn dump_node(
        &mut self,
        node: &mut Node,
        level: usize,
        next_closer: Option<&str>,
    ) -> Result<String, DumpError> {
        self.visit(node);

        match node {
            Node::Block(block) => self.dump_block(&mut block.children, level),
            Node::Tag(tag) => self.dump_tag(tag, level),
            Node::Text(text) => Ok(self.dump_text(text, level)),
            Node::Code(code) => self.dump_code(code, level, next_closer),
            Node::Comment(comment) => self.dump_comment(comment, level),
            Node::Doctype(doctype) => self.dump_doctype(doctype),
            Node::Filter(filter) => self.dump_filter(filter, level),
        }
    }

    fn visit(&self, node: &mut Node) {
        for visitor in self.dumper.visitors(node.kind()) {
            match node {
                Node::Block(_) => {}
                Node::Tag(tag) => visitor.visit_tag(tag),
                Node::Text(text) => visitor.visit_text(text),
                Node::Code(code) => visitor.visit_code(code),
                Node::Comment(comment) => visitor.visit_comment(comment),
                Node::Doctype(doctype) => visitor.visit_doctype(doctype),
                Node::Filter(filter) => visitor.visit_filter(filter),
            }
        }
    }

    // =========================================================================
    // Tags
    // =========================================================================

    fn dump_tag(&mut self, tag: &mut TagNode, level: usize) -> Result<String, DumpError> {
        let dumper = self.dumper;
        let indent = indent(level);
        let attributes = self.dump_attributes(&tag.attributes);

        // Checked after the visitors, which may have renamed the tag
        if dumper.options.is_self_closing(&tag.name) {
            if tag.text.is_some() || tag.code.is_some() || !tag.children.is_empty() {
                tracing::warn!(tag = %tag.name, line = tag.line, "dropping content of self-closing tag");
            }
            let slash = if self.html5 { "" } else { " /" };
            return Ok(format!("{indent}<{}{attributes}{slash}>", tag.name));
        }

        let mut html = format!("{indent}<{}{attributes}>", tag.name);

        let mut inline = Vec::new();
        if let Some(code) = &mut tag.code {
            for visitor in dumper.visitors(NodeKind::Code) {
                visitor.visit_code(code);
            }
            inline.push(self.dump_code(code, 0, None)?);
        }
        if let Some(text) = &mut tag.text {
            for visitor in dumper.visitors(NodeKind::Text) {
                visitor.visit_text(text);
            }
            inline.push(self.dump_text(text, 0));
        }

        // Children that render nothing (silent comments) leave the tag empty
        let children = self.dump_block(&mut tag.children, level + 1)?;
        let nested = !children.is_empty();

        // Inline content sits on the tag's line, or on its own line before
        // a nested block
        for part in inline.into_iter().filter(|part| !part.is_empty()) {
            if nested {
                html.push('\n');
                html.push_str(&self::indent(level + 1));
            }
            html.push_str(&part);
        }

        if nested {
            html.push('\n');
            html.push_str(&children);
            html.push('\n');
            html.push_str(&indent);
        }

        html.push_str(&format!("</{}>", tag.name));
        Ok(html)
    }

    /// ` key="value"` pairs in map order. `false` renders nothing, `true`
    /// renders `key="key"`, or a bare `key` in html5 mode.
    fn dump_attributes(&self, attributes: &Attributes) -> String {
        let mut html = String::new();

        for (key, value) in attributes {
            match value {
                AttrValue::Bool(false) => {}
                AttrValue::Bool(true) if self.html5 => html.push_str(&format!(" {key}")),
                AttrValue::Bool(true) => html.push_str(&format!(" {key}=\"{key}\"")),
                AttrValue::List(list) if list.is_empty() => {}
                AttrValue::List(list) => {
                    let value = self.attribute_value(&list.join(" "));
                    html.push_str(&format!(" {key}=\"{value}\""));
                }
                AttrValue::Str(value) => {
                    let value = self.attribute_value(value);
                    html.push_str(&format!(" {key}=\"{value}\""));
                }
            }
        }

        html
    }

    fn attribute_value(&self, value: &str) -> String {
        let escaped = html_escape::encode_double_quoted_attribute(value);
        replace_placeholders(&escaped, &self.dumper.options.host, true)
    }

    // =========================================================================
    // Text, code, comments, doctypes
    // =========================================================================

    fn dump_text(&self, text: &TextNode, level: usize) -> String {
        self.dump_lines(&text.lines, level, false)
    }

    /// Indented lines with placeholders replaced. `escaped` lines had their
    /// placeholder expressions HTML-escaped too, so those are decoded.
    fn dump_lines(&self, lines: &[String], level: usize, escaped: bool) -> String {
        if lines.is_empty() {
            return String::new();
        }

        let indent = indent(level);
        let joined = lines.join(&format!("\n{indent}"));
        format!(
            "{indent}{}",
            replace_placeholders(&joined, &self.dumper.options.host, escaped)
        )
    }

    fn dump_code(
        &mut self,
        code: &mut CodeNode,
        level: usize,
        next_closer: Option<&str>,
    ) -> Result<String, DumpError> {
        let dumper = self.dumper;
        let host = &dumper.options.host;
        let indent = indent(level);

        let Some(block) = &mut code.block else {
            let statement = code.code.trim_start_matches(' ');
            if code.buffered {
                return Ok(format!("{indent}{}", host.echo(statement)));
            }

            let mut html = format!("{indent}{}", host.statement(statement));
            // An empty last branch still owes the closer its chain deferred
            if let Some(construct) = dumper.options.construct(&code.code) {
                if construct.continues && next_closer != Some(construct.closer.as_str()) {
                    html.push_str(&format!("\n{indent}{}", host.closer(&construct.closer)));
                }
            }
            return Ok(html);
        };

        let (begin, end) = match dumper.options.construct(&code.code) {
            Some(construct) => {
                let begin = host.statement(code.code.trim_matches(' '));
                // The next branch of the chain emits the shared closer
                let end = if next_closer == Some(construct.closer.as_str()) {
                    String::new()
                } else {
                    format!("\n{indent}{}", host.closer(&construct.closer))
                };
                (begin, end)
            }
            None => (
                host.block_open(code.code.trim_start_matches(' '), code.buffered),
                format!("\n{indent}{}", host.block_close()),
            ),
        };

        let body = self.dump_block(&mut block.children, level + 1)?;
        Ok(format!("{indent}{begin}\n{body}{end}"))
    }

    fn dump_comment(
        &mut self,
        comment: &mut CommentNode,
        level: usize,
    ) -> Result<String, DumpError> {
        if !comment.buffered {
            return Ok(String::new());
        }

        let indent = indent(level);
        let Some(block) = &mut comment.block else {
            return Ok(format!("{indent}<!-- {} -->", comment.string));
        };

        let (begin, end, string) = if CONDITIONAL.is_match(&comment.string) {
            (
                format!("<!--{}>\n", comment.string),
                format!("\n{indent}<![endif]-->"),
                "",
            )
        } else {
            (
                "<!--\n".to_string(),
                format!("\n{indent}-->"),
                comment.string.as_str(),
            )
        };

        let mut html = format!("{indent}{begin}");
        if !string.is_empty() {
            html.push_str(&format!("{}{string}\n", self::indent(level + 1)));
        }
        html.push_str(&self.dump_block(&mut block.children, level + 1)?);
        html.push_str(&end);

        Ok(html)
    }

    fn dump_doctype(&mut self, doctype: &DoctypeNode) -> Result<String, DumpError> {
        let options = &self.dumper.options;
        let Some(declaration) = options.doctypes.get(&doctype.version) else {
            return Err(DumpError::UnknownDoctype {
                name: doctype.version.clone(),
                line: doctype.line,
            });
        };

        if options.is_html5(&doctype.version) {
            self.html5 = true;
        }

        Ok(declaration.clone())
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn dump_filter(&mut self, node: &mut FilterNode, level: usize) -> Result<String, DumpError> {
        let dumper = self.dumper;
        let Some(filter) = dumper.filters.get(&node.name) else {
            return Err(DumpError::UnregisteredFilter {
                name: node.name.clone(),
                line: node.line,
            });
        };

        match filter {
            Filter::Block(filter) => {
                let text = self.dump_node(&mut node.block, level + 1, None)?;
                Ok(filter.filter(&text, &node.attributes, level))
            }
            Filter::Text(filter) => match node.block.as_mut() {
                Node::Text(text) => {
                    for visitor in dumper.visitors(NodeKind::Text) {
                        visitor.visit_text(text);
                    }
                    let lines: Vec<_> = text.lines.iter().map(|l| filter.filter_text(l)).collect();
                    Ok(self.dump_lines(&lines, level, true))
                }
                block => {
                    let html = self.dump_node(block, level, None)?;
                    let lines: Vec<_> = html.lines().map(|l| filter.filter_text(l)).collect();
                    Ok(lines.join("\n"))
                }
            },
        }
    }
}
