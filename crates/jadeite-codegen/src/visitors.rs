//! Node visitors run by the dumper before a node is rendered.

use indexmap::IndexMap;
use jadeite_lexer::AttrValue;
use jadeite_parser::ast::{CodeNode, CommentNode, DoctypeNode, FilterNode, TagNode, TextNode};

/// Rewrites nodes in place before they are rendered.
///
/// A visitor is registered for one node kind; the dumper only calls the
/// method matching that kind. Every method defaults to doing nothing.
pub trait Visitor: Send + Sync {
    fn visit_tag(&self, _tag: &mut TagNode) {}
    fn visit_text(&self, _text: &mut TextNode) {}
    fn visit_code(&self, _code: &mut CodeNode) {}
    fn visit_comment(&self, _comment: &mut CommentNode) {}
    fn visit_doctype(&self, _doctype: &mut DoctypeNode) {}
    fn visit_filter(&self, _filter: &mut FilterNode) {}
}

#[derive(Debug, Clone)]
struct Autotag {
    tag: &'static str,
    attributes: Vec<(&'static str, &'static str)>,
}

const INPUT_TYPES: &[&str] = &[
    "button",
    "checkbox",
    "file",
    "hidden",
    "image",
    "password",
    "radio",
    "reset",
    "submit",
    "text",
    "search",
    "tel",
    "url",
    "email",
    "datetime",
    "date",
    "month",
    "week",
    "time",
    "number",
    "range",
    "color",
    "datetime-local",
];

/// Expands shorthand tag names: `input:text` becomes `input` with
/// `type="text"`, `link:css` a stylesheet link, and so on. The injected
/// attributes overwrite explicit ones of the same name.
#[derive(Debug, Clone)]
pub struct AutotagsVisitor {
    autotags: IndexMap<String, Autotag>,
}

impl Default for AutotagsVisitor {
    fn default() -> Self {
        let mut autotags = IndexMap::new();
        autotags.insert(
            "a:void".to_string(),
            Autotag {
                tag: "a",
                attributes: vec![("href", "javascript:void(0)")],
            },
        );
        autotags.insert(
            "form:post".to_string(),
            Autotag {
                tag: "form",
                attributes: vec![("method", "POST")],
            },
        );
        autotags.insert(
            "link:css".to_string(),
            Autotag {
                tag: "link",
                attributes: vec![("rel", "stylesheet"), ("type", "text/css")],
            },
        );
        autotags.insert(
            "script:js".to_string(),
            Autotag {
                tag: "script",
                attributes: vec![("type", "text/javascript")],
            },
        );
        for kind in INPUT_TYPES {
            autotags.insert(
                format!("input:{kind}"),
                Autotag {
                    tag: "input",
                    attributes: vec![("type", *kind)],
                },
            );
        }

        Self { autotags }
    }
}

impl AutotagsVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand names this visitor expands.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.autotags.keys().map(String::as_str)
    }
}

impl Visitor for AutotagsVisitor {
    fn visit_tag(&self, tag: &mut TagNode) {
        let Some(autotag) = self.autotags.get(&tag.name) else {
            return;
        };

        for (key, value) in &autotag.attributes {
            tag.set_attribute(key, AttrValue::from(*value));
        }
        tag.name = autotag.tag.to_string();
    }
}
