//! Named filters applied to `:name` blocks.
//!
//! A filter is either a [`BlockFilter`], which wraps the already rendered
//! block, or a [`TextFilter`], which rewrites the block line by line.

use std::borrow::Cow;
use std::sync::LazyLock;

use jadeite_lexer::Attributes;
use regex::Regex;

use crate::config::HostSyntax;

/// `{{expr}}` output placeholders.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("valid placeholder pattern"));

/// Transforms a rendered block.
///
/// `text` is the block rendered one level deeper than the filter, `depth` is
/// the filter's own nesting level.
pub trait BlockFilter: Send + Sync {
    fn filter(&self, text: &str, attributes: &Attributes, depth: usize) -> String;
}

/// Transforms each raw text line of a block.
pub trait TextFilter: Send + Sync {
    fn filter_text(&self, line: &str) -> String;
}

impl<F> BlockFilter for F
where
    F: Fn(&str, &Attributes, usize) -> String + Send + Sync,
{
    fn filter(&self, text: &str, attributes: &Attributes, depth: usize) -> String {
        self(text, attributes, depth)
    }
}

impl<F> TextFilter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn filter_text(&self, line: &str) -> String {
        self(line)
    }
}

/// A registered filter, tagged with the capability the dumper dispatches on.
pub enum Filter {
    Block(Box<dyn BlockFilter>),
    Text(Box<dyn TextFilter>),
}

impl Filter {
    pub fn block(filter: impl BlockFilter + 'static) -> Self {
        Filter::Block(Box::new(filter))
    }

    pub fn text(filter: impl TextFilter + 'static) -> Self {
        Filter::Text(Box::new(filter))
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Block(_) => f.write_str("Filter::Block"),
            Filter::Text(_) => f.write_str("Filter::Text"),
        }
    }
}

/// The built-in filters under their default names.
pub fn builtins(host: &HostSyntax) -> Vec<(&'static str, Filter)> {
    vec![
        ("cdata", Filter::block(CdataFilter)),
        ("javascript", Filter::block(JavaScriptFilter)),
        ("style", Filter::block(CssFilter)),
        ("css", Filter::block(CssFilter)),
        ("php", Filter::block(HostFilter::from_syntax(host))),
        ("escape", Filter::text(EscapeFilter)),
    ]
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// `<![CDATA[` … `]]>`
pub struct CdataFilter;

impl BlockFilter for CdataFilter {
    fn filter(&self, text: &str, _attributes: &Attributes, depth: usize) -> String {
        let indent = indent(depth);
        format!("{indent}<![CDATA[\n{text}\n{indent}]]>")
    }
}

/// Wraps the block in a script tag. With a truthy `cdata` attribute the body
/// is also wrapped in a commented-out CDATA section.
pub struct JavaScriptFilter;

impl BlockFilter for JavaScriptFilter {
    fn filter(&self, text: &str, attributes: &Attributes, depth: usize) -> String {
        let indent = indent(depth);
        let cdata = matches!(
            attributes.get("cdata"),
            Some(jadeite_lexer::AttrValue::Bool(true) | jadeite_lexer::AttrValue::Str(_))
        );

        let body: Cow<'_, str> = if cdata {
            Cow::Owned(format!("{indent}//<![CDATA[\n{text}\n{indent}//]]>"))
        } else {
            Cow::Borrowed(text)
        };

        format!("{indent}<script type=\"text/javascript\">\n{body}\n{indent}</script>")
    }
}

/// Wraps the block in a style tag.
pub struct CssFilter;

impl BlockFilter for CssFilter {
    fn filter(&self, text: &str, _attributes: &Attributes, depth: usize) -> String {
        let indent = indent(depth);
        format!("{indent}<style type=\"text/css\">\n{text}\n{indent}</style>")
    }
}

/// Passes the block through as literal host code inside one statement block.
pub struct HostFilter {
    open: String,
    close: String,
}

impl HostFilter {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    pub fn from_syntax(host: &HostSyntax) -> Self {
        Self::new(host.open.trim_end(), host.close.trim_start())
    }
}

impl BlockFilter for HostFilter {
    fn filter(&self, text: &str, _attributes: &Attributes, depth: usize) -> String {
        let indent = indent(depth);
        format!("{indent}{}\n{text}\n{indent}{}", self.open, self.close)
    }
}

/// HTML-escapes every line.
pub struct EscapeFilter;

impl TextFilter for EscapeFilter {
    fn filter_text(&self, line: &str) -> String {
        html_escape::encode_text(line).into_owned()
    }
}

/// Replace every `{{expr}}` with an output statement. Attribute values are
/// already HTML-escaped, so their expressions are entity-decoded first.
pub fn replace_placeholders(text: &str, host: &HostSyntax, decode: bool) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let expr = &caps[1];
            if decode {
                host.echo(&html_escape::decode_html_entities(expr))
            } else {
                host.echo(expr)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jadeite_lexer::AttrValue;
    use pretty_assertions::assert_eq;

    fn no_attrs() -> Attributes {
        Attributes::new()
    }

    // =========================================================================
    // Block filters
    // =========================================================================

    #[test]
    fn test_cdata() {
        assert_eq!(
            CdataFilter.filter("  foo\n  bar", &no_attrs(), 0),
            "<![CDATA[\n  foo\n  bar\n]]>"
        );
        assert_eq!(
            CdataFilter.filter("      foo", &no_attrs(), 2),
            "    <![CDATA[\n      foo\n    ]]>"
        );
    }

    #[test]
    fn test_javascript() {
        assert_eq!(
            JavaScriptFilter.filter("  alert('foo')", &no_attrs(), 0),
            "<script type=\"text/javascript\">\n  alert('foo')\n</script>"
        );
    }

    #[test]
    fn test_javascript_cdata() {
        let mut attrs = no_attrs();
        attrs.insert("cdata".into(), AttrValue::Bool(true));
        assert_eq!(
            JavaScriptFilter.filter("    alert('foo')", &attrs, 1),
            "  <script type=\"text/javascript\">\n  //<![CDATA[\n    alert('foo')\n  //]]>\n  </script>"
        );
    }

    #[test]
    fn test_css() {
        assert_eq!(
            CssFilter.filter("  body {color:#000;}", &no_attrs(), 0),
            "<style type=\"text/css\">\n  body {color:#000;}\n</style>"
        );
    }

    #[test]
    fn test_host_passthrough() {
        let filter = HostFilter::from_syntax(&HostSyntax::default());
        assert_eq!(
            filter.filter("  $bar = 10;\n  echo $bar;", &no_attrs(), 0),
            "<?php\n  $bar = 10;\n  echo $bar;\n?>"
        );
    }

    #[test]
    fn test_closure_block_filter() {
        let filter = Filter::block(|text: &str, _: &Attributes, depth: usize| {
            format!("{}<pre>\n{text}\n</pre>", indent(depth))
        });
        let Filter::Block(filter) = filter else {
            panic!("Expected block filter");
        };
        assert_eq!(filter.filter("x", &no_attrs(), 1), "  <pre>\nx\n</pre>");
    }

    // =========================================================================
    // Text filters
    // =========================================================================

    #[test]
    fn test_escape() {
        assert_eq!(EscapeFilter.filter_text("<b>a & b</b>"), "&lt;b&gt;a &amp; b&lt;/b&gt;");
    }

    #[test]
    fn test_closure_text_filter() {
        let Filter::Text(filter) = Filter::text(|line: &str| line.to_uppercase()) else {
            panic!("Expected text filter");
        };
        assert_eq!(filter.filter_text("shout"), "SHOUT");
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    #[test]
    fn test_placeholders_in_text() {
        let host = HostSyntax::default();
        assert_eq!(
            replace_placeholders("var name = \"{{$name}}\";", &host, false),
            "var name = \"<?php echo $name ?>\";"
        );
        assert_eq!(
            replace_placeholders("{{$a}} and {{$b}}", &host, false),
            "<?php echo $a ?> and <?php echo $b ?>"
        );
    }

    #[test]
    fn test_placeholders_decoded_in_attributes() {
        let host = HostSyntax::default();
        assert_eq!(
            replace_placeholders("{{$name || &quot;&lt;default /&gt;&quot;}}", &host, true),
            "<?php echo $name || \"<default />\" ?>"
        );
    }

    #[test]
    fn test_text_without_placeholders_unchanged() {
        let host = HostSyntax::default();
        assert_eq!(replace_placeholders("{ not one }", &host, false), "{ not one }");
    }
}
