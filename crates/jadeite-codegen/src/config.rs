//! Static tables the dumper renders against.
//!
//! Every table can be replaced or extended from JSON; fields left out keep
//! their defaults.

use indexmap::IndexMap;
use jadeite_lexer::SELF_CLOSING;
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Dumper configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Doctype key (lowercase) to the declaration it renders as.
    pub doctypes: IndexMap<String, String>,
    /// Doctype keys that switch the dumper into html5 mode.
    pub html5_doctypes: Vec<String>,
    /// Tags rendered without a closing tag.
    pub self_closing: Vec<String>,
    /// Control constructs, tried in order.
    pub constructs: Vec<ControlConstruct>,
    /// How host-language statements are wrapped.
    pub host: HostSyntax,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            doctypes: default_doctypes(),
            html5_doctypes: vec!["5".to_string(), "html".to_string()],
            self_closing: SELF_CLOSING.iter().map(|s| s.to_string()).collect(),
            constructs: default_constructs(),
            host: HostSyntax::default(),
        }
    }
}

impl Options {
    pub fn is_self_closing(&self, tag: &str) -> bool {
        self.self_closing.iter().any(|name| name == tag)
    }

    pub fn is_html5(&self, doctype: &str) -> bool {
        self.html5_doctypes.iter().any(|key| key == doctype)
    }

    /// First construct whose pattern matches the statement.
    pub fn construct(&self, code: &str) -> Option<&ControlConstruct> {
        self.constructs.iter().find(|c| c.pattern.is_match(code))
    }
}

/// A statement that opens a block closed by a dedicated keyword,
/// such as `if (...):` closed by `endif`.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConstruct {
    #[serde(deserialize_with = "deserialize_pattern")]
    pub pattern: Regex,
    pub closer: String,
    /// Continues the chain of the construct before it (`else`, `elseif`).
    /// The preceding branch then leaves the shared closer to the last branch.
    #[serde(default)]
    pub continues: bool,
}

impl ControlConstruct {
    /// Build a construct from a pattern known to be valid.
    fn builtin(pattern: &str, closer: &str, continues: bool) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid built-in construct pattern"),
            closer: closer.to_string(),
            continues,
        }
    }
}

/// Host-language statement syntax. The defaults produce PHP:
/// `<?php stmt ?>`, `<?php echo expr ?>`, `<?php endif; ?>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostSyntax {
    pub open: String,
    pub close: String,
    pub echo: String,
    pub block_open: String,
    pub block_close: String,
    pub terminator: String,
}

impl Default for HostSyntax {
    fn default() -> Self {
        Self {
            open: "<?php ".to_string(),
            close: " ?>".to_string(),
            echo: "echo ".to_string(),
            block_open: " {".to_string(),
            block_close: "}".to_string(),
            terminator: ";".to_string(),
        }
    }
}

impl HostSyntax {
    /// A single statement: `<?php stmt ?>`.
    pub fn statement(&self, code: &str) -> String {
        format!("{}{}{}", self.open, code, self.close)
    }

    /// An output statement: `<?php echo expr ?>`.
    pub fn echo(&self, expr: &str) -> String {
        format!("{}{}{}{}", self.open, self.echo, expr, self.close)
    }

    /// The closing keyword of a control construct: `<?php endif; ?>`.
    pub fn closer(&self, keyword: &str) -> String {
        format!("{}{}{}{}", self.open, keyword, self.terminator, self.close)
    }

    /// A statement opening a braced block: `<?php stmt { ?>`.
    pub fn block_open(&self, code: &str, buffered: bool) -> String {
        let echo = if buffered { self.echo.as_str() } else { "" };
        format!(
            "{}{}{}{}{}",
            self.open, echo, code, self.block_open, self.close
        )
    }

    /// The end of a braced block: `<?php } ?>`.
    pub fn block_close(&self) -> String {
        format!("{}{}{}", self.open, self.block_close, self.close)
    }
}

fn default_doctypes() -> IndexMap<String, String> {
    let transitional = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#;

    [
        ("5", "<!DOCTYPE html>"),
        ("html", "<!DOCTYPE html>"),
        ("xml", r#"<?xml version="1.0" encoding="utf-8" ?>"#),
        ("default", transitional),
        ("transitional", transitional),
        (
            "strict",
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#,
        ),
        (
            "frameset",
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#,
        ),
        (
            "1.1",
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#,
        ),
        (
            "basic",
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#,
        ),
        (
            "mobile",
            r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#,
        ),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

fn default_constructs() -> Vec<ControlConstruct> {
    vec![
        ControlConstruct::builtin(r"^ *if[ (]+.*: *$", "endif", false),
        ControlConstruct::builtin(r"^ *else *: *$", "endif", true),
        ControlConstruct::builtin(r"^ *else *if[ (]+.*: *$", "endif", true),
        ControlConstruct::builtin(r"^ *while *.*: *$", "endwhile", false),
        ControlConstruct::builtin(r"^ *for[ (]+.*: *$", "endfor", false),
        ControlConstruct::builtin(r"^ *foreach[ (]+.*: *$", "endforeach", false),
        ControlConstruct::builtin(r"^ *switch[ (]+.*: *$", "endswitch", false),
        ControlConstruct::builtin(r"^ *case *.* *: *$", "break", false),
    ]
}

fn deserialize_pattern<'de, D>(deserializer: D) -> Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = String::deserialize(deserializer)?;
    Regex::new(&pattern).map_err(serde::de::Error::custom)
}
