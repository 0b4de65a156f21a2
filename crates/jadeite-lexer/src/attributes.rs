//! Attribute-group scanning.
//!
//! An attribute group is isolated with a quote-aware, nesting-aware
//! parenthesis scan, split into `key: value` pairs on commas that sit outside
//! quotes and are followed by something that looks like the next key, and
//! each pair is split on its first unquoted `:` or `=`.
//!
//! The split is a heuristic: an unquoted value (such as a `{{expr}}`
//! placeholder) that contains `, word:` is still cut in two.

use std::sync::LazyLock;

use regex::Regex;

use crate::token::{AttrValue, Attributes};

/// What has to follow a comma for it to start a new pair:
/// a (possibly quoted) key and a separator, or a bare key ending the group.
static NEXT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^ *(?:['"\w-]+ *[:=]|[\w-]+ *$)"#).expect("valid next-key pattern")
});

/// Byte index of the `)` that closes the group opened by the `(` at the
/// start of `input`. Parentheses inside single or double quotes are ignored.
/// Returns `None` when the line ends before the group is closed.
pub fn closing_paren(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut single = false;
    let mut double = false;

    for (i, ch) in input.char_indices() {
        match ch {
            '\n' => return None,
            '"' if !single => double = !double,
            '\'' if !double => single = !single,
            '(' if !single && !double => depth += 1,
            ')' if !single && !double => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the text between the parentheses of an attribute group.
pub fn parse(raw: &str) -> Attributes {
    let mut attributes = Attributes::new();

    for pair in split_pairs(raw) {
        let pair = pair.trim_matches(' ');
        if pair.is_empty() {
            continue;
        }
        let (key, value) = parse_pair(pair);
        attributes.insert(key, value);
    }

    attributes
}

/// Split an attribute group into raw pairs.
fn split_pairs(raw: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut single = false;
    let mut double = false;

    for (i, ch) in raw.char_indices() {
        match ch {
            '"' if !single => double = !double,
            '\'' if !double => single = !single,
            ',' if !single && !double && NEXT_KEY.is_match(&raw[i + 1..]) => {
                pairs.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs.push(&raw[start..]);

    pairs
}

/// Split one pair on its first unquoted separator.
/// A pair without a separator is a presence-only attribute.
fn parse_pair(pair: &str) -> (String, AttrValue) {
    match separator(pair) {
        Some(at) => {
            let key = unquote(&pair[..at]);
            let value = unquote(&pair[at + 1..]);
            (key.to_string(), AttrValue::from_literal(value))
        }
        None => (unquote(pair).to_string(), AttrValue::Bool(true)),
    }
}

/// Byte index of the first `:` or `=` outside quotes.
fn separator(pair: &str) -> Option<usize> {
    let mut single = false;
    let mut double = false;

    for (i, ch) in pair.char_indices() {
        match ch {
            '"' if !single => double = !double,
            '\'' if !double => single = !single,
            ':' | '=' if !single && !double => return Some(i),
            _ => {}
        }
    }

    None
}

/// Trim surrounding spaces, then one leading and one trailing quote.
fn unquote(text: &str) -> &str {
    let is_quote = |c: char| c == '\'' || c == '"';
    let text = text.trim_matches(' ');
    let text = text.strip_prefix(is_quote).unwrap_or(text);
    text.strip_suffix(is_quote).unwrap_or(text)
}
