//! `string` module: text helpers beyond the built-in string methods.

use anyhow::anyhow;
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("string", || build::freeze_namespace("string", string_members));
}

const HTML_ESCAPES: &[(&str, &str)] = &[
    ("&", "&amp;"),
    ("<", "&lt;"),
    (">", "&gt;"),
    ("\"", "&#34;"),
    ("'", "&#39;"),
];

fn escape_html(s: &str) -> String {
    HTML_ESCAPES
        .iter()
        .fold(s.to_owned(), |acc, (from, to)| acc.replace(from, to))
}

fn unescape_html(s: &str) -> String {
    HTML_ESCAPES
        .iter()
        .rev()
        .fold(s.to_owned(), |acc, (to, from)| acc.replace(from, to))
}

fn unquote_str(s: &str) -> anyhow::Result<String> {
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if !quoted {
        return Err(anyhow!("not a quoted string: {}", s));
    }
    let inner = &s[1..s.len() - 1];
    Ok(serde_json::from_str(&format!("\"{}\"", inner.replace("\\'", "'")))?)
}

#[starlark_module]
fn string_members(builder: &mut GlobalsBuilder) {
    /// Number of characters, not bytes.
    fn length(s: &str) -> anyhow::Result<i32> {
        Ok(s.chars().count() as i32)
    }

    fn reverse(s: &str) -> anyhow::Result<String> {
        Ok(s.chars().rev().collect())
    }

    fn escape(s: &str) -> anyhow::Result<String> {
        Ok(escape_html(s))
    }

    fn unescape(s: &str) -> anyhow::Result<String> {
        Ok(unescape_html(s))
    }

    /// Wraps `s` in double quotes, escaping as needed.
    fn quote(s: &str) -> anyhow::Result<String> {
        Ok(serde_json::to_string(s)?)
    }

    fn unquote(s: &str) -> anyhow::Result<String> {
        unquote_str(s)
    }
}
