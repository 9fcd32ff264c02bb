//! `re` module: regular expressions.

use regex::Regex;
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::{Heap, Value, ValueLike};

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("re", || build::freeze_namespace("re", re_members));
}

#[starlark_module]
fn re_members(builder: &mut GlobalsBuilder) {
    /// Whether `pattern` matches anywhere in `text`.
    fn matches(pattern: &str, text: &str) -> anyhow::Result<bool> {
        Ok(Regex::new(pattern)?.is_match(text))
    }

    /// The first match of `pattern` in `text`, or `None`.
    fn search<'v>(pattern: &str, text: &str, heap: &'v Heap) -> anyhow::Result<Value<'v>> {
        Ok(match Regex::new(pattern)?.find(text) {
            Some(m) => heap.alloc_str(m.as_str()).to_value(),
            None => Value::new_none().to_value(),
        })
    }

    fn findall(pattern: &str, text: &str) -> anyhow::Result<Vec<String>> {
        Ok(Regex::new(pattern)?
            .find_iter(text)
            .map(|m| m.as_str().to_owned())
            .collect())
    }

    /// Replaces every match; `$1`-style group references are expanded.
    fn sub(pattern: &str, repl: &str, text: &str) -> anyhow::Result<String> {
        Ok(Regex::new(pattern)?.replace_all(text, repl).into_owned())
    }

    fn split(pattern: &str, text: &str) -> anyhow::Result<Vec<String>> {
        Ok(Regex::new(pattern)?
            .split(text)
            .map(str::to_owned)
            .collect())
    }
}
