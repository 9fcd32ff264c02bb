//! Builders turning host data, native functions and scripts into frozen
//! Starlark modules.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::anyhow;
use starlark::environment::{FrozenModule, Globals, GlobalsBuilder, LibraryExtension, Module};
use starlark::eval::{Evaluator, FileLoader};
use starlark::syntax::{AstModule, Dialect};
use starlark::values::structs::AllocStruct;
use starlark::values::{OwnedFrozenValue, Value};
use starlark::PrintHandler;

use super::memory::Memory;
use super::value;
use crate::StringAnyMap;

/// Host-provided global functions, registered on every script's globals.
pub type Builtins = fn(&mut GlobalsBuilder);

/// Flattens any Starlark-side error into an `anyhow` error.
pub(crate) fn into_anyhow(err: impl fmt::Display) -> anyhow::Error {
    anyhow!("{}", err)
}

/// The dialect scripts are parsed with.
pub fn dialect() -> Dialect {
    let mut dialect = Dialect::Extended;
    dialect.enable_f_strings = true;
    dialect
}

/// Globals of every script: the Starlark standard library, its struct,
/// record and enum extensions, and the host builtins.
pub fn standard_globals(builtins: &[Builtins]) -> Globals {
    let mut builder = GlobalsBuilder::extended_by(&[
        LibraryExtension::StructType,
        LibraryExtension::RecordType,
        LibraryExtension::EnumType,
        LibraryExtension::Print,
        LibraryExtension::Debug,
        LibraryExtension::Partial,
    ]);
    for add in builtins {
        add(&mut builder);
    }
    builder.build()
}

pub(crate) fn freeze(module: Module) -> anyhow::Result<FrozenModule> {
    module.freeze().map_err(anyhow::Error::from)
}

/// Binds every public global of `source` in `module` as a public global.
///
/// Returns the bound names with their values.
pub(crate) fn bind_public(
    module: &Module,
    source: &FrozenModule,
) -> anyhow::Result<Vec<(String, OwnedFrozenValue)>> {
    let mut bound = Vec::new();
    for name in source.names() {
        if let Some(value) = source.get_option(name.as_str())? {
            module.set(name.as_str(), value.owned_value(module.frozen_heap()));
            bound.push((name.as_str().to_owned(), value));
        }
    }
    Ok(bound)
}

/// Binds every entry of `values` at the top level of a new module.
pub fn freeze_values(values: &StringAnyMap) -> anyhow::Result<FrozenModule> {
    freeze_host_globals(values, &BTreeMap::new())
}

/// Binds host values and collective memories at the top level of a new
/// module. A memory shadows a value of the same name.
pub fn freeze_host_globals(
    values: &StringAnyMap,
    memories: &BTreeMap<String, Memory>,
) -> anyhow::Result<FrozenModule> {
    let module = Module::new();
    for (name, host) in values {
        let value = value::to_starlark(module.heap(), host);
        module.set(name, value);
    }
    for (name, memory) in memories {
        module.set(name, module.heap().alloc(memory.clone()));
    }
    freeze(module)
}

/// Binds a struct named `name` whose fields are `values`.
pub fn freeze_struct(name: &str, values: &StringAnyMap) -> anyhow::Result<FrozenModule> {
    let module = Module::new();
    {
        let heap = module.heap();
        let fields: Vec<(String, Value)> = values
            .iter()
            .map(|(k, v)| (k.clone(), value::to_starlark(heap, v)))
            .collect();
        module.set(name, heap.alloc(AllocStruct(fields)));
    }
    freeze(module)
}

/// Binds the native functions of `members` under the namespace `name`.
pub fn freeze_namespace(name: &str, members: Builtins) -> anyhow::Result<FrozenModule> {
    let globals = GlobalsBuilder::new().with_namespace(name, members).build();
    bind_from_globals(&globals, &[name])
}

/// Binds the listed native functions of `members` at the top level.
pub fn freeze_top_level(members: Builtins, names: &[&str]) -> anyhow::Result<FrozenModule> {
    let globals = GlobalsBuilder::new().with(members).build();
    bind_from_globals(&globals, names)
}

/// Binds the namespace `name` defined by a Starlark library extension.
pub fn freeze_extension(name: &str, extension: LibraryExtension) -> anyhow::Result<FrozenModule> {
    let globals = GlobalsBuilder::extended_by(&[extension]).build();
    bind_from_globals(&globals, &[name])
}

/// Looks each name up in `globals` and binds the result in a new module.
fn bind_from_globals(globals: &Globals, names: &[&str]) -> anyhow::Result<FrozenModule> {
    let module = Module::new();
    {
        let mut eval = Evaluator::new(&module);
        for name in names {
            let ast = AstModule::parse("<builtin>", (*name).to_owned(), &Dialect::Standard)
                .map_err(into_anyhow)?;
            let value = eval.eval_module(ast, globals).map_err(into_anyhow)?;
            module.set(name, value);
        }
    }
    freeze(module)
}

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "load", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

fn is_bindable(attr: &str) -> bool {
    let mut chars = attr.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    head_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !attr.starts_with('_')
        && !KEYWORDS.contains(&attr)
}

/// Lifts the members of the value bound to `name` to the top level of
/// `module`, so `load(name, "member")` reaches them. Names the module
/// already binds are kept as they are.
pub(crate) fn expand_members(name: &str, module: FrozenModule) -> anyhow::Result<FrozenModule> {
    let members = match module.get_option(name) {
        Ok(Some(value)) => value.value().dir_attr(),
        _ => return Ok(module),
    };
    let bound: Vec<String> = module.names().map(|n| n.as_str().to_owned()).collect();
    let lifted: Vec<String> = members
        .into_iter()
        .filter(|attr| attr != name && is_bindable(attr) && !bound.contains(attr))
        .collect();
    if lifted.is_empty() {
        return Ok(module);
    }

    let source: String = lifted
        .iter()
        .map(|attr| format!("{attr} = {name}.{attr}\n"))
        .collect();
    let expanded = Module::new();
    bind_public(&expanded, &module)?;
    {
        let ast = AstModule::parse("<members>", source, &Dialect::Standard).map_err(into_anyhow)?;
        let mut eval = Evaluator::new(&expanded);
        eval.eval_module(ast, &Globals::standard()).map_err(into_anyhow)?;
    }
    freeze(expanded)
}

/// Evaluates `source` into a new frozen module.
pub(crate) fn eval_script_module(
    name: &str,
    source: &str,
    globals: &Globals,
    loader: Option<&dyn FileLoader>,
    printer: Option<&dyn PrintHandler>,
) -> anyhow::Result<FrozenModule> {
    let ast = AstModule::parse(name, source.to_owned(), &dialect()).map_err(into_anyhow)?;
    let module = Module::new();
    {
        let mut eval = Evaluator::new(&module);
        if let Some(loader) = loader {
            eval.set_loader(loader);
        }
        if let Some(printer) = printer {
            eval.set_print_handler(printer);
        }
        eval.eval_module(ast, globals).map_err(into_anyhow)?;
    }
    freeze(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use starlark::starlark_module;

    #[starlark_module]
    fn greeting_members(builder: &mut GlobalsBuilder) {
        fn hello(name: &str) -> anyhow::Result<String> {
            Ok(format!("hello, {}", name))
        }
    }

    fn script_module(name: &str, source: &str) -> anyhow::Result<FrozenModule> {
        eval_script_module(name, source, &standard_globals(&[]), None, None)
    }

    #[test]
    fn test_struct_fields() {
        let values = json!({"shift": 2, "num": 10}).as_object().cloned().unwrap();
        let module = freeze_struct("data", &values).unwrap();
        let data = module.get_option("data").unwrap().unwrap();
        assert_eq!(data.value().get_type(), "struct");
    }

    #[test]
    fn test_namespace_is_callable_from_script() {
        let lib = freeze_namespace("greet", greeting_members).unwrap();
        let module = Module::new();
        module.import_public_symbols(&lib);
        let ast = AstModule::parse("t.star", "out = greet.hello('box')".to_owned(), &dialect())
            .unwrap();
        {
            let mut eval = Evaluator::new(&module);
            eval.eval_module(ast, &standard_globals(&[])).unwrap();
        }
        assert_eq!(module.get("out").unwrap().unpack_str(), Some("hello, box"));
    }

    #[test]
    fn test_script_module_exports_globals() {
        let module = script_module("lib.star", "def twice(x):\n    return x * 2\nv = twice(21)\n")
            .unwrap();
        let v = module.get_option("v").unwrap().unwrap();
        assert_eq!(v.value().unpack_i32(), Some(42));
    }

    #[test]
    fn test_bind_public_keeps_values_exported() {
        let values = json!({"num": 1, "word": "hi"}).as_object().cloned().unwrap();
        let source = freeze_values(&values).unwrap();
        let module = Module::new();
        let bound = bind_public(&module, &source).unwrap();
        assert_eq!(bound.len(), 2);

        let frozen = freeze(module).unwrap();
        let word = frozen.get_option("word").unwrap().unwrap();
        let (_, original) = bound.iter().find(|(name, _)| name == "word").unwrap();
        assert!(word.value().ptr_eq(original.value()));
    }

    #[test]
    fn test_expand_members_lifts_namespace_functions() {
        let lib = expand_members("greet", freeze_namespace("greet", greeting_members).unwrap())
            .unwrap();
        let hello = lib.get_option("hello").unwrap();
        assert!(hello.is_some());
        assert!(lib.get_option("greet").unwrap().is_some());
    }

    #[test]
    fn test_expand_members_leaves_plain_modules() {
        let values = json!({"num": 1}).as_object().cloned().unwrap();
        let lib = expand_members("data", freeze_values(&values).unwrap()).unwrap();
        let names: Vec<String> = lib.names().map(|n| n.as_str().to_owned()).collect();
        assert_eq!(names, vec!["num".to_owned()]);
    }

    #[test]
    fn test_script_module_reports_errors() {
        let err = script_module("bad.star", "v = 1 +").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
