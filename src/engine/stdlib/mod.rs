//! Built-in script modules.
//!
//! Every module registers a factory with the [`BuiltinRegistry`]. The registry
//! is built once and enumerates its modules in registration order.

pub mod codec;
pub mod file;
pub mod hashing;
pub mod idiomatic;
pub mod json;
pub mod logging;
pub mod math;
pub mod net;
pub mod path;
pub mod random;
pub mod re;
pub mod runtime;
pub mod string;
pub mod time;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use starlark::environment::FrozenModule;
use starlark::values::Value;

use crate::engine::context;
use crate::error::{Error, Result};
use crate::module::{LazyloadMap, ModuleLoader, PreloadList};

/// Builds a fresh frozen module.
pub type ModuleFactory = fn() -> anyhow::Result<FrozenModule>;

/// Registry of built-in module factories.
pub struct BuiltinRegistry {
    factories: Vec<(&'static str, ModuleFactory)>,
}

impl BuiltinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltinRegistry {
            factories: Vec::new(),
        }
    }

    /// Register a factory. A later registration under the same name
    /// replaces the earlier one in place.
    pub fn register(&mut self, name: &'static str, factory: ModuleFactory) {
        match self.factories.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name, factory)),
        }
    }

    pub fn factory(&self, name: &str) -> Option<ModuleFactory> {
        self.factories
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| *factory)
    }

    /// Module names in registration order.
    pub fn module_names(&self) -> Vec<String> {
        self.factories.iter().map(|(n, _)| n.to_string()).collect()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        BuiltinRegistry::new()
    }
}

/// Register every built-in module.
pub fn register_builtin_modules(registry: &mut BuiltinRegistry) {
    codec::register(registry);
    file::register(registry);
    hashing::register(registry);
    net::register(registry);
    idiomatic::register(registry);
    json::register(registry);
    logging::register(registry);
    math::register(registry);
    path::register(registry);
    random::register(registry);
    re::register(registry);
    runtime::register(registry);
    string::register(registry);
    time::register(registry);
}

lazy_static! {
    static ref BUILTINS: BuiltinRegistry = {
        let mut registry = BuiltinRegistry::new();
        register_builtin_modules(&mut registry);
        registry
    };
}

/// Names of all built-in modules.
pub fn builtin_module_names() -> Vec<String> {
    BUILTINS.module_names()
}

/// A loader for the named built-in module.
pub fn builtin_loader(name: &str) -> Option<ModuleLoader> {
    BUILTINS.factory(name).map(ModuleLoader::new)
}

/// One loader per name, in the order given.
fn builtin_loaders(names: &[String]) -> Result<Vec<(String, ModuleLoader)>> {
    names
        .iter()
        .map(|name| {
            builtin_loader(name)
                .map(|loader| (name.clone(), loader))
                .ok_or_else(|| Error::UnknownBuiltin(name.clone()))
        })
        .collect()
}

/// Loaders of the named built-ins, to be preloaded in the order given.
pub fn builtin_preload_list(names: &[String]) -> Result<PreloadList> {
    let mut list = PreloadList::new();
    for (_, loader) in builtin_loaders(names)? {
        list.push(loader);
    }
    Ok(list)
}

/// Loaders of the named built-ins, keyed for `load()`.
pub fn builtin_lazyload_map(names: &[String]) -> Result<LazyloadMap> {
    let mut map = LazyloadMap::new();
    for (name, loader) in builtin_loaders(names)? {
        map.insert(name, loader);
    }
    Ok(map)
}

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Sleeps for `seconds`, waking early with an error when the evaluation's
/// context is done.
pub(crate) fn interruptible_sleep(seconds: f64) -> anyhow::Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(anyhow!("invalid sleep duration: {}", seconds));
    }
    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    loop {
        if context::current_is_done() {
            return Err(anyhow!("sleep interrupted: execution cancelled"));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Reads an int or float argument as `f64`.
pub(crate) fn unpack_number(value: Value) -> anyhow::Result<f64> {
    if let Some(i) = value.unpack_i32() {
        return Ok(i as f64);
    }
    match value.get_type() {
        "int" | "float" => value
            .to_str()
            .parse::<f64>()
            .map_err(|_| anyhow!("cannot convert {} to a number", value.to_str())),
        other => Err(anyhow!("expected int or float, got {}", other)),
    }
}
