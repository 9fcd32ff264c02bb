//! Deferred module loaders and the two collections they are materialized in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use starlark::environment::{FrozenModule, GlobalsBuilder};

use crate::engine::build;
use crate::StringAnyMap;

type LoadFn = dyn Fn() -> anyhow::Result<FrozenModule> + Send + Sync;

/// A zero-argument capability that produces a frozen Starlark module.
///
/// Loaders are shared by reference counting and never change after they are
/// created, so cloning one is cheap and all clones produce the same module.
#[derive(Clone)]
pub struct ModuleLoader {
    load: Arc<LoadFn>,
}

impl ModuleLoader {
    pub fn new<F>(load: F) -> Self
    where
        F: Fn() -> anyhow::Result<FrozenModule> + Send + Sync + 'static,
    {
        ModuleLoader {
            load: Arc::new(load),
        }
    }

    /// Runs the loader.
    pub fn load(&self) -> anyhow::Result<FrozenModule> {
        (self.load)()
    }

    /// Wraps the loader so the first successful result is reused by every
    /// later call. Failures are not cached.
    pub fn memoized(self) -> Self {
        let cache: Arc<Mutex<Option<FrozenModule>>> = Arc::new(Mutex::new(None));
        ModuleLoader::new(move || {
            let mut cached = cache.lock();
            if let Some(module) = cached.as_ref() {
                return Ok(module.clone());
            }
            let module = self.load()?;
            *cached = Some(module.clone());
            Ok(module)
        })
    }

    /// Exposes every entry of `values` as a top-level binding.
    pub fn from_values(values: StringAnyMap) -> Self {
        ModuleLoader::new(move || build::freeze_values(&values))
    }

    /// Exposes `values` as the fields of a struct bound to `name`.
    pub fn from_struct(name: &str, values: StringAnyMap) -> Self {
        let name = name.to_owned();
        ModuleLoader::new(move || build::freeze_struct(&name, &values))
    }

    /// Exposes the native functions registered by `members` under the
    /// namespace `name`.
    pub fn from_functions(name: &str, members: fn(&mut GlobalsBuilder)) -> Self {
        let name = name.to_owned();
        ModuleLoader::new(move || build::freeze_namespace(&name, members))
    }

    /// Whether both loaders are clones of the same capability.
    pub fn same(&self, other: &ModuleLoader) -> bool {
        Arc::ptr_eq(&self.load, &other.load)
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleLoader({:p})", Arc::as_ptr(&self.load))
    }
}

/// Loaders run eagerly, in order, while a script module is prepared.
#[derive(Debug, Clone, Default)]
pub struct PreloadList(Vec<ModuleLoader>);

impl PreloadList {
    pub fn new() -> Self {
        PreloadList(Vec::new())
    }

    pub fn push(&mut self, loader: ModuleLoader) {
        self.0.push(loader);
    }

    /// Appends all loaders of `other`, keeping their order.
    pub fn append(&mut self, other: PreloadList) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModuleLoader> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a PreloadList {
    type Item = &'a ModuleLoader;
    type IntoIter = std::slice::Iter<'a, ModuleLoader>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Loaders run on demand by `load("name", ...)`, keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct LazyloadMap(BTreeMap<String, ModuleLoader>);

impl LazyloadMap {
    pub fn new() -> Self {
        LazyloadMap(BTreeMap::new())
    }

    /// Inserts a loader; an existing entry with the same name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, loader: ModuleLoader) {
        self.0.insert(name.into(), loader);
    }

    /// Moves every entry of `other` into this map, replacing collisions.
    pub fn merge(&mut self, other: LazyloadMap) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&ModuleLoader> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Module names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleLoader)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
