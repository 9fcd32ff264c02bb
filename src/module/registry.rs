//! Per-session registry of custom module loaders.

use std::collections::BTreeMap;

use super::loader::ModuleLoader;

/// Custom module loaders registered by the host, keyed by module name.
///
/// Registering a name twice keeps only the later loader. Names are visited in
/// sorted order.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    loaders: BTreeMap<String, ModuleLoader>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ModuleRegistry {
            loaders: BTreeMap::new(),
        }
    }

    /// Register a loader. Returns the loader it replaced, if any.
    pub fn register(&mut self, name: &str, loader: ModuleLoader) -> Option<ModuleLoader> {
        let previous = self.loaders.insert(name.to_owned(), loader);
        if previous.is_some() {
            log::debug!("custom module {} re-registered", name);
        }
        previous
    }

    /// Loaders in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleLoader)> {
        self.loaders.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
