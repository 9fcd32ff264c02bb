//! Module resolution: merges the built-in, custom and dynamic module sources
//! into one preload list and one lazyload map.
//!
//! Sources are queried in a fixed priority order. Each one sees the names
//! already claimed by the sources before it and only contributes names that
//! are still free, so the first source that claims a name wins.

use std::collections::HashSet;
use std::sync::Arc;

use super::loader::{LazyloadMap, ModuleLoader, PreloadList};
use super::registry::ModuleRegistry;
use super::set::{full_module_names, module_set, ModuleSetName};
use crate::engine::stdlib;
use crate::error::{Error, Result};
use crate::strings;

/// Host callback resolving a module name on demand.
///
/// `Ok(None)` means the callback does not know the module.
pub type DynamicModuleLoader =
    Arc<dyn Fn(&str) -> anyhow::Result<Option<ModuleLoader>> + Send + Sync>;

/// Everything the resolver reads from a session's configuration.
#[derive(Clone, Copy)]
pub struct ModuleSources<'a> {
    pub set: &'a ModuleSetName,
    pub named: &'a [String],
    pub custom: &'a ModuleRegistry,
    pub dynamic: Option<&'a DynamicModuleLoader>,
}

/// Output of a resolution pass.
///
/// `preload` and `lazyload` hold the same loaders. `names` lists every module
/// name exactly once.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub preload: PreloadList,
    pub lazyload: LazyloadMap,
    pub names: Vec<String>,
}

impl Resolution {
    fn add(&mut self, name: &str, loader: ModuleLoader) {
        self.preload.push(loader.clone());
        self.lazyload.insert(name, loader);
        self.names.push(name.to_owned());
    }

    fn merge(&mut self, other: Resolution) {
        self.preload.append(other.preload);
        self.lazyload.merge(other.lazyload);
        self.names.extend(other.names);
    }
}

/// One source of modules in the resolution chain.
pub trait ModuleSource {
    /// Contribute loaders for names not present in `claimed`.
    fn collect(&self, claimed: &HashSet<String>) -> Result<Resolution>;

    /// Human-readable name for this source (for logging).
    fn name(&self) -> &str;
}

/// Built-in modules: the selected set plus explicitly named built-ins.
pub struct BuiltinSource<'a> {
    set: &'a ModuleSetName,
    named: &'a [String],
}

impl<'a> BuiltinSource<'a> {
    pub fn new(set: &'a ModuleSetName, named: &'a [String]) -> Self {
        BuiltinSource { set, named }
    }

    /// Names this source provides, in materialization order.
    pub fn module_names(&self) -> Result<Vec<String>> {
        let base = module_set(self.set)?;
        let requested = strings::intersect(full_module_names(), self.named);
        Ok(strings::union_ordered(&base, &requested))
    }
}

impl ModuleSource for BuiltinSource<'_> {
    fn collect(&self, _claimed: &HashSet<String>) -> Result<Resolution> {
        let names = self.module_names()?;
        Ok(Resolution {
            preload: stdlib::builtin_preload_list(&names)?,
            lazyload: stdlib::builtin_lazyload_map(&names)?,
            names,
        })
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

/// Custom loaders registered on the session.
pub struct CustomSource<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> CustomSource<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        CustomSource { registry }
    }
}

impl ModuleSource for CustomSource<'_> {
    fn collect(&self, claimed: &HashSet<String>) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for (name, loader) in self.registry.iter() {
            if claimed.contains(name) {
                log::warn!("custom module {} is shadowed by a built-in module", name);
                continue;
            }
            resolution.add(name, loader.clone());
        }
        Ok(resolution)
    }

    fn name(&self) -> &str {
        "custom"
    }
}

/// Explicitly named modules nobody else provides, asked of the host callback.
pub struct DynamicSource<'a> {
    named: &'a [String],
    resolver: Option<&'a DynamicModuleLoader>,
}

impl<'a> DynamicSource<'a> {
    pub fn new(named: &'a [String], resolver: Option<&'a DynamicModuleLoader>) -> Self {
        DynamicSource { named, resolver }
    }
}

impl ModuleSource for DynamicSource<'_> {
    fn collect(&self, claimed: &HashSet<String>) -> Result<Resolution> {
        let claimed: Vec<&str> = claimed.iter().map(String::as_str).collect();
        let pending = strings::subtract(self.named, &claimed);
        let mut resolution = Resolution::default();
        if pending.is_empty() {
            return Ok(resolution);
        }

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => return Err(Error::ModuleNotFound(pending[0].clone())),
        };
        for name in &pending {
            match (**resolver)(name.as_str()) {
                Ok(Some(loader)) => resolution.add(name, loader),
                Ok(None) => return Err(Error::ModuleNotFound(name.clone())),
                Err(source) => {
                    return Err(Error::DynamicLoader {
                        module: name.clone(),
                        source,
                    })
                }
            }
        }
        Ok(resolution)
    }

    fn name(&self) -> &str {
        "dynamic"
    }
}

/// Resolve every module source into one conflict-free registry.
///
/// Any failure aborts the whole pass and nothing is returned.
pub fn resolve(sources: &ModuleSources<'_>) -> Result<Resolution> {
    let builtin = BuiltinSource::new(sources.set, sources.named);
    let custom = CustomSource::new(sources.custom);
    let dynamic = DynamicSource::new(sources.named, sources.dynamic);
    let chain: [&dyn ModuleSource; 3] = [&builtin, &custom, &dynamic];

    let mut resolution = Resolution::default();
    let mut claimed = HashSet::new();
    for source in chain.iter() {
        let part = source.collect(&claimed)?;
        log::debug!("{} modules resolved: {:?}", source.name(), part.names);
        claimed.extend(part.names.iter().cloned());
        resolution.merge(part);
    }
    resolution.names = strings::unique_sorted(&resolution.names);
    Ok(resolution)
}
