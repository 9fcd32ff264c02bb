//! Module loaders and the resolution engine that merges module sources.

pub mod loader;
pub mod registry;
pub mod resolve;
pub mod set;

pub use loader::{LazyloadMap, ModuleLoader, PreloadList};
pub use registry::ModuleRegistry;
pub use resolve::{resolve, DynamicModuleLoader, ModuleSource, ModuleSources, Resolution};
pub use set::{full_module_names, module_set, ModuleSetName};
