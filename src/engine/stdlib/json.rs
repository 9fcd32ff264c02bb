//! `json` module, provided by the Starlark library extension.

use starlark::environment::LibraryExtension;

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("json", || build::freeze_extension("json", LibraryExtension::Json));
}
