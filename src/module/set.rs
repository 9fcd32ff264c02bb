//! Named module sets.
//!
//! A module set is a predefined list of built-in module names selected by a
//! short identifier. The lists are derived once from the engine's full
//! enumeration of built-in modules.

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::engine::stdlib;
use crate::error::{Error, Result};
use crate::strings;

/// Identifier of a predefined module set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ModuleSetName(Cow<'static, str>);

impl ModuleSetName {
    /// No modules at all.
    pub const EMPTY: ModuleSetName = ModuleSetName(Cow::Borrowed("none"));
    /// Modules without file-system, process or network access.
    pub const SAFE: ModuleSetName = ModuleSetName(Cow::Borrowed("safe"));
    /// The safe modules plus `http` and `log`.
    pub const NETWORK: ModuleSetName = ModuleSetName(Cow::Borrowed("network"));
    /// Every built-in module.
    pub const FULL: ModuleSetName = ModuleSetName(Cow::Borrowed("full"));

    pub fn new(name: impl Into<String>) -> Self {
        ModuleSetName(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleSetName {
    fn from(name: &str) -> Self {
        ModuleSetName::new(name)
    }
}

impl From<String> for ModuleSetName {
    fn from(name: String) -> Self {
        ModuleSetName::new(name)
    }
}

impl FromStr for ModuleSetName {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ModuleSetName::new(s))
    }
}

const SAFE_EXCLUDED: &[&str] = &["file", "path", "runtime", "http", "log"];
const NETWORK_EXCLUDED: &[&str] = &["file", "path", "runtime"];

lazy_static! {
    static ref FULL_MODULE_NAMES: Vec<String> = {
        let none: [&str; 0] = [];
        strings::subtract(&stdlib::builtin_module_names(), &none)
    };
    static ref MODULE_SETS: HashMap<&'static str, Vec<String>> = {
        let mut sets = HashMap::new();
        sets.insert("", Vec::new());
        sets.insert("none", Vec::new());
        sets.insert("safe", strings::subtract(FULL_MODULE_NAMES.as_slice(), SAFE_EXCLUDED));
        sets.insert("network", strings::subtract(FULL_MODULE_NAMES.as_slice(), NETWORK_EXCLUDED));
        sets.insert("full", FULL_MODULE_NAMES.clone());
        sets
    };
}

/// Every built-in module name, de-duplicated, in enumeration order.
pub fn full_module_names() -> &'static [String] {
    FULL_MODULE_NAMES.as_slice()
}

/// Returns the built-in module names of the given set.
///
/// The empty identifier is the same as [`ModuleSetName::EMPTY`].
pub fn module_set(name: &ModuleSetName) -> Result<Vec<String>> {
    MODULE_SETS
        .get(name.as_str())
        .cloned()
        .ok_or_else(|| Error::UnknownModuleSet(name.to_string()))
}
