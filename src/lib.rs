//! # starbox - an embeddable Starlark scripting host
//!
//! `starbox` wraps the [`starlark`] interpreter in a session type,
//! [`Starbox`], that a host application configures once and then runs
//! scripts in:
//! - host values in and out as JSON-shaped [`serde_json::Value`]s
//! - a built-in module library selected by named sets (`none`, `safe`,
//!   `network`, `full`) or by module name
//! - custom modules from host data, native functions or Starlark sources
//! - a dynamic callback resolving unknown module names on demand
//! - collective [`Memory`] dictionaries shared between sessions
//! - runs bounded by a timeout or a cancellable [`Context`]
//! - a REPL, optionally opened on the globals of a finished run
//!
//! ## Quick Start
//!
//! ```
//! use starbox::{ModuleSetName, Starbox};
//!
//! let b = Starbox::new("demo");
//! b.set_module_set(ModuleSetName::SAFE);
//! b.add_key_value("word", "world");
//! let out = b.run("x = word.upper()\nn = len(__modules__) > 0").unwrap();
//! assert_eq!(out["x"], "WORLD");
//! assert_eq!(out["n"], true);
//! ```
//!
//! ## Module Resolution
//!
//! Before the first execution the session merges its module sources into
//! one registry. Sources are queried in a fixed order and the first one to
//! claim a name wins:
//!
//! 1. **Built-in**: the selected module set plus built-in modules asked for
//!    by name.
//! 2. **Custom**: loaders registered on the session, skipped when a
//!    built-in has the same name.
//! 3. **Dynamic**: the host callback, asked for every named module still
//!    unclaimed.
//!
//! Every resolved module is bound as globals before the script starts and
//! is also reachable through `load("name", ...)`. The sorted module names
//! are visible to scripts as `__modules__`.
//!
//! ```
//! use serde_json::json;
//! use starbox::{ModuleLoader, ModuleSetName, Starbox};
//!
//! let b = Starbox::new("demo");
//! b.set_module_set(ModuleSetName::EMPTY);
//! b.add_named_modules(["shiftmod"]);
//! b.set_dynamic_module_loader(|name| {
//!     Ok((name == "shiftmod").then(|| {
//!         ModuleLoader::from_values(json!({"num": 100}).as_object().cloned().unwrap())
//!     }))
//! });
//! let out = b.run("load('shiftmod', 'num')\nr = num * 2").unwrap();
//! assert_eq!(out["r"], 200);
//! assert_eq!(b.module_names(), vec!["shiftmod".to_owned()]);
//! ```
//!
//! ## Architecture
//!
//! - **[`starbox`]** - the session and its configuration
//! - **[`runner`]** - fluent run requests
//! - **[`module`]** - module loaders, module sets and the resolver
//! - **[`engine`]** - the machine wrapping the interpreter
//!   - **[`engine::stdlib`]** - the built-in module library
//! - **[`strings`]** - order-aware string list helpers

#[macro_use]
extern crate lazy_static;

pub mod engine;
pub mod error;
pub mod module;
pub mod runner;
pub mod starbox;
pub mod strings;

/// Host-side map of names to values.
pub type StringAnyMap = serde_json::Map<String, serde_json::Value>;

pub use crate::engine::context::Context;
pub use crate::engine::fs::{DirFs, MemoryFs, ScriptFs};
pub use crate::engine::memory::Memory;
pub use crate::engine::repl::{LineReader, ScriptedLines};
pub use crate::engine::{Machine, PrintFn};
pub use crate::error::{Error, Result};
pub use crate::module::{DynamicModuleLoader, ModuleLoader, ModuleRegistry, ModuleSetName};
pub use crate::runner::RunConfig;
pub use crate::starbox::{InspectCondFunc, Starbox};
