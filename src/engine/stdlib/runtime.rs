//! `runtime` module: facts about the host process.

use std::env;
use std::time::Instant;

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::{Heap, Value, ValueLike};

use super::BuiltinRegistry;
use crate::engine::build;

lazy_static! {
    static ref STARTED: Instant = Instant::now();
}

pub fn register(registry: &mut BuiltinRegistry) {
    lazy_static::initialize(&STARTED);
    registry.register("runtime", || build::freeze_namespace("runtime", runtime_module));
}

fn runtime_module(builder: &mut GlobalsBuilder) {
    builder.set("pid", std::process::id() as i32);
    runtime_members(builder);
}

#[starlark_module]
fn runtime_members(builder: &mut GlobalsBuilder) {
    fn os() -> anyhow::Result<String> {
        Ok(env::consts::OS.to_owned())
    }

    fn arch() -> anyhow::Result<String> {
        Ok(env::consts::ARCH.to_owned())
    }

    /// Seconds since the library was first used.
    fn uptime() -> anyhow::Result<f64> {
        Ok(STARTED.elapsed().as_secs_f64())
    }

    fn cwd() -> anyhow::Result<String> {
        Ok(env::current_dir()?.to_string_lossy().into_owned())
    }

    /// The environment variable `key`, or `default` when unset.
    fn getenv<'v>(
        key: &str,
        default: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        Ok(match env::var(key) {
            Ok(value) => heap.alloc_str(&value).to_value(),
            Err(_) => default.unwrap_or_else(|| Value::new_none().to_value()),
        })
    }
}
