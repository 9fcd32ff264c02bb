//! `log` module: forwards script messages to the host's `log` facade.

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::none::NoneType;
use starlark::values::Value;

use super::BuiltinRegistry;
use crate::engine::build;

const TARGET: &str = "starbox::script";

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("log", || build::freeze_namespace("log", log_members));
}

fn message(msg: Value) -> String {
    match msg.unpack_str() {
        Some(s) => s.to_owned(),
        None => msg.to_str(),
    }
}

#[starlark_module]
fn log_members(builder: &mut GlobalsBuilder) {
    fn debug<'v>(msg: Value<'v>) -> anyhow::Result<NoneType> {
        log::debug!(target: TARGET, "{}", message(msg));
        Ok(NoneType)
    }

    fn info<'v>(msg: Value<'v>) -> anyhow::Result<NoneType> {
        log::info!(target: TARGET, "{}", message(msg));
        Ok(NoneType)
    }

    fn warn<'v>(msg: Value<'v>) -> anyhow::Result<NoneType> {
        log::warn!(target: TARGET, "{}", message(msg));
        Ok(NoneType)
    }

    fn error<'v>(msg: Value<'v>) -> anyhow::Result<NoneType> {
        log::error!(target: TARGET, "{}", message(msg));
        Ok(NoneType)
    }
}
