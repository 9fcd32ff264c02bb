//! `base64` module.

use anyhow::anyhow;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::GeneralPurpose;
use base64::Engine;
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;

use super::BuiltinRegistry;
use crate::engine::build;

/// Register the `base64` module with the registry.
pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("base64", || build::freeze_namespace("base64", base64_members));
}

fn engine(encoding: Option<&str>) -> anyhow::Result<&'static GeneralPurpose> {
    match encoding.unwrap_or("standard") {
        "standard" => Ok(&STANDARD),
        "standard_raw" => Ok(&STANDARD_NO_PAD),
        "url" => Ok(&URL_SAFE),
        "url_raw" => Ok(&URL_SAFE_NO_PAD),
        other => Err(anyhow!("unsupported encoding: {}", other)),
    }
}

#[starlark_module]
fn base64_members(builder: &mut GlobalsBuilder) {
    /// Encodes `data` with the given alphabet: `standard` (default),
    /// `standard_raw`, `url` or `url_raw`.
    fn encode(data: &str, encoding: Option<&str>) -> anyhow::Result<String> {
        Ok(engine(encoding)?.encode(data.as_bytes()))
    }

    fn decode(data: &str, encoding: Option<&str>) -> anyhow::Result<String> {
        let bytes = engine(encoding)?.decode(data.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }
}
