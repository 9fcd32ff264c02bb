//! `hashlib` module: SHA-2 digests as lowercase hex strings.

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;

use super::BuiltinRegistry;
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("hashlib", || build::freeze_namespace("hashlib", hashlib_members));
}

fn hex_digest<D: Digest>(data: &str) -> String {
    D::digest(data.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[starlark_module]
fn hashlib_members(builder: &mut GlobalsBuilder) {
    fn sha224(data: &str) -> anyhow::Result<String> {
        Ok(hex_digest::<Sha224>(data))
    }

    fn sha256(data: &str) -> anyhow::Result<String> {
        Ok(hex_digest::<Sha256>(data))
    }

    fn sha384(data: &str) -> anyhow::Result<String> {
        Ok(hex_digest::<Sha384>(data))
    }

    fn sha512(data: &str) -> anyhow::Result<String> {
        Ok(hex_digest::<Sha512>(data))
    }
}
