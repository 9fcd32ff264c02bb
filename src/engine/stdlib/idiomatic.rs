//! `idiomatic` module: small helpers bound at the top level of the script.

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::none::NoneType;
use starlark::values::Value;

use super::{interruptible_sleep, unpack_number, BuiltinRegistry};
use crate::engine::build::{self, into_anyhow};

const EXPORTS: &[&str] = &["sleep", "length", "bin", "oct", "hex", "is_nil"];

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("idiomatic", || {
        build::freeze_top_level(idiomatic_members, EXPORTS)
    });
}

fn radix(n: i32, prefix: &str, digits: String) -> String {
    if n < 0 {
        format!("-{}{}", prefix, digits)
    } else {
        format!("{}{}", prefix, digits)
    }
}

#[starlark_module]
fn idiomatic_members(builder: &mut GlobalsBuilder) {
    /// Pauses the script for `secs` seconds.
    fn sleep<'v>(secs: Value<'v>) -> anyhow::Result<NoneType> {
        interruptible_sleep(unpack_number(secs)?)?;
        Ok(NoneType)
    }

    /// Character count of strings, element count of everything else.
    fn length<'v>(x: Value<'v>) -> anyhow::Result<i32> {
        if let Some(s) = x.unpack_str() {
            return Ok(s.chars().count() as i32);
        }
        x.length().map_err(into_anyhow)
    }

    fn bin(n: i32) -> anyhow::Result<String> {
        Ok(radix(n, "0b", format!("{:b}", n.unsigned_abs())))
    }

    fn oct(n: i32) -> anyhow::Result<String> {
        Ok(radix(n, "0o", format!("{:o}", n.unsigned_abs())))
    }

    fn hex(n: i32) -> anyhow::Result<String> {
        Ok(radix(n, "0x", format!("{:x}", n.unsigned_abs())))
    }

    fn is_nil<'v>(x: Value<'v>) -> anyhow::Result<bool> {
        Ok(x.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radix_sign() {
        assert_eq!(radix(5, "0b", format!("{:b}", 5u32)), "0b101");
        assert_eq!(radix(-255, "0x", format!("{:x}", 255u32)), "-0xff");
    }
}
