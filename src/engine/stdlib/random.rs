//! `random` module.

use anyhow::anyhow;
use rand::seq::SliceRandom;
use rand::Rng;
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::list::ListRef;
use starlark::values::Value;
use uuid::Uuid;

use super::{unpack_number, BuiltinRegistry};
use crate::engine::build;

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("random", || build::freeze_namespace("random", random_members));
}

#[starlark_module]
fn random_members(builder: &mut GlobalsBuilder) {
    /// A random integer in `[a, b]`.
    fn randint(a: i32, b: i32) -> anyhow::Result<i32> {
        if a > b {
            return Err(anyhow!("empty range for randint({}, {})", a, b));
        }
        Ok(rand::thread_rng().gen_range(a..=b))
    }

    /// A random float in `[0, 1)`.
    fn random() -> anyhow::Result<f64> {
        Ok(rand::thread_rng().gen::<f64>())
    }

    fn uniform<'v>(a: Value<'v>, b: Value<'v>) -> anyhow::Result<f64> {
        let (a, b) = (unpack_number(a)?, unpack_number(b)?);
        let t = rand::thread_rng().gen::<f64>();
        Ok(a + (b - a) * t)
    }

    /// A random element of a non-empty list.
    fn choice<'v>(seq: Value<'v>) -> anyhow::Result<Value<'v>> {
        let list = ListRef::from_value(seq)
            .ok_or_else(|| anyhow!("choice() expects a list, got {}", seq.get_type()))?;
        list.content()
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| anyhow!("cannot choose from an empty list"))
    }

    /// A string of `n` characters drawn from `chars`.
    fn randstr(chars: &str, n: i32) -> anyhow::Result<String> {
        let pool: Vec<char> = chars.chars().collect();
        if pool.is_empty() {
            return Err(anyhow!("randstr() needs at least one character"));
        }
        let mut rng = rand::thread_rng();
        Ok((0..n.max(0))
            .filter_map(|_| pool.choose(&mut rng).copied())
            .collect())
    }

    /// A random version 4 UUID in hyphenated form.
    fn uuid() -> anyhow::Result<String> {
        Ok(Uuid::new_v4().hyphenated().to_string())
    }
}
