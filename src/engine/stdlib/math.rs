//! `math` module.
//!
//! Provides mathematical constants and functions. Arguments may be ints or
//! floats; rounding functions return ints.

use anyhow::anyhow;
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::Value;

use super::{unpack_number, BuiltinRegistry};
use crate::engine::build;

/// Register the `math` module with the registry.
pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("math", || build::freeze_namespace("math", math_module));
}

fn math_module(builder: &mut GlobalsBuilder) {
    builder.set("pi", std::f64::consts::PI);
    builder.set("e", std::f64::consts::E);
    builder.set("tau", std::f64::consts::TAU);
    builder.set("inf", f64::INFINITY);
    math_members(builder);
}

fn to_int(x: f64) -> anyhow::Result<i64> {
    if !x.is_finite() || x.abs() > i64::MAX as f64 {
        return Err(anyhow!("cannot convert {} to int", x));
    }
    Ok(x as i64)
}

#[starlark_module]
fn math_members(builder: &mut GlobalsBuilder) {
    fn sqrt<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        let x = unpack_number(x)?;
        if x < 0.0 {
            return Err(anyhow!("math domain error"));
        }
        Ok(x.sqrt())
    }

    fn pow<'v>(x: Value<'v>, y: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.powf(unpack_number(y)?))
    }

    fn exp<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.exp())
    }

    /// Natural logarithm, or logarithm in `base` when given.
    fn log<'v>(x: Value<'v>, base: Option<Value<'v>>) -> anyhow::Result<f64> {
        let x = unpack_number(x)?;
        if x <= 0.0 {
            return Err(anyhow!("math domain error"));
        }
        match base {
            Some(base) => Ok(x.log(unpack_number(base)?)),
            None => Ok(x.ln()),
        }
    }

    fn fabs<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.abs())
    }

    fn floor<'v>(x: Value<'v>) -> anyhow::Result<i64> {
        to_int(unpack_number(x)?.floor())
    }

    fn ceil<'v>(x: Value<'v>) -> anyhow::Result<i64> {
        to_int(unpack_number(x)?.ceil())
    }

    fn round<'v>(x: Value<'v>) -> anyhow::Result<i64> {
        to_int(unpack_number(x)?.round())
    }

    fn sin<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.sin())
    }

    fn cos<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.cos())
    }

    fn tan<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.tan())
    }

    fn hypot<'v>(x: Value<'v>, y: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.hypot(unpack_number(y)?))
    }

    fn degrees<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.to_degrees())
    }

    fn radians<'v>(x: Value<'v>) -> anyhow::Result<f64> {
        Ok(unpack_number(x)?.to_radians())
    }
}
