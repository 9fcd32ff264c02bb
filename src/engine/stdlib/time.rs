//! `time` module: wall-clock time as Unix timestamps and formatted text.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::none::NoneType;
use starlark::values::Value;

use super::{interruptible_sleep, unpack_number, BuiltinRegistry};
use crate::engine::build;

const DEFAULT_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("time", || build::freeze_namespace("time", time_members));
}

fn from_unix(secs: f64) -> anyhow::Result<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| anyhow!("timestamp out of range: {}", secs))
}

fn parse_time(text: &str, layout: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match layout {
        Some(layout) => Ok(NaiveDateTime::parse_from_str(text, layout)?.and_utc()),
        None => Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc)),
    }
}

fn unix_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

#[starlark_module]
fn time_members(builder: &mut GlobalsBuilder) {
    /// Current time in seconds since the Unix epoch.
    fn now() -> anyhow::Result<f64> {
        Ok(unix_seconds(Utc::now()))
    }

    fn unix() -> anyhow::Result<i64> {
        Ok(Utc::now().timestamp())
    }

    fn unix_milli() -> anyhow::Result<i64> {
        Ok(Utc::now().timestamp_millis())
    }

    /// Formats a Unix timestamp in UTC with a `strftime` layout.
    fn format<'v>(secs: Value<'v>, layout: Option<&str>) -> anyhow::Result<String> {
        let t = from_unix(unpack_number(secs)?)?;
        Ok(t.format(layout.unwrap_or(DEFAULT_LAYOUT)).to_string())
    }

    /// Parses RFC 3339 text, or text in the given `strftime` layout read as
    /// UTC, into a Unix timestamp.
    fn parse(text: &str, layout: Option<&str>) -> anyhow::Result<f64> {
        Ok(unix_seconds(parse_time(text, layout)?))
    }

    fn sleep<'v>(secs: Value<'v>) -> anyhow::Result<NoneType> {
        interruptible_sleep(unpack_number(secs)?)?;
        Ok(NoneType)
    }
}
