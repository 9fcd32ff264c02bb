//! Collective memory: a dictionary shared by every session it is attached to.
//!
//! Scripts read and write it with `memory[key]` and `memory[key] = value`.
//! Keys are strings and values are stored as host values, so a value written
//! by one session can be read by any other.

use std::fmt;
use std::sync::Arc;

use allocative::Allocative;
use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::Value as HostValue;
use starlark::starlark_simple_value;
use starlark::values::{
    starlark_value, Heap, NoSerialize, ProvidesStaticType, StarlarkValue, Value, ValueError,
};

use super::value;
use crate::StringAnyMap;

const TYPE_NAME: &str = "collective_memory";

/// A handle to a shared dictionary. Clones refer to the same entries.
#[derive(Debug, Clone, Default, ProvidesStaticType, NoSerialize, Allocative)]
pub struct Memory {
    #[allocative(skip)]
    entries: Arc<Mutex<StringAnyMap>>,
}

starlark_simple_value!(Memory);

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&self, key: &str, value: impl Into<HostValue>) -> Option<HostValue> {
        self.entries.lock().insert(key.to_owned(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<HostValue> {
        self.entries.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// A copy of every entry.
    pub fn snapshot(&self) -> StringAnyMap {
        self.entries.lock().clone()
    }

    /// Whether both handles refer to the same entries.
    pub fn same(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = HostValue::Object(self.snapshot());
        write!(f, "{}({})", TYPE_NAME, entries)
    }
}

fn key_of<'v>(index: Value<'v>) -> starlark::Result<&'v str> {
    index.unpack_str().ok_or_else(|| {
        starlark::Error::new_other(anyhow!(
            "{} keys must be strings, got {}",
            TYPE_NAME,
            index.get_type()
        ))
    })
}

#[starlark_value(type = "collective_memory")]
impl<'v> StarlarkValue<'v> for Memory {
    fn at(&self, index: Value<'v>, heap: &'v Heap) -> starlark::Result<Value<'v>> {
        let key = key_of(index)?;
        match self.get(key) {
            Some(host) => Ok(value::to_starlark(heap, &host)),
            None => Err(starlark::Error::new_other(ValueError::KeyNotFound(
                index.to_repr(),
            ))),
        }
    }

    fn set_at(&self, index: Value<'v>, new_value: Value<'v>) -> starlark::Result<()> {
        let key = key_of(index)?;
        self.set(key, value::to_host(new_value));
        Ok(())
    }

    fn length(&self) -> starlark::Result<i32> {
        Ok(self.len() as i32)
    }

    fn is_in(&self, other: Value<'v>) -> starlark::Result<bool> {
        Ok(other
            .unpack_str()
            .map_or(false, |key| self.entries.lock().contains_key(key)))
    }
}
