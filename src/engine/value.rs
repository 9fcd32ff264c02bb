//! Conversion between host values and Starlark values.
//!
//! Host values are plain JSON values. Anything a script produces that has no
//! JSON form (functions, modules, structs holding functions) is handed back
//! as its `str()` rendering.

use serde_json::Value as HostValue;
use starlark::values::dict::AllocDict;
use starlark::values::list::AllocList;
use starlark::values::{Heap, Value, ValueLike};

/// Allocates a host value on a Starlark heap.
pub fn to_starlark<'v>(heap: &'v Heap, value: &HostValue) -> Value<'v> {
    match value {
        HostValue::Null => Value::new_none().to_value(),
        HostValue::Bool(b) => Value::new_bool(*b).to_value(),
        HostValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                heap.alloc(i)
            } else {
                heap.alloc(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        HostValue::String(s) => heap.alloc_str(s).to_value(),
        HostValue::Array(items) => {
            let items: Vec<Value<'v>> = items.iter().map(|v| to_starlark(heap, v)).collect();
            heap.alloc(AllocList(items))
        }
        HostValue::Object(map) => {
            let pairs: Vec<(Value<'v>, Value<'v>)> = map
                .iter()
                .map(|(k, v)| (heap.alloc_str(k).to_value(), to_starlark(heap, v)))
                .collect();
            heap.alloc(AllocDict(pairs))
        }
    }
}

/// Converts a Starlark value into a host value.
pub fn to_host(value: Value) -> HostValue {
    match value.to_json_value() {
        Ok(json) => json,
        Err(_) => HostValue::String(value.to_str()),
    }
}
