//! Purpose: Walk destination paths through value trees for reading and writing.
//! Exports: `resolve_for_read`, `resolve_for_write`, `assign`, `is_zero`, `zero_like`, `kind_name`.
//! Role: Tree navigator used by the converter, the slice flattener and the recursive delegate.
//! Invariants: Reads never allocate; a missing or null step makes the whole path absent.
//! Invariants: Writes allocate null/missing intermediates as empty objects, never replace data.
//! Invariants: Slice markers are not interpreted here; callers pass plain segment names.
use serde_json::{Map, Value};

use crate::core::error::Error;

/// Follows `names` from `root` without allocating. Returns `Ok(None)` when any step is
/// missing or null.
pub(crate) fn resolve_for_read<'a, 'n>(
    root: &'a Value,
    names: impl IntoIterator<Item = &'n str>,
) -> Result<Option<&'a Value>, Error> {
    let mut cursor = root;
    let mut walked = Vec::new();
    for name in names {
        let map = match cursor {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(Error::unaddressable(format!(
                    "cannot read `{name}` through {}",
                    kind_name(other)
                ))
                .with_path(walked.join(".")));
            }
        };
        walked.push(name);
        match map.get(name) {
            Some(next) => cursor = next,
            None => return Ok(None),
        }
    }
    if cursor.is_null() {
        return Ok(None);
    }
    Ok(Some(cursor))
}

/// Follows `names` from `root`, allocating null or missing intermediates, and returns the
/// leaf slot. A missing leaf is inserted as `null`.
pub(crate) fn resolve_for_write<'a, 'n>(
    root: &'a mut Value,
    names: impl IntoIterator<Item = &'n str>,
) -> Result<&'a mut Value, Error> {
    let mut cursor = root;
    let mut walked: Vec<&str> = Vec::new();
    for name in names {
        if cursor.is_null() {
            *cursor = Value::Object(Map::new());
        }
        cursor = match cursor {
            Value::Object(map) => map.entry(name.to_string()).or_insert(Value::Null),
            other => {
                return Err(Error::unaddressable(format!(
                    "cannot set `{name}` inside {}",
                    kind_name(other)
                ))
                .with_path(walked.join(".")));
            }
        };
        walked.push(name);
    }
    Ok(cursor)
}

/// Stores `value` into `slot`, refusing to change the kind of an already populated slot.
pub(crate) fn assign(slot: &mut Value, value: Value) -> Result<(), Error> {
    if !slot.is_null() && !value.is_null() && !same_kind(slot, &value) {
        return Err(Error::type_mismatch(format!(
            "cannot assign {} to a {} field",
            kind_name(&value),
            kind_name(slot)
        )));
    }
    *slot = value;
    Ok(())
}

pub(crate) fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_zero),
    }
}

/// Zero value of the same kind as `value`; objects are zeroed member by member.
pub(crate) fn zero_like(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => Value::Bool(false),
        Value::Number(_) => Value::from(0),
        Value::String(_) => Value::String(String::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, member)| (key.clone(), zero_like(member)))
                .collect(),
        ),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "struct",
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
