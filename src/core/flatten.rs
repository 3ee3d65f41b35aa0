//! Purpose: Collapse multi-level slice paths into flat value sequences and expand them back.
//! Exports: `flatten`, `unflatten`.
//! Role: Handles `[]`-marked destinations for the converter in both directions.
//! Invariants: Flattening is depth-first, left to right; absent or null leaves contribute nothing.
//! Invariants: Unflattening appends one fresh element chain per value (one wrapper per level).
//! Notes: The write side does not rebuild the grouping the read side walked through.
use serde_json::Value;

use crate::core::error::Error;
use crate::core::navigate::{kind_name, resolve_for_read, resolve_for_write};
use crate::core::path::Dest;

/// One `[]`-marked slice plus the plain segments that follow it.
#[derive(Debug)]
struct Level<'a> {
    slice: &'a str,
    rest: Vec<&'a str>,
}

/// A marked destination split at its slice markers.
#[derive(Debug)]
struct SlicePlan<'a> {
    prefix: Vec<&'a str>,
    levels: Vec<Level<'a>>,
}

impl<'a> SlicePlan<'a> {
    fn of(dest: &'a Dest) -> Self {
        let mut prefix = Vec::new();
        let mut levels: Vec<Level<'a>> = Vec::new();
        for segment in dest.segments() {
            if segment.is_slice() {
                levels.push(Level {
                    slice: segment.name(),
                    rest: Vec::new(),
                });
            } else if let Some(level) = levels.last_mut() {
                level.rest.push(segment.name());
            } else {
                prefix.push(segment.name());
            }
        }
        Self { prefix, levels }
    }
}

/// Reads every leaf named by the marked `dest` under `root`.
pub(crate) fn flatten(root: &Value, dest: &Dest) -> Result<Vec<Value>, Error> {
    let plan = SlicePlan::of(dest);
    let mut out = Vec::new();
    if let Some(container) = resolve_for_read(root, plan.prefix.iter().copied())? {
        collect(container, &plan.levels, &mut out)
            .map_err(|err| err.with_path(dest.to_string()))?;
    }
    Ok(out)
}

fn collect(container: &Value, levels: &[Level<'_>], out: &mut Vec<Value>) -> Result<(), Error> {
    let Some((level, deeper)) = levels.split_first() else {
        return Ok(());
    };
    let items = match resolve_for_read(container, [level.slice])? {
        None => return Ok(()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::type_mismatch(format!(
                "`{}` is a {}, not a slice",
                level.slice,
                kind_name(other)
            )));
        }
    };

    for item in items {
        let Some(inner) = resolve_for_read(item, level.rest.iter().copied())? else {
            continue;
        };
        if deeper.is_empty() {
            out.push(inner.clone());
        } else {
            collect(inner, deeper, out)?;
        }
    }
    Ok(())
}

/// Appends one element chain per value to the slice named by the marked `dest` under `root`.
pub(crate) fn unflatten(root: &mut Value, dest: &Dest, values: &[Value]) -> Result<(), Error> {
    let plan = SlicePlan::of(dest);
    let Some(first) = plan.levels.first() else {
        return Ok(());
    };

    let container = resolve_for_write(root, plan.prefix.iter().copied())?;
    let slot = resolve_for_write(container, [first.slice])?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(items) = slot else {
        return Err(Error::type_mismatch(format!(
            "`{}` is a {}, not a slice",
            first.slice,
            kind_name(slot)
        ))
        .with_path(dest.to_string()));
    };

    for value in values {
        items.push(wrap(&plan.levels, value.clone())?);
    }
    Ok(())
}

/// Builds the element appended to the outermost slice: the deepest level carries `value`
/// and every outer level is a fresh wrapper holding exactly one child.
fn wrap(levels: &[Level<'_>], value: Value) -> Result<Value, Error> {
    let mut node = value;
    for (idx, level) in levels.iter().enumerate().rev() {
        let mut element = Value::Null;
        let holder = resolve_for_write(&mut element, level.rest.iter().copied())?;
        match levels.get(idx + 1) {
            None => *holder = node,
            Some(inner) => *resolve_for_write(holder, [inner.slice])? = Value::Array(vec![node]),
        }
        node = element;
    }
    Ok(node)
}
