//! Purpose: Convert `recursive` fields by re-entering the converter with the nested schema.
//! Exports: `write_nested`, `read_nested`.
//! Role: Handles struct and slice-of-struct fields whose shape differs between the two sides.
//! Invariants: A null or absent source leaves the destination untouched.
//! Invariants: Slice elements convert pairwise; existing destination elements are reused by index.
use serde_json::{Map, Value};

use crate::core::convert::{Direction, convert};
use crate::core::error::{Error, ErrorKind};
use crate::core::navigate::{kind_name, resolve_for_read, resolve_for_write};
use crate::core::schema::{FieldPlan, Schema};

/// Writes the tagged `value` of a recursive field into every destination of `plan`.
pub(crate) fn write_nested(plan: &FieldPlan, value: &Value, naked: &mut Value) -> Result<(), Error> {
    if value.is_null() {
        return Ok(());
    }
    let schema = nested_schema(plan)?;
    for dest in plan.path().dests() {
        let slot = resolve_for_write(naked, dest.names())
            .map_err(|err| err.with_path(dest.to_string()))?;
        convert_pair(Direction::ToNaked, &schema, value, slot)?;
        tracing::trace!(field = plan.name(), dest = %dest, "delegated nested write");
    }
    Ok(())
}

/// Reads the naked value at the first destination of `plan` into the tagged field.
pub(crate) fn read_nested(plan: &FieldPlan, naked: &Value, tagged: &mut Value) -> Result<(), Error> {
    let dest = plan.path().primary();
    let Some(value) =
        resolve_for_read(naked, dest.names()).map_err(|err| err.with_path(dest.to_string()))?
    else {
        return Ok(());
    };
    let schema = nested_schema(plan)?;
    let slot = resolve_for_write(tagged, [plan.name()])?;
    tracing::trace!(field = plan.name(), dest = %dest, "delegated nested read");
    convert_pair(Direction::FromNaked, &schema, value, slot)
}

fn nested_schema(plan: &FieldPlan) -> Result<std::sync::Arc<Schema>, Error> {
    match plan.nested() {
        Some(nested) => nested.resolve(),
        None => Err(Error::new(ErrorKind::Internal)
            .with_message("recursive field compiled without a nested schema")),
    }
}

fn convert_pair(
    direction: Direction,
    schema: &Schema,
    source: &Value,
    slot: &mut Value,
) -> Result<(), Error> {
    match source {
        Value::Object(_) => {
            if slot.is_null() {
                *slot = fresh(direction, schema);
            }
            convert(direction, schema, source, slot)
        }
        Value::Array(items) => {
            let mut existing = match slot.take() {
                Value::Null => Vec::new(),
                Value::Array(existing) => existing,
                other => {
                    let err = Error::type_mismatch(format!(
                        "cannot convert a slice into a {}",
                        kind_name(&other)
                    ));
                    *slot = other;
                    return Err(err);
                }
            };
            let mut converted = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let mut element = if idx < existing.len() {
                    std::mem::take(&mut existing[idx])
                } else {
                    Value::Null
                };
                if item.is_null() {
                    converted.push(Value::Null);
                    continue;
                }
                convert_pair(direction, schema, item, &mut element)
                    .map_err(|err| err.in_field(&idx.to_string()))?;
                converted.push(element);
            }
            *slot = Value::Array(converted);
            Ok(())
        }
        other => Err(Error::type_mismatch(format!(
            "recursive field needs a struct or slice, got a {}",
            kind_name(other)
        ))),
    }
}

/// Allocates an empty value of the destination side's shape.
fn fresh(direction: Direction, schema: &Schema) -> Value {
    match direction {
        Direction::ToNaked => Value::Object(Map::new()),
        Direction::FromNaked => schema
            .template()
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    }
}
