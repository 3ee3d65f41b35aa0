//! Purpose: Drive per-field conversion between tagged and naked value trees.
//! Exports: `Direction`, `convert`.
//! Role: Single entry point of the engine; the recursive delegate re-enters it for nested pairs.
//! Invariants: The source tree is never mutated; allocation happens on the destination only.
//! Invariants: Defaults apply only `ToNaked`; `FromNaked` reads the first destination only.
//! Invariants: The first error stops the call; fields written before it stay written.
use serde_json::{Map, Value};

use crate::core::delegate;
use crate::core::error::Error;
use crate::core::flatten::{flatten, unflatten};
use crate::core::literal::coerce_literal;
use crate::core::navigate::{
    assign, is_zero, kind_name, resolve_for_read, resolve_for_write, zero_like,
};
use crate::core::schema::{FieldPlan, Schema};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Tagged source onto naked destination.
    ToNaked,
    /// Naked source onto tagged destination.
    FromNaked,
}

/// Projects `source` onto `dest` field by field according to `schema`.
pub(crate) fn convert(
    direction: Direction,
    schema: &Schema,
    source: &Value,
    dest: &mut Value,
) -> Result<(), Error> {
    let empty = Map::new();
    let members = match source {
        Value::Object(members) => members,
        Value::Null => &empty,
        other => {
            return Err(Error::type_mismatch(format!(
                "cannot convert from a {}",
                kind_name(other)
            )));
        }
    };
    if dest.is_null() {
        *dest = Value::Object(Map::new());
    }
    if !dest.is_object() {
        return Err(Error::unaddressable(format!(
            "cannot convert into a {}",
            kind_name(dest)
        )));
    }

    // Tagged-side fields the schema does not list map onto their own names.
    let tagged = match direction {
        Direction::ToNaked => Some(members),
        Direction::FromNaked => dest.as_object(),
    };
    let untagged: Vec<FieldPlan> = tagged
        .into_iter()
        .flat_map(|members| members.keys())
        .filter(|name| schema.field(name).is_none())
        .map(|name| FieldPlan::untagged(name))
        .collect();

    for plan in schema.fields().iter().chain(&untagged) {
        let result = match direction {
            Direction::ToNaked => {
                let unset = schema.template().and_then(|template| template.get(plan.name()));
                write_field(plan, unset, source, dest)
            }
            Direction::FromNaked => read_field(plan, source, dest),
        };
        result.map_err(|err| err.in_field(plan.name()))?;
    }
    Ok(())
}

/// `unset` is the field's value in the type's `Default` template, when the schema has one.
fn write_field(
    plan: &FieldPlan,
    unset: Option<&Value>,
    tagged: &Value,
    naked: &mut Value,
) -> Result<(), Error> {
    let path = plan.path();
    // Fields missing from the source (not merely null) leave the destination alone.
    let (mut value, is_unset) = match tagged.get(plan.name()) {
        Some(value) => {
            let is_unset = match unset {
                Some(unset) => value == unset,
                None => is_zero(value),
            };
            (value.clone(), is_unset)
        }
        None if path.default_literal().is_some() => (Value::Null, true),
        None => return Ok(()),
    };

    if let Some(literal) = path.default_literal() {
        if is_unset {
            let primary = path.primary();
            // Only a kind hint: a slice-marked primary has no single current value.
            let current = resolve_for_read(naked, primary.names()).ok().flatten();
            let substituted = coerce_literal(literal, current.or(Some(&value)))
                .map_err(|err| err.with_path(primary.to_string()))?;
            tracing::debug!(field = plan.name(), default = literal, "substituted default value");
            value = substituted;
        }
    }

    if path.is_recursive() {
        return delegate::write_nested(plan, &value, naked);
    }

    for dest in path.dests() {
        let with_dest = |err: Error| err.with_path(dest.to_string());
        if dest.has_slice() {
            match &value {
                Value::Null => {}
                Value::Array(items) => unflatten(naked, dest, items).map_err(with_dest)?,
                other => {
                    return Err(with_dest(Error::type_mismatch(format!(
                        "slice path needs a slice, got a {}",
                        kind_name(other)
                    ))));
                }
            }
        } else {
            let slot = resolve_for_write(naked, dest.names()).map_err(with_dest)?;
            assign(slot, value.clone()).map_err(with_dest)?;
        }
        tracing::trace!(field = plan.name(), dest = %dest, "wrote field");
    }
    Ok(())
}

fn read_field(plan: &FieldPlan, naked: &Value, tagged: &mut Value) -> Result<(), Error> {
    let path = plan.path();
    if path.is_recursive() {
        return delegate::read_nested(plan, naked, tagged);
    }

    let dest = path.primary();
    let with_dest = |err: Error| err.with_path(dest.to_string());
    let value = if dest.has_slice() {
        Value::Array(flatten(naked, dest)?)
    } else {
        match resolve_for_read(naked, dest.names()).map_err(with_dest)? {
            Some(value) => value.clone(),
            None => tagged.get(plan.name()).map(zero_like).unwrap_or(Value::Null),
        }
    };

    let slot = resolve_for_write(tagged, [plan.name()])?;
    assign(slot, value).map_err(with_dest)?;
    tracing::trace!(field = plan.name(), dest = %dest, "read field");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Direction, convert};
    use crate::core::error::ErrorKind;
    use crate::core::schema::{FieldTag, Schema, Tagged};
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn nested_path_schema() -> Schema {
        Schema::builder()
            .field("A", "ValueA.A")
            .field("B", "ValueA.ValueB.B")
            .field("C", "ValueA.ValueB.ValueC.C")
            .build()
            .unwrap()
    }

    #[test]
    fn to_naked_allocates_nested_paths_and_copies_untagged() {
        let schema = nested_path_schema();
        let tagged = json!({"A": "A", "B": "B", "C": "C", "NoTag": "NoTag"});
        let mut naked = json!({"ValueA": null, "NoTag": ""});
        convert(Direction::ToNaked, &schema, &tagged, &mut naked).unwrap();
        assert_eq!(
            naked,
            json!({
                "ValueA": {"A": "A", "ValueB": {"B": "B", "ValueC": {"C": "C"}}},
                "NoTag": "NoTag"
            })
        );
    }

    #[test]
    fn from_naked_round_trips_scalar_paths() {
        let schema = nested_path_schema();
        let populated = json!({
            "ValueA": {"A": "A", "ValueB": {"B": "B", "ValueC": {"C": "C"}}}
        });
        let mut tagged = json!({"A": "", "B": "", "C": ""});
        convert(Direction::FromNaked, &schema, &populated, &mut tagged).unwrap();
        assert_eq!(tagged, json!({"A": "A", "B": "B", "C": "C"}));

        let mut naked = Value::Null;
        convert(Direction::ToNaked, &schema, &tagged, &mut naked).unwrap();
        assert_eq!(naked, populated);
    }

    #[test]
    fn absent_path_reads_back_as_zero() {
        let schema = nested_path_schema();
        let mut tagged = json!({"A": "stale", "B": "", "C": ""});
        convert(Direction::FromNaked, &schema, &json!({"ValueA": null}), &mut tagged).unwrap();
        assert_eq!(tagged, json!({"A": "", "B": "", "C": ""}));
    }

    #[test]
    fn default_applies_only_to_zero_sources_when_writing() {
        let schema = Schema::builder()
            .field("Field", "Field,default=default-value")
            .build()
            .unwrap();

        let mut naked = json!({"Field": ""});
        convert(Direction::ToNaked, &schema, &json!({"Field": ""}), &mut naked).unwrap();
        assert_eq!(naked, json!({"Field": "default-value"}));

        let mut naked = json!({"Field": ""});
        convert(Direction::ToNaked, &schema, &json!({"Field": "set"}), &mut naked).unwrap();
        assert_eq!(naked, json!({"Field": "set"}));

        let mut tagged = json!({"Field": ""});
        convert(Direction::FromNaked, &schema, &json!({}), &mut tagged).unwrap();
        assert_eq!(tagged, json!({"Field": ""}));
    }

    #[test]
    fn numeric_default_follows_destination_kind() {
        let schema = Schema::builder()
            .field("SizeGB", "SizeMB,default=20480")
            .build()
            .unwrap();
        let mut naked = json!({"SizeMB": 0});
        convert(Direction::ToNaked, &schema, &json!({"SizeGB": 0}), &mut naked).unwrap();
        assert_eq!(naked, json!({"SizeMB": 20480}));
    }

    #[test]
    fn fan_out_writes_every_destination_and_reads_the_first() {
        let schema = Schema::builder()
            .field("Field", "Field1/Field2")
            .build()
            .unwrap();
        let mut naked = Value::Null;
        convert(Direction::ToNaked, &schema, &json!({"Field": "value"}), &mut naked).unwrap();
        assert_eq!(naked, json!({"Field1": "value", "Field2": "value"}));

        let mut tagged = json!({"Field": ""});
        let source = json!({"Field1": "first", "Field2": "second"});
        convert(Direction::FromNaked, &schema, &source, &mut tagged).unwrap();
        assert_eq!(tagged, json!({"Field": "first"}));
    }

    #[test]
    fn recursive_object_and_slice() {
        let child = Arc::new(
            Schema::builder()
                .field("Field1", "Dest1")
                .field("Field2", "Dest2")
                .build()
                .unwrap(),
        );
        let schema = Schema::builder()
            .nested("Field", ",recursive", Arc::clone(&child))
            .nested("Fields", "[]Slice,recursive", child)
            .build()
            .unwrap();

        let tagged = json!({
            "Field": {"Field1": "value1", "Field2": "value2"},
            "Fields": [
                {"Field1": "value1", "Field2": "value2"},
                {"Field1": "value3", "Field2": "value4"}
            ]
        });
        let mut naked = Value::Null;
        convert(Direction::ToNaked, &schema, &tagged, &mut naked).unwrap();
        assert_eq!(
            naked,
            json!({
                "Field": {"Dest1": "value1", "Dest2": "value2"},
                "Slice": [
                    {"Dest1": "value1", "Dest2": "value2"},
                    {"Dest1": "value3", "Dest2": "value4"}
                ]
            })
        );

        let mut back = Value::Null;
        convert(Direction::FromNaked, &schema, &naked, &mut back).unwrap();
        assert_eq!(back, tagged);
    }

    #[test]
    fn slice_paths_flatten_and_unflatten() {
        let schema = Schema::builder()
            .field("Values", "[]Slice.Value")
            .field("NestedValues", "[]Slice.[]Slice.Value")
            .build()
            .unwrap();
        let tagged = json!({
            "Values": ["value1", "value2", "value3"],
            "NestedValues": ["value4", "value5"]
        });
        let mut naked = json!({});
        convert(Direction::ToNaked, &schema, &tagged, &mut naked).unwrap();
        assert_eq!(naked["Slice"].as_array().map(Vec::len), Some(5));

        let mut back = json!({"Values": [], "NestedValues": []});
        convert(Direction::FromNaked, &schema, &naked, &mut back).unwrap();
        assert_eq!(back, tagged);
    }

    #[test]
    fn errors_carry_field_and_path() {
        let schema = Schema::builder().field("Count", "Name").build().unwrap();
        let mut naked = json!({"Name": ""});
        let err = convert(Direction::ToNaked, &schema, &json!({"Count": 3}), &mut naked)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.field(), Some("Count"));
        assert_eq!(err.path(), Some("Name"));

        let schema = Schema::builder().field("Zone", "Name.Zone").build().unwrap();
        let err = convert(Direction::ToNaked, &schema, &json!({"Zone": "is1a"}), &mut naked)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unaddressable);
        assert_eq!(err.path(), Some("Name.Zone"));
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Quota {
        #[serde(rename = "Count")]
        count: Option<u32>,
        #[serde(rename = "Limit")]
        limit: u32,
    }

    impl Tagged for Quota {
        const TAGS: &'static [FieldTag] = &[
            FieldTag::new("Count", "Count,default=5"),
            FieldTag::new("Limit", "Limit,default=10"),
        ];
    }

    #[test]
    fn typed_defaults_compare_against_the_default_value() {
        let schema = Schema::of::<Quota>().unwrap();

        let mut naked = json!({"Count": null, "Limit": 0});
        let explicit = json!({"Count": 0, "Limit": 0});
        convert(Direction::ToNaked, &schema, &explicit, &mut naked).unwrap();
        assert_eq!(naked, json!({"Count": 0, "Limit": 10}));

        let mut naked = json!({"Count": null, "Limit": 0});
        let unset = json!({"Count": null, "Limit": 3});
        convert(Direction::ToNaked, &schema, &unset, &mut naked).unwrap();
        assert_eq!(naked, json!({"Count": 5, "Limit": 3}));
    }

    #[test]
    fn default_and_slice_errors_name_their_path() {
        let schema = Schema::builder()
            .field("Count", "Total,default=many")
            .build()
            .unwrap();
        let mut naked = json!({"Total": 0});
        let err = convert(Direction::ToNaked, &schema, &json!({"Count": 0}), &mut naked)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.field(), Some("Count"));
        assert_eq!(err.path(), Some("Total"));

        let schema = Schema::builder()
            .field("Values", "Meta.[]Items.Value")
            .build()
            .unwrap();
        let mut naked = json!({"Meta": "flat"});
        let err = convert(Direction::ToNaked, &schema, &json!({"Values": ["a"]}), &mut naked)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unaddressable);
        assert_eq!(err.field(), Some("Values"));
        assert_eq!(err.path(), Some("Meta.[]Items.Value"));
    }

    #[test]
    fn slice_marked_default_takes_its_kind_from_the_source() {
        let schema = Schema::builder()
            .field("Values", "[]Slice.Value,default=[\"x\"]")
            .build()
            .unwrap();
        let mut naked = json!({"Slice": [{"Value": "kept"}]});
        convert(Direction::ToNaked, &schema, &json!({"Values": []}), &mut naked).unwrap();
        assert_eq!(naked, json!({"Slice": [{"Value": "kept"}, {"Value": "x"}]}));
    }

    #[test]
    fn missing_source_fields_are_skipped() {
        let schema = nested_path_schema();
        let mut naked = json!({"ValueA": {"A": "kept"}});
        convert(Direction::ToNaked, &schema, &json!({"C": "C"}), &mut naked).unwrap();
        assert_eq!(
            naked,
            json!({"ValueA": {"A": "kept", "ValueB": {"ValueC": {"C": "C"}}}})
        );
    }

    #[test]
    fn source_is_never_mutated() {
        let schema = nested_path_schema();
        let tagged = json!({"A": "A", "B": "", "C": ""});
        let snapshot = tagged.clone();
        let mut naked = Value::Null;
        convert(Direction::ToNaked, &schema, &tagged, &mut naked).unwrap();
        assert_eq!(tagged, snapshot);
    }
}
