//! Purpose: Run conversions over untyped JSON documents with a compiled mapping.
//! Exports: `Mapping`.
//! Role: Dynamic surface used by the CLI; mapping documents replace compile-time tags.
//! Invariants: Document key order is field order; nested documents become nested schemas.
//! Invariants: The destination is replaced only when the whole conversion succeeds.
use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::ApiResult;
use crate::core::convert::{Direction, convert};
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{Schema, Tagged};

const TAG_KEY: &str = "tag";
const FIELDS_KEY: &str = "fields";

#[derive(Clone, Debug)]
pub struct Mapping {
    schema: Arc<Schema>,
}

impl Mapping {
    /// Mapping backed by the cached schema of a typed model.
    pub fn of<T: Tagged>() -> ApiResult<Self> {
        Ok(Self::from_schema(Schema::of::<T>()?))
    }

    pub fn from_schema(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    /// Compiles a mapping document.
    ///
    /// Each member is `null` (untagged), a tag string, or
    /// `{"tag": "...", "fields": {...}}` for a recursive field.
    pub fn from_document(document: &Value) -> ApiResult<Self> {
        Ok(Self::from_schema(Arc::new(compile_document(document)?)))
    }

    pub fn from_json_str(text: &str) -> ApiResult<Self> {
        let document: Value = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("mapping document is not valid JSON")
                .with_source(err)
        })?;
        Self::from_document(&document)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn to_naked(&self, tagged: &Value, naked: &mut Value) -> ApiResult<()> {
        self.run(Direction::ToNaked, tagged, naked)
    }

    pub fn from_naked(&self, naked: &Value, tagged: &mut Value) -> ApiResult<()> {
        self.run(Direction::FromNaked, naked, tagged)
    }

    fn run(&self, direction: Direction, source: &Value, dest: &mut Value) -> ApiResult<()> {
        let mut staged = dest.clone();
        convert(direction, &self.schema, source, &mut staged)?;
        *dest = staged;
        Ok(())
    }

    /// Field-by-field description of the compiled mapping.
    pub fn describe(&self) -> ApiResult<Value> {
        describe_schema(&self.schema, &mut Vec::new())
    }
}

fn compile_document(document: &Value) -> ApiResult<Schema> {
    let Value::Object(members) = document else {
        return Err(Error::new(ErrorKind::InvalidTag)
            .with_message("mapping document must be an object")
            .with_hint("Map each tagged field name to a tag string, null, or {\"tag\", \"fields\"}."));
    };

    let mut builder = Schema::builder();
    for (name, entry) in members {
        builder = match entry {
            Value::Null => builder.plain(name),
            Value::String(tag) => builder.field(name, tag),
            Value::Object(nested) => {
                let (tag, schema) = compile_nested(nested).map_err(|err| err.in_field(name))?;
                builder.nested(name, tag, Arc::new(schema))
            }
            _ => {
                return Err(Error::new(ErrorKind::InvalidTag)
                    .with_message("mapping entry must be null, a string, or an object")
                    .in_field(name));
            }
        };
    }
    builder.build()
}

fn compile_nested(entry: &Map<String, Value>) -> ApiResult<(String, Schema)> {
    if let Some(key) = entry.keys().find(|key| *key != TAG_KEY && *key != FIELDS_KEY) {
        return Err(Error::new(ErrorKind::InvalidTag)
            .with_message(format!("unknown key `{key}` in nested mapping entry")));
    }
    let tag = match entry.get(TAG_KEY) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(tag)) => tag.clone(),
        Some(_) => {
            return Err(Error::new(ErrorKind::InvalidTag).with_message("`tag` must be a string"));
        }
    };
    let fields = entry.get(FIELDS_KEY).ok_or_else(|| {
        Error::new(ErrorKind::InvalidTag)
            .with_message("nested mapping entry has no `fields`")
            .with_hint("Use a plain tag string for fields that are not recursive.")
    })?;
    Ok((tag, compile_document(fields)?))
}

fn describe_schema(schema: &Arc<Schema>, stack: &mut Vec<*const Schema>) -> ApiResult<Value> {
    stack.push(Arc::as_ptr(schema));
    let mut fields = Vec::with_capacity(schema.fields().len());
    for plan in schema.fields() {
        let path = plan.path();
        let mut entry = json!({
            "field": plan.name(),
            "tag": path.to_string(),
            "dests": path.dests().iter().map(ToString::to_string).collect::<Vec<_>>(),
            "default": path.default_literal(),
            "recursive": path.is_recursive(),
        });
        if let Some(nested) = plan.nested() {
            let nested = nested.resolve().map_err(|err| err.in_field(plan.name()))?;
            let described = if stack.contains(&Arc::as_ptr(&nested)) {
                json!({ "cycle": nested.name() })
            } else {
                describe_schema(&nested, stack)?
            };
            entry[FIELDS_KEY] = described;
        }
        fields.push(entry);
    }
    stack.pop();
    Ok(json!({ "name": schema.name(), "fields": fields }))
}

#[cfg(test)]
mod tests {
    use super::Mapping;
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    fn server_mapping() -> Mapping {
        Mapping::from_document(&json!({
            "Name": null,
            "Core": "ServerPlan.CPU",
            "Tags": "Tags,default=[\"default\"]",
            "Disks": {
                "tag": "[]Disks,recursive",
                "fields": {"SizeGB": "SizeMB", "Zone": "Storage.Zone"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn document_keeps_field_order() {
        let mapping = server_mapping();
        let names: Vec<&str> = mapping
            .schema()
            .fields()
            .iter()
            .map(|plan| plan.name())
            .collect();
        assert_eq!(names, vec!["Name", "Core", "Tags", "Disks"]);
    }

    #[test]
    fn converts_documents_both_ways() {
        let mapping = server_mapping();
        let tagged = json!({
            "Name": "web",
            "Core": 2,
            "Tags": [],
            "Disks": [{"SizeGB": 20, "Zone": "is1a"}]
        });
        let mut naked = Value::Null;
        mapping.to_naked(&tagged, &mut naked).unwrap();
        assert_eq!(
            naked,
            json!({
                "Name": "web",
                "ServerPlan": {"CPU": 2},
                "Tags": ["default"],
                "Disks": [{"SizeMB": 20, "Storage": {"Zone": "is1a"}}]
            })
        );

        let mut back = Value::Null;
        mapping.from_naked(&naked, &mut back).unwrap();
        assert_eq!(
            back,
            json!({
                "Name": "web",
                "Core": 2,
                "Tags": ["default"],
                "Disks": [{"SizeGB": 20, "Zone": "is1a"}]
            })
        );
    }

    #[test]
    fn failed_conversion_keeps_destination() {
        let mapping = server_mapping();
        let mut naked = json!({"Name": "before", "ServerPlan": "flat"});
        let err = mapping
            .to_naked(&json!({"Name": "after", "Core": 1}), &mut naked)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unaddressable);
        assert_eq!(naked, json!({"Name": "before", "ServerPlan": "flat"}));
    }

    #[test]
    fn malformed_documents_are_invalid_tags() {
        for document in [
            json!([]),
            json!({"Name": 3}),
            json!({"Disks": {"tag": ",recursive"}}),
            json!({"Disks": {"tag": 1, "fields": {}}}),
            json!({"Disks": {"tag": ",recursive", "fields": {}, "extra": true}}),
            json!({"Name": "Name,omit"}),
        ] {
            let err = Mapping::from_document(&document).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTag, "{document}");
        }

        let err = Mapping::from_json_str("{").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn describe_lists_compiled_paths() {
        let described = server_mapping().describe().unwrap();
        let fields = described["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1]["dests"], json!(["ServerPlan.CPU"]));
        assert_eq!(fields[2]["default"], json!("[\"default\"]"));
        assert_eq!(fields[3]["recursive"], json!(true));
        assert_eq!(fields[3]["fields"]["fields"][0]["tag"], json!("SizeMB"));
    }
}
