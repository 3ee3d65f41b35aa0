//! Purpose: Compile per-type field tables (tags parsed once) and memoize them process-wide.
//! Exports: `Tagged`, `FieldTag`, `Schema`, `SchemaBuilder`, `FieldPlan`.
//! Role: Typed accessor table consumed by the converter; stands in for runtime reflection.
//! Invariants: Field order is serialization order, then tagged fields serde did not emit.
//! Invariants: `recursive` fields always carry a nested schema and vice versa.
//! Invariants: The cache is only ever grown; compiled schemas are immutable and shared.
use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::core::path::{FieldPath, parse_tag};

/// Lazily compiles a nested schema; keeps self-referential types finite.
pub type SchemaFn = fn() -> Result<Arc<Schema>, Error>;

/// The public, ergonomic side of a mapping.
///
/// Field names are serialized names. Fields that serde skips are never read or
/// written. `Default` supplies the full field list and fresh nested values.
pub trait Tagged: Serialize + DeserializeOwned + Default + 'static {
    /// Tags for fields that do not map onto a naked field of the same name.
    const TAGS: &'static [FieldTag] = &[];
}

/// Static tag declaration for one field of a [`Tagged`] type.
#[derive(Clone, Copy, Debug)]
pub struct FieldTag {
    pub name: &'static str,
    pub tag: &'static str,
    pub nested: Option<SchemaFn>,
}

impl FieldTag {
    pub const fn new(name: &'static str, tag: &'static str) -> Self {
        Self {
            name,
            tag,
            nested: None,
        }
    }

    pub const fn plain(name: &'static str) -> Self {
        Self::new(name, "")
    }

    /// Declares the tagged type used when the field is converted recursively.
    pub const fn nested<T: Tagged>(self) -> Self {
        Self {
            nested: Some(Schema::of::<T> as SchemaFn),
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum NestedSchema {
    Lazy(SchemaFn),
    Resolved(Arc<Schema>),
}

impl NestedSchema {
    pub(crate) fn resolve(&self) -> Result<Arc<Schema>, Error> {
        match self {
            Self::Lazy(compile) => compile(),
            Self::Resolved(schema) => Ok(Arc::clone(schema)),
        }
    }
}

/// One compiled field: its name, parsed path and nested schema for recursive fields.
#[derive(Clone, Debug)]
pub struct FieldPlan {
    name: String,
    path: FieldPath,
    nested: Option<NestedSchema>,
}

impl FieldPlan {
    fn compile(name: &str, tag: Option<&str>, nested: Option<NestedSchema>) -> Result<Self, Error> {
        let path = parse_tag(tag, name).map_err(|err| err.in_field(name))?;
        match (path.is_recursive(), nested.is_some()) {
            (true, false) => {
                return Err(Error::invalid_tag("recursive field has no nested schema")
                    .with_hint("Declare the nested tagged type with `FieldTag::nested`.")
                    .in_field(name));
            }
            (false, true) => {
                return Err(
                    Error::invalid_tag("nested schema declared on a non-recursive field")
                        .in_field(name),
                );
            }
            _ => {}
        }
        Ok(Self {
            name: name.to_string(),
            path,
            nested,
        })
    }

    /// Plan for a tagged-side field the schema does not list.
    pub(crate) fn untagged(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: FieldPath::own_name(name),
            nested: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub(crate) fn nested(&self) -> Option<&NestedSchema> {
        self.nested.as_ref()
    }
}

/// Compiled field table for one tagged shape.
#[derive(Debug)]
pub struct Schema {
    name: Option<&'static str>,
    fields: Vec<FieldPlan>,
    template: Option<Value>,
}

impl Schema {
    /// Returns the memoized schema for `T`, compiling it on first use.
    pub fn of<T: Tagged>() -> Result<Arc<Schema>, Error> {
        static CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<Schema>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(Default::default);
        let id = TypeId::of::<T>();

        if let Some(schema) = cache.read().ok().and_then(|map| map.get(&id).cloned()) {
            return Ok(schema);
        }

        let compiled = Arc::new(Self::compile::<T>()?);
        tracing::debug!(
            tagged = type_name::<T>(),
            fields = compiled.fields.len(),
            "compiled mapping schema"
        );
        match cache.write() {
            Ok(mut map) => Ok(Arc::clone(map.entry(id).or_insert(compiled))),
            Err(_) => Ok(compiled),
        }
    }

    fn compile<T: Tagged>() -> Result<Self, Error> {
        let template = serde_json::to_value(T::default()).map_err(|err| {
            Error::new(ErrorKind::Encode)
                .with_message(format!("cannot serialize default `{}`", type_name::<T>()))
                .with_source(err)
        })?;
        let Value::Object(members) = &template else {
            return Err(Error::invalid_tag(format!(
                "tagged type `{}` must serialize as a struct",
                type_name::<T>()
            )));
        };

        let mut seen = HashSet::new();
        for tag in T::TAGS {
            if !seen.insert(tag.name) {
                return Err(Error::invalid_tag("field tagged more than once").in_field(tag.name));
            }
        }

        let lookup = |name: &str| T::TAGS.iter().find(|tag| tag.name == name);
        let mut fields = Vec::with_capacity(members.len());
        for name in members.keys() {
            let tag = lookup(name);
            fields.push(FieldPlan::compile(
                name,
                tag.map(|tag| tag.tag),
                tag.and_then(|tag| tag.nested).map(NestedSchema::Lazy),
            )?);
        }
        for tag in T::TAGS.iter().filter(|tag| !members.contains_key(tag.name)) {
            fields.push(FieldPlan::compile(
                tag.name,
                Some(tag.tag),
                tag.nested.map(NestedSchema::Lazy),
            )?);
        }

        Ok(Self {
            name: Some(type_name::<T>()),
            fields,
            template: Some(template),
        })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Rust type name for typed schemas; `None` for dynamically built ones.
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|plan| plan.name == name)
    }

    /// Serialized `Default` of a typed schema, used to allocate fresh tagged values.
    pub(crate) fn template(&self) -> Option<&Value> {
        self.template.as_ref()
    }
}

/// Builds schemas at runtime, e.g. from mapping documents.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, Option<String>, Option<Arc<Schema>>)>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
        self.fields.push((name.into(), Some(tag.into()), None));
        self
    }

    pub fn plain(mut self, name: impl Into<String>) -> Self {
        self.fields.push((name.into(), None, None));
        self
    }

    pub fn nested(
        mut self,
        name: impl Into<String>,
        tag: impl Into<String>,
        schema: Arc<Schema>,
    ) -> Self {
        self.fields.push((name.into(), Some(tag.into()), Some(schema)));
        self
    }

    pub fn build(self) -> Result<Schema, Error> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, tag, nested) in self.fields {
            if !seen.insert(name.clone()) {
                return Err(Error::invalid_tag("field declared more than once").in_field(&name));
            }
            fields.push(FieldPlan::compile(
                &name,
                tag.as_deref(),
                nested.map(NestedSchema::Resolved),
            )?);
        }
        Ok(Schema {
            name: None,
            fields,
            template: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldTag, Schema, Tagged};
    use crate::core::error::ErrorKind;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Child {
        field1: String,
    }

    impl Tagged for Child {
        const TAGS: &'static [FieldTag] = &[FieldTag::new("Field1", "Dest1")];
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Parent {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon_id: Option<u64>,
        child: Option<Child>,
        #[serde(skip)]
        hidden: String,
    }

    impl Tagged for Parent {
        const TAGS: &'static [FieldTag] = &[
            FieldTag::new("IconID", "Icon.ID"),
            FieldTag::new("Child", ",recursive").nested::<Child>(),
        ];
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct RecursiveWithoutType {
        child: Option<Child>,
    }

    impl Tagged for RecursiveWithoutType {
        const TAGS: &'static [FieldTag] = &[FieldTag::new("child", ",recursive")];
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct BadModifier {
        name: String,
    }

    impl Tagged for BadModifier {
        const TAGS: &'static [FieldTag] = &[FieldTag::new("name", "Name,omit")];
    }

    #[test]
    fn fields_follow_serialization_order_then_unserialized_tags() {
        let schema = Schema::of::<Parent>().unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|plan| plan.name()).collect();
        assert_eq!(names, vec!["Name", "Child", "IconID"]);
        assert_eq!(schema.fields()[2].path().to_string(), "Icon.ID");
        assert!(schema.field("Hidden").is_none());
    }

    #[test]
    fn schemas_are_memoized_per_type() {
        let first = Schema::of::<Parent>().unwrap();
        let second = Schema::of::<Parent>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let nested = first
            .field("Child")
            .and_then(|plan| plan.nested())
            .expect("nested schema")
            .resolve()
            .unwrap();
        assert!(Arc::ptr_eq(&nested, &Schema::of::<Child>().unwrap()));
    }

    #[test]
    fn recursive_without_nested_type_is_invalid() {
        let err = Schema::of::<RecursiveWithoutType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTag);
        assert_eq!(err.field(), Some("child"));
    }

    #[test]
    fn invalid_modifier_reports_field() {
        let err = Schema::of::<BadModifier>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTag);
        assert_eq!(err.field(), Some("name"));
        assert_eq!(err.path(), Some("Name,omit"));
    }

    #[test]
    fn builder_rejects_duplicates_and_orphan_nested() {
        let err = Schema::builder().plain("A").plain("A").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTag);

        let child = Arc::new(Schema::builder().field("Field1", "Dest1").build().unwrap());
        let err = Schema::builder()
            .nested("Field", "Field", child)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTag);
        assert_eq!(err.field(), Some("Field"));
    }
}
