use std::sync::Arc;

use serde_json::{Map, Value};

use super::coerce::coerce_field;
use super::{
    schema, BoundModel, FieldSpec, FieldType, FieldViolation, ModelKey, ParamModel, RawValue,
    RawValues, SchemaRefs,
};
use crate::error::ConfigurationError;

/// A parameter model whose fields are declared at runtime.
///
/// ```ignore
/// let query = ModelSpec::new("BookQuery")
///     .field(FieldSpec::integer("age").ge(2).le(4))
///     .field(FieldSpec::string("author").optional())
///     .shared();
/// ```
///
/// `ModelSpec` is intentionally not `Clone`: each value is one declaration.
/// Share it between routes through the `Arc` returned by [`shared`](Self::shared).
#[derive(Debug)]
pub struct ModelSpec {
    key: ModelKey,
    name: String,
    description: Option<String>,
    fields: Vec<FieldSpec>,
    allow_extra: bool,
    populate_by_name: bool,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: ModelKey::next(),
            name: name.into(),
            description: None,
            fields: Vec::new(),
            allow_extra: false,
            populate_by_name: false,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Keep keys that match no declared field, uncoerced.
    pub fn allow_extra(mut self, allow: bool) -> Self {
        self.allow_extra = allow;
        self
    }

    /// Let an aliased field also be populated through its plain name.
    pub fn populate_by_name(mut self, populate: bool) -> Self {
        self.populate_by_name = populate;
        self
    }

    /// Freeze the declaration into a shareable model.
    pub fn shared(self) -> Arc<dyn ParamModel> {
        Arc::new(self)
    }

    fn lookup<'a>(&self, raw: &'a RawValues, field: &FieldSpec) -> Option<&'a RawValue> {
        raw.get(field.lookup_key()).or_else(|| {
            if self.populate_by_name && field.alias.is_some() {
                raw.get(&field.name)
            } else {
                None
            }
        })
    }

    fn is_declared(&self, raw: &RawValues, key: &str) -> bool {
        self.fields.iter().any(|f| {
            raw.matches(f.lookup_key(), key) || (self.populate_by_name && raw.matches(&f.name, key))
        })
    }
}

impl From<ModelSpec> for Arc<dyn ParamModel> {
    fn from(spec: ModelSpec) -> Self {
        spec.shared()
    }
}

impl ParamModel for ModelSpec {
    fn key(&self) -> ModelKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn validate(&self, raw: &RawValues) -> Result<BoundModel, Vec<FieldViolation>> {
        let mut bound = BoundModel::default();
        let mut violations = Vec::new();

        for field in &self.fields {
            match self.lookup(raw, field) {
                Some(RawValue::Files(files)) if field.field_type.is_file() => {
                    let single = matches!(field.field_type, FieldType::File);
                    if single && files.len() > 1 {
                        violations.push(FieldViolation::new(
                            &field.name,
                            "expected a single file",
                            RawValue::Files(files.clone()).to_input(),
                        ));
                        continue;
                    }
                    bound.files.insert(field.name.clone(), files.clone());
                }
                Some(value) if field.field_type.is_file() => {
                    violations.push(FieldViolation::new(
                        &field.name,
                        "expected a file upload",
                        value.to_input(),
                    ));
                }
                Some(value) => match coerce_field(field, value, &field.name) {
                    Ok(coerced) => {
                        bound.values.insert(field.name.clone(), coerced);
                    }
                    Err(errs) => violations.extend(errs),
                },
                None if field.required => {
                    violations.push(FieldViolation::new(&field.name, "field required", Value::Null));
                }
                None => {
                    if !field.field_type.is_file() {
                        let default = field.default.clone().unwrap_or(Value::Null);
                        bound.values.insert(field.name.clone(), default);
                    }
                }
            }
        }

        if self.allow_extra {
            for (key, value) in raw.iter() {
                if self.is_declared(raw, key) {
                    continue;
                }
                match value {
                    RawValue::Files(files) => {
                        bound.files.insert(key.to_string(), files.clone());
                    }
                    other => {
                        bound.values.insert(key.to_string(), other.to_input());
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(bound)
        } else {
            Err(violations)
        }
    }

    fn json_schema(&self, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
        let mut schema = schema::object_schema(&self.name, &self.fields, self.allow_extra, refs)?;
        if let (Some(description), Value::Object(obj)) = (&self.description, &mut schema) {
            obj.insert("description".into(), Value::String(description.clone()));
        }
        Ok(schema)
    }
}

/// Schema refs that inline nothing and never fail; used where a model's
/// schema is needed without a registry (tests, debugging).
#[derive(Default)]
pub struct InlineRefs {
    pub definitions: Map<String, Value>,
}

impl SchemaRefs for InlineRefs {
    fn model_ref(&mut self, model: &Arc<dyn ParamModel>) -> Result<String, ConfigurationError> {
        let name = model.name().to_string();
        if !self.definitions.contains_key(&name) {
            self.definitions.insert(name.clone(), Value::Null);
            let schema = model.json_schema(self)?;
            self.definitions.insert(name.clone(), schema);
        }
        Ok(super::component_ref(&name))
    }

    fn definition_name(&mut self, name: &str) -> Result<String, ConfigurationError> {
        Ok(name.to_string())
    }

    fn define(&mut self, assigned: &str, schema: Value) {
        self.definitions.insert(assigned.to_string(), schema);
    }
}
