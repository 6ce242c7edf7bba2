use std::marker::PhantomData;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::coerce::coerce_field;
use super::{
    BoundModel, Constraints, FieldSpec, FieldType, FieldViolation, ModelKey, ParamModel, Pattern,
    RawValues, SchemaRefs,
};
use crate::error::ConfigurationError;

/// A parameter model backed by a Rust type.
///
/// Fields are described from the type's schemars schema. Raw values are
/// coerced by the declared JSON types, deserialized with serde, then checked
/// with `garde`.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema, Validate)]
/// struct BookQuery {
///     #[garde(range(min = 2, max = 4))]
///     age: i64,
/// }
///
/// RouteDescriptor::get("/book", list_books).query(TypedModel::<BookQuery>::new())
/// ```
pub struct TypedModel<T> {
    name: String,
    fields: Vec<FieldSpec>,
    schema: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedModel<T>
where
    T: DeserializeOwned + JsonSchema + garde::Validate + 'static,
    T::Context: Default,
{
    pub fn new() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or_else(|_| json!({ "type": "object" }));
        let fields = describe_schema(&schema);
        Self {
            name: T::schema_name().into_owned(),
            fields,
            schema,
            _marker: PhantomData,
        }
    }

    pub fn shared() -> Arc<dyn ParamModel> {
        Arc::new(Self::new())
    }
}

impl<T> Default for TypedModel<T>
where
    T: DeserializeOwned + JsonSchema + garde::Validate + 'static,
    T::Context: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<TypedModel<T>> for Arc<dyn ParamModel>
where
    T: DeserializeOwned + JsonSchema + garde::Validate + 'static,
    T::Context: Default,
{
    fn from(model: TypedModel<T>) -> Self {
        Arc::new(model)
    }
}

impl<T> ParamModel for TypedModel<T>
where
    T: DeserializeOwned + JsonSchema + garde::Validate + 'static,
    T::Context: Default,
{
    fn key(&self) -> ModelKey {
        ModelKey::of::<T>()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn shared_definition(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, raw: &RawValues) -> Result<BoundModel, Vec<FieldViolation>> {
        let mut object = Map::new();
        let mut violations = Vec::new();
        // Fields already reported; they hold placeholders so serde and garde
        // can still check the rest.
        let mut failed: Vec<&str> = Vec::new();

        for field in &self.fields {
            match raw.get(&field.name) {
                Some(value) => match coerce_field(field, value, &field.name) {
                    // Optional and not nullable: leave it to the serde default.
                    Ok(Value::Null) if !field.required && !field.nullable => {}
                    Ok(coerced) => {
                        object.insert(field.name.clone(), coerced);
                    }
                    Err(errs) => {
                        violations.extend(errs);
                        failed.push(&field.name);
                        object.insert(field.name.clone(), placeholder(&field.field_type));
                    }
                },
                None if field.required => {
                    violations.push(FieldViolation::new(&field.name, "field required", Value::Null));
                    failed.push(&field.name);
                    object.insert(field.name.clone(), placeholder(&field.field_type));
                }
                None => {}
            }
        }

        let typed: T = match serde_json::from_value(Value::Object(object.clone())) {
            Ok(typed) => typed,
            Err(_) if !violations.is_empty() => return Err(violations),
            Err(e) => {
                return Err(vec![FieldViolation::new("__root__", e.to_string(), Value::Object(object))]);
            }
        };

        if let Err(report) = typed.validate() {
            for (path, error) in report.iter() {
                let field = match path.to_string() {
                    s if s.is_empty() => "__root__".to_string(),
                    s => s,
                };
                let top = field.split(['.', '[']).next().unwrap_or_default();
                if failed.contains(&top) {
                    continue;
                }
                let input = object.get(top).cloned().unwrap_or(Value::Null);
                violations.push(FieldViolation::new(field.clone(), error.message().to_string(), input));
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }
        Ok(BoundModel {
            values: object,
            files: Default::default(),
        })
    }

    fn json_schema(&self, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
        let mut schema = self.schema.clone();
        let mut definitions = Vec::new();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            // schemars 1.x uses "$defs" (Draft 2020-12)
            if let Some(Value::Object(defs)) = obj.remove("$defs") {
                definitions.extend(defs);
            }
        }

        let mut renames = Vec::with_capacity(definitions.len());
        for (name, _) in &definitions {
            renames.push((name.clone(), refs.definition_name(name)?));
        }
        for ((_, mut def), (_, assigned)) in definitions.into_iter().zip(&renames) {
            rewrite_refs(&mut def, &renames);
            refs.define(assigned, def);
        }
        rewrite_refs(&mut schema, &renames);
        Ok(schema)
    }
}

/// Recursively rewrite `$ref` paths from schemars format to OpenAPI components format.
fn rewrite_refs(value: &mut Value, renames: &[(String, String)]) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(ref_str)) = obj.get_mut("$ref") {
                if let Some(def) = ref_str.strip_prefix("#/$defs/") {
                    let assigned = renames
                        .iter()
                        .find(|(original, _)| original == def)
                        .map(|(_, assigned)| assigned.as_str())
                        .unwrap_or(def);
                    *ref_str = super::component_ref(assigned);
                }
            }
            for (_, v) in obj.iter_mut() {
                rewrite_refs(v, renames);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                rewrite_refs(v, renames);
            }
        }
        _ => {}
    }
}

/// A well-typed stand-in for a field that failed coercion.
fn placeholder(ty: &FieldType) -> Value {
    match ty {
        FieldType::String | FieldType::File => json!(""),
        FieldType::Integer | FieldType::Number => json!(0),
        FieldType::Boolean => json!(false),
        FieldType::Enum(values) => values.first().map_or(Value::Null, |v| json!(v)),
        FieldType::Array(_) => json!([]),
        FieldType::Model(_) | FieldType::Any => Value::Null,
    }
}

/// Derive field declarations from an object schema.
fn describe_schema(schema: &Value) -> Vec<FieldSpec> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema["properties"].as_object() else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let mut field = FieldSpec::new(name.clone(), field_type(prop));
            field.required = required.contains(&name.as_str());
            field.nullable = is_nullable(prop);
            field.default = prop.get("default").cloned();
            field.description = prop["description"].as_str().map(str::to_string);
            field.deprecated = prop["deprecated"].as_bool().unwrap_or(false);
            // schemars writes `#[schemars(example = ..)]` as an `examples` array.
            field.example = prop
                .get("example")
                .or_else(|| prop["examples"].get(0))
                .cloned();
            field.constraints = constraints(prop);
            field
        })
        .collect()
}

/// `Option<T>` renders as `"type": ["T", "null"]`, or as an `anyOf` with a
/// null branch when `T` is a referenced type.
fn is_nullable(prop: &Value) -> bool {
    let null_type = |v: &Value| v == "null";
    match &prop["type"] {
        Value::Array(types) => types.iter().any(null_type),
        Value::String(ty) => ty == "null",
        _ => prop["anyOf"]
            .as_array()
            .is_some_and(|branches| branches.iter().any(|b| null_type(&b["type"]))),
    }
}

fn field_type(prop: &Value) -> FieldType {
    if let Some(values) = prop["enum"].as_array() {
        let values: Vec<String> = values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            return FieldType::Enum(values);
        }
    }
    // `Option<T>` is rendered as `"type": ["T", "null"]`.
    let ty = match &prop["type"] {
        Value::String(s) => s.as_str(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or(""),
        _ => "",
    };
    match ty {
        "string" if prop["format"] == "binary" => FieldType::File,
        "string" => FieldType::String,
        "integer" => FieldType::Integer,
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "array" => FieldType::array(field_type(&prop["items"])),
        _ => FieldType::Any,
    }
}

fn constraints(prop: &Value) -> Constraints {
    let count = |key: &str| prop[key].as_u64().map(|n| n as usize);
    Constraints {
        minimum: prop["minimum"].as_f64(),
        maximum: prop["maximum"].as_f64(),
        exclusive_minimum: prop["exclusiveMinimum"].as_f64(),
        exclusive_maximum: prop["exclusiveMaximum"].as_f64(),
        min_length: count("minLength"),
        max_length: count("maxLength"),
        min_items: count("minItems"),
        max_items: count("maxItems"),
        pattern: prop["pattern"].as_str().map(Pattern::new),
    }
}
