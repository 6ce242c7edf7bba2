//! JSON Schema fragments for declared fields.

use serde_json::{json, Map, Number, Value};

use super::{Constraints, FieldSpec, FieldType, SchemaRefs};
use crate::error::ConfigurationError;

/// Schema of a field's type, including its constraints but no annotations.
///
/// This is what goes under `schema` in an OpenAPI parameter object.
pub fn type_schema(field: &FieldSpec, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
    let mut schema = bare_type_schema(&field.field_type, refs)?;
    if field.nullable {
        schema = nullable(schema);
    }
    if let Value::Object(obj) = &mut schema {
        apply_constraints(obj, &field.constraints);
        if let Some(default) = &field.default {
            obj.insert("default".into(), default.clone());
        }
    }
    Ok(schema)
}

/// Schema of a field as a model property: type, constraints and annotations.
pub fn property_schema(field: &FieldSpec, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
    let mut schema = type_schema(field, refs)?;
    if let Value::Object(obj) = &mut schema {
        if let Some(description) = &field.description {
            obj.insert("description".into(), json!(description));
        }
        if field.deprecated {
            obj.insert("deprecated".into(), json!(true));
        }
        if let Some(example) = &field.example {
            obj.insert("example".into(), example.clone());
        }
        if let Some(examples) = &field.examples {
            obj.insert("examples".into(), examples.clone());
        }
        for (k, v) in &field.extensions {
            obj.insert(k.clone(), v.clone());
        }
    }
    Ok(schema)
}

/// Object schema for a list of fields.
pub fn object_schema(
    title: &str,
    fields: &[FieldSpec],
    allow_extra: bool,
    refs: &mut dyn SchemaRefs,
) -> Result<Value, ConfigurationError> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let key = field.lookup_key().to_string();
        if field.required {
            required.push(json!(key));
        }
        properties.insert(key, property_schema(field, refs)?);
    }

    let mut schema = Map::new();
    schema.insert("title".into(), json!(title));
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    if allow_extra {
        schema.insert("additionalProperties".into(), json!(true));
    }
    Ok(Value::Object(schema))
}

fn bare_type_schema(ty: &FieldType, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
    Ok(match ty {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Integer => json!({ "type": "integer" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldType::Array(inner) => json!({
            "type": "array",
            "items": bare_type_schema(inner, refs)?,
        }),
        FieldType::Model(model) => json!({ "$ref": refs.model_ref(model)? }),
        FieldType::File => json!({ "type": "string", "format": "binary" }),
        FieldType::Any => json!({}),
    })
}

/// `{"type": "T"}` becomes `{"type": ["T", "null"]}`; anything else is
/// wrapped in `anyOf` with a null alternative.
fn nullable(schema: Value) -> Value {
    match schema {
        Value::Object(mut obj) => match obj.get("type").cloned() {
            Some(Value::String(ty)) => {
                obj.insert("type".into(), json!([ty, "null"]));
                Value::Object(obj)
            }
            _ if obj.is_empty() => Value::Object(obj),
            _ => json!({ "anyOf": [Value::Object(obj), { "type": "null" }] }),
        },
        other => other,
    }
}

fn apply_constraints(obj: &mut Map<String, Value>, c: &Constraints) {
    let numeric = [
        ("minimum", c.minimum),
        ("maximum", c.maximum),
        ("exclusiveMinimum", c.exclusive_minimum),
        ("exclusiveMaximum", c.exclusive_maximum),
    ];
    for (key, bound) in numeric {
        if let Some(bound) = bound {
            obj.insert(key.into(), number(bound));
        }
    }
    let counts = [
        ("minLength", c.min_length),
        ("maxLength", c.max_length),
        ("minItems", c.min_items),
        ("maxItems", c.max_items),
    ];
    for (key, count) in counts {
        if let Some(count) = count {
            obj.insert(key.into(), json!(count));
        }
    }
    if let Some(pattern) = &c.pattern {
        obj.insert("pattern".into(), json!(pattern.source));
    }
}

fn number(bound: f64) -> Value {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        json!(bound as i64)
    } else {
        Number::from_f64(bound).map(Value::Number).unwrap_or(Value::Null)
    }
}
