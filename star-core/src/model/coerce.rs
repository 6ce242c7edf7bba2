//! Coercion of raw request values into typed JSON, and constraint checks.

use serde_json::{Number, Value};

use super::{Constraints, FieldSpec, FieldType, FieldViolation, RawValue, RawValues};

/// Coerce one raw value to the declared type of `field`.
///
/// `path` is the dotted name used in violations; nested models extend it.
pub(crate) fn coerce_field(
    field: &FieldSpec,
    raw: &RawValue,
    path: &str,
) -> Result<Value, Vec<FieldViolation>> {
    if let RawValue::Json(Value::Null) = raw {
        if field.nullable {
            return Ok(Value::Null);
        }
        if !field.required {
            return Ok(field.default.clone().unwrap_or(Value::Null));
        }
    }
    let value = coerce(&field.field_type, raw, path)?;
    match check_constraints(&field.constraints, &value) {
        Some(reason) => Err(vec![FieldViolation::new(path, reason, raw.to_input())]),
        None => Ok(value),
    }
}

fn coerce(ty: &FieldType, raw: &RawValue, path: &str) -> Result<Value, Vec<FieldViolation>> {
    let fail = |reason: String| vec![FieldViolation::new(path, reason, raw.to_input())];

    match (ty, raw) {
        (FieldType::Array(inner), RawValue::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_item(inner, &RawValue::Text(item.clone()), path, i))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldType::Array(inner), RawValue::Json(Value::Array(items))) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_item(inner, &RawValue::Json(item.clone()), path, i))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldType::Array(inner), RawValue::Text(_)) => {
            coerce_item(inner, raw, path, 0).map(|v| Value::Array(vec![v]))
        }
        (FieldType::Array(_), _) => Err(fail("expected a list".into())),
        (FieldType::Any, RawValue::List(items)) => Ok(Value::Array(
            items.iter().cloned().map(Value::String).collect(),
        )),
        (_, RawValue::List(items)) => match items.last() {
            // A repeated scalar key keeps its last value.
            Some(last) => coerce(ty, &RawValue::Text(last.clone()), path),
            None => Err(fail(format!("expected {}", ty.describe()))),
        },
        (FieldType::Model(model), RawValue::Json(Value::Object(object))) => {
            validate_nested(model.as_ref(), object.clone(), path)
        }
        (FieldType::Model(model), RawValue::Text(text)) => {
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(object)) => validate_nested(model.as_ref(), object, path),
                _ => Err(fail(format!("expected a JSON object for {}", model.name()))),
            }
        }
        (FieldType::Model(model), _) => {
            Err(fail(format!("expected a JSON object for {}", model.name())))
        }
        (FieldType::File, _) | (_, RawValue::Files(_)) => {
            Err(fail("expected a file upload".into()))
        }
        (_, RawValue::Text(text)) => coerce_text(ty, text).map_err(fail),
        (_, RawValue::Json(value)) => coerce_json(ty, value).map_err(fail),
    }
}

fn coerce_item(
    ty: &FieldType,
    raw: &RawValue,
    path: &str,
    index: usize,
) -> Result<Value, Vec<FieldViolation>> {
    let item_path = format!("{path}.{index}");
    coerce(ty, raw, &item_path)
}

fn validate_nested(
    model: &dyn super::ParamModel,
    object: serde_json::Map<String, Value>,
    path: &str,
) -> Result<Value, Vec<FieldViolation>> {
    model
        .validate(&RawValues::from_json_object(object))
        .map(|bound| Value::Object(bound.values))
        .map_err(|violations| {
            violations
                .into_iter()
                .map(|v| FieldViolation {
                    field: format!("{path}.{}", v.field),
                    ..v
                })
                .collect()
        })
}

pub(crate) fn coerce_text(ty: &FieldType, text: &str) -> Result<Value, String> {
    match ty {
        FieldType::String | FieldType::Any => Ok(Value::String(text.to_string())),
        FieldType::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| "expected integer".to_string()),
        FieldType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "expected number".to_string()),
        FieldType::Boolean => parse_bool(text)
            .map(Value::Bool)
            .ok_or_else(|| "expected boolean".to_string()),
        FieldType::Enum(values) => check_enum(values, text),
        FieldType::Array(_) | FieldType::Model(_) | FieldType::File => {
            Err(format!("expected {}", ty.describe()))
        }
    }
}

fn coerce_json(ty: &FieldType, value: &Value) -> Result<Value, String> {
    match (ty, value) {
        (FieldType::Any, v) => Ok(v.clone()),
        (FieldType::String, Value::String(_)) => Ok(value.clone()),
        (FieldType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(value.clone())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err("expected integer".into()),
                }
            }
        }
        (FieldType::Number, Value::Number(_)) => Ok(value.clone()),
        (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (FieldType::Enum(values), Value::String(s)) => check_enum(values, s),
        // Lax mode: numeric and boolean strings inside JSON payloads.
        (FieldType::Integer | FieldType::Number | FieldType::Boolean, Value::String(s)) => {
            coerce_text(ty, s)
        }
        _ => Err(format!("expected {}", ty.describe())),
    }
}

fn check_enum(values: &[String], text: &str) -> Result<Value, String> {
    if values.iter().any(|v| v == text) {
        Ok(Value::String(text.to_string()))
    } else {
        Err(format!("must be one of [{}]", values.join(", ")))
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Check a coerced value against its constraints.
///
/// Returns the reason for the first violated constraint.
pub(crate) fn check_constraints(c: &Constraints, value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64()?;
            if let Some(min) = c.minimum {
                if n < min {
                    return Some(format!("must be ≥ {}", format_bound(min)));
                }
            }
            if let Some(max) = c.maximum {
                if n > max {
                    return Some(format!("must be ≤ {}", format_bound(max)));
                }
            }
            if let Some(min) = c.exclusive_minimum {
                if n <= min {
                    return Some(format!("must be > {}", format_bound(min)));
                }
            }
            if let Some(max) = c.exclusive_maximum {
                if n >= max {
                    return Some(format!("must be < {}", format_bound(max)));
                }
            }
            None
        }
        Value::String(s) => {
            let len = s.chars().count();
            if let Some(min) = c.min_length {
                if len < min {
                    return Some(format!("length must be ≥ {min}"));
                }
            }
            if let Some(max) = c.max_length {
                if len > max {
                    return Some(format!("length must be ≤ {max}"));
                }
            }
            if let Some(pattern) = &c.pattern {
                if !pattern.is_match(s) {
                    return Some(format!("must match pattern {}", pattern.source));
                }
            }
            None
        }
        Value::Array(items) => {
            if let Some(min) = c.min_items {
                if items.len() < min {
                    return Some(format!("must contain at least {min} items"));
                }
            }
            if let Some(max) = c.max_items {
                if items.len() > max {
                    return Some(format!("must contain at most {max} items"));
                }
            }
            None
        }
        _ => None,
    }
}

/// Render a bound without a trailing `.0` for whole numbers.
pub(crate) fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        format!("{bound}")
    }
}
