use crate::http::response::{IntoResponse, Response};
use crate::http::{Json, StatusCode};
use crate::kind::ParamKind;
use serde::Serialize;
use serde_json::Value;

// ── Error types ────────────────────────────────────────────

/// A single invalid field, tagged with the request part it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub kind: ParamKind,
    pub field: String,
    pub reason: String,
    pub input: Value,
}

/// Request-time binding failure.
///
/// Lists every invalid field across every declared kind. Rendered as
/// `{"errors": [...]}` with status 422.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Errors reported for one kind.
    pub fn for_kind(&self, kind: ParamKind) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// First error reported for the given field, if any.
    pub fn field(&self, kind: ParamKind, field: &str) -> Option<&FieldError> {
        self.errors
            .iter()
            .find(|e| e.kind == kind && e.field == field)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation Error: {} errors", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}.{}: {}", err.kind, err.field, err.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Status of a validation failure unless the app sets another one.
pub const DEFAULT_VALIDATION_STATUS: StatusCode = StatusCode::UNPROCESSABLE_ENTITY;

impl ValidationError {
    /// Render with a status other than 422.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        self.into_response_with(DEFAULT_VALIDATION_STATUS)
    }
}

/// JSON Schema of the validation error payload, published in the document
/// as the `ValidationErrorModel` component.
pub fn validation_error_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "errors": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kind": {
                            "type": "string",
                            "enum": ["path", "query", "header", "cookie", "form", "body"]
                        },
                        "field": { "type": "string" },
                        "reason": { "type": "string" },
                        "input": {}
                    },
                    "required": ["kind", "field", "reason", "input"]
                }
            }
        },
        "required": ["errors"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_error_list_shape() {
        let err = ValidationError::new(vec![FieldError {
            kind: ParamKind::Query,
            field: "age".into(),
            reason: "must be ≤ 4".into(),
            input: json!("10"),
        }]);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({ "errors": [
                { "kind": "query", "field": "age", "reason": "must be ≤ 4", "input": "10" }
            ]})
        );
    }

    #[test]
    fn lookup_by_kind_and_field() {
        let err = ValidationError::new(vec![
            FieldError { kind: ParamKind::Path, field: "bid".into(), reason: "expected integer".into(), input: json!("x") },
            FieldError { kind: ParamKind::Query, field: "bid".into(), reason: "field required".into(), input: Value::Null },
        ]);
        assert_eq!(err.for_kind(ParamKind::Path).count(), 1);
        assert_eq!(err.field(ParamKind::Query, "bid").unwrap().reason, "field required");
        assert!(err.field(ParamKind::Body, "bid").is_none());
    }
}
