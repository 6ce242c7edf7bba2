//! Request-time binding: raw request parts in, validated values out.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::extract::{RawRequest, ROOT_FIELD};
use crate::kind::ParamKind;
use crate::model::{BoundModel, FieldViolation};
use crate::multipart::UploadedFile;
use crate::router::{Models, ResolvedRoute};
use crate::validation::{FieldError, ValidationError};

/// The validated values of every declared kind of a route, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct BoundParams {
    slots: [Option<BoundModel>; 6],
}

impl BoundParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ParamKind, model: BoundModel) {
        self.slots[kind.index()] = Some(model);
    }

    /// The bound model of one kind, if the route declared it.
    pub fn model(&self, kind: ParamKind) -> Option<&BoundModel> {
        self.slots[kind.index()].as_ref()
    }

    pub fn path(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Path)
    }

    pub fn query(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Query)
    }

    pub fn header(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Header)
    }

    pub fn cookie(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Cookie)
    }

    pub fn form(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Form)
    }

    pub fn body(&self) -> Option<&BoundModel> {
        self.model(ParamKind::Body)
    }

    /// Deserialize the values of one kind into a typed struct.
    ///
    /// An undeclared kind deserializes from an empty object.
    pub fn get<T: DeserializeOwned>(&self, kind: ParamKind) -> Result<T, serde_json::Error> {
        match self.model(kind) {
            Some(model) => model.deserialize(),
            None => serde_json::from_value(Value::Object(Map::new())),
        }
    }

    /// One bound value.
    pub fn value(&self, kind: ParamKind, field: &str) -> Option<&Value> {
        self.model(kind).and_then(|m| m.get(field))
    }

    /// The first file uploaded under a form field.
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.form().and_then(|m| m.file(field))
    }

    /// The JSON values of every declared kind, keyed by kind name.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for kind in ParamKind::ALL {
            if let Some(model) = self.model(kind) {
                out.insert(kind.as_str().to_string(), Value::Object(model.values.clone()));
            }
        }
        Value::Object(out)
    }
}

/// Runs extraction and validation for every declared kind of a route.
pub struct ParameterBinder;

impl ParameterBinder {
    pub fn bind(route: &ResolvedRoute, raw: &RawRequest) -> Result<BoundParams, ValidationError> {
        Self::bind_models(&route.models, raw)
    }

    /// Bind every declared model. All kinds are processed even after a
    /// failure, so the error lists every invalid field of the request.
    pub fn bind_models(models: &Models, raw: &RawRequest) -> Result<BoundParams, ValidationError> {
        let mut bound = BoundParams::new();
        let mut errors = Vec::new();

        for (kind, model) in models.iter() {
            let values = match raw.values(kind) {
                Ok(values) => values,
                Err(violation) => {
                    errors.push(field_error(kind, violation));
                    continue;
                }
            };

            match catch_unwind(AssertUnwindSafe(|| model.validate(&values))) {
                Ok(Ok(values)) => bound.insert(kind, values),
                Ok(Err(violations)) => {
                    errors.extend(violations.into_iter().map(|v| field_error(kind, v)));
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(kind = %kind, model = model.name(), message = %message, "Model validation panicked");
                    errors.push(FieldError {
                        kind,
                        field: ROOT_FIELD.to_string(),
                        reason: format!("validation failed: {message}"),
                        input: Value::Null,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(bound)
        } else {
            Err(ValidationError::new(errors))
        }
    }
}

fn field_error(kind: ParamKind, violation: FieldViolation) -> FieldError {
    FieldError {
        kind,
        field: violation.field,
        reason: violation.reason,
        input: violation.input,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
