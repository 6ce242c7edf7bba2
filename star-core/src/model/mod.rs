//! Parameter models: the declared shape of one part of a request.
//!
//! A model enumerates its fields, validates a bag of raw values into typed
//! JSON values, and describes itself as a JSON Schema fragment. Two adapters
//! ship with the crate:
//!
//! - [`ModelSpec`]: fields declared at runtime with a builder.
//! - [`TypedModel`]: a Rust type deriving `Deserialize`, `JsonSchema` and
//!   `garde::Validate`.

mod coerce;
pub mod schema;
mod spec;
mod typed;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::multipart::UploadedFile;

pub use spec::{InlineRefs, ModelSpec};
pub use typed::TypedModel;

// ── Identity ────────────────────────────────────────────────────────────────

/// Stable identity of a model declaration.
///
/// Every [`ModelSpec::new`] call draws a fresh key, so two declarations with
/// the same fields are still distinct models. Sharing a model between routes
/// means sharing the same `Arc<dyn ParamModel>`, which carries the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelKey(KeyInner);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyInner {
    Declared(u64),
    Type(TypeId),
}

static NEXT_DECLARATION: AtomicU64 = AtomicU64::new(1);

impl ModelKey {
    /// Allocate the key of a new declaration.
    pub fn next() -> Self {
        ModelKey(KeyInner::Declared(
            NEXT_DECLARATION.fetch_add(1, Ordering::Relaxed),
        ))
    }

    /// The key of a model backed by the Rust type `T`.
    pub fn of<T: 'static>() -> Self {
        ModelKey(KeyInner::Type(TypeId::of::<T>()))
    }
}

// ── Field declarations ──────────────────────────────────────────────────────

/// Semantic type of a declared field.
#[derive(Clone)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// A string restricted to the listed values.
    Enum(Vec<String>),
    Array(Box<FieldType>),
    /// A nested model, validated recursively and emitted as a `$ref`.
    Model(Arc<dyn ParamModel>),
    /// An uploaded file, only available in form models.
    File,
    /// Anything; passed through as-is.
    Any,
}

impl FieldType {
    pub fn array(inner: FieldType) -> Self {
        FieldType::Array(Box::new(inner))
    }

    /// Whether this type holds uploaded files.
    pub fn is_file(&self) -> bool {
        match self {
            FieldType::File => true,
            FieldType::Array(inner) => inner.is_file(),
            _ => false,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Integer => "integer".into(),
            FieldType::Number => "number".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Enum(_) => "enum".into(),
            FieldType::Array(inner) => format!("array of {}", inner.describe()),
            FieldType::Model(model) => model.name().to_string(),
            FieldType::File => "file".into(),
            FieldType::Any => "any".into(),
        }
    }
}

impl std::fmt::Debug for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Enum(values) => f.debug_tuple("Enum").field(values).finish(),
            FieldType::Array(inner) => f.debug_tuple("Array").field(inner).finish(),
            FieldType::Model(model) => f.debug_tuple("Model").field(&model.name()).finish(),
            other => f.write_str(&other.describe()),
        }
    }
}

/// A regular-expression constraint, compiled once at declaration.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    compiled: Result<Regex, String>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&source).map_err(|e| e.to_string());
        Self { source, compiled }
    }

    pub(crate) fn is_match(&self, text: &str) -> bool {
        match &self.compiled {
            Ok(re) => re.is_match(text),
            Err(_) => false,
        }
    }
}

/// Constraints enforced by [`ParamModel::validate`] and published in the schema.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub pattern: Option<Pattern>,
}

/// One declared field of a parameter model.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// The key looked up in the request, when it differs from `name`.
    pub alias: Option<String>,
    pub field_type: FieldType,
    pub required: bool,
    /// An explicit `null` is accepted and bound as `null`.
    pub nullable: bool,
    pub default: Option<Value>,
    pub constraints: Constraints,
    pub description: Option<String>,
    pub deprecated: bool,
    pub example: Option<Value>,
    /// Named examples, emitted as the OpenAPI `examples` map.
    pub examples: Option<Value>,
    /// Vendor extensions (`x-…`) copied verbatim into the schema.
    pub extensions: Map<String, Value>,
}

impl FieldSpec {
    /// A required field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            field_type,
            required: true,
            nullable: false,
            default: None,
            constraints: Constraints::default(),
            description: None,
            deprecated: false,
            example: None,
            examples: None,
            extensions: Map::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::File)
    }

    pub fn array(name: impl Into<String>, items: FieldType) -> Self {
        Self::new(name, FieldType::array(items))
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(name, FieldType::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn model(name: impl Into<String>, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        Self::new(name, FieldType::Model(model.into()))
    }

    /// Make the field optional; a missing or `null` value binds to `null`.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Accept an explicit `null`, even when the field is required.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set a default value. Implies optional.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn examples(mut self, examples: impl Into<Value>) -> Self {
        self.examples = Some(examples.into());
        self
    }

    /// Attach a vendor extension. The key is prefixed with `x-` if needed.
    pub fn extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        let key = if key.starts_with("x-") {
            key.to_string()
        } else {
            format!("x-{key}")
        };
        self.extensions.insert(key, value.into());
        self
    }

    /// `value >= min`
    pub fn ge(mut self, min: impl Into<f64>) -> Self {
        self.constraints.minimum = Some(min.into());
        self
    }

    /// `value <= max`
    pub fn le(mut self, max: impl Into<f64>) -> Self {
        self.constraints.maximum = Some(max.into());
        self
    }

    /// `value > min`
    pub fn gt(mut self, min: impl Into<f64>) -> Self {
        self.constraints.exclusive_minimum = Some(min.into());
        self
    }

    /// `value < max`
    pub fn lt(mut self, max: impl Into<f64>) -> Self {
        self.constraints.exclusive_maximum = Some(max.into());
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints.max_length = Some(len);
        self
    }

    pub fn min_items(mut self, len: usize) -> Self {
        self.constraints.min_items = Some(len);
        self
    }

    pub fn max_items(mut self, len: usize) -> Self {
        self.constraints.max_items = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(Pattern::new(pattern));
        self
    }

    /// The key this field is read from in the raw request data.
    pub fn lookup_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Startup check: a `pattern` constraint must compile.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        match &self.constraints.pattern {
            Some(Pattern { source, compiled: Err(message) }) => {
                Err(ConfigurationError::InvalidPattern {
                    field: self.name.clone(),
                    pattern: source.clone(),
                    message: message.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

// ── Raw request data ────────────────────────────────────────────────────────

/// A value as extracted from the request, before coercion.
#[derive(Debug, Clone)]
pub enum RawValue {
    Text(String),
    /// A repeated key (`?tag=a&tag=b`, a header sent twice, …).
    List(Vec<String>),
    /// A value taken from a parsed JSON payload.
    Json(Value),
    Files(Vec<UploadedFile>),
}

impl RawValue {
    /// The raw value as reported in error payloads.
    pub fn to_input(&self) -> Value {
        match self {
            RawValue::Text(s) => Value::String(s.clone()),
            RawValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            RawValue::Json(v) => v.clone(),
            RawValue::Files(files) => Value::Array(
                files
                    .iter()
                    .map(|f| f.file_name.clone().map(Value::String).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

/// The bag of raw values for one request part, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RawValues {
    entries: Vec<(String, RawValue)>,
    case_insensitive: bool,
}

impl RawValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bag whose keys are matched case-insensitively (HTTP headers).
    pub fn case_insensitive() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: true,
        }
    }

    /// Build from the top-level keys of a JSON object.
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        Self {
            entries: object
                .into_iter()
                .map(|(k, v)| (k, RawValue::Json(v)))
                .collect(),
            case_insensitive: false,
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        if self.case_insensitive {
            self.entries
                .iter()
                .position(|(k, _)| k.eq_ignore_ascii_case(key))
        } else {
            self.entries.iter().position(|(k, _)| k == key)
        }
    }

    /// Append a text value; a repeated key turns into a list.
    pub fn push_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(idx) => {
                let slot = &mut self.entries[idx].1;
                match slot {
                    RawValue::Text(first) => {
                        *slot = RawValue::List(vec![std::mem::take(first), value]);
                    }
                    RawValue::List(items) => items.push(value),
                    other => *other = RawValue::Text(value),
                }
            }
            None => self.entries.push((key, RawValue::Text(value))),
        }
    }

    pub fn push_file(&mut self, key: impl Into<String>, file: UploadedFile) {
        let key = key.into();
        match self.position(&key) {
            Some(idx) => match &mut self.entries[idx].1 {
                RawValue::Files(files) => files.push(file),
                other => *other = RawValue::Files(vec![file]),
            },
            None => self.entries.push((key, RawValue::Files(vec![file]))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        let key = key.into();
        match self.position(&key) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn matches(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

// ── Validation output ───────────────────────────────────────────────────────

/// One invalid field, as reported by a model adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
    pub input: Value,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>, input: Value) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            input,
        }
    }
}

/// The validated values of one model.
///
/// Uploaded files are not representable as JSON; they are kept aside as
/// opaque handles.
#[derive(Debug, Clone, Default)]
pub struct BoundModel {
    pub values: Map<String, Value>,
    pub files: HashMap<String, Vec<UploadedFile>>,
}

impl BoundModel {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// The first file uploaded under `field`.
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field).and_then(|files| files.first())
    }

    pub fn files(&self, field: &str) -> &[UploadedFile] {
        self.files.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deserialize the JSON values into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.values.clone()))
    }
}

// ── Adapter seam ────────────────────────────────────────────────────────────

/// Where a model sends the nested definitions it references while emitting
/// its schema. Implemented by the schema registry of `star-openapi`.
pub trait SchemaRefs {
    /// Register a nested model and return its `$ref` target.
    fn model_ref(&mut self, model: &Arc<dyn ParamModel>) -> Result<String, ConfigurationError>;

    /// Reserve the component name for a named definition the model emits
    /// itself (for example schemars `$defs`). Idempotent per name.
    fn definition_name(&mut self, name: &str) -> Result<String, ConfigurationError>;

    /// Store the schema of a definition reserved with [`definition_name`](Self::definition_name).
    fn define(&mut self, assigned: &str, schema: Value);
}

/// `$ref` target of a component schema.
pub fn component_ref(name: &str) -> String {
    format!("#/components/schemas/{name}")
}

/// Capability contract of a declared parameter model.
pub trait ParamModel: Send + Sync + 'static {
    /// Declaration identity, used to deduplicate schema components.
    fn key(&self) -> ModelKey;

    /// Preferred component name.
    fn name(&self) -> &str;

    /// The declared fields, in declaration order.
    fn fields(&self) -> &[FieldSpec];

    /// Coerce and check a raw value bag. Reports every invalid field.
    fn validate(&self, raw: &RawValues) -> Result<BoundModel, Vec<FieldViolation>>;

    /// JSON Schema fragment describing the whole model.
    fn json_schema(&self, refs: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError>;

    /// The `$defs` name other generated schemas use for this model's type.
    /// Models known under such a name share one component with those
    /// definitions.
    fn shared_definition(&self) -> Option<&str> {
        None
    }

    /// Startup checks on the declaration itself.
    fn check(&self) -> Result<(), ConfigurationError> {
        self.fields().iter().try_for_each(FieldSpec::check)
    }

    /// Find a field by its name or alias.
    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields()
            .iter()
            .find(|f| f.name == name || f.alias.as_deref() == Some(name))
    }

    /// Whether any field accepts uploaded files.
    fn has_files(&self) -> bool {
        self.fields().iter().any(|f| f.field_type.is_file())
    }
}

impl std::fmt::Debug for dyn ParamModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamModel")
            .field("name", &self.name())
            .field("key", &self.key())
            .finish()
    }
}
