use std::sync::Arc;

use serde_json::{json, Map, Value};
use star_core::config::StarConfig;
use star_core::error::ConfigurationError;
use star_core::kind::ParamKind;
use star_core::meta::{ExternalDocs, Server, Tag};
use star_core::model::{component_ref, schema, ParamModel};
use star_core::router::{check_collisions, ResolvedRoute};
use star_core::validation::validation_error_schema;
use tracing::info;

use crate::document::OpenApiDocument;
use crate::schema::SchemaRegistry;

/// OpenAPI version written to every document.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Component name of the validation error payload.
pub const VALIDATION_ERROR_MODEL: &str = "ValidationErrorModel";

/// Configuration for the generated OpenAPI document and its endpoints.
#[derive(Debug, Clone)]
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Serve the Swagger UI page at the URL prefix.
    pub docs_ui: bool,
    /// Serve `openapi.yaml` next to `openapi.json`.
    pub yaml: bool,
    pub url_prefix: String,
    pub servers: Vec<Server>,
    pub external_docs: Option<ExternalDocs>,
    pub security_schemes: Map<String, Value>,
    /// Document-level tags, listed before the tags found on routes.
    pub tags: Vec<Tag>,
    /// Documents validation failures instead of the built-in
    /// `ValidationErrorModel`.
    pub validation_error_model: Option<Arc<dyn ParamModel>>,
}

impl OpenApiConfig {
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            title: title.to_string(),
            version: version.to_string(),
            description: None,
            docs_ui: true,
            yaml: true,
            url_prefix: "/openapi".to_string(),
            servers: Vec::new(),
            external_docs: None,
            security_schemes: Map::new(),
            tags: Vec::new(),
            validation_error_model: None,
        }
    }

    /// Read the `openapi.*` keys of the application configuration.
    pub fn from_config(config: &StarConfig) -> Self {
        let mut out = Self::new(
            &config.get_or("openapi.title", "Star API".to_string()),
            &config.get_or("openapi.version", "0.1.0".to_string()),
        );
        out.description = config.get::<Option<String>>("openapi.description").ok().flatten();
        out.url_prefix = config.get_or("openapi.url_prefix", out.url_prefix);
        out.docs_ui = config.get_or("openapi.docs_ui", true);
        out.yaml = config.get_or("openapi.yaml", true);
        out.servers = config
            .get_or("openapi.servers", Vec::<String>::new())
            .into_iter()
            .map(Server::new)
            .collect();
        out
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_docs_ui(mut self, enabled: bool) -> Self {
        self.docs_ui = enabled;
        self
    }

    pub fn with_yaml(mut self, enabled: bool) -> Self {
        self.yaml = enabled;
        self
    }

    pub fn with_url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = prefix.to_string();
        self
    }

    pub fn with_server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    pub fn with_external_docs(mut self, docs: ExternalDocs) -> Self {
        self.external_docs = Some(docs);
        self
    }

    /// Declare a security scheme, e.g. `json!({"type": "http", "scheme": "bearer"})`.
    pub fn with_security_scheme(mut self, name: &str, scheme: Value) -> Self {
        self.security_schemes.insert(name.to_string(), scheme);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Document validation failures with `model`, e.g. a payload that
    /// extends the built-in error list.
    pub fn with_validation_error_model(mut self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.validation_error_model = Some(model.into());
        self
    }
}

/// Builds an [`OpenApiDocument`] from a flattened route table.
///
/// The output depends only on the configuration and the routes, in order:
/// building twice from the same input serializes to the same bytes.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    config: OpenApiConfig,
}

impl DocumentBuilder {
    pub fn new(config: OpenApiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OpenApiConfig {
        &self.config
    }

    pub fn build(&self, routes: &[ResolvedRoute]) -> Result<OpenApiDocument, ConfigurationError> {
        check_collisions(routes)?;

        let mut registry = SchemaRegistry::new();
        let mut validation = ValidationComponent {
            model: self.config.validation_error_model.as_ref(),
            name: None,
        };
        let mut tags = Vec::new();
        for tag in &self.config.tags {
            push_tag(&mut tags, tag);
        }

        let mut paths: Map<String, Value> = Map::new();
        let mut documented = 0;
        for route in routes.iter().filter(|r| r.include_in_schema) {
            let operation = build_operation(route, &mut registry, &mut validation)?;
            for tag in &route.tags {
                push_tag(&mut tags, tag);
            }
            let path_entry = paths.entry(route.path.clone()).or_insert_with(|| json!({}));
            if let Some(obj) = path_entry.as_object_mut() {
                obj.insert(route.method.as_str().to_lowercase(), Value::Object(operation));
            }
            documented += 1;
        }
        registry.freeze();

        let mut info: Map<String, Value> = Map::new();
        info.insert("title".into(), json!(self.config.title));
        info.insert("version".into(), json!(self.config.version));
        if let Some(ref desc) = self.config.description {
            info.insert("description".into(), json!(desc));
        }

        let mut doc: Map<String, Value> = Map::new();
        doc.insert("openapi".into(), json!(OPENAPI_VERSION));
        doc.insert("info".into(), Value::Object(info));
        if !self.config.servers.is_empty() {
            doc.insert("servers".into(), json!(self.config.servers));
        }
        if let Some(ref docs) = self.config.external_docs {
            doc.insert("externalDocs".into(), json!(docs));
        }
        if !tags.is_empty() {
            doc.insert("tags".into(), json!(tags));
        }
        doc.insert("paths".into(), Value::Object(paths));

        let mut components: Map<String, Value> = Map::new();
        if !registry.is_empty() {
            components.insert("schemas".into(), Value::Object(registry.export()));
        }
        if !self.config.security_schemes.is_empty() {
            components.insert(
                "securitySchemes".into(),
                Value::Object(self.config.security_schemes.clone()),
            );
        }
        if !components.is_empty() {
            doc.insert("components".into(), Value::Object(components));
        }

        info!(routes = documented, schemas = registry.len(), "Built OpenAPI document");
        Ok(OpenApiDocument::new(Value::Object(doc)))
    }
}

fn push_tag(tags: &mut Vec<Tag>, tag: &Tag) {
    if !tags.iter().any(|t| t.name == tag.name) {
        tags.push(tag.clone());
    }
}

fn build_operation(
    route: &ResolvedRoute,
    registry: &mut SchemaRegistry,
    validation: &mut ValidationComponent<'_>,
) -> Result<Map<String, Value>, ConfigurationError> {
    let mut operation: Map<String, Value> = Map::new();

    if !route.tags.is_empty() {
        operation.insert("tags".into(), json!(route.tag_names()));
    }
    if let Some(ref summary) = route.summary {
        operation.insert("summary".into(), json!(summary));
    }
    if let Some(ref description) = route.description {
        operation.insert("description".into(), json!(description));
    }
    if let Some(ref docs) = route.external_docs {
        operation.insert("externalDocs".into(), json!(docs));
    }
    operation.insert("operationId".into(), json!(route.operation_id));

    let params = parameters(route, registry)?;
    if !params.is_empty() {
        operation.insert("parameters".into(), Value::Array(params));
    }

    if let Some(body) = request_body(route, registry)? {
        operation.insert("requestBody".into(), body);
    }

    operation.insert("responses".into(), responses(route, registry, validation)?);

    if route.deprecated {
        operation.insert("deprecated".into(), json!(true));
    }

    if !route.security.is_empty() {
        let security: Vec<Value> = route
            .security
            .iter()
            .map(|req| {
                let mut entry = Map::new();
                entry.insert(req.scheme.clone(), json!(req.scopes));
                Value::Object(entry)
            })
            .collect();
        operation.insert("security".into(), Value::Array(security));
    }

    if !route.servers.is_empty() {
        operation.insert("servers".into(), json!(route.servers));
    }

    for (key, value) in &route.extensions {
        operation.insert(key.clone(), value.clone());
    }

    Ok(operation)
}

/// One parameter object per field of the path, query, header and cookie models.
fn parameters(
    route: &ResolvedRoute,
    registry: &mut SchemaRegistry,
) -> Result<Vec<Value>, ConfigurationError> {
    let mut params = Vec::new();
    for (kind, model) in route.models.iter().filter(|(kind, _)| kind.is_parameter()) {
        for field in model.fields() {
            let mut param: Map<String, Value> = Map::new();
            param.insert("name".into(), json!(field.lookup_key()));
            param.insert("in".into(), json!(kind.as_str()));
            param.insert("required".into(), json!(kind == ParamKind::Path || field.required));
            if let Some(ref description) = field.description {
                param.insert("description".into(), json!(description));
            }
            if field.deprecated {
                param.insert("deprecated".into(), json!(true));
            }
            if let Some(ref example) = field.example {
                param.insert("example".into(), example.clone());
            }
            if let Some(ref examples) = field.examples {
                param.insert("examples".into(), examples.clone());
            }
            param.insert("schema".into(), schema::type_schema(field, registry)?);
            for (key, value) in &field.extensions {
                param.insert(key.clone(), value.clone());
            }
            params.push(Value::Object(param));
        }
    }
    Ok(params)
}

fn model_content(
    model: &std::sync::Arc<dyn ParamModel>,
    registry: &mut SchemaRegistry,
) -> Result<Value, ConfigurationError> {
    let name = registry.register(model)?;
    Ok(json!({ "schema": { "$ref": component_ref(&name) } }))
}

fn request_body(
    route: &ResolvedRoute,
    registry: &mut SchemaRegistry,
) -> Result<Option<Value>, ConfigurationError> {
    if let Some(ref custom) = route.request_body {
        let mut body: Map<String, Value> = Map::new();
        if let Some(ref description) = custom.description {
            body.insert("description".into(), json!(description));
        }
        body.insert("required".into(), json!(custom.required));
        body.insert("content".into(), custom.content.clone());
        return Ok(Some(Value::Object(body)));
    }

    let mut content: Map<String, Value> = Map::new();
    if let Some(model) = route.models.get(ParamKind::Body) {
        content.insert("application/json".into(), model_content(model, registry)?);
    }
    if let Some(model) = route.models.get(ParamKind::Form) {
        let media_type = if model.has_files() {
            "multipart/form-data"
        } else {
            "application/x-www-form-urlencoded"
        };
        content.insert(media_type.into(), model_content(model, registry)?);
    }
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(json!({ "required": true, "content": content })))
}

/// The component validation failures point at, registered on first use.
struct ValidationComponent<'a> {
    model: Option<&'a Arc<dyn ParamModel>>,
    name: Option<String>,
}

impl ValidationComponent<'_> {
    fn name(&mut self, registry: &mut SchemaRegistry) -> Result<String, ConfigurationError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let name = match self.model {
            Some(model) => registry.register(model)?,
            None => registry.register_named(VALIDATION_ERROR_MODEL, validation_error_schema())?,
        };
        self.name = Some(name.clone());
        Ok(name)
    }
}

fn responses(
    route: &ResolvedRoute,
    registry: &mut SchemaRegistry,
    validation: &mut ValidationComponent<'_>,
) -> Result<Value, ConfigurationError> {
    let mut responses: Map<String, Value> = Map::new();

    if !route.responses.iter().any(|(status, _)| status.starts_with('2')) {
        responses.insert("200".into(), json!({ "description": "Successful Response" }));
    }

    for (status, spec) in &route.responses {
        let mut response: Map<String, Value> = Map::new();
        response.insert("description".into(), json!(spec.description));
        if let Some(ref content) = spec.content {
            response.insert("content".into(), content.clone());
        } else if let Some(ref model) = spec.model {
            response.insert(
                "content".into(),
                json!({ "application/json": model_content(model, registry)? }),
            );
        }
        responses.insert(status.clone(), Value::Object(response));
    }

    let validation_status = route.validation_status.as_str();
    if !route.models.is_empty() && !responses.contains_key(validation_status) {
        let name = validation.name(registry)?;
        responses.insert(
            validation_status.into(),
            json!({
                "description": "Validation Error",
                "content": {
                    "application/json": {
                        "schema": { "$ref": component_ref(&name) }
                    }
                }
            }),
        );
    }

    Ok(Value::Object(responses))
}
