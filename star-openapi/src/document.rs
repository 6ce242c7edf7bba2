use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use star_core::error::ConfigurationError;
use star_core::router::ResolvedRoute;
use tracing::debug;

use crate::builder::DocumentBuilder;

/// A built OpenAPI document. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OpenApiDocument {
    value: Value,
}

impl OpenApiDocument {
    pub(crate) fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The operation object for `method` (any case) on a full path.
    pub fn operation(&self, method: &str, path: &str) -> Option<&Value> {
        self.value
            .get("paths")?
            .get(path)?
            .get(method.to_lowercase())
    }

    /// Component schema names, in document order.
    pub fn schema_names(&self) -> Vec<&str> {
        self.value
            .pointer("/components/schemas")
            .and_then(Value::as_object)
            .map(|schemas| schemas.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.value)
    }
}

/// Builds the document on first use and keeps it until invalidated.
///
/// Routes are static after startup, so the document is normally built once.
/// [`invalidate`](Self::invalidate) drops the cached copy and the next
/// [`get`](Self::get) rebuilds it from the same routes.
pub struct DocumentCache {
    builder: DocumentBuilder,
    routes: Vec<ResolvedRoute>,
    cached: RwLock<Option<Arc<OpenApiDocument>>>,
}

impl DocumentCache {
    pub fn new(builder: DocumentBuilder, routes: Vec<ResolvedRoute>) -> Self {
        Self {
            builder,
            routes,
            cached: RwLock::new(None),
        }
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    pub fn get(&self) -> Result<Arc<OpenApiDocument>, ConfigurationError> {
        if let Some(doc) = self.read().as_ref() {
            return Ok(Arc::clone(doc));
        }
        let mut slot = self.cached.write().unwrap_or_else(|e| e.into_inner());
        if let Some(doc) = slot.as_ref() {
            return Ok(Arc::clone(doc));
        }
        let doc = Arc::new(self.builder.build(&self.routes)?);
        *slot = Some(Arc::clone(&doc));
        Ok(doc)
    }

    pub fn is_built(&self) -> bool {
        self.read().is_some()
    }

    pub fn invalidate(&self) {
        debug!("Invalidating cached OpenAPI document");
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Swap the route table; the document is rebuilt on next access.
    pub fn replace_routes(&mut self, routes: Vec<ResolvedRoute>) {
        self.routes = routes;
        self.invalidate();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<OpenApiDocument>>> {
        self.cached.read().unwrap_or_else(|e| e.into_inner())
    }
}
