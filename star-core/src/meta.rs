//! Operation metadata attached to routes and router nodes.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::model::ParamModel;

/// A tag grouping operations in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "externalDocs", skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocs>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            external_docs: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn external_docs(mut self, docs: ExternalDocs) -> Self {
        self.external_docs = Some(docs);
        self
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::new(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalDocs {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExternalDocs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Server {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One named security scheme required by an operation, with its scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRequirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}

impl SecurityRequirement {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            scopes: Vec::new(),
        }
    }

    pub fn scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&str> for SecurityRequirement {
    fn from(scheme: &str) -> Self {
        SecurityRequirement::new(scheme)
    }
}

/// A documented response.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub description: String,
    /// Model of the `application/json` payload, emitted as a component ref.
    pub model: Option<Arc<dyn ParamModel>>,
    /// Raw `content` object, used when no model is given.
    pub content: Option<Value>,
}

impl ResponseSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            model: None,
            content: None,
        }
    }

    pub fn model(mut self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }
}

/// A hand-written request body that replaces the generated one.
#[derive(Debug, Clone)]
pub struct RequestBodySpec {
    pub description: Option<String>,
    pub required: bool,
    /// The OpenAPI `content` object.
    pub content: Value,
}

impl RequestBodySpec {
    pub fn new(content: Value) -> Self {
        Self {
            description: None,
            required: true,
            content,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Append tags, keeping the first occurrence of each name.
pub(crate) fn merge_tags(into: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        if !into.iter().any(|t| t.name == tag.name) {
            into.push(tag.clone());
        }
    }
}

/// Append requirements; a requirement for a scheme already present replaces
/// the earlier one in place.
pub(crate) fn merge_security(into: &mut Vec<SecurityRequirement>, reqs: &[SecurityRequirement]) {
    for req in reqs {
        match into.iter_mut().find(|r| r.scheme == req.scheme) {
            Some(existing) => *existing = req.clone(),
            None => into.push(req.clone()),
        }
    }
}
