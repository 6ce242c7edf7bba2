//! Router trees: route descriptors grouped under prefixed nodes.
//!
//! A [`RouterNode`] owns its routes and its children. Attaching a child moves
//! it into its parent, so a node can never have two parents:
//!
//! ```compile_fail
//! use star_core::router::RouterNode;
//!
//! let mut books = RouterNode::with_prefix("/book");
//! let mut authors = RouterNode::with_prefix("/author");
//! let shared = RouterNode::new();
//! books.register_child(shared);
//! authors.register_child(shared); // use of moved value
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::handler::{BoxedHandler, Handler};
use crate::http::{Method, StatusCode};
use crate::kind::ParamKind;
use crate::meta::{
    merge_security, merge_tags, ExternalDocs, RequestBodySpec, ResponseSpec, SecurityRequirement,
    Server, Tag,
};
use crate::model::ParamModel;
use crate::validation::DEFAULT_VALIDATION_STATUS;

// ── Models ──────────────────────────────────────────────────────────────────

/// At most one parameter model per request part.
#[derive(Debug, Clone, Default)]
pub struct Models {
    slots: [Option<Arc<dyn ParamModel>>; 6],
}

impl Models {
    pub fn get(&self, kind: ParamKind) -> Option<&Arc<dyn ParamModel>> {
        self.slots[kind.index()].as_ref()
    }

    /// Declared models in [`ParamKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamKind, &Arc<dyn ParamModel>)> {
        ParamKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|m| (kind, m)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn set(&mut self, kind: ParamKind, model: Arc<dyn ParamModel>) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(model);
        true
    }
}

// ── RouteDescriptor ─────────────────────────────────────────────────────────

/// One declared endpoint, before it is attached to a node.
///
/// ```ignore
/// let route = RouteDescriptor::get("/book/{bid}", get_book)
///     .path(book_path)
///     .query(book_query)
///     .summary("Get a book");
/// ```
pub struct RouteDescriptor {
    method: Method,
    path: String,
    handler: BoxedHandler,
    models: Models,
    tags: Vec<Tag>,
    security: Vec<SecurityRequirement>,
    summary: Option<String>,
    description: Option<String>,
    operation_id: Option<String>,
    deprecated: bool,
    external_docs: Option<ExternalDocs>,
    servers: Vec<Server>,
    extensions: Map<String, Value>,
    request_body: Option<RequestBodySpec>,
    responses: Vec<(String, ResponseSpec)>,
    include_in_schema: bool,
    // Deferred until `add_route` so the builder stays chainable.
    error: Option<ConfigurationError>,
}

impl RouteDescriptor {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            models: Models::default(),
            tags: Vec::new(),
            security: Vec::new(),
            summary: None,
            description: None,
            operation_id: None,
            deprecated: false,
            external_docs: None,
            servers: Vec::new(),
            extensions: Map::new(),
            request_body: None,
            responses: Vec::new(),
            include_in_schema: true,
            error: None,
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Declare the model for one request part.
    pub fn model(mut self, kind: ParamKind, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        if !self.models.set(kind, model.into()) && self.error.is_none() {
            self.error = Some(ConfigurationError::DuplicateModel {
                method: self.method.to_string(),
                path: self.path.clone(),
                kind,
            });
        }
        self
    }

    pub fn path(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Path, model)
    }

    pub fn query(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Query, model)
    }

    pub fn header(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Header, model)
    }

    pub fn cookie(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Cookie, model)
    }

    pub fn form(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Form, model)
    }

    pub fn body(self, model: impl Into<Arc<dyn ParamModel>>) -> Self {
        self.model(ParamKind::Body, model)
    }

    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        merge_tags(&mut self.tags, std::slice::from_ref(&tag));
        self
    }

    pub fn security(mut self, requirement: impl Into<SecurityRequirement>) -> Self {
        let req = requirement.into();
        merge_security(&mut self.security, std::slice::from_ref(&req));
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn external_docs(mut self, docs: ExternalDocs) -> Self {
        self.external_docs = Some(docs);
        self
    }

    pub fn server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    /// Attach an operation-level vendor extension (`x-…`).
    pub fn extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        let key = if key.starts_with("x-") {
            key.to_string()
        } else {
            format!("x-{key}")
        };
        self.extensions.insert(key, value.into());
        self
    }

    pub fn request_body(mut self, body: RequestBodySpec) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn response(mut self, status: impl ToString, response: ResponseSpec) -> Self {
        set_response(&mut self.responses, status.to_string(), response);
        self
    }

    /// Serve the route but leave it out of the document.
    pub fn doc_ui(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn local_path(&self) -> &str {
        &self.path
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    fn check(&mut self) -> Result<(), ConfigurationError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for (_, model) in self.models.iter() {
            model.check()?;
        }
        check_path_variables(&self.method, &self.path, &self.models)
    }
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

fn set_response(responses: &mut Vec<(String, ResponseSpec)>, status: String, response: ResponseSpec) {
    match responses.iter_mut().find(|(s, _)| *s == status) {
        Some(slot) => slot.1 = response,
        None => responses.push((status, response)),
    }
}

/// Names of the `{var}` placeholders of a path pattern.
pub fn path_variables(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter_map(|segment| {
        segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .map(|s| s.trim_start_matches('*'))
    })
}

fn check_path_variables(method: &Method, path: &str, models: &Models) -> Result<(), ConfigurationError> {
    let Some(model) = models.get(ParamKind::Path) else {
        return Ok(());
    };
    for variable in path_variables(path) {
        if model.field(variable).is_none() {
            return Err(ConfigurationError::UndeclaredPathVariable {
                method: method.to_string(),
                path: path.to_string(),
                variable: variable.to_string(),
            });
        }
    }
    Ok(())
}

// ── RouterNode ──────────────────────────────────────────────────────────────

/// A grouping unit: a prefix, inherited metadata, routes and child nodes.
#[derive(Debug, Default)]
pub struct RouterNode {
    prefix: String,
    operation_id: Option<OperationIdFn>,
    tags: Vec<Tag>,
    security: Vec<SecurityRequirement>,
    responses: Vec<(String, ResponseSpec)>,
    exclude_from_doc: bool,
    routes: Vec<RouteDescriptor>,
    children: Vec<RouterNode>,
}

impl RouterNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        merge_tags(&mut self.tags, std::slice::from_ref(&tag));
        self
    }

    /// Name the operations of this node and its children that do not set an
    /// explicit operation id. The nearest node's callback wins.
    ///
    /// ```ignore
    /// let api = RouterNode::with_prefix("/api")
    ///     .operation_ids(|op| format!("{}_{}", op.method.as_str().to_lowercase(), op.handler.unwrap_or("anon")));
    /// ```
    pub fn operation_ids<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OperationIdInput<'_>) -> String + Send + Sync + 'static,
    {
        self.operation_id = Some(OperationIdFn(Arc::new(callback)));
        self
    }

    pub fn tags<T: Into<Tag>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        let tags: Vec<Tag> = tags.into_iter().map(Into::into).collect();
        merge_tags(&mut self.tags, &tags);
        self
    }

    pub fn security(mut self, requirement: impl Into<SecurityRequirement>) -> Self {
        let req = requirement.into();
        merge_security(&mut self.security, std::slice::from_ref(&req));
        self
    }

    /// A response documented on every route of this node and its children.
    pub fn response(mut self, status: impl ToString, response: ResponseSpec) -> Self {
        set_response(&mut self.responses, status.to_string(), response);
        self
    }

    /// Leave every route of this node (and its children) out of the document.
    pub fn doc_ui(mut self, include: bool) -> Self {
        self.exclude_from_doc = !include;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn children(&self) -> &[RouterNode] {
        &self.children
    }

    /// Declare a route on this node.
    ///
    /// Fails if this node already has a route with the same method and local
    /// path, if the route declared two models for one kind, or if the path
    /// uses a variable its path model does not declare.
    pub fn add_route(&mut self, mut route: RouteDescriptor) -> Result<&mut Self, ConfigurationError> {
        route.check()?;
        if self
            .routes
            .iter()
            .any(|r| r.method == route.method && r.path == route.path)
        {
            return Err(ConfigurationError::DuplicateRoute {
                method: route.method.to_string(),
                path: route.path,
            });
        }
        debug!(method = %route.method, path = %route.path, prefix = %self.prefix, "Registered route");
        self.routes.push(route);
        Ok(self)
    }

    pub fn get(&mut self, path: impl Into<String>, handler: impl Handler) -> Result<&mut Self, ConfigurationError> {
        self.add_route(RouteDescriptor::get(path, handler))
    }

    pub fn post(&mut self, path: impl Into<String>, handler: impl Handler) -> Result<&mut Self, ConfigurationError> {
        self.add_route(RouteDescriptor::post(path, handler))
    }

    pub fn put(&mut self, path: impl Into<String>, handler: impl Handler) -> Result<&mut Self, ConfigurationError> {
        self.add_route(RouteDescriptor::put(path, handler))
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: impl Handler) -> Result<&mut Self, ConfigurationError> {
        self.add_route(RouteDescriptor::patch(path, handler))
    }

    pub fn delete(&mut self, path: impl Into<String>, handler: impl Handler) -> Result<&mut Self, ConfigurationError> {
        self.add_route(RouteDescriptor::delete(path, handler))
    }

    /// Attach a child node. The child is moved in and cannot be attached again.
    pub fn register_child(&mut self, child: RouterNode) -> &mut Self {
        debug!(parent = %self.prefix, child = %child.prefix, routes = child.routes.len(), "Registered child router");
        self.children.push(child);
        self
    }

    /// Resolve every route of the tree, depth-first in registration order.
    ///
    /// Fails with [`ConfigurationError::AmbiguousRoute`] when two routes
    /// resolve to the same method and full path.
    pub fn flatten(&self) -> Result<Vec<ResolvedRoute>, ConfigurationError> {
        let mut out = Vec::new();
        self.flatten_into(&Inherited::default(), &mut out)?;
        check_collisions(&out)?;
        Ok(out)
    }

    fn flatten_into(&self, parent: &Inherited, out: &mut Vec<ResolvedRoute>) -> Result<(), ConfigurationError> {
        let mut here = parent.clone();
        here.prefixes.push(self.prefix.clone());
        if let Some(callback) = &self.operation_id {
            here.operation_id = Some(callback.clone());
        }
        merge_tags(&mut here.tags, &self.tags);
        merge_security(&mut here.security, &self.security);
        for (status, response) in &self.responses {
            set_response(&mut here.responses, status.clone(), response.clone());
        }
        here.include_in_schema &= !self.exclude_from_doc;

        for route in &self.routes {
            out.push(here.resolve(route)?);
        }
        for child in &self.children {
            child.flatten_into(&here, out)?;
        }
        Ok(())
    }
}

/// What an operation-id callback gets to name a route.
#[derive(Debug, Clone, Copy)]
pub struct OperationIdInput<'a> {
    /// The handler's function name, when it has one.
    pub handler: Option<&'a str>,
    pub method: &'a Method,
    /// Path as declared on the route.
    pub local_path: &'a str,
    /// Path after every ancestor prefix is joined.
    pub path: &'a str,
}

#[derive(Clone)]
struct OperationIdFn(Arc<dyn Fn(&OperationIdInput<'_>) -> String + Send + Sync>);

impl std::fmt::Debug for OperationIdFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OperationIdFn")
    }
}

#[derive(Clone)]
struct Inherited {
    prefixes: Vec<String>,
    operation_id: Option<OperationIdFn>,
    tags: Vec<Tag>,
    security: Vec<SecurityRequirement>,
    responses: Vec<(String, ResponseSpec)>,
    include_in_schema: bool,
}

impl Default for Inherited {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            operation_id: None,
            tags: Vec::new(),
            security: Vec::new(),
            responses: Vec::new(),
            include_in_schema: true,
        }
    }
}

impl Inherited {
    fn resolve(&self, route: &RouteDescriptor) -> Result<ResolvedRoute, ConfigurationError> {
        let path = join_path(
            self.prefixes
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(route.path.as_str())),
        );
        check_path_variables(&route.method, &path, &route.models)?;

        let mut tags = self.tags.clone();
        merge_tags(&mut tags, &route.tags);
        let mut security = self.security.clone();
        merge_security(&mut security, &route.security);
        let mut responses = self.responses.clone();
        for (status, response) in &route.responses {
            set_response(&mut responses, status.clone(), response.clone());
        }

        let operation_id = match (&route.operation_id, &self.operation_id) {
            (Some(id), _) => id.clone(),
            (None, Some(callback)) => (callback.0)(&OperationIdInput {
                handler: route.handler.name(),
                method: &route.method,
                local_path: &route.path,
                path: &path,
            }),
            (None, None) => default_operation_id(route.handler.name(), &route.method, &path),
        };

        Ok(ResolvedRoute {
            method: route.method.clone(),
            path,
            handler: Arc::clone(&route.handler),
            models: route.models.clone(),
            tags,
            security,
            summary: route.summary.clone(),
            description: route.description.clone(),
            operation_id,
            deprecated: route.deprecated,
            external_docs: route.external_docs.clone(),
            servers: route.servers.clone(),
            extensions: route.extensions.clone(),
            request_body: route.request_body.clone(),
            responses,
            include_in_schema: self.include_in_schema && route.include_in_schema,
            validation_status: DEFAULT_VALIDATION_STATUS,
        })
    }
}

/// Join path segments: runs of `/` collapse, the result starts with `/`, and
/// only the root keeps a trailing slash.
pub fn join_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut path = String::from("/");
    for part in segments
        .into_iter()
        .flat_map(|s| s.split('/'))
        .filter(|p| !p.is_empty())
    {
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(part);
    }
    path
}

/// The path with placeholder names erased: `/book/{bid}` and `/book/{id}`
/// both become `/book/{}`, `/{*rest}` becomes `/{*}`.
///
/// Two paths with the same shape match the same requests.
pub fn route_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut in_var = false;
    for c in path.chars() {
        match c {
            '{' if !in_var => {
                in_var = true;
                shape.push('{');
            }
            '}' if in_var => {
                in_var = false;
                shape.push('}');
            }
            '*' if in_var && shape.ends_with('{') => shape.push('*'),
            _ if in_var => {}
            c => shape.push(c),
        }
    }
    shape
}

/// Reject route tables the server cannot mount.
///
/// Two routes collide when they share a method and a [`route_shape`]. Paths
/// of the same shape must also spell their variables identically, whatever
/// their methods.
pub fn check_collisions(routes: &[ResolvedRoute]) -> Result<(), ConfigurationError> {
    let mut seen: Vec<(&Method, String, &str)> = Vec::with_capacity(routes.len());
    for route in routes {
        let shape = route_shape(&route.path);
        for (method, other_shape, other_path) in &seen {
            if *other_shape != shape {
                continue;
            }
            if *method == &route.method {
                return Err(ConfigurationError::AmbiguousRoute {
                    method: route.method.to_string(),
                    path: route.path.clone(),
                });
            }
            if *other_path != route.path {
                return Err(ConfigurationError::ConflictingPathVariables {
                    path: route.path.clone(),
                    other: other_path.to_string(),
                });
            }
        }
        seen.push((&route.method, shape, route.path.as_str()));
    }
    Ok(())
}

/// `{handler}{path}_{method}` with every non-word character replaced by `_`.
fn default_operation_id(handler: Option<&str>, method: &Method, path: &str) -> String {
    let method = method.as_str().to_ascii_lowercase();
    let name = handler.unwrap_or(method.as_str());
    let raw = format!("{name}{path}");
    let mut id: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    id.push('_');
    id.push_str(&method);
    id
}

// ── ResolvedRoute ───────────────────────────────────────────────────────────

/// A route with every ancestor's prefix and metadata folded in.
#[derive(Clone)]
pub struct ResolvedRoute {
    pub method: Method,
    pub path: String,
    pub handler: BoxedHandler,
    pub models: Models,
    pub tags: Vec<Tag>,
    pub security: Vec<SecurityRequirement>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: String,
    pub deprecated: bool,
    pub external_docs: Option<ExternalDocs>,
    pub servers: Vec<Server>,
    pub extensions: Map<String, Value>,
    pub request_body: Option<RequestBodySpec>,
    pub responses: Vec<(String, ResponseSpec)>,
    pub include_in_schema: bool,
    /// Status sent when binding fails. Set by the app.
    pub validation_status: StatusCode,
}

impl ResolvedRoute {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn security_schemes(&self) -> Vec<&str> {
        self.security.iter().map(|s| s.scheme.as_str()).collect()
    }
}

impl std::fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation_id", &self.operation_id)
            .field("tags", &self.tag_names())
            .field("security", &self.security_schemes())
            .finish_non_exhaustive()
    }
}
