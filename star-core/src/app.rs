//! The application: a root router node, plugins and layers, built into an
//! axum `Router`.

use std::convert::Infallible;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::binder::ParameterBinder;
use crate::config::StarConfig;
use crate::error::{ConfigurationError, StartupError};
use crate::extract::{RawRequest, DEFAULT_BODY_LIMIT};
use crate::handler::Handler;
use crate::http::body::Body;
use crate::http::extract::Request;
use crate::http::header::HttpRequest;
use crate::http::response::{IntoResponse, Response};
use crate::http::routing::{on, MethodFilter, MethodRouter, Route};
use crate::http::{Router, StatusCode};
use crate::plugin::Plugin;
use crate::router::{route_shape, ResolvedRoute, RouteDescriptor, RouterNode};
use crate::validation::DEFAULT_VALIDATION_STATUS;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type RouteConsumer = Box<dyn FnOnce(&[ResolvedRoute]) -> Result<Router, BoxError> + Send>;
type LayerFn = Box<dyn FnOnce(Router) -> Router + Send>;

/// Application builder.
///
/// ```ignore
/// let app = App::new()
///     .route(RouteDescriptor::get("/book/{bid}", get_book).path(book_path).query(book_query))
///     .register_api(api)
///     .with(OpenApiPlugin::new(OpenApiConfig::new("Book API", "1.0.0")))
///     .build()?;
/// ```
///
/// Registration errors are collected and returned by [`build`](Self::build),
/// before anything is served.
pub struct App {
    root: RouterNode,
    errors: Vec<ConfigurationError>,
    routers: Vec<Router>,
    consumers: Vec<(&'static str, RouteConsumer)>,
    layers: Vec<LayerFn>,
    config: StarConfig,
    body_limit: usize,
    validation_status: StatusCode,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            root: RouterNode::new(),
            errors: Vec::new(),
            routers: Vec::new(),
            consumers: Vec::new(),
            layers: Vec::new(),
            config: StarConfig::empty(),
            body_limit: DEFAULT_BODY_LIMIT,
            validation_status: DEFAULT_VALIDATION_STATUS,
        }
    }

    pub fn with_config(mut self, config: StarConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StarConfig {
        &self.config
    }

    /// Maximum buffered request body, in bytes.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Status of the response sent when a request fails validation
    /// (default 422). The document uses the same status.
    pub fn with_validation_status(mut self, status: StatusCode) -> Self {
        self.validation_status = status;
        self
    }

    /// Declare a route on the root node.
    pub fn route(mut self, route: RouteDescriptor) -> Self {
        if let Err(err) = self.root.add_route(route) {
            self.errors.push(err);
        }
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(RouteDescriptor::get(path, handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(RouteDescriptor::post(path, handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(RouteDescriptor::put(path, handler))
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(RouteDescriptor::patch(path, handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(RouteDescriptor::delete(path, handler))
    }

    /// Mount a router node under the root.
    pub fn register_api(mut self, node: RouterNode) -> Self {
        self.root.register_child(node);
        self
    }

    /// Merge a plain axum router, outside of parameter binding and the document.
    pub fn with_router(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    pub fn with<P: Plugin>(self, plugin: P) -> Self {
        debug!(plugin = P::name(), "Installing plugin");
        plugin.install(self)
    }

    /// Register a consumer of the flattened route table. It runs once during
    /// [`build`](Self::build); the router it returns is merged into the app.
    pub fn with_route_consumer<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: FnOnce(&[ResolvedRoute]) -> Result<Router, BoxError> + Send + 'static,
    {
        self.consumers.push((name, Box::new(f)));
        self
    }

    /// Apply a tower layer to every route, in registration order.
    pub fn with_layer<L>(mut self, layer: L) -> Self
    where
        L: tower::Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Clone + tower::Service<HttpRequest<Body>> + Send + Sync + 'static,
        <L::Service as tower::Service<HttpRequest<Body>>>::Response: IntoResponse + 'static,
        <L::Service as tower::Service<HttpRequest<Body>>>::Error: Into<Infallible> + 'static,
        <L::Service as tower::Service<HttpRequest<Body>>>::Future: Send + 'static,
    {
        self.layers.push(Box::new(move |router| router.layer(layer)));
        self
    }

    /// Resolve the route table without building the server router.
    pub fn flatten(&self) -> Result<Vec<ResolvedRoute>, ConfigurationError> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }
        let mut routes = self.root.flatten()?;
        for route in &mut routes {
            route.validation_status = self.validation_status;
        }
        Ok(routes)
    }

    /// Assemble the axum router.
    ///
    /// Fails on the first registration error, on any route collision after
    /// flattening, or when a route consumer fails.
    pub fn build(self) -> Result<Router, StartupError> {
        let routes = self.flatten()?;

        // Grouped by shape; `flatten` guarantees one spelling per shape.
        let mut by_path: Vec<(String, String, Vec<(MethodFilter, Arc<ResolvedRoute>)>)> = Vec::new();
        for route in &routes {
            let filter = MethodFilter::try_from(route.method.clone()).map_err(|_| {
                ConfigurationError::UnsupportedMethod {
                    method: route.method.to_string(),
                    path: route.path.clone(),
                }
            })?;
            let entry = (filter, Arc::new(route.clone()));
            let shape = route_shape(&route.path);
            match by_path.iter_mut().find(|(s, _, _)| *s == shape) {
                Some((_, _, methods)) => methods.push(entry),
                None => by_path.push((shape, route.path.clone(), vec![entry])),
            }
        }

        let mut router = Router::new();
        for (_, path, methods) in by_path {
            let method_router = methods
                .into_iter()
                .fold(None::<MethodRouter>, |acc, (filter, route)| {
                    let handler = endpoint(route, self.body_limit);
                    Some(match acc {
                        Some(mr) => mr.on(filter, handler),
                        None => on(filter, handler),
                    })
                });
            if let Some(method_router) = method_router {
                router = router.route(&path, method_router);
            }
        }
        info!(routes = routes.len(), "Built router");

        for extra in self.routers {
            router = router.merge(extra);
        }
        for (name, consumer) in self.consumers {
            let extra = consumer(&routes).map_err(|source| StartupError::Plugin { plugin: name, source })?;
            router = router.merge(extra);
        }
        for layer in self.layers {
            router = layer(router);
        }
        Ok(router)
    }

    /// Build the application and serve it on `addr` until Ctrl-C or SIGTERM.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.build()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Star server listening");
        crate::http::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

fn endpoint(
    route: Arc<ResolvedRoute>,
    body_limit: usize,
) -> impl Fn(Request) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>> + Clone + Send + Sync + 'static {
    move |req: Request| {
        let route = Arc::clone(&route);
        Box::pin(async move { dispatch(&route, req, body_limit).await })
    }
}

/// Extract, bind, then call the handler or answer with the validation error.
async fn dispatch(route: &ResolvedRoute, req: Request, body_limit: usize) -> Response {
    let raw = match RawRequest::from_request(req, body_limit).await {
        Ok(raw) => raw,
        Err(response) => return response,
    };
    match ParameterBinder::bind(route, &raw) {
        Ok(params) => route.handler.call(params).await,
        Err(err) => {
            debug!(method = %route.method, path = %route.path, errors = err.len(), "Request failed validation");
            err.into_response_with(route.validation_status)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
