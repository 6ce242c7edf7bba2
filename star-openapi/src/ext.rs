use star_core::{App, Plugin};

use crate::{openapi_routes, OpenApiConfig};

/// Plugin that adds OpenAPI document generation and the documentation UI.
///
/// # Example
///
/// ```ignore
/// use star_openapi::{OpenApiPlugin, OpenApiConfig};
///
/// App::new()
///     .register_api(api)
///     .with(OpenApiPlugin::new(
///         OpenApiConfig::new("Book API", "1.0.0")
///             .with_security_scheme("jwt", json!({"type": "http", "scheme": "bearer"})),
///     ))
///     .build()?;
/// ```
pub struct OpenApiPlugin {
    config: Option<OpenApiConfig>,
}

impl OpenApiPlugin {
    /// Create a new OpenAPI plugin with the given configuration.
    pub fn new(config: OpenApiConfig) -> Self {
        Self { config: Some(config) }
    }

    /// Read the configuration from the app's `openapi.*` keys at install time.
    pub fn from_app_config() -> Self {
        Self { config: None }
    }
}

impl Plugin for OpenApiPlugin {
    fn install(self, app: App) -> App {
        let config = self
            .config
            .unwrap_or_else(|| OpenApiConfig::from_config(app.config()));
        app.with_route_consumer("openapi", move |routes| {
            openapi_routes(config, routes).map_err(Into::into)
        })
    }
}
