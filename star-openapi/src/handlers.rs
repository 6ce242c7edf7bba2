use std::sync::Arc;

use star_core::error::ConfigurationError;
use star_core::http::response::{Html, IntoResponse, Response};
use star_core::http::routing::get;
use star_core::http::{Router, StatusCode};
use star_core::router::ResolvedRoute;
use tracing::{debug, error};

use crate::builder::{DocumentBuilder, OpenApiConfig};
use crate::document::DocumentCache;

/// Build an `axum::Router` that serves the document for `routes`.
///
/// Under the configured URL prefix (default `/openapi`):
/// - `openapi.json`
/// - `openapi.yaml`, unless disabled
/// - the Swagger UI page at the prefix itself, unless disabled
///
/// The document is built here, so a broken route table fails at startup.
pub fn openapi_routes(
    config: OpenApiConfig,
    routes: &[ResolvedRoute],
) -> Result<Router, ConfigurationError> {
    let cache = Arc::new(DocumentCache::new(DocumentBuilder::new(config), routes.to_vec()));
    cache.get()?;
    Ok(document_routes(cache))
}

/// Serve an existing cache. Invalidating it makes the endpoints rebuild.
pub fn document_routes(cache: Arc<DocumentCache>) -> Router {
    let config = cache.builder().config().clone();
    let base = config.url_prefix.trim_end_matches('/').to_string();
    let json_path = format!("{base}/openapi.json");

    let json_cache = Arc::clone(&cache);
    let mut router = Router::new().route(
        &json_path,
        get(move || {
            let cache = Arc::clone(&json_cache);
            async move {
                match cache.get() {
                    Ok(doc) => ([("content-type", "application/json")], doc.to_json()).into_response(),
                    Err(err) => build_failed(err),
                }
            }
        }),
    );

    if config.yaml {
        let yaml_cache = Arc::clone(&cache);
        router = router.route(
            &format!("{base}/openapi.yaml"),
            get(move || {
                let cache = Arc::clone(&yaml_cache);
                async move {
                    let rendered = cache
                        .get()
                        .map_err(|err| err.to_string())
                        .and_then(|doc| doc.to_yaml().map_err(|err| err.to_string()));
                    match rendered {
                        Ok(yaml) => ([("content-type", "application/yaml")], yaml).into_response(),
                        Err(message) => {
                            error!(error = %message, "Failed to render OpenAPI YAML");
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        );
    }

    if config.docs_ui {
        let page = swagger_html(&config.title, &json_path);
        let docs_path = if base.is_empty() { "/".to_string() } else { base.clone() };
        router = router.route(
            &docs_path,
            get(move || {
                let page = page.clone();
                async move { Html(page).into_response() }
            }),
        );
    }

    debug!(prefix = %base, yaml = config.yaml, docs_ui = config.docs_ui, "Mounted OpenAPI endpoints");
    router
}

fn build_failed(err: ConfigurationError) -> Response {
    error!(error = %err, "Failed to build OpenAPI document");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn swagger_html(title: &str, spec_url: &str) -> String {
    SWAGGER_HTML
        .replace("{title}", &escape_html(title))
        .replace("{spec_url}", &escape_html(spec_url))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const SWAGGER_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.ui = SwaggerUIBundle({
            url: "{spec_url}",
            dom_id: "#swagger-ui",
            deepLinking: true
        });
    </script>
</body>
</html>"##;
