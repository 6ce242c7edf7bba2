use std::sync::Arc;

use http::Request;
use http_body_util::BodyExt;
use serde_json::Value;
use star_core::binder::BoundParams;
use star_core::config::StarConfig;
use star_core::http::body::Body;
use star_core::http::Router;
use star_core::model::{FieldSpec, ModelSpec};
use star_core::router::{ResolvedRoute, RouteDescriptor, RouterNode};
use star_core::App;
use star_openapi::{document_routes, openapi_routes, DocumentBuilder, DocumentCache, OpenApiConfig, OpenApiPlugin};
use tower::ServiceExt;

// ── Helpers ─────────────────────────────────────────────────────────────────

async fn ok(_: BoundParams) -> &'static str {
    "ok"
}

fn routes() -> Vec<ResolvedRoute> {
    let mut node = RouterNode::with_prefix("/users");
    node.get("/", ok).unwrap();
    node.post("/", ok).unwrap();
    node.add_route(
        RouteDescriptor::get("/{id}", ok).path(ModelSpec::new("UserPath").field(FieldSpec::integer("id"))),
    )
    .unwrap();
    node.flatten().unwrap()
}

fn config() -> OpenApiConfig {
    OpenApiConfig::new("Test API", "1.0.0")
}

async fn get_response(router: Router, path: &str) -> (http::StatusCode, String, http::HeaderMap) {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    let response = router.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_str = String::from_utf8(body.to_vec()).unwrap();
    (status, body_str, headers)
}

fn content_type(headers: &http::HeaderMap) -> &str {
    headers.get("content-type").unwrap().to_str().unwrap()
}

// ── Endpoints ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn openapi_json_endpoint() {
    let router = openapi_routes(config(), &routes()).unwrap();
    let (status, body, headers) = get_response(router, "/openapi/openapi.json").await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(content_type(&headers), "application/json");

    let spec: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(spec["openapi"], "3.1.0");
    assert!(spec["paths"]["/users"]["get"].is_object());
    assert!(spec["paths"]["/users"]["post"].is_object());
    assert!(spec["paths"]["/users/{id}"]["get"].is_object());
}

#[tokio::test]
async fn openapi_yaml_endpoint() {
    let router = openapi_routes(config(), &routes()).unwrap();
    let (status, body, headers) = get_response(router, "/openapi/openapi.yaml").await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(content_type(&headers), "application/yaml");
    assert!(body.contains("Test API"));
}

#[tokio::test]
async fn yaml_can_be_disabled() {
    let router = openapi_routes(config().with_yaml(false), &routes()).unwrap();
    let (status, _, _) = get_response(router, "/openapi/openapi.yaml").await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn docs_ui_when_enabled() {
    let router = openapi_routes(config(), &[]).unwrap();
    let (status, body, _) = get_response(router, "/openapi").await;
    assert_eq!(status, http::StatusCode::OK);
    assert!(body.contains("<html"));
    assert!(body.contains("swagger-ui"));
    assert!(body.contains(r#"url: "/openapi/openapi.json""#));
}

#[tokio::test]
async fn docs_ui_when_disabled() {
    let router = openapi_routes(config().with_docs_ui(false), &[]).unwrap();
    let (status, _, _) = get_response(router.clone(), "/openapi").await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
    let (status, _, _) = get_response(router, "/openapi/openapi.json").await;
    assert_eq!(status, http::StatusCode::OK);
}

#[tokio::test]
async fn custom_url_prefix() {
    let router = openapi_routes(config().with_url_prefix("/docs/"), &[]).unwrap();
    let (status, _, _) = get_response(router.clone(), "/docs/openapi.json").await;
    assert_eq!(status, http::StatusCode::OK);
    let (status, body, _) = get_response(router, "/docs").await;
    assert_eq!(status, http::StatusCode::OK);
    assert!(body.contains(r#"url: "/docs/openapi.json""#));
}

#[tokio::test]
async fn invalidated_cache_is_rebuilt_on_request() {
    let cache = Arc::new(DocumentCache::new(DocumentBuilder::new(config()), routes()));
    let router = document_routes(Arc::clone(&cache));
    let (_, first, _) = get_response(router.clone(), "/openapi/openapi.json").await;
    assert!(cache.is_built());
    cache.invalidate();
    let (_, second, _) = get_response(router, "/openapi/openapi.json").await;
    assert_eq!(first, second);
    assert!(cache.is_built());
}

#[test]
fn ambiguous_routes_fail_at_startup() {
    let mut doubled = routes();
    doubled.extend(routes());
    assert!(openapi_routes(config(), &doubled).is_err());
}

// ── Plugin ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plugin_serves_the_app_document() {
    let mut api = RouterNode::with_prefix("/api");
    api.get("/ping", ok).unwrap();
    let router = App::new()
        .register_api(api)
        .with(OpenApiPlugin::new(config()))
        .build()
        .unwrap();

    let (status, body, _) = get_response(router.clone(), "/openapi/openapi.json").await;
    assert_eq!(status, http::StatusCode::OK);
    let spec: Value = serde_json::from_str(&body).unwrap();
    assert!(spec["paths"]["/api/ping"]["get"].is_object());
    assert!(spec["paths"].get("/openapi/openapi.json").is_none());

    let (status, body, _) = get_response(router, "/api/ping").await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn plugin_reads_app_configuration() {
    let config = StarConfig::from_yaml_str("openapi:\n  title: Configured\n  url_prefix: /spec\n").unwrap();
    let router = App::new()
        .with_config(config)
        .get("/ping", ok)
        .with(OpenApiPlugin::from_app_config())
        .build()
        .unwrap();
    let (status, body, _) = get_response(router, "/spec/openapi.json").await;
    assert_eq!(status, http::StatusCode::OK);
    let spec: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(spec["info"]["title"], "Configured");
}

#[tokio::test]
async fn document_uses_the_app_validation_status() {
    let mut users = RouterNode::new();
    users
        .add_route(
            RouteDescriptor::get("/users/{id}", ok)
                .path(ModelSpec::new("UserPath").field(FieldSpec::integer("id"))),
        )
        .unwrap();
    let router = App::new()
        .register_api(users)
        .with_validation_status(http::StatusCode::BAD_REQUEST)
        .with(OpenApiPlugin::new(config()))
        .build()
        .unwrap();

    let (_, body, _) = get_response(router.clone(), "/openapi/openapi.json").await;
    let spec: Value = serde_json::from_str(&body).unwrap();
    let responses = &spec["paths"]["/users/{id}"]["get"]["responses"];
    assert!(responses["400"].is_object());
    assert!(responses.get("422").is_none());

    let (status, _, _) = get_response(router, "/users/abc").await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
}
