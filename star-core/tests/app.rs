use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use star_core::app::App;
use star_core::binder::BoundParams;
use star_core::error::{ConfigurationError, StartupError};
use star_core::http::Json;
use star_core::kind::ParamKind;
use star_core::model::{FieldSpec, ModelSpec};
use star_core::router::{RouteDescriptor, RouterNode};
use tower::ServiceExt;

async fn send(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn get_book(params: BoundParams) -> Json<Value> {
    Json(params.to_json())
}

fn book_app() -> App {
    let path = ModelSpec::new("BookPath").field(FieldSpec::integer("bid"));
    let query = ModelSpec::new("BookQuery").field(FieldSpec::integer("age").ge(2).le(4));
    App::new().route(RouteDescriptor::get("/book/{bid}", get_book).path(path).query(query))
}

// ── Dispatch ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_request_returns_422_without_calling_handler() {
    let router = book_app().build().unwrap();
    let (status, body) = send(router, get("/book/7?age=10")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({ "errors": [
            { "kind": "query", "field": "age", "reason": "must be ≤ 4", "input": "10" }
        ]})
    );
}

#[tokio::test]
async fn validation_status_can_be_changed() {
    let app = book_app().with_validation_status(StatusCode::BAD_REQUEST);
    let routes = app.flatten().unwrap();
    assert_eq!(routes[0].validation_status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app.build().unwrap(), get("/book/7?age=10")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "age");
}

#[tokio::test]
async fn valid_request_reaches_handler() {
    let router = book_app().build().unwrap();
    let (status, body) = send(router, get("/book/7?age=3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "path": { "bid": 7 }, "query": { "age": 3 } }));
}

#[tokio::test]
async fn methods_on_one_path_share_a_route() {
    let mut books = RouterNode::with_prefix("/book");
    books.get("/", |_: BoundParams| async { "list" }).unwrap();
    books.post("/", |_: BoundParams| async { (StatusCode::CREATED, "created") }).unwrap();
    let router = App::new().register_api(books).build().unwrap();

    let resp = router.clone().oneshot(get("/book")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let req = Request::builder().method("POST").uri("/book").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let req = Request::builder().method("DELETE").uri("/book").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn json_body_and_cookie_are_bound() {
    let body = ModelSpec::new("Book")
        .field(FieldSpec::string("name"))
        .field(FieldSpec::number("price").ge(0));
    let cookie = ModelSpec::new("Session").field(FieldSpec::string("session"));
    let router = App::new()
        .route(
            RouteDescriptor::post("/book", |p: BoundParams| async move {
                let name = p.value(ParamKind::Body, "name").cloned().unwrap_or_default();
                let session = p.value(ParamKind::Cookie, "session").cloned().unwrap_or_default();
                Json(json!({ "name": name, "session": session }))
            })
            .body(body)
            .cookie(cookie),
        )
        .build()
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/book")
        .header("content-type", "application/json")
        .header("cookie", "session=abc; theme=dark")
        .body(Body::from(r#"{"name":"Dune","price":"9.5"}"#))
        .unwrap();
    let (status, body) = send(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "Dune", "session": "abc" }));
}

#[tokio::test]
async fn multipart_upload_is_parsed() {
    let form = ModelSpec::new("Upload")
        .field(FieldSpec::string("title"))
        .field(FieldSpec::file("cover"));
    let router = App::new()
        .route(
            RouteDescriptor::post("/upload", |p: BoundParams| async move {
                let file = p.file("cover").map(|f| (f.file_name.clone(), f.len()));
                Json(json!({ "file": file }))
            })
            .form(form),
        )
        .build()
        .unwrap();

    let body = "--XYZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\r\n\
        Dune\r\n\
        --XYZ\r\n\
        Content-Disposition: form-data; name=\"cover\"; filename=\"dune.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        spice\r\n\
        --XYZ--\r\n";
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "multipart/form-data; boundary=XYZ")
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "file": ["dune.txt", 5] }));
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let body = ModelSpec::new("Book").field(FieldSpec::string("name"));
    let router = App::new()
        .with_body_limit(16)
        .route(RouteDescriptor::post("/book", |_: BoundParams| async { "ok" }).body(body))
        .build()
        .unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/book")
        .header("content-type", "application/json")
        .header("content-length", "38")
        .body(Body::from(r#"{"name":"a very long book title here"}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn oversized_body_without_length_is_refused() {
    let body = ModelSpec::new("Book").field(FieldSpec::string("name"));
    let router = App::new()
        .with_body_limit(16)
        .route(RouteDescriptor::post("/book", |_: BoundParams| async { "ok" }).body(body))
        .build()
        .unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/book")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"a very long book title here"}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ── Startup errors ───────────────────────────────────────────────────────

#[test]
fn registration_errors_surface_at_build() {
    let result = App::new()
        .get("/a", |_: BoundParams| async { "a" })
        .get("/a", |_: BoundParams| async { "again" })
        .build();
    assert!(matches!(
        result,
        Err(StartupError::Configuration(ConfigurationError::DuplicateRoute { .. }))
    ));
}

#[test]
fn ambiguous_tree_fails_before_serving() {
    let mut a = RouterNode::with_prefix("/api");
    a.get("/x", |_: BoundParams| async { "a" }).unwrap();
    let mut b = RouterNode::with_prefix("/api/");
    b.get("x", |_: BoundParams| async { "b" }).unwrap();
    let result = App::new().register_api(a).register_api(b).build();
    assert!(matches!(
        result,
        Err(StartupError::Configuration(ConfigurationError::AmbiguousRoute { .. }))
    ));
}

#[test]
fn renamed_path_variable_is_a_startup_error() {
    let mut a = RouterNode::with_prefix("/book");
    a.get("/{bid}", |_: BoundParams| async { "a" }).unwrap();
    let mut b = RouterNode::with_prefix("/book");
    b.get("/{id}", |_: BoundParams| async { "b" }).unwrap();
    let result = App::new().register_api(a).register_api(b).build();
    assert!(matches!(
        result,
        Err(StartupError::Configuration(ConfigurationError::AmbiguousRoute { .. }))
    ));

    let mut c = RouterNode::with_prefix("/book");
    c.get("/{bid}", |_: BoundParams| async { "c" }).unwrap();
    c.post("/{id}", |_: BoundParams| async { "d" }).unwrap();
    let result = App::new().register_api(c).build();
    assert!(matches!(
        result,
        Err(StartupError::Configuration(ConfigurationError::ConflictingPathVariables { .. }))
    ));
}

#[test]
fn invalid_pattern_fails_registration() {
    let query = ModelSpec::new("Q").field(FieldSpec::string("code").pattern("[a-"));
    let result = App::new()
        .route(RouteDescriptor::get("/q", |_: BoundParams| async { "q" }).query(query))
        .build();
    assert!(matches!(
        result,
        Err(StartupError::Configuration(ConfigurationError::InvalidPattern { .. }))
    ));
}

// ── Route consumers and layers ───────────────────────────────────────────

#[tokio::test]
async fn route_consumer_sees_flattened_routes() {
    let mut api = RouterNode::with_prefix("/api");
    api.get("/ping", |_: BoundParams| async { "pong" }).unwrap();
    let router = App::new()
        .register_api(api)
        .with_route_consumer("route-list", |routes| {
            let listed: Vec<String> = routes.iter().map(|r| r.path.clone()).collect();
            Ok(axum::Router::new().route(
                "/routes",
                axum::routing::get(move || async move { Json(listed) }),
            ))
        })
        .build()
        .unwrap();
    let (status, body) = send(router, get("/routes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["/api/ping"]));
}

#[test]
fn failing_route_consumer_is_a_startup_error() {
    let result = App::new()
        .with_route_consumer("broken", |_| Err("nope".into()))
        .build();
    match result {
        Err(StartupError::Plugin { plugin, source }) => {
            assert_eq!(plugin, "broken");
            assert_eq!(source.to_string(), "nope");
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn layers_wrap_every_route() {
    let router = App::new()
        .get("/", |_: BoundParams| async { "root" })
        .with_layer(star_core::default_trace())
        .build()
        .unwrap();
    let resp = router.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
