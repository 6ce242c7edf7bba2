use http::header::{HeaderMap, HeaderValue, IntoHeaderName, CONTENT_TYPE, COOKIE};
use http::{Method, Request};
use http_body_util::BodyExt;
use serde::Serialize;
use star_core::http::body::Body;
use star_core::http::Router;
use star_core::App;
use tower::util::ServiceExt;

use crate::response::TestResponse;

/// In-process HTTP test client wrapping the `axum::Router` built by an [`App`].
///
/// Requests go through `tower::ServiceExt::oneshot`, so the whole pipeline
/// runs (extraction, binding, handler, layers) without binding a TCP port.
///
/// ```ignore
/// let app = TestApp::from_app(App::new().route(book_route()));
/// app.get("/book/7").query("age=10").send().await
///     .assert_unprocessable()
///     .assert_validation_error("query", "age");
/// ```
#[derive(Clone)]
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Build the app. Panics with the startup error if it fails to build.
    pub fn from_app(app: App) -> Self {
        match app.build() {
            Ok(router) => Self::new(router),
            Err(err) => panic!("app failed to build: {err}"),
        }
    }

    pub fn get(&self, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest::new(self, method, path)
    }
}

/// Builder for one test request.
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: Method,
    path: String,
    query: Vec<String>,
    cookies: Vec<String>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: Method, path: &str) -> Self {
        Self {
            app,
            method,
            path: path.to_string(),
            query: Vec::new(),
            cookies: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Append a raw, already-encoded query string fragment (`age=3&tag=a`).
    pub fn query(mut self, raw: &str) -> Self {
        self.query.push(raw.to_string());
        self
    }

    /// Append one query parameter, percent-encoded.
    pub fn query_param(mut self, key: &str, value: &str) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair(key, value)
            .finish();
        self.query.push(encoded);
        self
    }

    /// Add a header. Repeated calls with the same name append values.
    pub fn header(mut self, name: impl IntoHeaderName, value: impl AsRef<str>) -> Self {
        let value = HeaderValue::from_str(value.as_ref())
            .unwrap_or_else(|e| panic!("invalid header value {:?}: {e}", value.as_ref()));
        self.headers.append(name, value);
        self
    }

    /// Add a cookie; all cookies are sent in one `Cookie` header.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(format!("{name}={value}"));
        self
    }

    /// Set the body as JSON, with `Content-Type: application/json`.
    pub fn json(self, body: &impl Serialize) -> Self {
        let bytes = serde_json::to_vec(body).unwrap_or_else(|e| panic!("body is not JSON: {e}"));
        self.body_with_type(bytes, "application/json")
    }

    /// Set an `application/x-www-form-urlencoded` body.
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body_with_type(encoded.into_bytes(), "application/x-www-form-urlencoded")
    }

    /// Set a raw body with its content type.
    pub fn body_with_type(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.header(CONTENT_TYPE, content_type)
    }

    /// Set a raw body without touching the headers.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub async fn send(self) -> TestResponse {
        let body = match self.body {
            Some(b) => Body::from(b),
            None => Body::empty(),
        };

        let uri = if self.query.is_empty() {
            self.path
        } else {
            format!("{}?{}", self.path, self.query.join("&"))
        };
        let mut builder = Request::builder().method(self.method).uri(&uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if !self.cookies.is_empty() {
            builder = builder.header(COOKIE, self.cookies.join("; "));
        }
        let request = builder
            .body(body)
            .unwrap_or_else(|e| panic!("invalid test request {uri}: {e}"));

        let response = self
            .app
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes();

        TestResponse { status, headers, body }
    }
}
