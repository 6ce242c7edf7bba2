pub use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
pub use axum::http::request::Parts;
pub use axum::http::{HeaderMap, Method, StatusCode};
pub use axum::http::Request as HttpRequest;
