//! Re-exports of the axum types star builds on, so that applications and the
//! sibling crates depend on one place.

pub mod header;

pub use axum::http::Uri;
pub use axum::{serve, Json, Router};
pub use bytes::Bytes;

pub use self::header::{
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    // Common header constants
    CONTENT_LENGTH, CONTENT_TYPE, COOKIE,
};

pub mod body {
    pub use axum::body::{to_bytes, Body};
}

pub mod extract {
    pub use axum::extract::{FromRequest, FromRequestParts, Multipart, RawPathParams, Request};
}

pub mod response {
    pub use axum::response::{Html, IntoResponse, Response};
}

pub mod routing {
    pub use axum::routing::{get, on, MethodFilter, MethodRouter, Route};
}
