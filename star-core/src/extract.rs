//! Framework-neutral view of an incoming request and per-kind extraction of
//! raw values from it.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::http::extract::{FromRequest, FromRequestParts, Multipart, RawPathParams, Request};
use crate::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use crate::http::response::{IntoResponse, Response};
use crate::http::{Bytes, Json, StatusCode};
use crate::kind::ParamKind;
use crate::model::{FieldViolation, RawValues};
use crate::multipart::collect_parts;

/// Field name used for errors about a request part as a whole.
pub const ROOT_FIELD: &str = "__root__";

/// Default request body limit: 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The raw parts of a matched request, already buffered.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub path_params: Vec<(String, String)>,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Parsed `multipart/form-data` parts, or the parse failure.
    pub multipart: Option<Result<RawValues, String>>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an axum request. Multipart bodies are parsed here.
    pub async fn from_request(req: Request, body_limit: usize) -> Result<Self, Response> {
        let (mut parts, body) = req.into_parts();

        let path_params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Err(_) => Vec::new(),
        };

        let declared_len = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_len.is_some_and(|len| len > body_limit) {
            return Err(body_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
        }
        let body = match Limited::new(body, body_limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(body_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
            }
            Err(e) => {
                return Err(body_error(StatusCode::BAD_REQUEST, &format!("failed to read request body: {e}")));
            }
        };

        let query = parts.uri.query().map(str::to_string);
        let headers = parts.headers.clone();

        let multipart = if is_multipart(&headers) {
            let req = Request::from_parts(parts, body.clone().into());
            Some(match Multipart::from_request(req, &()).await {
                Ok(multipart) => collect_parts(multipart).await.map_err(|e| e.to_string()),
                Err(rejection) => Err(rejection.body_text()),
            })
        } else {
            None
        };

        Ok(Self {
            path_params,
            query,
            headers,
            body,
            multipart,
        })
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Set the raw query string (without the leading `?`).
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(HeaderName::from_static(name), value);
        }
        self
    }

    pub fn cookie(self, name: &str, value: &str) -> Self {
        self.header("cookie", &format!("{name}={value}"))
    }

    pub fn json(mut self, value: &Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self.header("content-type", "application/json")
    }

    pub fn form_urlencoded(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body = Bytes::from(encoded);
        self.header("content-type", "application/x-www-form-urlencoded")
    }

    /// Supply already-parsed multipart parts.
    pub fn multipart(mut self, parts: RawValues) -> Self {
        self.multipart = Some(Ok(parts));
        self.header("content-type", "multipart/form-data; boundary=star")
    }

    pub fn body_bytes(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = body.into();
        self.header("content-type", content_type)
    }

    /// The raw value bag for one request part.
    ///
    /// Fails only when the part as a whole is unreadable (malformed body).
    pub fn values(&self, kind: ParamKind) -> Result<RawValues, FieldViolation> {
        match kind {
            ParamKind::Path => Ok(self.path_values()),
            ParamKind::Query => Ok(self.query_values()),
            ParamKind::Header => Ok(self.header_values()),
            ParamKind::Cookie => Ok(self.cookie_values()),
            ParamKind::Form => self.form_values(),
            ParamKind::Body => self.body_values(),
        }
    }

    fn path_values(&self) -> RawValues {
        let mut values = RawValues::new();
        for (name, value) in &self.path_params {
            values.push_text(name.clone(), value.clone());
        }
        values
    }

    fn query_values(&self) -> RawValues {
        let mut values = RawValues::new();
        if let Some(query) = &self.query {
            for (k, v) in form_urlencoded::parse(query.as_bytes()) {
                values.push_text(k, v);
            }
        }
        values
    }

    fn header_values(&self) -> RawValues {
        let mut values = RawValues::case_insensitive();
        for (name, value) in &self.headers {
            values.push_text(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        values
    }

    fn cookie_values(&self) -> RawValues {
        let mut values = RawValues::new();
        for header in self.headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else { continue };
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                values.push_text(name.trim(), value);
            }
        }
        values
    }

    fn form_values(&self) -> Result<RawValues, FieldViolation> {
        match &self.multipart {
            Some(Ok(parts)) => Ok(parts.clone()),
            Some(Err(message)) => Err(FieldViolation::new(ROOT_FIELD, message.clone(), Value::Null)),
            None => {
                let mut values = RawValues::new();
                for (k, v) in form_urlencoded::parse(&self.body) {
                    values.push_text(k, v);
                }
                Ok(values)
            }
        }
    }

    fn body_values(&self) -> Result<RawValues, FieldViolation> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(RawValues::new());
        }
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(object)) => Ok(RawValues::from_json_object(object)),
            Ok(other) => Err(FieldViolation::new(ROOT_FIELD, "expected a JSON object", other)),
            Err(e) => Err(FieldViolation::new(
                ROOT_FIELD,
                format!("invalid JSON: {e}"),
                Value::String(String::from_utf8_lossy(&self.body).into_owned()),
            )),
        }
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn body_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
