use bytes::Bytes;
use http::header::{HeaderMap, HeaderName};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::path::resolve_path;

/// Response wrapper with status, validation-error and JSON-path assertions.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    /// Assert 422, the status of a failed parameter binding.
    pub fn assert_unprocessable(self) -> Self {
        self.assert_status(StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status,
            expected,
            "Expected {expected}, got {}\nBody: {}",
            self.status,
            self.text()
        );
        self
    }

    /// Assert the validation error payload reports `field` of `kind`
    /// (`"query"`, `"body"`, …).
    pub fn assert_validation_error(self, kind: &str, field: &str) -> Self {
        if self.find_error(kind, field).is_none() {
            panic!(
                "No validation error for {kind}.{field}\nBody: {}",
                self.text()
            );
        }
        self
    }

    /// The `reason` of the validation error for `kind`.`field`.
    pub fn validation_reason(&self, kind: &str, field: &str) -> Option<String> {
        self.find_error(kind, field)
            .and_then(|e| e.get("reason").and_then(Value::as_str).map(str::to_string))
    }

    /// Number of entries in the validation error payload.
    pub fn validation_error_count(&self) -> usize {
        self.json::<Value>()
            .get("errors")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    fn find_error(&self, kind: &str, field: &str) -> Option<Value> {
        let root: Value = serde_json::from_slice(&self.body).ok()?;
        root.get("errors")?
            .as_array()?
            .iter()
            .find(|e| e["kind"] == kind && e["field"] == field)
            .cloned()
    }

    /// Assert that a JSON path resolves to the expected value.
    ///
    /// ```ignore
    /// resp.assert_json_path("query.age", 3)
    ///     .assert_json_path("errors.len()", 1);
    /// ```
    pub fn assert_json_path(self, path: &str, expected: impl Into<Value>) -> Self {
        let root: Value = self.json();
        let actual = resolve_path(&root, path);
        let expected = expected.into();
        assert_eq!(
            actual, expected,
            "JSON path \"{path}\" assertion failed\n  Expected: {expected}\n  Actual:   {actual}\n  Body: {root}",
        );
        self
    }

    /// Extract and deserialize a value at a JSON path.
    pub fn json_path<T: DeserializeOwned>(&self, path: &str) -> T {
        let root: Value = self.json();
        let value = resolve_path(&root, path);
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            panic!("Failed to deserialize JSON path \"{path}\": {e}\n  Value: {value}\n  Body: {root}")
        })
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name: HeaderName = name.as_ref().parse().ok()?;
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("Failed to parse JSON: {e}\nBody: {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
