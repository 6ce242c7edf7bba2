//! Tiny JSON path language used by the response assertions.
//!
//! `errors[0].field`, `book.authors.len()`, `paths./book/{bid}.get` (a segment
//! is split on `.` only, so keys may contain `/` and braces).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum PathToken {
    Field(String),
    Index(usize),
    Len,
}

pub fn tokenize_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if segment == "len()" {
            tokens.push(PathToken::Len);
            continue;
        }
        let (field, mut indices) = match segment.find('[') {
            Some(pos) if segment.ends_with(']') => (&segment[..pos], &segment[pos..]),
            _ => (segment, ""),
        };
        if !field.is_empty() {
            tokens.push(PathToken::Field(field.to_string()));
        }
        while let Some(rest) = indices.strip_prefix('[') {
            let end = rest
                .find(']')
                .unwrap_or_else(|| panic!("unclosed bracket in JSON path {path:?}"));
            let index = rest[..end]
                .parse()
                .unwrap_or_else(|_| panic!("non-numeric index {:?} in JSON path {path:?}", &rest[..end]));
            tokens.push(PathToken::Index(index));
            indices = &rest[end + 1..];
        }
    }
    tokens
}

/// Resolve `path` against `root`. Missing keys and indices resolve to `null`.
pub fn resolve_path(root: &Value, path: &str) -> Value {
    let mut current = root;
    let tokens = tokenize_path(path);
    for (i, token) in tokens.iter().enumerate() {
        match token {
            PathToken::Field(name) => match current.get(name) {
                Some(next) => current = next,
                None => return Value::Null,
            },
            PathToken::Index(idx) => match current.get(*idx) {
                Some(next) => current = next,
                None => return Value::Null,
            },
            PathToken::Len => {
                let len = match current {
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    Value::String(s) => s.chars().count(),
                    other => panic!("len() applied to {other} at segment {i} of {path:?}"),
                };
                if i + 1 != tokens.len() {
                    panic!("len() must be the last segment of {path:?}");
                }
                return Value::from(len);
            }
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokenizes_fields_indices_and_len() {
        assert_eq!(
            tokenize_path("errors[0].field"),
            [
                PathToken::Field("errors".into()),
                PathToken::Index(0),
                PathToken::Field("field".into())
            ]
        );
        assert_eq!(tokenize_path("m[1][2].len()").len(), 4);
    }

    #[test]
    fn keys_may_contain_braces() {
        let doc = json!({ "paths": { "/book/{bid}": { "get": { "operationId": "x" } } } });
        assert_eq!(resolve_path(&doc, "paths./book/{bid}.get.operationId"), json!("x"));
    }
}
