use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use star_core::binder::{BoundParams, ParameterBinder};
use star_core::error::ConfigurationError;
use star_core::extract::RawRequest;
use star_core::kind::ParamKind;
use star_core::model::{
    BoundModel, FieldSpec, FieldType, FieldViolation, ModelKey, ModelSpec, ParamModel, RawValues,
    SchemaRefs,
};
use star_core::multipart::UploadedFile;
use star_core::router::{ResolvedRoute, RouteDescriptor, RouterNode};

async fn ok(_: BoundParams) -> &'static str {
    "ok"
}

fn resolve(route: RouteDescriptor) -> ResolvedRoute {
    let mut node = RouterNode::new();
    node.add_route(route).unwrap();
    node.flatten().unwrap().remove(0)
}

fn book_route() -> ResolvedRoute {
    let path = ModelSpec::new("BookPath").field(FieldSpec::integer("bid"));
    let query = ModelSpec::new("BookQuery")
        .field(FieldSpec::integer("age").ge(2).le(4))
        .field(FieldSpec::string("author").optional());
    resolve(RouteDescriptor::get("/book/{bid}", ok).path(path).query(query))
}

// ── Book scenario ────────────────────────────────────────────────────────

#[test]
fn out_of_range_query_is_reported() {
    let raw = RawRequest::new().path_param("bid", "7").query("age=10");
    let err = ParameterBinder::bind(&book_route(), &raw).unwrap_err();
    assert_eq!(err.len(), 1);
    let age = err.field(ParamKind::Query, "age").unwrap();
    assert_eq!(age.reason, "must be ≤ 4");
    assert_eq!(age.input, json!("10"));
}

#[test]
fn valid_request_binds_typed_values() {
    let raw = RawRequest::new().path_param("bid", "7").query("age=3");
    let bound = ParameterBinder::bind(&book_route(), &raw).unwrap();
    assert_eq!(bound.value(ParamKind::Path, "bid"), Some(&json!(7)));
    assert_eq!(bound.value(ParamKind::Query, "age"), Some(&json!(3)));
    assert_eq!(bound.value(ParamKind::Query, "author"), Some(&Value::Null));
    assert_eq!(
        bound.to_json(),
        json!({ "path": { "bid": 7 }, "query": { "age": 3, "author": null } })
    );

    #[derive(Deserialize)]
    struct BookQuery {
        age: i64,
        author: Option<String>,
    }
    let query: BookQuery = bound.get(ParamKind::Query).unwrap();
    assert_eq!(query.age, 3);
    assert!(query.author.is_none());
}

// ── Aggregation ──────────────────────────────────────────────────────────

#[test]
fn every_kind_is_validated_before_failing() {
    let header = ModelSpec::new("Headers").field(FieldSpec::string("x_token").alias("X-Token"));
    let cookie = ModelSpec::new("Cookies").field(FieldSpec::integer("session"));
    let body = ModelSpec::new("Book")
        .field(FieldSpec::string("name").min_length(2))
        .field(FieldSpec::integer("pages").gt(0));
    let path = ModelSpec::new("BookPath").field(FieldSpec::integer("bid"));
    let query = ModelSpec::new("BookQuery").field(FieldSpec::integer("age").ge(2).le(4));
    let route = resolve(
        RouteDescriptor::put("/book/{bid}", ok)
            .path(path)
            .query(query)
            .header(header)
            .cookie(cookie)
            .body(body),
    );

    let raw = RawRequest::new()
        .path_param("bid", "seven")
        .query("age=1")
        .cookie("session", "abc")
        .json(&json!({ "name": "x", "pages": 0 }));
    let err = ParameterBinder::bind(&route, &raw).unwrap_err();

    let reported: Vec<_> = err
        .errors
        .iter()
        .map(|e| (e.kind, e.field.as_str()))
        .collect();
    assert_eq!(
        reported,
        [
            (ParamKind::Path, "bid"),
            (ParamKind::Query, "age"),
            (ParamKind::Header, "x_token"),
            (ParamKind::Cookie, "session"),
            (ParamKind::Body, "name"),
            (ParamKind::Body, "pages"),
        ]
    );
    assert_eq!(err.field(ParamKind::Header, "x_token").unwrap().reason, "field required");
    assert_eq!(err.field(ParamKind::Body, "pages").unwrap().reason, "must be > 0");
}

#[test]
fn header_alias_is_case_insensitive() {
    let header = ModelSpec::new("Headers").field(FieldSpec::string("x_hello").alias("X-Hello"));
    let route = resolve(RouteDescriptor::get("/h", ok).header(header));
    let raw = RawRequest::new().header("x-hello", "world");
    let bound = ParameterBinder::bind(&route, &raw).unwrap();
    assert_eq!(bound.value(ParamKind::Header, "x_hello"), Some(&json!("world")));
}

#[test]
fn malformed_body_is_one_root_error() {
    let body = ModelSpec::new("Book").field(FieldSpec::string("name"));
    let query = ModelSpec::new("Q").field(FieldSpec::integer("n"));
    let route = resolve(RouteDescriptor::post("/book", ok).query(query).body(body));
    let raw = RawRequest::new()
        .query("n=x")
        .body_bytes("{\"name\":", "application/json");
    let err = ParameterBinder::bind(&route, &raw).unwrap_err();
    assert_eq!(err.len(), 2);
    assert_eq!(err.errors[1].kind, ParamKind::Body);
    assert_eq!(err.errors[1].field, "__root__");
}

#[test]
fn explicit_null_is_accepted_where_declared() {
    let body = ModelSpec::new("Book")
        .field(FieldSpec::string("name"))
        .field(FieldSpec::string("nick").optional())
        .field(FieldSpec::integer("pages").default_value(100))
        .field(FieldSpec::string("isbn").nullable());
    let route = resolve(RouteDescriptor::post("/book", ok).body(body));

    let raw = RawRequest::new().json(&json!({ "name": "Dune", "nick": null, "pages": null, "isbn": null }));
    let bound = ParameterBinder::bind(&route, &raw).unwrap();
    assert_eq!(bound.value(ParamKind::Body, "nick"), Some(&Value::Null));
    assert_eq!(bound.value(ParamKind::Body, "pages"), Some(&json!(100)));
    assert_eq!(bound.value(ParamKind::Body, "isbn"), Some(&Value::Null));

    let raw = RawRequest::new().json(&json!({ "name": null, "isbn": "x" }));
    let err = ParameterBinder::bind(&route, &raw).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.field(ParamKind::Body, "name").unwrap().reason, "expected string");
}

#[test]
fn repeated_query_key_binds_to_array() {
    let query = ModelSpec::new("Q").field(FieldSpec::array("tag", FieldType::String).min_items(2));
    let route = resolve(RouteDescriptor::get("/t", ok).query(query));

    let bound = ParameterBinder::bind(&route, &RawRequest::new().query("tag=a&tag=b")).unwrap();
    assert_eq!(bound.value(ParamKind::Query, "tag"), Some(&json!(["a", "b"])));

    let err = ParameterBinder::bind(&route, &RawRequest::new().query("tag=a")).unwrap_err();
    assert_eq!(err.errors[0].reason, "must contain at least 2 items");
}

// ── Forms ────────────────────────────────────────────────────────────────

#[test]
fn multipart_files_are_passed_as_handles() {
    let form = ModelSpec::new("Upload")
        .field(FieldSpec::file("cover"))
        .field(FieldSpec::string("title"));
    let route = resolve(RouteDescriptor::post("/upload", ok).form(form));

    let mut parts = RawValues::new();
    parts.push_text("title", "Dune");
    parts.push_file(
        "cover",
        UploadedFile::new("cover", "dune.png", &b"\x89PNG"[..]).with_content_type("image/png"),
    );
    let bound = ParameterBinder::bind(&route, &RawRequest::new().multipart(parts)).unwrap();

    let cover = bound.file("cover").unwrap();
    assert_eq!(cover.file_name.as_deref(), Some("dune.png"));
    assert_eq!(cover.len(), 4);
    assert_eq!(bound.value(ParamKind::Form, "title"), Some(&json!("Dune")));
}

#[test]
fn text_for_a_file_field_is_rejected() {
    let form = ModelSpec::new("Upload").field(FieldSpec::file("cover"));
    let route = resolve(RouteDescriptor::post("/upload", ok).form(form));
    let raw = RawRequest::new().form_urlencoded(&[("cover", "not a file")]);
    let err = ParameterBinder::bind(&route, &raw).unwrap_err();
    assert_eq!(err.errors[0].reason, "expected a file upload");
}

// ── Adapter failures ─────────────────────────────────────────────────────

struct Exploding {
    key: ModelKey,
}

impl ParamModel for Exploding {
    fn key(&self) -> ModelKey {
        self.key
    }

    fn name(&self) -> &str {
        "Exploding"
    }

    fn fields(&self) -> &[FieldSpec] {
        &[]
    }

    fn validate(&self, _: &RawValues) -> Result<BoundModel, Vec<FieldViolation>> {
        panic!("adapter bug")
    }

    fn json_schema(&self, _: &mut dyn SchemaRefs) -> Result<Value, ConfigurationError> {
        Ok(json!({ "type": "object" }))
    }
}

#[test]
fn adapter_panic_becomes_a_validation_error() {
    let model: Arc<dyn ParamModel> = Arc::new(Exploding { key: ModelKey::next() });
    let query = ModelSpec::new("Q").field(FieldSpec::integer("n"));
    let route = resolve(RouteDescriptor::get("/x", ok).query(query).body(model));
    let err = ParameterBinder::bind(&route, &RawRequest::new().query("n=1")).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.errors[0].kind, ParamKind::Body);
    assert!(err.errors[0].reason.contains("adapter bug"));
}

// ── Typed models ─────────────────────────────────────────────────────────

mod typed {
    use super::*;
    use schemars::JsonSchema;
    use star_core::model::TypedModel;

    #[derive(Deserialize, JsonSchema, garde::Validate)]
    struct Signup {
        #[garde(length(min = 3))]
        name: String,
        #[garde(range(min = 18))]
        age: i64,
        #[garde(skip)]
        newsletter: Option<bool>,
    }

    #[test]
    fn coerces_strings_and_runs_garde() {
        let route = resolve(RouteDescriptor::post("/signup", ok).form(TypedModel::<Signup>::new()));

        let raw = RawRequest::new().form_urlencoded(&[("name", "Ada"), ("age", "36"), ("newsletter", "on")]);
        let bound = ParameterBinder::bind(&route, &raw).unwrap();
        let signup: Signup = bound.get(ParamKind::Form).unwrap();
        assert_eq!(signup.name, "Ada");
        assert_eq!(signup.age, 36);
        assert_eq!(signup.newsletter, Some(true));

        let raw = RawRequest::new().form_urlencoded(&[("name", "Al"), ("age", "12")]);
        let err = ParameterBinder::bind(&route, &raw).unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "age"]);
    }

    fn not_admin(value: &String, _: &()) -> garde::Result {
        if value == "admin" {
            return Err(garde::Error::new("reserved name"));
        }
        Ok(())
    }

    #[derive(Deserialize, JsonSchema, garde::Validate)]
    struct Account {
        #[garde(custom(not_admin))]
        email: String,
        #[garde(range(min = 1))]
        age: i64,
    }

    #[test]
    fn garde_still_runs_when_another_field_fails_coercion() {
        let route = resolve(RouteDescriptor::post("/account", ok).body(TypedModel::<Account>::new()));
        let raw = RawRequest::new().json(&json!({ "email": "admin", "age": "old" }));
        let err = ParameterBinder::bind(&route, &raw).unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(err.field(ParamKind::Body, "age").unwrap().reason, "expected integer");
        assert_eq!(err.field(ParamKind::Body, "email").unwrap().reason, "reserved name");
    }

    #[test]
    fn explicit_null_binds_an_option() {
        let route = resolve(RouteDescriptor::post("/signup", ok).body(TypedModel::<Signup>::new()));
        let raw = RawRequest::new().json(&json!({ "name": "Ada", "age": 36, "newsletter": null }));
        let bound = ParameterBinder::bind(&route, &raw).unwrap();
        let signup: Signup = bound.get(ParamKind::Body).unwrap();
        assert_eq!(signup.newsletter, None);
    }

    #[test]
    fn missing_and_uncoercible_fields_are_all_reported() {
        let route = resolve(RouteDescriptor::post("/signup", ok).body(TypedModel::<Signup>::new()));
        let raw = RawRequest::new().json(&json!({ "age": "old" }));
        let err = ParameterBinder::bind(&route, &raw).unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(err.field(ParamKind::Body, "name").unwrap().reason, "field required");
        assert!(err.field(ParamKind::Body, "age").is_some());
    }
}
