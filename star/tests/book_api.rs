use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use star::prelude::*;
use star_test::TestApp;

#[derive(Deserialize, JsonSchema, garde::Validate)]
struct NewBook {
    #[garde(length(min = 1))]
    name: String,
    #[garde(range(min = 1))]
    pages: i64,
}

async fn get_book(params: BoundParams) -> Json<Value> {
    Json(params.to_json())
}

async fn create_book(params: BoundParams) -> impl IntoResponse {
    match params.get::<NewBook>(ParamKind::Body) {
        Ok(book) => (StatusCode::CREATED, Json(json!({ "name": book.name, "pages": book.pages }))).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

fn book_app() -> App {
    let book_path = ModelSpec::new("BookPath").field(FieldSpec::integer("bid")).shared();
    let book_query = ModelSpec::new("BookQuery")
        .field(FieldSpec::integer("age").ge(2).le(4))
        .shared();

    let mut english = RouterNode::new().tag("english").security("api_key");
    english.post("/english", create_book).unwrap();
    let mut api = RouterNode::with_prefix("/api/book")
        .tag(Tag::new("book").description("Books"))
        .security("jwt");
    api.add_route(
        RouteDescriptor::get("/{bid}", get_book)
            .path(book_path)
            .query(book_query),
    )
    .unwrap();
    api.add_route(RouteDescriptor::post("/", create_book).body(TypedModel::<NewBook>::new()))
        .unwrap();
    api.register_child(english);

    App::new().register_api(api).with(OpenApiPlugin::new(
        OpenApiConfig::new("Book API", "1.0.0")
            .with_security_scheme("jwt", json!({ "type": "http", "scheme": "bearer" }))
            .with_security_scheme("api_key", json!({ "type": "apiKey", "in": "header", "name": "X-Key" })),
    ))
}

#[tokio::test]
async fn invalid_query_never_reaches_the_handler() {
    let app = TestApp::from_app(book_app());
    let resp = app
        .get("/api/book/7")
        .query("age=10")
        .send()
        .await
        .assert_unprocessable()
        .assert_json_path("errors.len()", 1)
        .assert_json_path("errors[0].kind", "query")
        .assert_json_path("errors[0].field", "age")
        .assert_json_path("errors[0].input", "10");
    assert_eq!(resp.validation_reason("query", "age").as_deref(), Some("must be ≤ 4"));
}

#[tokio::test]
async fn valid_request_binds_path_and_query() {
    TestApp::from_app(book_app())
        .get("/api/book/7")
        .query("age=3")
        .send()
        .await
        .assert_ok()
        .assert_json_path("path.bid", 7)
        .assert_json_path("query.age", 3);
}

#[tokio::test]
async fn typed_body_is_validated_with_garde() {
    let app = TestApp::from_app(book_app());
    app.post("/api/book")
        .json(&json!({ "name": "", "pages": 0 }))
        .send()
        .await
        .assert_unprocessable()
        .assert_validation_error("body", "name")
        .assert_validation_error("body", "pages");

    app.post("/api/book")
        .json(&json!({ "name": "Dune", "pages": 412 }))
        .send()
        .await
        .assert_created()
        .assert_json_path("pages", 412);
}

#[tokio::test]
async fn document_describes_the_whole_tree() {
    let app = TestApp::from_app(book_app());
    let resp = app.get("/openapi/openapi.json").send().await.assert_ok();
    let doc: Value = resp.json();

    let get = &doc["paths"]["/api/book/{bid}"]["get"];
    assert_eq!(get["tags"], json!(["book"]));
    assert_eq!(get["security"], json!([{ "jwt": [] }]));
    assert_eq!(get["parameters"][1]["schema"], json!({ "type": "integer", "minimum": 2, "maximum": 4 }));
    assert_eq!(
        get["responses"]["422"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/ValidationErrorModel"
    );

    let english = &doc["paths"]["/api/book/english"]["post"];
    assert_eq!(english["tags"], json!(["book", "english"]));
    assert_eq!(english["security"], json!([{ "jwt": [] }, { "api_key": [] }]));

    let create = &doc["paths"]["/api/book"]["post"];
    assert_eq!(
        create["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/NewBook"
    );
    assert!(doc["components"]["schemas"]["NewBook"]["properties"]["pages"].is_object());

    app.get("/openapi").send().await.assert_ok();
}
