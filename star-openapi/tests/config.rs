use serde_json::json;
use star_core::config::StarConfig;
use star_core::meta::{ExternalDocs, Server};
use star_openapi::OpenApiConfig;

#[test]
fn config_new() {
    let config = OpenApiConfig::new("My API", "1.0.0");
    assert_eq!(config.title, "My API");
    assert_eq!(config.version, "1.0.0");
    assert!(config.description.is_none());
    assert!(config.docs_ui);
    assert!(config.yaml);
    assert_eq!(config.url_prefix, "/openapi");
}

#[test]
fn config_builders() {
    let config = OpenApiConfig::new("My API", "1.0.0")
        .with_description("A great API")
        .with_docs_ui(false)
        .with_yaml(false)
        .with_url_prefix("/docs")
        .with_server(Server::new("https://api.example.com"))
        .with_external_docs(ExternalDocs::new("https://docs.example.com"))
        .with_security_scheme("jwt", json!({ "type": "http", "scheme": "bearer" }))
        .with_tag("book");
    assert_eq!(config.description.as_deref(), Some("A great API"));
    assert!(!config.docs_ui);
    assert!(!config.yaml);
    assert_eq!(config.url_prefix, "/docs");
    assert_eq!(config.servers[0].url, "https://api.example.com");
    assert!(config.external_docs.is_some());
    assert_eq!(config.security_schemes["jwt"]["scheme"], "bearer");
    assert_eq!(config.tags[0].name, "book");
}

#[test]
fn config_from_application_yaml() {
    let yaml = r#"
openapi:
  title: "Book API"
  version: "2.0.0"
  description: "Books and authors"
  url_prefix: /docs
  docs_ui: false
  yaml: false
  servers:
    - https://a.example
"#;
    let config = OpenApiConfig::from_config(&StarConfig::from_yaml_str(yaml).unwrap());
    assert_eq!(config.title, "Book API");
    assert_eq!(config.version, "2.0.0");
    assert_eq!(config.description.as_deref(), Some("Books and authors"));
    assert_eq!(config.url_prefix, "/docs");
    assert!(!config.docs_ui);
    assert!(!config.yaml);
    assert_eq!(config.servers.len(), 1);
}

#[test]
fn config_from_empty_configuration_uses_defaults() {
    let config = OpenApiConfig::from_config(&StarConfig::empty());
    assert_eq!(config.url_prefix, "/openapi");
    assert!(config.docs_ui);
    assert!(config.yaml);
    assert!(config.servers.is_empty());
}
