mod builder;
mod document;
mod ext;
mod handlers;
pub mod schema;

pub use builder::{DocumentBuilder, OpenApiConfig, OPENAPI_VERSION, VALIDATION_ERROR_MODEL};
pub use document::{DocumentCache, OpenApiDocument};
pub use ext::OpenApiPlugin;
pub use handlers::{document_routes, openapi_routes};
pub use schema::{SchemaRegistry, MAX_NAME_SUFFIX};
