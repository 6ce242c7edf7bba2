//! Import everything needed to declare models and routes with a single `use`.
//!
//! ```ignore
//! use star_core::prelude::*;
//!
//! let query = ModelSpec::new("BookQuery")
//!     .field(FieldSpec::integer("age").ge(2).le(4))
//!     .shared();
//!
//! let app = App::new()
//!     .route(RouteDescriptor::get("/book", list_books).query(query))
//!     .build()?;
//! ```

pub use crate::app::App;
pub use crate::binder::BoundParams;
pub use crate::config::StarConfig;
pub use crate::error::{ConfigurationError, StartupError};
pub use crate::http::response::IntoResponse;
pub use crate::http::{Json, StatusCode};
pub use crate::kind::ParamKind;
pub use crate::meta::{ExternalDocs, RequestBodySpec, ResponseSpec, SecurityRequirement, Server, Tag};
pub use crate::model::{FieldSpec, FieldType, ModelSpec, ParamModel, TypedModel};
pub use crate::multipart::UploadedFile;
pub use crate::plugin::Plugin;
pub use crate::router::{RouteDescriptor, RouterNode};
pub use crate::validation::ValidationError;
