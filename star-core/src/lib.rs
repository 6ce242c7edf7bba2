//! Core runtime for star: parameter models, router trees, request binding
//! and the `App` that mounts them on axum.

pub mod app;
pub mod binder;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod http;
pub mod kind;
pub mod layers;
pub mod meta;
pub mod model;
pub mod multipart;
pub mod plugin;
pub mod prelude;
pub mod router;
pub mod validation;

pub use app::App;
pub use binder::{BoundParams, ParameterBinder};
pub use config::{ConfigError, ConfigValue, FromConfigValue, StarConfig};
pub use error::{ConfigurationError, StartupError};
pub use extract::RawRequest;
pub use handler::{BoxedHandler, Handler};
pub use kind::ParamKind;
pub use layers::{default_trace, init_tracing};
pub use meta::{ExternalDocs, RequestBodySpec, ResponseSpec, SecurityRequirement, Server, Tag};
pub use model::{
    BoundModel, FieldSpec, FieldType, FieldViolation, ModelKey, ModelSpec, ParamModel, RawValue,
    RawValues, SchemaRefs, TypedModel,
};
pub use multipart::UploadedFile;
pub use plugin::Plugin;
pub use router::{OperationIdInput, ResolvedRoute, RouteDescriptor, RouterNode};
pub use validation::{FieldError, ValidationError};

pub use garde;
pub use schemars;
