use crate::kind::ParamKind;

/// A structural problem in the registration tree.
///
/// These are raised while the application is being assembled and always
/// prevent it from serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The same method and local path were registered twice on one node.
    DuplicateRoute { method: String, path: String },
    /// A route declared two models for the same request part.
    DuplicateModel { method: String, path: String, kind: ParamKind },
    /// A `{name}` placeholder in the path has no matching field in the path model.
    UndeclaredPathVariable { method: String, path: String, variable: String },
    /// Two routes resolve to the same method and full path after flattening.
    AmbiguousRoute { method: String, path: String },
    /// Two full paths match the same requests but name their variables differently.
    ConflictingPathVariables { path: String, other: String },
    /// Every suffixed variant of a schema name is already taken.
    SchemaNamesExhausted { name: String },
    /// A field `pattern` constraint is not a valid regular expression.
    InvalidPattern { field: String, pattern: String, message: String },
    /// The schema registry was asked to grow after the document was frozen.
    RegistryFrozen { name: String },
    /// The HTTP method cannot be routed by the server.
    UnsupportedMethod { method: String, path: String },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::DuplicateRoute { method, path } => {
                write!(f, "route {method} {path} is already registered on this router")
            }
            ConfigurationError::DuplicateModel { method, path, kind } => {
                write!(f, "route {method} {path} declares more than one {kind} model")
            }
            ConfigurationError::UndeclaredPathVariable { method, path, variable } => {
                write!(
                    f,
                    "route {method} {path} uses path variable '{variable}' which its path model does not declare"
                )
            }
            ConfigurationError::AmbiguousRoute { method, path } => {
                write!(f, "more than one route resolves to {method} {path}")
            }
            ConfigurationError::ConflictingPathVariables { path, other } => {
                write!(f, "paths {other} and {path} match the same requests with different variable names")
            }
            ConfigurationError::SchemaNamesExhausted { name } => {
                write!(f, "no free schema name left for '{name}'")
            }
            ConfigurationError::InvalidPattern { field, pattern, message } => {
                write!(f, "field '{field}' has an invalid pattern '{pattern}': {message}")
            }
            ConfigurationError::RegistryFrozen { name } => {
                write!(f, "cannot register schema '{name}': the registry is frozen")
            }
            ConfigurationError::UnsupportedMethod { method, path } => {
                write!(f, "route {method} {path} uses a method the server cannot route")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Error returned by [`App::build`](crate::app::App::build).
#[derive(Debug)]
pub enum StartupError {
    Configuration(ConfigurationError),
    /// A plugin refused to install (for example, the document failed to build).
    Plugin { plugin: &'static str, source: Box<dyn std::error::Error + Send + Sync> },
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Configuration(err) => write!(f, "configuration error: {err}"),
            StartupError::Plugin { plugin, source } => {
                write!(f, "plugin {plugin} failed to install: {source}")
            }
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Configuration(err) => Some(err),
            StartupError::Plugin { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<ConfigurationError> for StartupError {
    fn from(err: ConfigurationError) -> Self {
        StartupError::Configuration(err)
    }
}
