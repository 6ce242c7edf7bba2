mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str, found: &'static str },
    /// A configuration file could not be read or parsed.
    Load { source: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected, found } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}, found {found}")
            }
            ConfigError::Load { source, message } => write!(f, "Config load error in {source}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration: flattened dot-separated keys.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml`
/// 2. `application-{profile}.yaml`
/// 3. `.env` and `.env.{profile}` (never overwrite variables already set)
/// 4. Environment variables (`OPENAPI_TITLE` overrides `openapi.title`)
///
/// The profile is `STAR_PROFILE` if set, else the argument of [`load`](Self::load).
#[derive(Debug, Clone)]
pub struct StarConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl StarConfig {
    /// Load from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile)
    }

    /// Load the YAML and `.env` files found in `dir`, then overlay the
    /// process environment.
    pub fn load_from_dir(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let profile = std::env::var("STAR_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::load_yaml_file(&dir.join(format!("application-{profile}.yaml")), &mut values)?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{profile}")));

        loader::overlay_env(&mut values, std::env::vars());

        tracing::debug!(profile = %profile, keys = values.len(), "Loaded configuration");
        Ok(Self { values, profile })
    }

    /// Build from a YAML document, without touching files or the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml(yaml, "<string>", &mut values)?;
        Ok(Self {
            values,
            profile: "test".to_string(),
        })
    }

    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Typed value at a dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Typed value, or `default` when the key is missing or mistyped.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Keys under `prefix.`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let dotted = format!("{prefix}.");
        let mut keys: Vec<&str> = self
            .values
            .keys()
            .filter(|k| k.starts_with(&dotted))
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for StarConfig {
    fn default() -> Self {
        Self::empty()
    }
}
