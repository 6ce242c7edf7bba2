use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

/// Flatten a YAML file into `values`. A missing file is not an error.
pub(crate) fn load_yaml_file(path: &Path, values: &mut HashMap<String, ConfigValue>) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
        source: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_yaml(&content, &path.display().to_string(), values)
}

pub(crate) fn load_yaml(content: &str, source: &str, values: &mut HashMap<String, ConfigValue>) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| ConfigError::Load {
        source: source.to_string(),
        message: e.to_string(),
    })?;
    flatten("", &yaml, values);
    Ok(())
}

/// `openapi: { title: x }` becomes `openapi.title = x`. Lists stay whole
/// under their key.
fn flatten(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, ConfigValue>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let segment = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                let key = if prefix.is_empty() {
                    segment
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten(&key, v, out);
            }
        }
        leaf if !prefix.is_empty() => {
            out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
        }
        _ => {}
    }
}

/// Environment variable name for a config key: `openapi.url_prefix` ->
/// `OPENAPI_URL_PREFIX`.
pub(crate) fn env_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Keys read by star itself. Their variables map back even when no YAML
/// file sets them.
pub(crate) const FRAMEWORK_KEYS: &[&str] = &[
    "openapi.title",
    "openapi.version",
    "openapi.description",
    "openapi.url_prefix",
    "openapi.docs_ui",
    "openapi.yaml",
    "openapi.servers",
];

/// Overlay environment variables. A variable overrides the loaded or
/// framework key whose [`env_name`] it equals; other variables are added
/// under their lowercase, dot-separated form.
pub(crate) fn overlay_env(values: &mut HashMap<String, ConfigValue>, vars: impl Iterator<Item = (String, String)>) {
    let known: HashMap<String, String> = FRAMEWORK_KEYS
        .iter()
        .map(|k| k.to_string())
        .chain(values.keys().cloned())
        .map(|k| (env_name(&k), k))
        .collect();
    for (name, value) in vars {
        let key = match known.get(&name) {
            Some(key) => key.clone(),
            None => name.to_ascii_lowercase().replace('_', "."),
        };
        values.insert(key, ConfigValue::String(value));
    }
}
