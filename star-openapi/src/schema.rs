use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use star_core::error::ConfigurationError;
use star_core::model::{component_ref, ModelKey, ParamModel, SchemaRefs};

/// Highest numeric suffix tried when a component name is already taken.
pub const MAX_NAME_SUFFIX: usize = 1000;

/// Registry that collects the JSON Schema components of a document.
///
/// Models are deduplicated by declaration identity ([`ModelKey`]), not by
/// shape: registering the same model twice returns the same name, while two
/// distinct declarations with identical fields get two components
/// (`Book`, `Book_2`). A typed model and the `$defs` entry of the same type
/// share one component. Entries are exported in registration order.
pub struct SchemaRegistry {
    entries: Vec<(String, Value)>,
    by_key: HashMap<ModelKey, usize>,
    definitions: HashMap<String, usize>,
    frozen: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            definitions: HashMap::new(),
            frozen: false,
        }
    }

    /// Register a model and, transitively, every model it references.
    ///
    /// Returns the component name assigned to the model.
    pub fn register(&mut self, model: &Arc<dyn ParamModel>) -> Result<String, ConfigurationError> {
        if let Some(&idx) = self.by_key.get(&model.key()) {
            return Ok(self.entries[idx].0.clone());
        }
        let definition = model.shared_definition();
        if let Some(&idx) = definition.and_then(|d| self.definitions.get(d)) {
            self.by_key.insert(model.key(), idx);
            return Ok(self.entries[idx].0.clone());
        }
        let idx = self.reserve(model.name())?;
        self.by_key.insert(model.key(), idx);
        if let Some(definition) = definition {
            self.definitions.insert(definition.to_string(), idx);
        }
        // The name is reserved before the schema is computed so that a model
        // referencing itself resolves to its own component.
        let schema = model.json_schema(self)?;
        self.entries[idx].1 = schema;
        Ok(self.entries[idx].0.clone())
    }

    /// Add a component that is not backed by a model declaration.
    pub fn register_named(&mut self, name: &str, schema: Value) -> Result<String, ConfigurationError> {
        let idx = self.reserve(name)?;
        self.entries[idx].1 = schema;
        Ok(self.entries[idx].0.clone())
    }

    /// The name assigned to a model, if it was registered.
    pub fn name_of(&self, key: ModelKey) -> Option<&str> {
        self.by_key.get(&key).map(|&idx| self.entries[idx].0.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Refuse any further growth. Existing names still resolve.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// The components, in registration order.
    pub fn export(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, schema)| {
                let schema = if schema.is_null() {
                    json!({ "type": "object" })
                } else {
                    schema.clone()
                };
                (name.clone(), schema)
            })
            .collect()
    }

    fn reserve(&mut self, base: &str) -> Result<usize, ConfigurationError> {
        if self.frozen {
            return Err(ConfigurationError::RegistryFrozen { name: base.to_string() });
        }
        let name = self.unique_name(base)?;
        self.entries.push((name, Value::Null));
        Ok(self.entries.len() - 1)
    }

    fn unique_name(&self, base: &str) -> Result<String, ConfigurationError> {
        if !self.contains(base) {
            return Ok(base.to_string());
        }
        (2..=MAX_NAME_SUFFIX)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .ok_or_else(|| ConfigurationError::SchemaNamesExhausted { name: base.to_string() })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRefs for SchemaRegistry {
    fn model_ref(&mut self, model: &Arc<dyn ParamModel>) -> Result<String, ConfigurationError> {
        self.register(model).map(|name| component_ref(&name))
    }

    fn definition_name(&mut self, name: &str) -> Result<String, ConfigurationError> {
        if let Some(&idx) = self.definitions.get(name) {
            return Ok(self.entries[idx].0.clone());
        }
        let idx = self.reserve(name)?;
        self.definitions.insert(name.to_string(), idx);
        Ok(self.entries[idx].0.clone())
    }

    fn define(&mut self, assigned: &str, schema: Value) {
        // Only fills a reserved slot; a defined entry is never rewritten.
        if let Some((_, slot)) = self.entries.iter_mut().find(|(n, _)| n == assigned) {
            if slot.is_null() {
                *slot = schema;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_core::model::{FieldSpec, ModelSpec};

    #[test]
    fn suffixes_run_out() {
        let mut registry = SchemaRegistry::new();
        registry.register_named("Book", json!({})).unwrap();
        for n in 2..=MAX_NAME_SUFFIX {
            assert_eq!(registry.register_named("Book", json!({})).unwrap(), format!("Book_{n}"));
        }
        let err = registry.register_named("Book", json!({})).unwrap_err();
        assert_eq!(err, ConfigurationError::SchemaNamesExhausted { name: "Book".into() });
    }

    #[test]
    fn definitions_are_reserved_once_per_name() {
        let mut registry = SchemaRegistry::new();
        let first = registry.definition_name("Address").unwrap();
        let again = registry.definition_name("Address").unwrap();
        assert_eq!(first, again);
        registry.define(&first, json!({ "type": "object", "title": "Address" }));
        registry.define(&first, json!({ "type": "string" }));
        assert_eq!(registry.get("Address").unwrap()["title"], "Address");
    }

    #[test]
    fn frozen_registry_still_resolves_known_models() {
        let model = ModelSpec::new("Book").field(FieldSpec::string("name")).shared();
        let mut registry = SchemaRegistry::new();
        registry.register(&model).unwrap();
        registry.freeze();
        assert_eq!(registry.register(&model).unwrap(), "Book");
        assert_eq!(registry.name_of(model.key()), Some("Book"));
    }
}
