//! Variable maps for template rendering
//!
//! Bindings merge in layers: file-sourced values first, inline overrides
//! last. Inline overrides win by key and are coerced: `"true"`/`"false"`
//! become booleans, everything else stays a string.

#![allow(clippy::must_use_candidate)]

use crate::template::errors::TemplateError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name→value bindings for templating
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMap {
    values: BTreeMap<String, Value>,
}

impl VariableMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML document into a base layer
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MalformedVars`] when the document is not a
    /// YAML mapping.
    pub fn from_yaml(body: &str) -> Result<Self, TemplateError> {
        if body.trim().is_empty() {
            return Ok(Self::new());
        }
        let parsed: Value =
            serde_yaml::from_str(body).map_err(|e| TemplateError::MalformedVars {
                reason: e.to_string(),
            })?;
        let Value::Object(map) = parsed else {
            return Err(TemplateError::MalformedVars {
                reason: "variable file must be a mapping".to_string(),
            });
        };
        Ok(Self {
            values: map.into_iter().collect(),
        })
    }

    /// Sets a typed value, replacing any previous binding
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Applies inline `key=value` overrides on top of the current layer
    ///
    /// Each value is coerced: `"true"`/`"false"` become booleans, everything
    /// else is kept verbatim as a string. Unknown keys are retained.
    #[must_use]
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in overrides {
            self.values.insert(key.to_string(), coerce(value));
        }
        self
    }

    /// Looks up a binding
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns true when no bindings exist
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for VariableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VariableMap({} keys)", self.values.len())
    }
}

/// Coerces an inline scalar override to its typed value
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_yaml_layer_parses_typed_values() {
        let vars = VariableMap::from_yaml("role: admin\nreplicas: 3\ndebug: false\n").unwrap();
        assert_eq!(vars.get("role"), Some(&Value::String("admin".into())));
        assert_eq!(vars.get("replicas"), Some(&Value::from(3)));
        assert_eq!(vars.get("debug"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_inline_overrides_win_by_key() {
        let vars = VariableMap::from_yaml("role: admin\nname: bob\n")
            .unwrap()
            .with_overrides([("name", "Alice")]);
        assert_eq!(vars.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(vars.get("role"), Some(&Value::String("admin".into())));
    }

    #[test]
    fn test_inline_coercion() {
        let vars = VariableMap::new().with_overrides([
            ("enabled", "true"),
            ("disabled", "false"),
            ("count", "3"),
        ]);
        assert_eq!(vars.get("enabled"), Some(&Value::Bool(true)));
        assert_eq!(vars.get("disabled"), Some(&Value::Bool(false)));
        // Everything that is not a boolean literal stays a string.
        assert_eq!(vars.get("count"), Some(&Value::String("3".into())));
    }

    #[test]
    fn test_empty_yaml_is_empty_map() {
        assert!(VariableMap::from_yaml("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_yaml_is_rejected() {
        assert!(matches!(
            VariableMap::from_yaml("- a\n- b\n"),
            Err(TemplateError::MalformedVars { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_override_beats_file_value(
            key in "[a-z][a-z0-9_]{0,12}",
            file_value in "[a-zA-Z0-9 ]{0,16}",
            inline in "[a-zA-Z0-9 ]{1,16}",
        ) {
            let vars = VariableMap::new()
                .set(key.clone(), Value::String(file_value))
                .with_overrides([(key.as_str(), inline.as_str())]);
            prop_assert_eq!(vars.get(&key), Some(&coerce(&inline)));
        }
    }
}
