//! Flow-scoped variables with late-bound `${name}` substitution
//!
//! Option values are stored unexpanded. Every time an actor reads an option,
//! placeholders are replaced with the *current* value of the variable, so the
//! same actor definition can behave differently on each activation of a
//! Trigger, ForLoop or ArrayProcess when variables change in between.
//!
//! `$${name}` escapes a literal `${name}`.

use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{FlowError, FlowResult};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"(\$?)\$\{([^}]*)\}").expect("placeholder pattern is a valid regex")
    })
}

/// Shared name -> value map for one flow run.
///
/// Cloning is cheap and clones share the same map.
#[derive(Clone, Default)]
pub struct Variables {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl Variables {
    /// Create an empty variable map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable map seeded with initial values
    pub fn from_map(initial: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(initial)),
        }
    }

    /// Whether `name` is usable as a variable name
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
    }

    /// Set a variable, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> FlowResult<Option<String>> {
        let name = name.into();
        if !Self::is_valid_name(&name) {
            return Err(FlowError::invalid_option("variable_name", format!("'{}' is not a valid variable name", name)));
        }
        Ok(self.values.write().insert(name, value.into()))
    }

    /// Current value of a variable
    pub fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    /// Check if a variable is defined
    pub fn has(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Remove a variable
    pub fn remove(&self, name: &str) -> Option<String> {
        self.values.write().remove(name)
    }

    /// Sorted variable names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Copy of all current values
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Whether `text` contains at least one unescaped placeholder
    pub fn contains_placeholder(text: &str) -> bool {
        placeholder_regex()
            .captures_iter(text)
            .any(|caps| caps.get(1).is_none_or(|m| m.as_str().is_empty()))
    }

    /// Substitute every `${name}` in `text` with its current value.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::UnknownVariable` for the first placeholder whose
    /// variable is not defined.
    pub fn expand(&self, text: &str) -> FlowResult<String> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }

        let values = self.values.read();
        let mut missing: Option<String> = None;
        let expanded = placeholder_regex().replace_all(text, |caps: &Captures| {
            let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let escaped = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if escaped {
                return format!("${{{}}}", name);
            }
            match values.get(name) {
                Some(value) => value.clone(),
                None => {
                    if missing.is_none() {
                        missing = Some(name.to_string());
                    }
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(FlowError::UnknownVariable(name)),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Expand placeholders in every string inside a JSON value
    pub fn expand_value(&self, value: &JsonValue) -> FlowResult<JsonValue> {
        match value {
            JsonValue::String(s) => Ok(JsonValue::String(self.expand(s)?)),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.expand_value(item))
                .collect::<FlowResult<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::Object(map) => {
                let mut expanded = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    expanded.insert(key.clone(), self.expand_value(item)?);
                }
                Ok(JsonValue::Object(expanded))
            }
            other => Ok(other.clone()),
        }
    }
}

impl std::fmt::Debug for Variables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variables")
            .field("names", &self.names())
            .finish()
    }
}
