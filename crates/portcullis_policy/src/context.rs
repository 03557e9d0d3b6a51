//! Request-side inputs to an access decision.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The user attempting to reach a route
///
/// Only the id is interpreted by the engine; attributes are carried for
/// custom predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User identifier, as known to the identity service
    pub id: String,
    /// Free-form attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl User {
    /// Create a user with no attributes
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Opaque context forwarded to custom predicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Variables available to predicates
    pub vars: HashMap<String, Value>,
}

impl AccessContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// Get a variable
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }
}
