//! Role and permission lookups.
//!
//! The identity service owns users, roles and permissions. The engine only
//! asks for the grants a user holds on a site.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named role or permission record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    /// Role or permission name
    pub name: String,
}

impl Grant {
    /// Create a grant
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Failure of an identity lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The identity service could not answer
    #[error("identity service unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not finish in time
    #[error("{operation} timed out")]
    Timeout {
        /// Lookup that timed out
        operation: String,
    },
}

impl From<LookupError> for portcullis_core::CoreError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Timeout { operation } => Self::Timeout { operation },
            LookupError::Unavailable(message) => Self::Internal { message },
        }
    }
}

/// Source of a user's roles and permissions on a site
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Roles held by `user_id` on `site`
    ///
    /// # Errors
    ///
    /// Returns error if the identity service cannot answer
    async fn fetch_roles(&self, user_id: &str, site: &str) -> Result<Vec<Grant>, LookupError>;

    /// Permissions held by `user_id` on `site`
    ///
    /// # Errors
    ///
    /// Returns error if the identity service cannot answer
    async fn fetch_permissions(&self, user_id: &str, site: &str)
    -> Result<Vec<Grant>, LookupError>;
}

/// In-memory identity provider
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    roles: HashMap<(String, String), Vec<Grant>>,
    permissions: HashMap<(String, String), Vec<Grant>>,
}

impl StaticIdentityProvider {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role on a site
    #[must_use]
    pub fn with_role(mut self, site: &str, user_id: &str, role: &str) -> Self {
        self.roles
            .entry((site.to_string(), user_id.to_string()))
            .or_default()
            .push(Grant::new(role));
        self
    }

    /// Grant a permission on a site
    #[must_use]
    pub fn with_permission(mut self, site: &str, user_id: &str, permission: &str) -> Self {
        self.permissions
            .entry((site.to_string(), user_id.to_string()))
            .or_default()
            .push(Grant::new(permission));
        self
    }

    fn lookup(
        table: &HashMap<(String, String), Vec<Grant>>,
        user_id: &str,
        site: &str,
    ) -> Vec<Grant> {
        table
            .get(&(site.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn fetch_roles(&self, user_id: &str, site: &str) -> Result<Vec<Grant>, LookupError> {
        Ok(Self::lookup(&self.roles, user_id, site))
    }

    async fn fetch_permissions(
        &self,
        user_id: &str,
        site: &str,
    ) -> Result<Vec<Grant>, LookupError> {
        Ok(Self::lookup(&self.permissions, user_id, site))
    }
}
