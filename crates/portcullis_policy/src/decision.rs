//! Access decision result.

use serde::{Deserialize, Serialize};

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    /// Whether the route may be reached
    pub allow: bool,
    /// Canonical path to send a denied user to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    /// Description of the condition that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_policy: Option<String>,
}

impl AccessDecision {
    /// Access granted
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allow: true,
            redirect_to: None,
            failed_policy: None,
        }
    }

    /// Access denied with a redirect
    #[must_use]
    pub fn deny(redirect_to: impl Into<String>) -> Self {
        Self {
            allow: false,
            redirect_to: Some(redirect_to.into()),
            failed_policy: None,
        }
    }

    /// Attach the failing condition
    #[must_use]
    pub fn with_failed_policy(mut self, description: impl Into<String>) -> Self {
        self.failed_policy = Some(description.into());
        self
    }

    /// Whether access was granted
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allow
    }
}
