//! Route rules and module access tables.

use crate::context::{AccessContext, User};
use indexmap::IndexMap;
use portcullis_core::path::strip_leading_slash;
use portcullis_core::AuthRoutes;
use std::fmt;
use std::sync::Arc;

/// Error raised by a custom predicate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("predicate failed: {message}")]
pub struct PredicateError {
    /// What went wrong
    pub message: String,
}

impl PredicateError {
    /// Create a predicate error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Custom predicate: `(user, site, context) -> allowed`
pub type MatchCallback =
    Arc<dyn Fn(&User, &str, &AccessContext) -> Result<bool, PredicateError> + Send + Sync>;

/// Matches any authenticated user
pub const ROLE_AUTHENTICATED: &str = "@";
/// Always matches
pub const ROLE_ANYONE: &str = "?";

/// One access condition
///
/// Every condition that is present must hold. A rule with no conditions
/// passes when `allow` is set and fails otherwise.
#[derive(Clone)]
pub struct PolicyRule {
    /// Outcome for a rule without conditions
    pub allow: bool,
    /// Passes if any listed role matches
    pub roles: Vec<String>,
    /// Passes if any listed permission is granted
    pub permissions: Vec<String>,
    /// Custom predicate
    pub match_callback: Option<MatchCallback>,
}

impl PolicyRule {
    /// Unconditional pass
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allow: true,
            roles: Vec::new(),
            permissions: Vec::new(),
            match_callback: None,
        }
    }

    /// Unconditional failure
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            allow: false,
            ..Self::allow_all()
        }
    }

    /// Require any of the given roles
    #[must_use]
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            ..Self::allow_all()
        }
    }

    /// Require any of the given permissions
    #[must_use]
    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            ..Self::allow_all()
        }
    }

    /// Require a custom predicate
    #[must_use]
    pub fn predicate<F>(callback: F) -> Self
    where
        F: Fn(&User, &str, &AccessContext) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            match_callback: Some(Arc::new(callback)),
            ..Self::allow_all()
        }
    }

    /// Add a permission requirement to this rule
    #[must_use]
    pub fn and_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the rule needs a user to be evaluated
    #[must_use]
    pub fn has_conditions(&self) -> bool {
        !self.roles.is_empty() || !self.permissions.is_empty() || self.match_callback.is_some()
    }

    /// Description of the role condition, as reported on failure
    #[must_use]
    pub fn describe_roles(&self) -> String {
        format!("roles: [{}]", self.roles.join(", "))
    }

    /// Description of the permission condition, as reported on failure
    #[must_use]
    pub fn describe_permissions(&self) -> String {
        format!("permissions: [{}]", self.permissions.join(", "))
    }
}

impl Default for PolicyRule {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRule")
            .field("allow", &self.allow)
            .field("roles", &self.roles)
            .field("permissions", &self.permissions)
            .field("match_callback", &self.match_callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Access rule for one protected route
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Whether the route may be reached at all
    pub allow: bool,
    /// Where to send denied users, relative to the module
    pub redirect_to: Option<String>,
    /// Conditions, all of which must pass
    pub policies: Vec<PolicyRule>,
}

impl RouteRule {
    /// Rule that allows access subject to policies
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allow: true,
            redirect_to: None,
            policies: Vec::new(),
        }
    }

    /// Rule that always denies
    #[must_use]
    pub fn deny() -> Self {
        Self {
            allow: false,
            ..Self::allow()
        }
    }

    /// Set the redirect target
    #[must_use]
    pub fn redirect_to(mut self, route: impl Into<String>) -> Self {
        self.redirect_to = Some(route.into());
        self
    }

    /// Add a policy
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyRule) -> Self {
        self.policies.push(policy);
        self
    }
}

/// Flat access configuration of one module
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Module name
    pub module_name: String,
    /// Path segment override
    pub route_prefix: Option<String>,
    /// Auth route overrides
    pub auth: AuthRoutes,
    /// Protected routes keyed without a leading `/`
    pub protected_routes: IndexMap<String, RouteRule>,
    /// Routes reachable without any check
    pub public_routes: Vec<String>,
}

impl ModuleConfig {
    /// Create an empty module config
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    /// Set the route prefix
    #[must_use]
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = Some(prefix.into());
        self
    }

    /// Set the auth overrides
    #[must_use]
    pub fn with_auth(mut self, auth: AuthRoutes) -> Self {
        self.auth = auth;
        self
    }

    /// Protect a route
    #[must_use]
    pub fn protect(mut self, route: &str, rule: RouteRule) -> Self {
        self.protected_routes
            .insert(strip_leading_slash(route).to_string(), rule);
        self
    }

    /// Declare a public route
    #[must_use]
    pub fn public(mut self, route: impl Into<String>) -> Self {
        self.public_routes.push(route.into());
        self
    }

    /// Re-key protected routes without a leading `/`
    pub(crate) fn normalize_keys(&mut self) {
        if self.protected_routes.keys().any(|k| k.starts_with('/')) {
            self.protected_routes = std::mem::take(&mut self.protected_routes)
                .into_iter()
                .map(|(k, v)| (strip_leading_slash(&k).to_string(), v))
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_roles() {
        let rule = PolicyRule::roles(["admin", "editor"]);
        assert_eq!(rule.describe_roles(), "roles: [admin, editor]");
    }

    #[test]
    fn test_allow_all_has_no_conditions() {
        assert!(!PolicyRule::allow_all().has_conditions());
        assert!(PolicyRule::permissions(["reports.read"]).has_conditions());
        assert!(PolicyRule::predicate(|_, _, _| Ok(true)).has_conditions());
    }

    #[test]
    fn test_protect_strips_leading_slash() {
        let config = ModuleConfig::new("sales").protect("/reports", RouteRule::deny());
        assert!(config.protected_routes.contains_key("reports"));
    }

    #[test]
    fn test_normalize_keys() {
        let mut config = ModuleConfig::new("sales");
        config
            .protected_routes
            .insert("/reports/daily".to_string(), RouteRule::allow());
        config.normalize_keys();
        assert!(config.protected_routes.contains_key("reports/daily"));
    }

    #[test]
    fn test_policy_rule_debug_hides_callback() {
        let rule = PolicyRule::predicate(|_, _, _| Ok(false));
        assert!(format!("{:?}", rule).contains("<fn>"));
    }
}
