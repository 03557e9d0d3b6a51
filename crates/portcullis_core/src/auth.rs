//! Auth route records.
//!
//! Every site declares a set of auth routes (login, register, home,
//! unauthorized, default redirect). Modules may override any subset of
//! them. Values are route specifiers: they only become canonical paths
//! once a resolver has placed them under a site and module.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The five recognized auth route keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRouteKind {
    /// Login page
    Login,
    /// Registration page
    Register,
    /// Landing page for authenticated users
    Home,
    /// Page shown when access is denied to an authenticated user
    Unauthorized,
    /// Fallback redirect
    Default,
}

impl AuthRouteKind {
    /// All keys, in canonical order
    pub const ALL: [AuthRouteKind; 5] = [
        Self::Login,
        Self::Register,
        Self::Home,
        Self::Unauthorized,
        Self::Default,
    ];

    /// Lowercase name of the key
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Home => "home",
            Self::Unauthorized => "unauthorized",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for AuthRouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthRouteKind {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "register" => Ok(Self::Register),
            "home" => Ok(Self::Home),
            "unauthorized" => Ok(Self::Unauthorized),
            "default" => Ok(Self::Default),
            other => Err(crate::CoreError::ParseError {
                message: format!("unknown auth route kind: {}", other),
            }),
        }
    }
}

/// Partial set of auth route specifiers
///
/// Used both for site defaults and for module overrides. A missing field
/// means "not declared here"; resolution falls through to the next source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRoutes {
    /// Login route specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_route: Option<String>,
    /// Register route specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_route: Option<String>,
    /// Home route specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_route: Option<String>,
    /// Unauthorized route specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unauthorized_route: Option<String>,
    /// Default redirect specifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_redirect: Option<String>,
}

/// Site-level defaults share the shape of module overrides
pub type SiteAuthConfig = AuthRoutes;

/// Per-module auth route overrides
pub type AuthOverrides = AuthRoutes;

impl AuthRoutes {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one key
    #[must_use]
    pub fn with(mut self, kind: AuthRouteKind, route: impl Into<String>) -> Self {
        self.set(kind, route.into());
        self
    }

    /// Get the specifier for a key
    #[must_use]
    pub fn get(&self, kind: AuthRouteKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    /// Replace the specifier for a key
    pub fn set(&mut self, kind: AuthRouteKind, route: String) {
        *self.slot_mut(kind) = Some(route);
    }

    /// Whether this record declares a key
    #[must_use]
    pub fn declares(&self, kind: AuthRouteKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Whether no key is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        AuthRouteKind::ALL.iter().all(|k| !self.declares(*k))
    }

    /// Overlay another record: every key it declares replaces ours
    pub fn merge_from(&mut self, other: &AuthRoutes) {
        for kind in AuthRouteKind::ALL {
            if let Some(route) = other.get(kind) {
                self.set(kind, route.to_string());
            }
        }
    }

    fn slot(&self, kind: AuthRouteKind) -> &Option<String> {
        match kind {
            AuthRouteKind::Login => &self.login_route,
            AuthRouteKind::Register => &self.register_route,
            AuthRouteKind::Home => &self.home_route,
            AuthRouteKind::Unauthorized => &self.unauthorized_route,
            AuthRouteKind::Default => &self.default_redirect,
        }
    }

    fn slot_mut(&mut self, kind: AuthRouteKind) -> &mut Option<String> {
        match kind {
            AuthRouteKind::Login => &mut self.login_route,
            AuthRouteKind::Register => &mut self.register_route,
            AuthRouteKind::Home => &mut self.home_route,
            AuthRouteKind::Unauthorized => &mut self.unauthorized_route,
            AuthRouteKind::Default => &mut self.default_redirect,
        }
    }
}

/// Fully resolved auth routes, all canonical paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAuthRoutes {
    /// Login path
    pub login_route: String,
    /// Register path
    pub register_route: String,
    /// Home path
    pub home_route: String,
    /// Unauthorized path
    pub unauthorized_route: String,
    /// Default redirect path
    pub default_redirect: String,
}

impl ResolvedAuthRoutes {
    /// Build from a per-key resolver
    pub fn from_fn(mut f: impl FnMut(AuthRouteKind) -> String) -> Self {
        Self {
            login_route: f(AuthRouteKind::Login),
            register_route: f(AuthRouteKind::Register),
            home_route: f(AuthRouteKind::Home),
            unauthorized_route: f(AuthRouteKind::Unauthorized),
            default_redirect: f(AuthRouteKind::Default),
        }
    }

    /// Get the path for a key
    #[must_use]
    pub fn get(&self, kind: AuthRouteKind) -> &str {
        match kind {
            AuthRouteKind::Login => &self.login_route,
            AuthRouteKind::Register => &self.register_route,
            AuthRouteKind::Home => &self.home_route,
            AuthRouteKind::Unauthorized => &self.unauthorized_route,
            AuthRouteKind::Default => &self.default_redirect,
        }
    }

    /// Iterate over all keys and paths
    pub fn iter(&self) -> impl Iterator<Item = (AuthRouteKind, &str)> {
        AuthRouteKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_declared_keys_only() {
        let mut base = AuthRoutes::new()
            .with(AuthRouteKind::Login, "/login")
            .with(AuthRouteKind::Home, "/dashboard");
        let overlay = AuthRoutes::new().with(AuthRouteKind::Home, "/sales/home");

        base.merge_from(&overlay);

        assert_eq!(base.get(AuthRouteKind::Login), Some("/login"));
        assert_eq!(base.get(AuthRouteKind::Home), Some("/sales/home"));
        assert_eq!(base.get(AuthRouteKind::Register), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(AuthRoutes::new().is_empty());
        assert!(!AuthRoutes::new().with(AuthRouteKind::Default, "x").is_empty());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("home".parse::<AuthRouteKind>().unwrap(), AuthRouteKind::Home);
        assert!("nope".parse::<AuthRouteKind>().is_err());
    }

    #[test]
    fn test_camel_case_serde() {
        let json = r#"{"loginRoute":"/auth/login","defaultRedirect":"/home"}"#;
        let routes: AuthRoutes = serde_json::from_str(json).unwrap();
        assert_eq!(routes.get(AuthRouteKind::Login), Some("/auth/login"));
        assert_eq!(routes.get(AuthRouteKind::Default), Some("/home"));
        assert!(!routes.declares(AuthRouteKind::Home));
    }

    #[test]
    fn test_resolved_iter_order() {
        let resolved = ResolvedAuthRoutes::from_fn(|k| format!("/s/{}", k));
        let kinds: Vec<_> = resolved.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, AuthRouteKind::ALL.to_vec());
        assert_eq!(resolved.get(AuthRouteKind::Unauthorized), "/s/unauthorized");
    }
}
