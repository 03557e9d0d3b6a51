//! Route access evaluation.

use crate::auth_config::{AuthConfigResolver, Precedence};
use crate::context::{AccessContext, User};
use crate::decision::AccessDecision;
use crate::identity::{Grant, IdentityProvider, LookupError};
use crate::registry::Registry;
use crate::routes::RouteResolver;
use crate::rule::{
    MatchCallback, ModuleConfig, PolicyRule, RouteRule, ROLE_ANYONE, ROLE_AUTHENTICATED,
};
use portcullis_core::path::ancestor_keys;
use portcullis_core::AuthRouteKind;
use std::collections::HashSet;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

/// Decides access for one route of one module
pub struct PolicyEvaluator<'a> {
    registry: &'a Registry,
    auth: AuthConfigResolver<'a>,
    identity: &'a dyn IdentityProvider,
    precedence: &'a Precedence,
    lookup_timeout: Option<Duration>,
}

impl<'a> PolicyEvaluator<'a> {
    /// Create an evaluator
    #[must_use]
    pub fn new(
        registry: &'a Registry,
        auth: AuthConfigResolver<'a>,
        identity: &'a dyn IdentityProvider,
        precedence: &'a Precedence,
    ) -> Self {
        Self {
            registry,
            auth,
            identity,
            precedence,
            lookup_timeout: None,
        }
    }

    /// Bound every identity lookup
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Protected-route entry governing `route`
    ///
    /// Tries the exact route, then each ancestor prefix, then the empty
    /// default entry. Returns the matched key with its rule.
    #[must_use]
    pub fn find_route_config<'m>(
        config: &'m ModuleConfig,
        route: &str,
    ) -> Option<(&'m str, &'m RouteRule)> {
        ancestor_keys(route).find_map(|key| {
            config
                .protected_routes
                .get_key_value(key)
                .map(|(k, rule)| (k.as_str(), rule))
        })
    }

    /// Decide whether `user` may reach `route` of `module` on `site`
    ///
    /// Unknown modules are denied with a login redirect. Routes with no
    /// matching entry are allowed.
    #[tracing::instrument(
        level = "debug",
        skip(self, user, ctx),
        fields(user = user.map(|u| u.id.as_str()))
    )]
    pub async fn evaluate_access(
        &self,
        module: &str,
        route: &str,
        user: Option<&User>,
        site: &str,
        ctx: &AccessContext,
    ) -> AccessDecision {
        let Some(config) = self.registry.module(site, module) else {
            tracing::debug!("module not registered, denying");
            return AccessDecision::deny(self.auth_route(site, module, AuthRouteKind::Login));
        };

        let Some((key, rule)) = Self::find_route_config(config, route) else {
            return AccessDecision::allow();
        };

        if !rule.allow {
            tracing::debug!(key, "route rule denies access");
            return AccessDecision::deny(self.rule_redirect(rule, site, module));
        }

        let mut grants = UserGrants::new(self, user, site);
        for policy in &rule.policies {
            if let Err(failed) = self.check_policy(policy, user, site, ctx, &mut grants).await {
                tracing::debug!(key, failed_policy = %failed, "policy failed");
                return AccessDecision::deny(self.rule_redirect(rule, site, module))
                    .with_failed_policy(failed);
            }
        }

        AccessDecision::allow()
    }

    fn auth_route(&self, site: &str, module: &str, kind: AuthRouteKind) -> String {
        self.auth.redirect_route(site, Some(module), kind, self.precedence)
    }

    /// Rule's own redirect, else the module's login route
    fn rule_redirect(&self, rule: &RouteRule, site: &str, module: &str) -> String {
        match &rule.redirect_to {
            Some(target) => {
                RouteResolver::new(self.registry).resolve_in_module(target, site, module)
            }
            None => self.auth_route(site, module, AuthRouteKind::Login),
        }
    }

    async fn check_policy(
        &self,
        policy: &PolicyRule,
        user: Option<&User>,
        site: &str,
        ctx: &AccessContext,
        grants: &mut UserGrants<'_, 'a>,
    ) -> Result<(), String> {
        if !policy.has_conditions() {
            return if policy.allow {
                Ok(())
            } else {
                Err("deny".to_string())
            };
        }

        let roles_need_user =
            !policy.roles.is_empty() && !policy.roles.iter().any(|r| r == ROLE_ANYONE);

        let Some(user) = user else {
            return if roles_need_user {
                Err(policy.describe_roles())
            } else if !policy.permissions.is_empty() {
                Err(policy.describe_permissions())
            } else if policy.match_callback.is_some() {
                Err("custom callback".to_string())
            } else {
                Ok(())
            };
        };

        if !policy.roles.is_empty() && !self.roles_match(policy, grants).await {
            return Err(policy.describe_roles());
        }

        if !policy.permissions.is_empty() {
            let held = grants.permissions().await;
            let granted =
                held.is_some_and(|held| policy.permissions.iter().any(|p| held.contains(p)));
            if !granted {
                return Err(policy.describe_permissions());
            }
        }

        if let Some(callback) = &policy.match_callback {
            if !run_callback(callback, user, site, ctx) {
                return Err("custom callback".to_string());
            }
        }

        Ok(())
    }

    async fn roles_match(&self, policy: &PolicyRule, grants: &mut UserGrants<'_, 'a>) -> bool {
        if policy
            .roles
            .iter()
            .any(|r| r == ROLE_ANYONE || r == ROLE_AUTHENTICATED)
        {
            return true;
        }
        match grants.roles().await {
            Some(held) => policy.roles.iter().any(|r| held.contains(r)),
            None => false,
        }
    }

    async fn lookup<F>(&self, operation: &str, fut: F) -> Result<Vec<Grant>, LookupError>
    where
        F: Future<Output = Result<Vec<Grant>, LookupError>>,
    {
        match self.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| {
                    Err(LookupError::Timeout {
                        operation: operation.to_string(),
                    })
                }),
            None => fut.await,
        }
    }
}

fn run_callback(callback: &MatchCallback, user: &User, site: &str, ctx: &AccessContext) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(user, site, ctx))) {
        Ok(Ok(allowed)) => allowed,
        Ok(Err(err)) => {
            tracing::warn!(site, user = %user.id, error = %err, "policy predicate failed, denying");
            false
        }
        Err(_) => {
            tracing::warn!(site, user = %user.id, "policy predicate panicked, denying");
            false
        }
    }
}

/// Roles and permissions of the current user, fetched at most once each
struct UserGrants<'e, 'a> {
    evaluator: &'e PolicyEvaluator<'a>,
    user_id: Option<&'e str>,
    site: &'e str,
    roles: Option<Option<HashSet<String>>>,
    permissions: Option<Option<HashSet<String>>>,
}

impl<'e, 'a> UserGrants<'e, 'a> {
    fn new(evaluator: &'e PolicyEvaluator<'a>, user: Option<&'e User>, site: &'e str) -> Self {
        Self {
            evaluator,
            user_id: user.map(|u| u.id.as_str()),
            site,
            roles: None,
            permissions: None,
        }
    }

    async fn roles(&mut self) -> Option<&HashSet<String>> {
        if self.roles.is_none() {
            let fetched = match self.user_id {
                Some(id) => {
                    let fut = self.evaluator.identity.fetch_roles(id, self.site);
                    self.evaluator.lookup("fetch_roles", fut).await
                }
                None => Ok(Vec::new()),
            };
            self.roles = Some(into_names(fetched, self.site));
        }
        self.roles.as_ref().and_then(Option::as_ref)
    }

    async fn permissions(&mut self) -> Option<&HashSet<String>> {
        if self.permissions.is_none() {
            let fetched = match self.user_id {
                Some(id) => {
                    let fut = self.evaluator.identity.fetch_permissions(id, self.site);
                    self.evaluator.lookup("fetch_permissions", fut).await
                }
                None => Ok(Vec::new()),
            };
            self.permissions = Some(into_names(fetched, self.site));
        }
        self.permissions.as_ref().and_then(Option::as_ref)
    }
}

fn into_names(fetched: Result<Vec<Grant>, LookupError>, site: &str) -> Option<HashSet<String>> {
    match fetched {
        Ok(grants) => Some(grants.into_iter().map(|g| g.name).collect()),
        Err(err) => {
            tracing::warn!(site, error = %err, "identity lookup failed, treating as no grants");
            None
        }
    }
}
