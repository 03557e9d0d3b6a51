//! Landing page after login.
//!
//! Login pages often live in an `auth` submodule embedded under the module
//! that owns the flow. The landing page is that owner's home, not the home
//! of `auth` itself.

use crate::auth_config::AuthConfigResolver;
use crate::registry::Registry;
use crate::routes::RouteResolver;
use crate::rule::ModuleConfig;
use portcullis_core::path::strip_leading_slash;
use portcullis_core::AuthRouteKind;
use std::cmp::Reverse;

/// Name of the auth module
pub const AUTH_MODULE: &str = "auth";

/// Picks the landing page after a successful login
#[derive(Debug, Clone, Copy)]
pub struct PostLoginRedirectResolver<'a> {
    registry: &'a Registry,
    auth: AuthConfigResolver<'a>,
    routes: RouteResolver<'a>,
}

impl<'a> PostLoginRedirectResolver<'a> {
    /// Create a resolver
    #[must_use]
    pub fn new(registry: &'a Registry, auth: AuthConfigResolver<'a>) -> Self {
        Self {
            registry,
            auth,
            routes: RouteResolver::new(registry),
        }
    }

    /// Landing page for a login that happened at `relative_path` of `current_module`
    #[must_use]
    pub fn post_login_redirect(
        &self,
        site: &str,
        current_module: Option<&str>,
        relative_path: &str,
    ) -> String {
        let current_module = current_module.filter(|m| !m.is_empty());

        let chain: Vec<&str> = match current_module {
            Some(module) if relative_path.starts_with("auth/") => vec![module, AUTH_MODULE],
            Some(AUTH_MODULE) => match self.auth_owner(site) {
                Some(owner) => vec![owner, AUTH_MODULE],
                None => vec![AUTH_MODULE],
            },
            Some(module) => vec![module],
            None => Vec::new(),
        };

        tracing::debug!(site, ?chain, "resolving post-login home");
        self.resolve_post_login_home(site, &chain)
    }

    /// First home route found along `chain`, with site-wide fallbacks
    ///
    /// The `auth` entry is skipped: its own home is rarely where a user
    /// should land.
    #[must_use]
    pub fn resolve_post_login_home(&self, site: &str, chain: &[&str]) -> String {
        let mut seen = Vec::with_capacity(chain.len());
        for &module in chain {
            if seen.contains(&module) {
                continue;
            }
            seen.push(module);
            if module == AUTH_MODULE {
                continue;
            }
            let effective = self.auth.effective_auth_config(site, Some(module));
            if let Some(home) = effective.get(AuthRouteKind::Home) {
                return self.routes.resolve(home, site, Some(module));
            }
        }

        if let Some(home) = self
            .registry
            .site_auth(site)
            .and_then(|auth| auth.get(AuthRouteKind::Home))
        {
            return self.routes.resolve(home, site, None);
        }

        if let Some((module, home)) = self.first_module_home(site) {
            return self.routes.resolve(home, site, Some(module));
        }

        format!("/{}/dashboard", site)
    }

    /// Module that most plausibly owns a standalone auth flow
    ///
    /// Candidates expose a public `auth/...` route. Among several, a declared
    /// home route and having protected routes each score a point; ties go to
    /// the larger protected table, then to the alphabetically first name.
    #[must_use]
    pub fn auth_owner(&self, site: &str) -> Option<&'a str> {
        let mut candidates: Vec<&'a ModuleConfig> = self
            .registry
            .modules(site)
            .filter(|config| config.module_name != AUTH_MODULE)
            .filter(|config| {
                config
                    .public_routes
                    .iter()
                    .any(|route| strip_leading_slash(route).starts_with("auth/"))
            })
            .collect();

        if candidates.len() > 1 {
            candidates.sort_by(|a, b| self.rank(site, a).cmp(&self.rank(site, b)));
            tracing::debug!(
                site,
                chosen = %candidates[0].module_name,
                candidates = candidates.len(),
                "several modules expose auth routes"
            );
        }

        candidates.first().map(|config| config.module_name.as_str())
    }

    fn rank<'c>(
        &self,
        site: &str,
        config: &'c ModuleConfig,
    ) -> (Reverse<u8>, Reverse<usize>, &'c str) {
        (
            Reverse(self.ownership_score(site, config)),
            Reverse(config.protected_routes.len()),
            config.module_name.as_str(),
        )
    }

    fn ownership_score(&self, site: &str, config: &ModuleConfig) -> u8 {
        let declares_home = config.auth.declares(AuthRouteKind::Home)
            || self
                .registry
                .node(site, &config.module_name)
                .is_some_and(|node| node.auth.declares(AuthRouteKind::Home));
        u8::from(declares_home) + u8::from(!config.protected_routes.is_empty())
    }

    fn first_module_home(&self, site: &str) -> Option<(&'a str, &'a str)> {
        let flat = self.registry.modules(site).find_map(|config| {
            config
                .auth
                .get(AuthRouteKind::Home)
                .map(|home| (config.module_name.as_str(), home))
        });
        flat.or_else(|| {
            self.registry.hierarchy(site)?.iter().find_map(|node| {
                node.auth
                    .get(AuthRouteKind::Home)
                    .map(|home| (node.name.as_str(), home))
            })
        })
    }
}
