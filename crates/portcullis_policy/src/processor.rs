//! Policy processor: the engine's entry point.
//!
//! Owns the registry, the identity provider and the auth cache. Build it,
//! register every site and module, then share it (typically behind an
//! `Arc`) with the navigation layer. Registration takes `&mut self`, so a
//! shared processor cannot be modified while it is being read.

use crate::auth_config::{AuthCache, AuthConfigResolver, Precedence};
use crate::context::{AccessContext, User};
use crate::decision::AccessDecision;
use crate::evaluator::PolicyEvaluator;
use crate::identity::IdentityProvider;
use crate::post_login::PostLoginRedirectResolver;
use crate::registry::Registry;
use crate::routes::RouteResolver;
use crate::rule::ModuleConfig;
use portcullis_core::{AuthRouteKind, AuthRoutes, ModuleNode, ResolvedAuthRoutes};
use std::sync::Arc;
use std::time::Duration;

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Upper bound on each role or permission lookup
    pub lookup_timeout: Option<Duration>,
    /// Whether resolved auth routes are memoized
    pub cache_auth_configs: bool,
    /// Source order for login and other redirect routes
    pub precedence: Precedence,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: None,
            cache_auth_configs: true,
            precedence: Precedence::unified(),
        }
    }
}

/// Access-control and route-resolution engine
pub struct PolicyProcessor {
    registry: Registry,
    identity: Arc<dyn IdentityProvider>,
    config: ProcessorConfig,
    cache: AuthCache,
}

impl PolicyProcessor {
    /// Create a processor with default configuration
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_config(identity, ProcessorConfig::default())
    }

    /// Create a processor with explicit configuration
    #[must_use]
    pub fn with_config(identity: Arc<dyn IdentityProvider>, config: ProcessorConfig) -> Self {
        Self {
            registry: Registry::new(),
            identity,
            config,
            cache: AuthCache::new(),
        }
    }

    /// Read-only view of the registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Set a site's auth defaults
    pub fn register_site_auth_config(&mut self, site: &str, config: AuthRoutes) {
        self.registry.register_site_auth_config(site, config);
        self.cache.clear();
    }

    /// Place a module in a site's hierarchy
    pub fn register_module_hierarchy(
        &mut self,
        site: &str,
        module: &str,
        auth: AuthRoutes,
        route_prefix: Option<String>,
        parent: Option<&str>,
    ) {
        self.registry.register_module_hierarchy(site, module, auth, route_prefix, parent);
        self.cache.clear();
    }

    /// Register a module's flat access config
    pub fn register_module(&mut self, site: &str, config: ModuleConfig) {
        self.registry.register_module(site, config);
        self.cache.clear();
    }

    /// Register a module in both the hierarchy and the flat registry
    ///
    /// The hierarchy node takes the config's route prefix and auth overrides.
    pub fn register_module_tree(&mut self, site: &str, config: ModuleConfig, parent: Option<&str>) {
        self.registry.register_module_hierarchy(
            site,
            &config.module_name,
            config.auth.clone(),
            config.route_prefix.clone(),
            parent,
        );
        self.registry.register_module(site, config);
        self.cache.clear();
    }

    /// Drop memoized auth routes
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn auth_resolver(&self) -> AuthConfigResolver<'_> {
        let resolver = AuthConfigResolver::new(&self.registry);
        if self.config.cache_auth_configs {
            resolver.with_cache(&self.cache)
        } else {
            resolver
        }
    }

    /// Canonical path for a route specifier
    #[must_use]
    pub fn resolve_hierarchical_route(
        &self,
        route: &str,
        site: &str,
        current_module: Option<&str>,
    ) -> String {
        RouteResolver::new(&self.registry).resolve(route, site, current_module)
    }

    /// Path segment addressing a module
    #[must_use]
    pub fn module_path_segment<'a>(&'a self, site: &str, module: &'a str) -> &'a str {
        self.registry.module_path_segment(site, module)
    }

    /// Module names matched by path segments
    #[must_use]
    pub fn resolve_module_chain_from_path(&self, site: &str, segments: &[&str]) -> Vec<String> {
        self.registry.resolve_module_chain_from_path(site, segments)
    }

    /// Hierarchy nodes from the root to `module`
    #[must_use]
    pub fn build_module_chain(&self, site: &str, module: &str) -> Vec<&ModuleNode> {
        self.registry.build_module_chain(site, module)
    }

    /// Site defaults overlaid with the module chain, as declared
    #[must_use]
    pub fn effective_auth_config(&self, site: &str, module: Option<&str>) -> AuthRoutes {
        self.auth_resolver().effective_auth_config(site, module)
    }

    /// Canonical auth routes from site, flat module config, then defaults
    #[must_use]
    pub fn resolved_auth_config(&self, site: &str, module: &str) -> ResolvedAuthRoutes {
        self.auth_resolver().resolved_auth_config(site, module)
    }

    /// Canonical auth routes under the configured precedence
    #[must_use]
    pub fn auth_routes(&self, site: &str, module: Option<&str>) -> ResolvedAuthRoutes {
        self.auth_resolver().resolve(site, module, &self.config.precedence)
    }

    /// Canonical path for one auth key of a module
    #[must_use]
    pub fn redirect_route(&self, module: &str, kind: AuthRouteKind, site: &str) -> String {
        self.auth_resolver()
            .redirect_route(site, Some(module), kind, &self.config.precedence)
    }

    /// Decide whether `user` may reach `route` of `module`
    pub async fn evaluate_access(
        &self,
        module: &str,
        route: &str,
        user: Option<&User>,
        site: &str,
        ctx: &AccessContext,
    ) -> AccessDecision {
        PolicyEvaluator::new(
            &self.registry,
            self.auth_resolver(),
            self.identity.as_ref(),
            &self.config.precedence,
        )
        .with_lookup_timeout(self.config.lookup_timeout)
        .evaluate_access(module, route, user, site, ctx)
        .await
    }

    /// Landing page after login
    #[must_use]
    pub fn post_login_redirect(
        &self,
        site: &str,
        current_module: Option<&str>,
        relative_path: &str,
    ) -> String {
        PostLoginRedirectResolver::new(&self.registry, self.auth_resolver())
            .post_login_redirect(site, current_module, relative_path)
    }

    /// First home along a module chain, with site fallbacks
    #[must_use]
    pub fn resolve_post_login_home(&self, site: &str, chain: &[&str]) -> String {
        PostLoginRedirectResolver::new(&self.registry, self.auth_resolver())
            .resolve_post_login_home(site, chain)
    }
}
