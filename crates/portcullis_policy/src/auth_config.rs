//! Auth route resolution.
//!
//! Each of the five auth keys is resolved independently by walking an
//! ordered list of sources and taking the first one that declares the key.
//! The chosen specifier is then made canonical for the module.

use crate::registry::Registry;
use crate::routes::RouteResolver;
use portcullis_core::{AuthRouteKind, AuthRoutes, ResolvedAuthRoutes};
use std::collections::HashMap;
use std::sync::RwLock;

/// Where an auth route value can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthSource {
    /// The site's defaults
    Site,
    /// The nearest module in the hierarchy chain that declares the key
    Hierarchy,
    /// The module's flat config
    Flat,
    /// Built-in default
    Computed,
}

/// Ordered list of sources, first match wins
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Precedence(Vec<AuthSource>);

impl Precedence {
    /// Custom order
    #[must_use]
    pub fn new(sources: impl IntoIterator<Item = AuthSource>) -> Self {
        Self(sources.into_iter().collect())
    }

    /// Site, then hierarchy, then flat config, then built-in default
    #[must_use]
    pub fn unified() -> Self {
        Self::new([
            AuthSource::Site,
            AuthSource::Hierarchy,
            AuthSource::Flat,
            AuthSource::Computed,
        ])
    }

    /// Site, then flat config, then built-in default
    #[must_use]
    pub fn flat_fallback() -> Self {
        Self::new([AuthSource::Site, AuthSource::Flat, AuthSource::Computed])
    }

    /// Most specific hierarchy override, then site
    #[must_use]
    pub fn chain_merge() -> Self {
        Self::new([AuthSource::Hierarchy, AuthSource::Site])
    }

    /// Sources in order
    #[must_use]
    pub fn sources(&self) -> &[AuthSource] {
        &self.0
    }
}

impl Default for Precedence {
    fn default() -> Self {
        Self::unified()
    }
}

type CacheKey = (String, Option<String>, Precedence);

/// Memo of resolved auth routes
///
/// Never invalidated on its own; call [`AuthCache::clear`] after changing
/// the registry.
#[derive(Debug, Default)]
pub struct AuthCache {
    entries: RwLock<HashMap<CacheKey, ResolvedAuthRoutes>>,
}

impl AuthCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &CacheKey) -> Option<ResolvedAuthRoutes> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn insert(&self, key: CacheKey, value: ResolvedAuthRoutes) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, value);
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves auth routes for a site and module
#[derive(Debug, Clone, Copy)]
pub struct AuthConfigResolver<'a> {
    registry: &'a Registry,
    routes: RouteResolver<'a>,
    cache: Option<&'a AuthCache>,
}

impl<'a> AuthConfigResolver<'a> {
    /// Create a resolver without caching
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            routes: RouteResolver::new(registry),
            cache: None,
        }
    }

    /// Memoize resolved routes in `cache`
    #[must_use]
    pub fn with_cache(mut self, cache: &'a AuthCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Site defaults overlaid with the module's hierarchy chain, root to leaf
    ///
    /// Values are returned as declared, not canonical.
    #[must_use]
    pub fn effective_auth_config(&self, site: &str, module: Option<&str>) -> AuthRoutes {
        self.raw_routes(site, module, &Precedence::chain_merge())
    }

    /// Canonical routes using site, then flat module config, then defaults
    #[must_use]
    pub fn resolved_auth_config(&self, site: &str, module: &str) -> ResolvedAuthRoutes {
        self.resolve(site, Some(module), &Precedence::flat_fallback())
    }

    /// Canonical path for one auth key
    #[must_use]
    pub fn redirect_route(
        &self,
        site: &str,
        module: Option<&str>,
        kind: AuthRouteKind,
        precedence: &Precedence,
    ) -> String {
        self.resolve(site, module, precedence).get(kind).to_string()
    }

    /// Declared value of every key under the given precedence
    #[must_use]
    pub fn raw_routes(
        &self,
        site: &str,
        module: Option<&str>,
        precedence: &Precedence,
    ) -> AuthRoutes {
        let mut routes = AuthRoutes::new();
        for kind in AuthRouteKind::ALL {
            if let Some(route) = self.pick(site, module, kind, precedence) {
                routes.set(kind, route);
            }
        }
        routes
    }

    /// Canonical value of every key under the given precedence
    ///
    /// A key no source declares falls back to the built-in default even
    /// when `precedence` omits [`AuthSource::Computed`].
    #[must_use]
    pub fn resolve(
        &self,
        site: &str,
        module: Option<&str>,
        precedence: &Precedence,
    ) -> ResolvedAuthRoutes {
        let key = (
            site.to_string(),
            module.map(str::to_string),
            precedence.clone(),
        );
        if let Some(hit) = self.cache.and_then(|cache| cache.get(&key)) {
            return hit;
        }

        let resolved = ResolvedAuthRoutes::from_fn(|kind| {
            let declared = self
                .pick(site, module, kind, precedence)
                .unwrap_or_else(|| self.computed_default(site, module, kind));
            self.routes.resolve(&declared, site, module)
        });

        if let Some(cache) = self.cache {
            cache.insert(key, resolved.clone());
        }
        resolved
    }

    fn pick(
        &self,
        site: &str,
        module: Option<&str>,
        kind: AuthRouteKind,
        precedence: &Precedence,
    ) -> Option<String> {
        precedence
            .sources()
            .iter()
            .find_map(|source| self.from_source(*source, site, module, kind))
    }

    fn from_source(
        &self,
        source: AuthSource,
        site: &str,
        module: Option<&str>,
        kind: AuthRouteKind,
    ) -> Option<String> {
        match source {
            AuthSource::Site => self
                .registry
                .site_auth(site)
                .and_then(|auth| auth.get(kind))
                .map(str::to_string),
            AuthSource::Hierarchy => {
                let module = module?;
                self.registry
                    .build_module_chain(site, module)
                    .iter()
                    .rev()
                    .find_map(|node| node.auth.get(kind))
                    .map(str::to_string)
            }
            AuthSource::Flat => self
                .registry
                .module(site, module?)
                .and_then(|config| config.auth.get(kind))
                .map(str::to_string),
            AuthSource::Computed => Some(self.computed_default(site, module, kind)),
        }
    }

    fn computed_default(&self, site: &str, module: Option<&str>, kind: AuthRouteKind) -> String {
        match kind {
            AuthRouteKind::Home | AuthRouteKind::Default => match module {
                Some(module) => format!(
                    "/{}/dashboard",
                    self.registry.module_path_segment(site, module)
                ),
                None => "/dashboard".to_string(),
            },
            AuthRouteKind::Login => "/auth/login".to_string(),
            AuthRouteKind::Register => "/auth/register".to_string(),
            AuthRouteKind::Unauthorized => "/auth/unauthorized".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ModuleConfig;

    fn acme() -> Registry {
        let mut registry = Registry::new();
        registry.register_site_auth_config(
            "acme",
            AuthRoutes::new()
                .with(AuthRouteKind::Home, "/dashboard")
                .with(AuthRouteKind::Login, "/auth/login"),
        );
        registry.register_module("acme", ModuleConfig::new("sales"));
        registry.register_module(
            "acme",
            ModuleConfig::new("billing")
                .with_route_prefix("bill")
                .with_auth(
                    AuthRoutes::new()
                        .with(AuthRouteKind::Home, "overview")
                        .with(AuthRouteKind::Unauthorized, "/denied"),
                ),
        );
        registry.register_module_hierarchy(
            "acme",
            "admin",
            AuthRoutes::new().with(AuthRouteKind::Register, "/admin/signup"),
            None,
            None,
        );
        registry.register_module_hierarchy(
            "acme",
            "users",
            AuthRoutes::new().with(AuthRouteKind::Home, "list"),
            None,
            Some("admin"),
        );
        registry.register_module_hierarchy(
            "acme",
            "auth",
            AuthRoutes::new(),
            Some("auth".to_string()),
            Some("admin"),
        );
        registry
    }

    fn zoomy() -> Registry {
        let mut registry = Registry::new();
        registry.register_module("zoomy", ModuleConfig::new("shop").with_route_prefix("store"));
        registry.register_module_hierarchy(
            "zoomy",
            "shop",
            AuthRoutes::new().with(AuthRouteKind::Login, "signin"),
            None,
            None,
        );
        registry
    }

    #[test]
    fn test_site_home_canonical_for_module_without_override() {
        let registry = acme();
        let resolver = AuthConfigResolver::new(&registry);
        let resolved = resolver.resolved_auth_config("acme", "sales");
        assert_eq!(resolved.home_route, "/acme/dashboard");
        assert_eq!(resolved.login_route, "/acme/auth/login");
        assert_eq!(resolved.register_route, "/acme/auth/register");
        assert_eq!(resolved.default_redirect, "/acme/sales/dashboard");
    }

    #[test]
    fn test_flat_override_used_when_site_silent() {
        let registry = acme();
        let resolver = AuthConfigResolver::new(&registry);
        let resolved = resolver.resolved_auth_config("acme", "billing");
        // site declares home, so the module override is shadowed
        assert_eq!(resolved.home_route, "/acme/dashboard");
        assert_eq!(resolved.unauthorized_route, "/acme/denied");
        assert_eq!(resolved.default_redirect, "/acme/bill/dashboard");
    }

    #[test]
    fn test_effective_config_most_specific_wins() {
        let registry = acme();
        let resolver = AuthConfigResolver::new(&registry);

        let users = resolver.effective_auth_config("acme", Some("users"));
        assert_eq!(users.get(AuthRouteKind::Home), Some("list"));
        assert_eq!(users.get(AuthRouteKind::Register), Some("/admin/signup"));
        assert_eq!(users.get(AuthRouteKind::Login), Some("/auth/login"));

        let site_only = resolver.effective_auth_config("acme", None);
        assert_eq!(site_only.get(AuthRouteKind::Home), Some("/dashboard"));
        assert!(!site_only.declares(AuthRouteKind::Register));
    }

    #[test]
    fn test_unified_consults_hierarchy_before_flat() {
        let registry = zoomy();
        let resolver = AuthConfigResolver::new(&registry);
        let unified = resolver.resolve("zoomy", Some("shop"), &Precedence::unified());
        assert_eq!(unified.login_route, "/zoomy/store/signin");
        let flat = resolver.resolved_auth_config("zoomy", "shop");
        assert_eq!(flat.login_route, "/zoomy/auth/login");
    }

    #[test]
    fn test_every_key_is_canonical() {
        for (registry, site) in [(acme(), "acme"), (zoomy(), "zoomy")] {
            let resolver = AuthConfigResolver::new(&registry);
            let modules: Vec<String> =
                registry.modules(site).map(|m| m.module_name.clone()).collect();
            for module in modules {
                let resolved = resolver.resolved_auth_config(site, &module);
                for (kind, path) in resolved.iter() {
                    assert!(
                        path.starts_with(&format!("/{}/", site)),
                        "{} of {} not canonical: {}",
                        kind,
                        module,
                        path
                    );
                }
            }
        }
    }

    #[test]
    fn test_cache_memoizes_and_clears() {
        let registry = acme();
        let cache = AuthCache::new();
        let resolver = AuthConfigResolver::new(&registry).with_cache(&cache);

        let first = resolver.resolve("acme", Some("sales"), &Precedence::unified());
        assert_eq!(cache.len(), 1);
        let second = resolver.resolve("acme", Some("sales"), &Precedence::unified());
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    // Reference implementations of the two historical resolution paths.
    // The unified resolver must reproduce them exactly.

    fn legacy_effective(registry: &Registry, site: &str, module: Option<&str>) -> AuthRoutes {
        let mut config = registry.site_auth(site).cloned().unwrap_or_default();
        if let Some(module) = module {
            for node in registry.build_module_chain(site, module) {
                config.merge_from(&node.auth);
            }
        }
        config
    }

    fn legacy_resolved(registry: &Registry, site: &str, module: &str) -> ResolvedAuthRoutes {
        let site_auth = registry.site_auth(site);
        let flat = registry.module(site, module).map(|config| &config.auth);
        let segment = registry.module_path_segment(site, module);
        let routes = RouteResolver::new(registry);

        let pick = |kind: AuthRouteKind, fallback: String| {
            let declared = site_auth
                .and_then(|auth| auth.get(kind))
                .or_else(|| flat.and_then(|auth| auth.get(kind)))
                .map(str::to_string)
                .unwrap_or(fallback);
            routes.resolve(&declared, site, Some(module))
        };

        ResolvedAuthRoutes {
            login_route: pick(AuthRouteKind::Login, "/auth/login".to_string()),
            register_route: pick(AuthRouteKind::Register, "/auth/register".to_string()),
            home_route: pick(AuthRouteKind::Home, format!("/{}/dashboard", segment)),
            unauthorized_route: pick(AuthRouteKind::Unauthorized, "/auth/unauthorized".to_string()),
            default_redirect: pick(AuthRouteKind::Default, format!("/{}/dashboard", segment)),
        }
    }

    fn fixture_modules(registry: &Registry, site: &str) -> Vec<String> {
        let mut names: Vec<String> =
            registry.modules(site).map(|m| m.module_name.clone()).collect();
        if let Some(tree) = registry.hierarchy(site) {
            names.extend(tree.iter().map(|node| node.name.clone()));
        }
        names.push("unregistered".to_string());
        names.sort();
        names.dedup();
        names
    }

    #[test]
    fn test_golden_master_effective() {
        for (registry, site) in [(acme(), "acme"), (zoomy(), "zoomy"), (Registry::new(), "empty")] {
            let resolver = AuthConfigResolver::new(&registry);
            assert_eq!(
                resolver.effective_auth_config(site, None),
                legacy_effective(&registry, site, None)
            );
            for module in fixture_modules(&registry, site) {
                assert_eq!(
                    resolver.effective_auth_config(site, Some(&module)),
                    legacy_effective(&registry, site, Some(&module)),
                    "effective config diverged for {}/{}",
                    site,
                    module
                );
            }
        }
    }

    #[test]
    fn test_golden_master_resolved() {
        for (registry, site) in [(acme(), "acme"), (zoomy(), "zoomy"), (Registry::new(), "empty")] {
            let resolver = AuthConfigResolver::new(&registry);
            for module in fixture_modules(&registry, site) {
                assert_eq!(
                    resolver.resolved_auth_config(site, &module),
                    legacy_resolved(&registry, site, &module),
                    "resolved config diverged for {}/{}",
                    site,
                    module
                );
            }
        }
    }
}
