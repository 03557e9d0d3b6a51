//! Canonical route resolution.
//!
//! Canonical paths always start with `/{site}/`. Route strings are opaque:
//! no decoding, no slash collapsing, no query handling.

use crate::registry::Registry;
use portcullis_core::path::{first_segment, is_site_anchored, strip_leading_slash};

/// Turns route specifiers into canonical paths
#[derive(Debug, Clone, Copy)]
pub struct RouteResolver<'a> {
    registry: &'a Registry,
}

impl<'a> RouteResolver<'a> {
    /// Create a resolver over a registry
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resolve a route specifier in the context of a site and module
    ///
    /// - already under `/{site}/`: unchanged
    /// - `/x/...` where the current module has a child named `x`:
    ///   `/{site}/{module segment}/x/...`
    /// - any other `/...`: `/{site}/...`
    /// - relative with a module: `/{site}/{module segment}/{route}`
    /// - relative without a module: `/{site}/{route}`
    #[must_use]
    pub fn resolve(&self, route: &str, site: &str, current_module: Option<&str>) -> String {
        if is_site_anchored(route, site) {
            return route.to_string();
        }

        let current_module = current_module.filter(|m| !m.is_empty());

        if route.starts_with('/') {
            let target = first_segment(route);
            return match current_module {
                Some(module)
                    if module != target && self.registry.has_child(site, module, target) =>
                {
                    let segment = self.registry.module_path_segment(site, module);
                    format!("/{}/{}{}", site, segment, route)
                }
                _ => format!("/{}{}", site, route),
            };
        }

        match current_module {
            Some(module) => {
                let segment = self.registry.module_path_segment(site, module);
                format!("/{}/{}/{}", site, segment, route)
            }
            None => format!("/{}/{}", site, route),
        }
    }

    /// Resolve a route that always lives inside `module`
    ///
    /// Used for deny redirects declared on a module's protected routes:
    /// `/no-access` on module `x` of site `s` becomes `/s/x/no-access`.
    #[must_use]
    pub fn resolve_in_module(&self, route: &str, site: &str, module: &str) -> String {
        if is_site_anchored(route, site) {
            return route.to_string();
        }
        let segment = self.registry.module_path_segment(site, module);
        format!("/{}/{}/{}", site, segment, strip_leading_slash(route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ModuleConfig;
    use portcullis_core::AuthRoutes;
    use proptest::prelude::*;

    fn zoomy() -> Registry {
        let mut registry = Registry::new();
        registry.register_module_hierarchy("zoomy", "admin", AuthRoutes::new(), None, None);
        registry.register_module_hierarchy(
            "zoomy",
            "auth",
            AuthRoutes::new(),
            Some("auth".to_string()),
            Some("admin"),
        );
        registry.register_module("zoomy", ModuleConfig::new("sales").with_route_prefix("crm"));
        registry
    }

    #[test]
    fn test_nested_submodule_route() {
        let registry = zoomy();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(
            resolver.resolve("/auth/login", "zoomy", Some("admin")),
            "/zoomy/admin/auth/login"
        );
    }

    #[test]
    fn test_site_relative_absolute() {
        let registry = zoomy();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(resolver.resolve("/auth/login", "zoomy", None), "/zoomy/auth/login");
        assert_eq!(resolver.resolve("/auth/login", "zoomy", Some("sales")), "/zoomy/auth/login");
        assert_eq!(resolver.resolve("/admin/users", "zoomy", Some("admin")), "/zoomy/admin/users");
    }

    #[test]
    fn test_module_relative() {
        let registry = zoomy();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(resolver.resolve("reports", "zoomy", Some("sales")), "/zoomy/crm/reports");
        assert_eq!(resolver.resolve("reports", "zoomy", None), "/zoomy/reports");
        assert_eq!(resolver.resolve("reports", "zoomy", Some("")), "/zoomy/reports");
    }

    #[test]
    fn test_already_canonical_unchanged() {
        let registry = zoomy();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(
            resolver.resolve("/zoomy/admin/auth/login", "zoomy", Some("admin")),
            "/zoomy/admin/auth/login"
        );
    }

    #[test]
    fn test_resolve_in_module() {
        let registry = Registry::new();
        let resolver = RouteResolver::new(&registry);
        assert_eq!(resolver.resolve_in_module("/no-access", "s", "x"), "/s/x/no-access");
        assert_eq!(resolver.resolve_in_module("denied", "s", "x"), "/s/x/denied");
        assert_eq!(resolver.resolve_in_module("/s/other", "s", "x"), "/s/other");
    }

    proptest! {
        #[test]
        fn prop_resolve_is_idempotent(
            route in "/?[a-z]{1,6}(/[a-z]{1,6}){0,3}",
            module in proptest::option::of(prop_oneof![
                Just("admin".to_string()),
                Just("sales".to_string()),
                Just("auth".to_string()),
            ]),
        ) {
            let registry = zoomy();
            let resolver = RouteResolver::new(&registry);
            let once = resolver.resolve(&route, "zoomy", module.as_deref());
            let twice = resolver.resolve(&once, "zoomy", module.as_deref());
            prop_assert!(once.starts_with("/zoomy/"));
            prop_assert_eq!(once, twice);
        }
    }
}
