//! Site and module registry.
//!
//! Populated once at bootstrap, then shared read-only. Registration is
//! idempotent: a later call for the same key overwrites the earlier one.
//! Calls with an empty site or module name are ignored.

use crate::rule::ModuleConfig;
use indexmap::IndexMap;
use portcullis_core::{AuthRoutes, ModuleNode, SiteHierarchy};

/// Everything registered for one site
#[derive(Debug, Clone, Default)]
pub struct SiteEntry {
    /// Site auth defaults
    pub auth: Option<AuthRoutes>,
    /// Module forest
    pub hierarchy: SiteHierarchy,
    /// Flat module configs, in registration order
    pub modules: IndexMap<String, ModuleConfig>,
}

/// Registry of sites, module hierarchies and module access tables
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sites: IndexMap<String, SiteEntry>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn site_mut(&mut self, site: &str) -> &mut SiteEntry {
        self.sites.entry(site.to_string()).or_default()
    }

    /// Set the auth defaults of a site, replacing any earlier ones
    pub fn register_site_auth_config(&mut self, site: &str, config: AuthRoutes) {
        if site.is_empty() {
            tracing::warn!("ignoring site auth config without a site name");
            return;
        }
        self.site_mut(site).auth = Some(config);
    }

    /// Place a module in the site's hierarchy
    pub fn register_module_hierarchy(
        &mut self,
        site: &str,
        module: &str,
        auth: AuthRoutes,
        route_prefix: Option<String>,
        parent: Option<&str>,
    ) {
        if site.is_empty() || module.is_empty() {
            tracing::warn!(site, module, "ignoring hierarchy registration with missing name");
            return;
        }
        self.site_mut(site)
            .hierarchy
            .register(module, auth, route_prefix, parent);
    }

    /// Register the flat access config of a module
    pub fn register_module(&mut self, site: &str, mut config: ModuleConfig) {
        if site.is_empty() || config.module_name.is_empty() {
            tracing::warn!(site, "ignoring module registration with missing name");
            return;
        }
        config.normalize_keys();
        self.site_mut(site)
            .modules
            .insert(config.module_name.clone(), config);
    }

    /// Registered site names
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    /// Everything registered for a site
    #[must_use]
    pub fn site(&self, site: &str) -> Option<&SiteEntry> {
        self.sites.get(site)
    }

    /// Auth defaults of a site
    #[must_use]
    pub fn site_auth(&self, site: &str) -> Option<&AuthRoutes> {
        self.sites.get(site).and_then(|entry| entry.auth.as_ref())
    }

    /// Module forest of a site
    #[must_use]
    pub fn hierarchy(&self, site: &str) -> Option<&SiteHierarchy> {
        self.sites.get(site).map(|entry| &entry.hierarchy)
    }

    /// Hierarchy node of a module
    #[must_use]
    pub fn node(&self, site: &str, module: &str) -> Option<&ModuleNode> {
        self.hierarchy(site).and_then(|tree| tree.node(module))
    }

    /// Flat config of a module
    #[must_use]
    pub fn module(&self, site: &str, module: &str) -> Option<&ModuleConfig> {
        self.sites.get(site).and_then(|entry| entry.modules.get(module))
    }

    /// Flat configs of a site, in registration order
    pub fn modules(&self, site: &str) -> impl Iterator<Item = &ModuleConfig> {
        self.sites
            .get(site)
            .into_iter()
            .flat_map(|entry| entry.modules.values())
    }

    /// Path segment that addresses a module
    ///
    /// The hierarchy node's prefix wins, then the flat config's prefix,
    /// then the module name itself.
    #[must_use]
    pub fn module_path_segment<'a>(&'a self, site: &str, module: &'a str) -> &'a str {
        self.node(site, module)
            .and_then(|node| node.route_prefix.as_deref())
            .or_else(|| {
                self.module(site, module)
                    .and_then(|config| config.route_prefix.as_deref())
            })
            .unwrap_or(module)
    }

    /// Module names matched by successive path segments
    #[must_use]
    pub fn resolve_module_chain_from_path(&self, site: &str, segments: &[&str]) -> Vec<String> {
        self.hierarchy(site)
            .map(|tree| tree.resolve_chain(segments))
            .unwrap_or_default()
    }

    /// Nodes from the root down to `module`
    #[must_use]
    pub fn build_module_chain(&self, site: &str, module: &str) -> Vec<&ModuleNode> {
        self.hierarchy(site)
            .map(|tree| tree.chain(module))
            .unwrap_or_default()
    }

    /// Whether a module has a registered child with the given name
    #[must_use]
    pub fn has_child(&self, site: &str, module: &str, child: &str) -> bool {
        self.hierarchy(site)
            .is_some_and(|tree| tree.has_child(module, child))
    }
}
