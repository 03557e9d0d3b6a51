//! JSON bootstrap manifest.
//!
//! Describes sites, their auth defaults and their modules, and replays
//! them as registrations on a [`PolicyProcessor`]. Predicate callbacks
//! cannot be written in JSON and are attached in code after loading.
//!
//! ```json
//! {
//!   "sites": {
//!     "zoomy": {
//!       "auth": { "loginRoute": "/auth/login", "homeRoute": "/dashboard" },
//!       "modules": [
//!         {
//!           "name": "admin",
//!           "protectedRoutes": { "": { "policies": [{ "roles": ["admin"] }] } },
//!           "publicRoutes": ["auth/login"]
//!         },
//!         { "name": "auth", "parent": "admin", "routePrefix": "auth" }
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::processor::PolicyProcessor;
use crate::rule::{ModuleConfig, PolicyRule, RouteRule};
use indexmap::{IndexMap, IndexSet};
use portcullis_core::{AuthRoutes, CoreError, CoreResult, SiteHierarchy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest loading and validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// File could not be read
    #[error("cannot read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Document is not a valid manifest
    #[error("invalid manifest: {0}")]
    Parse(String),

    /// A module has an empty name
    #[error("site {site}: module with empty name")]
    EmptyName {
        /// Site name
        site: String,
    },

    /// Two modules share a name
    #[error("site {site}: module {module} declared twice")]
    DuplicateModule {
        /// Site name
        site: String,
        /// Module name
        module: String,
    },

    /// A parent reference names no declared module
    #[error("site {site}: module {module} has unknown parent {parent}")]
    UnknownParent {
        /// Site name
        site: String,
        /// Module name
        module: String,
        /// Missing parent
        parent: String,
    },

    /// Parent links form a loop
    #[error("site {site}: parent cycle through module {module}")]
    ParentCycle {
        /// Site name
        site: String,
        /// Module on the cycle
        module: String,
    },
}

impl From<ManifestError> for CoreError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Io { path, message } => Self::Io { path, message },
            ManifestError::Parse(message) => Self::ParseError { message },
            ManifestError::ParentCycle { site, module } => Self::CycleDetected { site, module },
            other => Self::Validation {
                field: "manifest".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// One policy of a protected route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyManifest {
    /// Outcome when the policy has no conditions
    #[serde(default = "default_true")]
    pub allow: bool,
    /// Any-of role names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Any-of permission names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

/// Rule of one protected route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleManifest {
    /// Whether the route may be reached at all
    #[serde(default = "default_true")]
    pub allow: bool,
    /// Redirect for denied users, relative to the module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    /// Policies, all of which must pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyManifest>,
}

/// One module of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    /// Module name, unique within the site
    pub name: String,
    /// Parent module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Path segment override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
    /// Auth route overrides
    #[serde(default, skip_serializing_if = "AuthRoutes::is_empty")]
    pub auth: AuthRoutes,
    /// Protected routes, in lookup order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub protected_routes: IndexMap<String, RuleManifest>,
    /// Routes reachable without checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_routes: Vec<String>,
}

/// One site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteManifest {
    /// Site auth defaults
    #[serde(default, skip_serializing_if = "AuthRoutes::is_empty")]
    pub auth: AuthRoutes,
    /// Modules, parents before children
    #[serde(default)]
    pub modules: Vec<ModuleManifest>,
}

/// Bootstrap document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Sites by name
    #[serde(default)]
    pub sites: IndexMap<String, SiteManifest>,
}

fn default_true() -> bool {
    true
}

impl PolicyManifest {
    fn to_rule(&self) -> PolicyRule {
        match (self.roles.is_empty(), self.permissions.is_empty()) {
            (true, true) if self.allow => PolicyRule::allow_all(),
            (true, true) => PolicyRule::deny_all(),
            (true, false) => PolicyRule::permissions(self.permissions.iter().cloned()),
            (false, _) => PolicyRule::roles(self.roles.iter().cloned())
                .and_permissions(self.permissions.iter().cloned()),
        }
    }
}

impl RuleManifest {
    fn to_rule(&self) -> RouteRule {
        let mut rule = if self.allow {
            RouteRule::allow()
        } else {
            RouteRule::deny()
        };
        rule.redirect_to = self.redirect_to.clone();
        rule.policies = self.policies.iter().map(PolicyManifest::to_rule).collect();
        rule
    }
}

impl ModuleManifest {
    /// Flat access config described by this entry
    #[must_use]
    pub fn to_config(&self) -> ModuleConfig {
        let mut config = ModuleConfig::new(self.name.clone()).with_auth(self.auth.clone());
        config.route_prefix = self.route_prefix.clone();
        for (route, rule) in &self.protected_routes {
            config = config.protect(route, rule.to_rule());
        }
        config.public_routes = self.public_routes.clone();
        config
    }
}

impl Manifest {
    /// Parse a manifest from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a valid manifest
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every structural problem in the manifest
    #[must_use]
    pub fn problems(&self) -> Vec<ManifestError> {
        let mut problems = Vec::new();
        for (site, entry) in &self.sites {
            let mut names: IndexSet<&str> = IndexSet::new();
            for module in &entry.modules {
                if module.name.is_empty() {
                    problems.push(ManifestError::EmptyName { site: site.clone() });
                } else if !names.insert(module.name.as_str()) {
                    problems.push(ManifestError::DuplicateModule {
                        site: site.clone(),
                        module: module.name.clone(),
                    });
                }
            }

            let mut tree = SiteHierarchy::new();
            for module in entry.modules.iter().filter(|m| !m.name.is_empty()) {
                let Some(parent) = module.parent.as_deref() else {
                    tree.register(&module.name, AuthRoutes::new(), None, None);
                    continue;
                };
                if parent == module.name {
                    problems.push(ManifestError::ParentCycle {
                        site: site.clone(),
                        module: module.name.clone(),
                    });
                    continue;
                }
                if !names.contains(parent) {
                    problems.push(ManifestError::UnknownParent {
                        site: site.clone(),
                        module: module.name.clone(),
                        parent: parent.to_string(),
                    });
                }
                tree.register(&module.name, AuthRoutes::new(), None, Some(parent));
            }

            let mut reported: IndexSet<String> = IndexSet::new();
            for module in &names {
                if let Err(CoreError::CycleDetected { module, .. }) = tree.try_chain(module) {
                    if reported.insert(module.clone()) {
                        problems.push(ManifestError::ParentCycle {
                            site: site.clone(),
                            module,
                        });
                    }
                }
            }
        }
        problems
    }

    /// Check module names and parent links
    ///
    /// # Errors
    ///
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ManifestError> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    /// Declared site
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the manifest does not declare `name`
    pub fn site(&self, name: &str) -> CoreResult<&SiteManifest> {
        self.sites.get(name).ok_or_else(|| CoreError::NotFound {
            kind: "site".to_string(),
            id: name.to_string(),
        })
    }

    /// Number of modules across all sites
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.sites.values().map(|site| site.modules.len()).sum()
    }

    /// Register everything in document order
    ///
    /// Each module is placed in its site's hierarchy and registered as a
    /// flat config.
    pub fn apply(&self, processor: &mut PolicyProcessor) {
        for (site, entry) in &self.sites {
            if !entry.auth.is_empty() {
                processor.register_site_auth_config(site, entry.auth.clone());
            }
            for module in &entry.modules {
                processor.register_module_tree(site, module.to_config(), module.parent.as_deref());
            }
            tracing::debug!(site = %site, modules = entry.modules.len(), "site registered");
        }
    }
}
