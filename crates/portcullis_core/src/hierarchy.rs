//! Per-site module forest.
//!
//! Nodes are stored flat by name and link to each other by name, so a
//! parent can be registered after its children and stub nodes can be
//! filled in later.

use crate::auth::AuthRoutes;
use crate::error::{CoreError, CoreResult};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A module in a site's hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    /// Module name, unique per site
    pub name: String,
    /// Auth route overrides declared by this module
    pub auth: AuthRoutes,
    /// Path segment used for this module, defaults to the name
    pub route_prefix: Option<String>,
    /// Parent module name
    pub parent: Option<String>,
    /// Child module names, in link order
    pub children: IndexSet<String>,
}

impl ModuleNode {
    /// Create a stub node with no overrides
    #[must_use]
    pub fn stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Path segment for this node
    #[must_use]
    pub fn segment(&self) -> &str {
        self.route_prefix.as_deref().unwrap_or(&self.name)
    }

    /// Whether a path segment addresses this node by prefix or name
    #[must_use]
    pub fn matches_segment(&self, segment: &str) -> bool {
        self.route_prefix.as_deref() == Some(segment) || self.name == segment
    }
}

/// The module forest of one site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteHierarchy {
    nodes: IndexMap<String, ModuleNode>,
}

impl SiteHierarchy {
    /// Create an empty hierarchy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and link it under its parent
    ///
    /// Missing nodes for both `module` and `parent` are created as stubs.
    /// Overrides and route prefix on `module` are replaced (last write wins).
    pub fn register(
        &mut self,
        module: &str,
        auth: AuthRoutes,
        route_prefix: Option<String>,
        parent: Option<&str>,
    ) {
        let parent = match parent {
            Some(p) if p == module => {
                tracing::warn!(module, "module cannot be its own parent, ignoring link");
                None
            }
            Some(p) if p.is_empty() => None,
            other => other,
        };

        let previous_parent = {
            let node = self.ensure(module);
            node.auth = auth;
            node.route_prefix = route_prefix;
            match parent {
                Some(p) => node.parent.replace(p.to_string()),
                None => None,
            }
        };

        if let Some(parent) = parent {
            if let Some(old) = previous_parent.filter(|old| old != parent) {
                if let Some(old_node) = self.nodes.get_mut(&old) {
                    old_node.children.shift_remove(module);
                }
            }
            self.ensure(parent).children.insert(module.to_string());
        }
    }

    fn ensure(&mut self, name: &str) -> &mut ModuleNode {
        self.nodes
            .entry(name.to_string())
            .or_insert_with(|| ModuleNode::stub(name))
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&ModuleNode> {
        self.nodes.get(name)
    }

    /// Whether `parent` has a registered child called `child`
    #[must_use]
    pub fn has_child(&self, parent: &str, child: &str) -> bool {
        self.nodes
            .get(parent)
            .is_some_and(|node| node.children.contains(child))
    }

    /// Nodes without a parent, in registration order
    pub fn roots(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values().filter(|node| node.parent.is_none())
    }

    /// All nodes, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the hierarchy has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Chain of nodes from the root down to `module`
    ///
    /// Unknown modules yield an empty chain. A parent cycle is logged and
    /// the chain is cut where the cycle closes.
    #[must_use]
    pub fn chain(&self, module: &str) -> Vec<&ModuleNode> {
        match self.walk_to_root(module) {
            Ok(chain) => chain,
            Err((chain, _)) => {
                tracing::warn!(module, "parent cycle detected while building module chain");
                chain
            }
        }
    }

    /// Chain of nodes from the root down to `module`, failing on cycles
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CycleDetected` if the parent pointers loop
    pub fn try_chain(&self, module: &str) -> CoreResult<Vec<&ModuleNode>> {
        self.walk_to_root(module).map_err(|(_, name)| CoreError::CycleDetected {
            site: String::new(),
            module: name,
        })
    }

    fn walk_to_root(&self, module: &str) -> Result<Vec<&ModuleNode>, (Vec<&ModuleNode>, String)> {
        let mut chain = Vec::new();
        let mut seen = IndexSet::new();
        let mut current = self.nodes.get(module);

        while let Some(node) = current {
            if !seen.insert(node.name.as_str()) {
                chain.reverse();
                return Err((chain, node.name.clone()));
            }
            chain.push(node);
            current = node.parent.as_deref().and_then(|p| self.nodes.get(p));
        }

        chain.reverse();
        Ok(chain)
    }

    /// Greedily match path segments against the tree
    ///
    /// The first segment is matched against root modules, each following
    /// one against the children of the previous match. Stops at the first
    /// segment that matches nothing.
    #[must_use]
    pub fn resolve_chain(&self, segments: &[&str]) -> Vec<String> {
        let mut matched = Vec::new();
        let mut current: Option<&ModuleNode> = None;

        for segment in segments {
            let next = match current {
                None => self.roots().find(|node| node.matches_segment(segment)),
                Some(parent) => parent
                    .children
                    .iter()
                    .filter_map(|name| self.nodes.get(name))
                    .find(|node| node.matches_segment(segment)),
            };

            match next {
                Some(node) => {
                    matched.push(node.name.clone());
                    current = Some(node);
                }
                None => break,
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthRouteKind;

    fn sample() -> SiteHierarchy {
        let mut tree = SiteHierarchy::new();
        tree.register("admin", AuthRoutes::new(), None, None);
        tree.register("auth", AuthRoutes::new(), Some("auth".to_string()), Some("admin"));
        tree.register(
            "reports",
            AuthRoutes::new().with(AuthRouteKind::Home, "overview"),
            Some("rpt".to_string()),
            Some("admin"),
        );
        tree
    }

    #[test]
    fn test_register_creates_parent_stub() {
        let mut tree = SiteHierarchy::new();
        tree.register("child", AuthRoutes::new(), None, Some("parent"));

        let parent = tree.node("parent").unwrap();
        assert!(parent.parent.is_none());
        assert!(parent.children.contains("child"));
        assert_eq!(tree.node("child").unwrap().parent.as_deref(), Some("parent"));
    }

    #[test]
    fn test_register_link_is_idempotent() {
        let mut tree = sample();
        tree.register("auth", AuthRoutes::new(), None, Some("admin"));
        tree.register("auth", AuthRoutes::new(), None, Some("admin"));
        assert_eq!(tree.node("admin").unwrap().children.len(), 2);
    }

    #[test]
    fn test_register_overwrites_prefix() {
        let mut tree = sample();
        tree.register("reports", AuthRoutes::new(), None, Some("admin"));
        let node = tree.node("reports").unwrap();
        assert_eq!(node.segment(), "reports");
        assert!(node.auth.is_empty());
    }

    #[test]
    fn test_reparent_unlinks_old_parent() {
        let mut tree = sample();
        tree.register("reports", AuthRoutes::new(), None, Some("sales"));
        assert!(!tree.has_child("admin", "reports"));
        assert!(tree.has_child("sales", "reports"));
    }

    #[test]
    fn test_self_parent_ignored() {
        let mut tree = SiteHierarchy::new();
        tree.register("loop", AuthRoutes::new(), None, Some("loop"));
        assert!(tree.node("loop").unwrap().parent.is_none());
    }

    #[test]
    fn test_chain_root_to_leaf() {
        let tree = sample();
        let names: Vec<_> = tree.chain("reports").iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "reports"]);
        assert!(tree.chain("missing").is_empty());
    }

    #[test]
    fn test_chain_cycle_is_cut() {
        let mut tree = SiteHierarchy::new();
        tree.register("a", AuthRoutes::new(), None, Some("b"));
        tree.register("b", AuthRoutes::new(), None, Some("a"));

        let names: Vec<_> = tree.chain("a").iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(matches!(tree.try_chain("a"), Err(CoreError::CycleDetected { .. })));
    }

    #[test]
    fn test_resolve_chain_by_prefix_and_name() {
        let tree = sample();
        assert_eq!(tree.resolve_chain(&["admin", "rpt", "monthly"]), vec!["admin", "reports"]);
        assert_eq!(tree.resolve_chain(&["admin", "reports"]), vec!["admin", "reports"]);
        assert_eq!(tree.resolve_chain(&["admin", "auth", "login"]), vec!["admin", "auth"]);
    }

    #[test]
    fn test_resolve_chain_stops_at_first_mismatch() {
        let tree = sample();
        assert!(tree.resolve_chain(&["rpt"]).is_empty());
        assert_eq!(tree.resolve_chain(&["admin", "nope", "rpt"]), vec!["admin"]);
    }
}
