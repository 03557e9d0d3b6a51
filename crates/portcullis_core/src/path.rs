//! Route string helpers.
//!
//! Routes are treated as opaque slash-separated strings. Nothing here
//! decodes, normalizes duplicate slashes, or understands query strings.

/// Strip a single leading `/`
#[must_use]
pub fn strip_leading_slash(route: &str) -> &str {
    route.strip_prefix('/').unwrap_or(route)
}

/// First segment of a route, ignoring a leading `/`
#[must_use]
pub fn first_segment(route: &str) -> &str {
    let trimmed = strip_leading_slash(route);
    trimmed.split('/').next().unwrap_or(trimmed)
}

/// Whether a route is already anchored under `/{site}/`
#[must_use]
pub fn is_site_anchored(route: &str, site: &str) -> bool {
    route
        .strip_prefix('/')
        .and_then(|rest| rest.strip_prefix(site))
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Lookup keys for a route, most specific first
///
/// `"/a/b/c"` yields `"a/b/c"`, `"a/b"`, `"a"` and finally `""`.
pub fn ancestor_keys(route: &str) -> AncestorKeys<'_> {
    AncestorKeys {
        next: Some(strip_leading_slash(route)),
    }
}

/// Iterator returned by [`ancestor_keys`]
#[derive(Debug, Clone)]
pub struct AncestorKeys<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for AncestorKeys<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current.is_empty() {
            None
        } else {
            Some(current.rsplit_once('/').map_or("", |(parent, _)| parent))
        };
        Some(current)
    }
}
