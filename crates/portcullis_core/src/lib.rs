//! PORTCULLIS Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Sites own a forest of modules; every module can override the
//! site's auth routes and carry its own route prefix.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod hierarchy;
pub mod path;

// Re-exports
pub use auth::{AuthOverrides, AuthRouteKind, AuthRoutes, ResolvedAuthRoutes, SiteAuthConfig};
pub use error::{CoreError, CoreResult};
pub use hierarchy::{ModuleNode, SiteHierarchy};
