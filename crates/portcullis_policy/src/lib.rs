//! PORTCULLIS Policy Engine
//!
//! Resolves relative route declarations into canonical site paths and
//! decides whether a user may reach a route. Sites and modules are
//! registered once at bootstrap; everything after that is read-only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth_config;
pub mod context;
pub mod decision;
pub mod evaluator;
pub mod identity;
pub mod manifest;
pub mod post_login;
pub mod processor;
pub mod registry;
pub mod routes;
pub mod rule;

pub use auth_config::{AuthCache, AuthConfigResolver, AuthSource, Precedence};
pub use context::{AccessContext, User};
pub use decision::AccessDecision;
pub use evaluator::PolicyEvaluator;
pub use identity::{Grant, IdentityProvider, LookupError, StaticIdentityProvider};
pub use manifest::{Manifest, ManifestError, ModuleManifest, SiteManifest};
pub use post_login::PostLoginRedirectResolver;
pub use processor::{PolicyProcessor, ProcessorConfig};
pub use registry::Registry;
pub use routes::RouteResolver;
pub use rule::{MatchCallback, ModuleConfig, PolicyRule, PredicateError, RouteRule};
