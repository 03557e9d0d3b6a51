//! PORTCULLIS CLI
//!
//! Loads a policy manifest and answers routing and access questions
//! against it, without a running application.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use portcullis_core::AuthRouteKind;
use portcullis_policy::{
    AccessContext, Manifest, PolicyProcessor, ProcessorConfig, StaticIdentityProvider, User,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portcullis")]
#[command(
    about = "PORTCULLIS - route resolution and access checks for multi-site apps",
    long_about = None
)]
struct Cli {
    /// Log resolution steps
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Path to the JSON manifest
    #[arg(short, long)]
    manifest: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a manifest
    Validate {
        #[command(flatten)]
        source: Source,
    },
    /// Evaluate access to a route
    Check {
        #[command(flatten)]
        source: Source,
        /// Site name
        #[arg(long)]
        site: String,
        /// Module name
        #[arg(long)]
        module: String,
        /// Route within the module
        #[arg(long)]
        route: String,
        /// User id, anonymous when absent
        #[arg(long)]
        user: Option<String>,
        /// Role held by the user (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
        /// Permission held by the user (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Identity lookup timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the canonical path of a route
    Resolve {
        #[command(flatten)]
        source: Source,
        /// Site name
        #[arg(long)]
        site: String,
        /// Current module
        #[arg(long)]
        module: Option<String>,
        /// Route specifier
        #[arg(long)]
        route: String,
    },
    /// Print an auth redirect route of a module
    Redirect {
        #[command(flatten)]
        source: Source,
        /// Site name
        #[arg(long)]
        site: String,
        /// Module name
        #[arg(long)]
        module: String,
        /// login, register, home, unauthorized or default
        #[arg(long)]
        kind: AuthRouteKind,
    },
    /// Print the landing page after login
    PostLogin {
        #[command(flatten)]
        source: Source,
        /// Site name
        #[arg(long)]
        site: String,
        /// Module the login happened in
        #[arg(long)]
        module: Option<String>,
        /// Path of the login page, relative to the module
        #[arg(long)]
        path: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "portcullis=debug" } else { "portcullis=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load and validate a manifest that declares `site`
fn load(source: &Source, site: &str) -> Result<Manifest> {
    let manifest = Manifest::load(&source.manifest)?;
    manifest.validate()?;
    manifest.site(site)?;
    Ok(manifest)
}

fn processor(
    manifest: &Manifest,
    identity: StaticIdentityProvider,
    config: ProcessorConfig,
) -> PolicyProcessor {
    let mut processor = PolicyProcessor::with_config(Arc::new(identity), config);
    manifest.apply(&mut processor);
    processor
}

fn offline(manifest: &Manifest) -> PolicyProcessor {
    processor(manifest, StaticIdentityProvider::new(), ProcessorConfig::default())
}

async fn run(command: Commands) -> Result<String> {
    match command {
        Commands::Validate { source } => {
            let manifest = Manifest::load(&source.manifest)?;
            let problems = manifest.problems();
            if !problems.is_empty() {
                for problem in &problems {
                    tracing::error!("{}", problem);
                }
                return Err(eyre!(
                    "{} has {} problem(s)",
                    source.manifest.display(),
                    problems.len()
                ));
            }
            Ok(format!(
                "ok: {} site(s), {} module(s)",
                manifest.sites.len(),
                manifest.module_count()
            ))
        }
        Commands::Check {
            source,
            site,
            module,
            route,
            user,
            roles,
            permissions,
            timeout_ms,
        } => {
            let manifest = load(&source, &site)?;
            let mut identity = StaticIdentityProvider::new();
            if let Some(user) = &user {
                for role in &roles {
                    identity = identity.with_role(&site, user, role);
                }
                for permission in &permissions {
                    identity = identity.with_permission(&site, user, permission);
                }
            } else if !roles.is_empty() || !permissions.is_empty() {
                tracing::warn!("--role and --permission are ignored without --user");
            }
            let config = ProcessorConfig {
                lookup_timeout: timeout_ms.map(Duration::from_millis),
                ..ProcessorConfig::default()
            };
            let processor = processor(&manifest, identity, config);
            let user = user.map(User::new);
            let decision = processor
                .evaluate_access(&module, &route, user.as_ref(), &site, &AccessContext::new())
                .await;
            Ok(serde_json::to_string_pretty(&decision)?)
        }
        Commands::Resolve {
            source,
            site,
            module,
            route,
        } => {
            let processor = offline(&load(&source, &site)?);
            Ok(processor.resolve_hierarchical_route(&route, &site, module.as_deref()))
        }
        Commands::Redirect {
            source,
            site,
            module,
            kind,
        } => {
            let processor = offline(&load(&source, &site)?);
            Ok(processor.redirect_route(&module, kind, &site))
        }
        Commands::PostLogin {
            source,
            site,
            module,
            path,
        } => {
            let processor = offline(&load(&source, &site)?);
            Ok(processor.post_login_redirect(&site, module.as_deref(), &path))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let output = run(cli.command).await?;
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "sites": {
            "zoomy": {
                "auth": { "loginRoute": "/auth/login", "homeRoute": "/dashboard" },
                "modules": [
                    {
                        "name": "admin",
                        "protectedRoutes": { "": { "policies": [{ "roles": ["admin"] }] } },
                        "publicRoutes": ["auth/login"]
                    },
                    { "name": "auth", "parent": "admin", "routePrefix": "auth" }
                ]
            }
        }
    }"#;

    fn manifest_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    async fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args)?;
        run(cli.command).await
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_validate() {
        let file = manifest_file(MANIFEST);
        let path = file.path().to_str().unwrap();
        let out = run_args(&["portcullis", "validate", "--manifest", path]).await.unwrap();
        assert_eq!(out, "ok: 1 site(s), 2 module(s)");

        let broken =
            manifest_file(r#"{"sites": {"s": {"modules": [{"name": "a", "parent": "b"}]}}}"#);
        let path = broken.path().to_str().unwrap();
        assert!(run_args(&["portcullis", "validate", "-m", path]).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_and_redirect() {
        let file = manifest_file(MANIFEST);
        let path = file.path().to_str().unwrap();
        let resolved = run_args(&[
            "portcullis", "resolve", "-m", path, "--site", "zoomy", "--module", "admin", "--route",
            "/auth/login",
        ])
        .await
        .unwrap();
        assert_eq!(resolved, "/zoomy/admin/auth/login");

        let redirect = run_args(&[
            "portcullis", "redirect", "-m", path, "--site", "zoomy", "--module", "admin", "--kind",
            "home",
        ])
        .await
        .unwrap();
        assert_eq!(redirect, "/zoomy/dashboard");
    }

    #[tokio::test]
    async fn test_check_with_roles() {
        let file = manifest_file(MANIFEST);
        let path = file.path().to_str().unwrap();
        let allowed = run_args(&[
            "portcullis", "check", "-m", path, "--site", "zoomy", "--module", "admin", "--route",
            "users", "--user", "root", "--role", "admin",
        ])
        .await
        .unwrap();
        let decision: serde_json::Value = serde_json::from_str(&allowed).unwrap();
        assert_eq!(decision["allow"], true);

        let denied = run_args(&[
            "portcullis", "check", "-m", path, "--site", "zoomy", "--module", "admin", "--route",
            "users",
        ])
        .await
        .unwrap();
        let decision: serde_json::Value = serde_json::from_str(&denied).unwrap();
        assert_eq!(decision["allow"], false);
        assert_eq!(decision["redirectTo"], "/zoomy/admin/auth/login");
        assert_eq!(decision["failedPolicy"], "roles: [admin]");
    }

    #[tokio::test]
    async fn test_post_login() {
        let file = manifest_file(MANIFEST);
        let path = file.path().to_str().unwrap();
        let out = run_args(&[
            "portcullis", "post-login", "-m", path, "--site", "zoomy", "--module", "auth", "--path",
            "login",
        ])
        .await
        .unwrap();
        assert_eq!(out, "/zoomy/dashboard");
    }

    #[tokio::test]
    async fn test_unknown_site_is_rejected() {
        let file = manifest_file(MANIFEST);
        let path = file.path().to_str().unwrap();
        let err = run_args(&[
            "portcullis", "resolve", "-m", path, "--site", "acme", "--route", "/dashboard",
        ])
        .await
        .unwrap_err();
        assert!(err.to_string().contains("site not found: acme"));
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        assert!(run_args(&["portcullis", "validate", "-m", "/nonexistent/manifest.json"])
            .await
            .is_err());
    }
}
