//! Environment-variable bootstrap, read once at process start.
//!
//! Mirrors the spec's literal variable names rather than renaming them to
//! a Rust-ier convention, since they are part of the deployment contract.

use tracing::warn;

/// Runtime configuration read from the process environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `FLASK_DEBUG` — enables permissive CORS and verbose error bodies.
    pub debug: bool,
    /// `PORT` — TCP port to bind.
    pub port: u16,
    /// `PHISHGUARD_ADMIN_KEY` — required header value for `/api/governance/unfreeze`.
    pub admin_key: Option<String>,
    /// `RATELIMIT_STORAGE_URI` — passed through for operational tooling;
    /// rate limiting itself is not implemented by this crate.
    pub ratelimit_storage_uri: Option<String>,
    /// `ALLOW_TRUSTED_DOMAIN_RECLASSIFICATION` — test-only escape hatch.
    /// Every read of this flag is audited; see [`ServerConfig::allow_trusted_domain_reclassification`].
    allow_trusted_domain_reclassification: bool,
}

const DEFAULT_PORT: u16 = 5000;

impl ServerConfig {
    /// Read configuration from the process environment, applying defaults
    /// for anything unset. Never fails: an unparsable value is logged and
    /// the default is used instead.
    #[must_use]
    pub fn from_env() -> Self {
        let debug = parse_bool_env("FLASK_DEBUG").unwrap_or(false);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let admin_key = std::env::var("PHISHGUARD_ADMIN_KEY").ok().filter(|v| !v.is_empty());
        let ratelimit_storage_uri = std::env::var("RATELIMIT_STORAGE_URI").ok();
        let allow_trusted_domain_reclassification =
            parse_bool_env("ALLOW_TRUSTED_DOMAIN_RECLASSIFICATION").unwrap_or(false);

        if admin_key.is_none() {
            warn!("PHISHGUARD_ADMIN_KEY is unset; /api/governance/unfreeze will refuse all requests");
        }

        Self {
            debug,
            port,
            admin_key,
            ratelimit_storage_uri,
            allow_trusted_domain_reclassification,
        }
    }

    /// Read the reclassification override flag. Every call is audited at
    /// `info` level per the environment-variable contract — this flag is
    /// test-only and every read of it is meant to be noisy.
    pub fn allow_trusted_domain_reclassification(&self) -> bool {
        if self.allow_trusted_domain_reclassification {
            tracing::info!("ALLOW_TRUSTED_DOMAIN_RECLASSIFICATION read as true");
        }
        self.allow_trusted_domain_reclassification
    }
}

fn parse_bool_env(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!(name, value = other, "unrecognised boolean environment value, defaulting to false");
            None
        }
    }
}
