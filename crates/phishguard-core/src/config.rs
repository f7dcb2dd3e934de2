//! Policy configuration loader.
//!
//! Mirrors the teacher's builder-pattern config loader: a policy struct is
//! assembled from defaults, then overridden by a TOML or YAML file, then by
//! `PHISHGUARD_*` environment variables — each layer strictly widening over
//! the previous one, never silently discarding a caller-set field.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Errors raised while loading or validating a [`SecurityPolicy`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The policy file could not be read.
    #[error("failed to read policy file at {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The policy file's extension was not recognised.
    #[error("unrecognised policy file extension: {path}")]
    UnknownFormat {
        /// Path with the unrecognised extension.
        path: String,
    },

    /// TOML deserialisation failed.
    #[error("failed to parse TOML policy: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML deserialisation failed.
    #[error("failed to parse YAML policy: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The assembled policy failed validation.
    #[error("policy validation failed: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Thresholds and constants governing the Decision Pipeline (C6).
///
/// Field values are the spec-mandated constants; they are configurable only
/// so a manifest version bump can intentionally change them, per §4.6's
/// "thresholds are constants; forbids moving them without a manifest
/// version bump" rule — `manifest_version` must be bumped alongside any of
/// these fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelinePolicy {
    /// Manifest version gating threshold changes.
    pub manifest_version: String,
    /// `p >= phishing_threshold` maps to PHISHING.
    #[validate(range(min = 0.0, max = 1.0))]
    pub phishing_threshold: f64,
    /// `p >= suspicious_threshold` (and below phishing) maps to SUSPICIOUS.
    #[validate(range(min = 0.0, max = 1.0))]
    pub suspicious_threshold: f64,
    /// Confidence penalty added per failed HTTP signal.
    pub http_failure_penalty: f64,
    /// Confidence penalty added per failed WHOIS signal.
    pub whois_failure_penalty: f64,
    /// Confidence penalty added per failed DNS signal.
    pub dns_failure_penalty: f64,
    /// Risk score assigned to trusted-domain fast-path results.
    pub trusted_risk_score: f64,
    /// Risk score for a high-confidence blocklist match.
    pub blocklist_high_confidence_risk: f64,
    /// Risk score for a lower-confidence blocklist match.
    pub blocklist_low_confidence_risk: f64,
    /// Confidence threshold separating the two blocklist risk scores.
    pub blocklist_confidence_cutoff: f64,
    /// Risk score assigned when feature extraction fails `InvalidURL`.
    pub invalid_url_risk_score: f64,
    /// Analysis cache TTL, in seconds.
    pub cache_ttl_secs: u64,
    /// Analysis cache maximum entry count.
    pub cache_capacity: usize,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            manifest_version: "1".to_string(),
            phishing_threshold: 0.85,
            suspicious_threshold: 0.55,
            http_failure_penalty: 0.075,
            whois_failure_penalty: 0.045,
            dns_failure_penalty: 0.030,
            trusted_risk_score: 15.0,
            blocklist_high_confidence_risk: 95.0,
            blocklist_low_confidence_risk: 85.0,
            blocklist_confidence_cutoff: 0.9,
            invalid_url_risk_score: 50.0,
            cache_ttl_secs: 3600,
            cache_capacity: 10_000,
        }
    }
}

/// Governance-specific thresholds and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GovernancePolicy {
    /// Maximum overrides per rolling 24h window before a freeze triggers.
    pub overrides_per_window: u64,
    /// Length of the override-rate window, in hours.
    pub override_window_hours: i64,
    /// Maximum canary failures per window before a freeze triggers.
    pub canary_failure_limit: u64,
    /// Minimum justification length required to resume from freeze.
    pub resume_justification_min_len: usize,
    /// File lock acquisition timeout, in seconds.
    pub lock_timeout_secs: u64,
    /// File lock acquisition retry ceiling.
    pub lock_retry_ceiling: u32,
    /// Read-mostly cached-view TTL for governance state, in seconds.
    pub read_cache_ttl_secs: u64,
    /// Promotion eligibility: minimum canary test runs.
    pub promotion_min_test_runs: u64,
    /// Promotion eligibility: minimum cumulative sample size.
    pub promotion_min_sample_size: u64,
    /// Promotion eligibility: minimum consecutive passes.
    pub promotion_min_consecutive_passes: u64,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            overrides_per_window: 3,
            override_window_hours: 24,
            canary_failure_limit: 5,
            resume_justification_min_len: 20,
            lock_timeout_secs: 5,
            lock_retry_ceiling: 50,
            read_cache_ttl_secs: 5,
            promotion_min_test_runs: 5,
            promotion_min_sample_size: 100,
            promotion_min_consecutive_passes: 5,
        }
    }
}

/// The combined policy document loaded at process start.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Pipeline thresholds and cache tuning.
    #[validate(nested)]
    pub pipeline: PipelinePolicy,
    /// Governance thresholds and timeouts.
    #[validate(nested)]
    pub governance: GovernancePolicy,
}

/// Builder assembling a [`SecurityPolicy`] from defaults, an optional file,
/// and environment variable overrides, in that priority order.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    policy: SecurityPolicy,
}

impl PolicyBuilder {
    /// Start from the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML or YAML file, overriding fields it sets.
    #[must_use = "call .build() to finish constructing the policy"]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let loaded: SecurityPolicy = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&contents)?,
            _ => {
                return Err(ConfigError::UnknownFormat {
                    path: path.display().to_string(),
                })
            }
        };
        self.policy = loaded;
        Ok(self)
    }

    /// Apply `PHISHGUARD_*` environment variable overrides on top of
    /// whatever has been loaded so far.
    #[must_use = "call .build() to finish constructing the policy"]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("PHISHGUARD_PHISHING_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.policy.pipeline.phishing_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("PHISHGUARD_SUSPICIOUS_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.policy.pipeline.suspicious_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("PHISHGUARD_CACHE_TTL_SECS") {
            if let Ok(parsed) = v.parse() {
                self.policy.pipeline.cache_ttl_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("PHISHGUARD_OVERRIDES_PER_WINDOW") {
            if let Ok(parsed) = v.parse() {
                self.policy.governance.overrides_per_window = parsed;
            }
        }
        self
    }

    /// Validate and return the assembled policy.
    pub fn build(self) -> Result<SecurityPolicy, ConfigError> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
