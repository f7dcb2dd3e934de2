//! Feature Extractor interface (C4).
//!
//! The pipeline depends only on [`FeatureExtractor`]; this crate's
//! [`crate::heuristic::HeuristicExtractor`] is one concrete implementation,
//! not the only one the interface permits.

use async_trait::async_trait;
use phishguard_core::types::{FailureFlags, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::error::InvalidUrlError;
use crate::ssrf;

/// A named, described signal surfaced to the explanation builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalExplanation {
    /// Short identifier for the signal.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// The three explanation buckets the feature extractor contributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorExplanations {
    /// Signals that leaned safe.
    pub safe_signals: Vec<SignalExplanation>,
    /// Signals that leaned toward phishing.
    pub phishing_signals: Vec<SignalExplanation>,
    /// Signals that could not be evaluated.
    pub failed_features: Vec<SignalExplanation>,
}

/// A URL that has passed constructor-time validation: scheme restricted to
/// `http`/`https`, non-empty hostname, and the SSRF literal-IP guard.
#[derive(Debug, Clone)]
pub struct ValidatedUrl {
    raw: String,
    scheme: String,
    host: String,
}

impl ValidatedUrl {
    /// Validate `raw` per the Feature Extractor's construction contract.
    pub fn new(raw: &str) -> Result<Self, InvalidUrlError> {
        let normalized = phishguard_core::domain::normalize(raw);
        let (scheme, rest) = normalized
            .split_once("://")
            .unwrap_or(("https", normalized.as_str()));
        if scheme != "http" && scheme != "https" {
            return Err(InvalidUrlError::UnsupportedScheme {
                scheme: scheme.to_string(),
            });
        }

        let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            return Err(InvalidUrlError::EmptyHostname);
        }

        if ssrf::literal_host_is_disallowed(host) {
            return Err(InvalidUrlError::SsrfBlocked {
                host: host.to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_string(),
            host: host.to_string(),
        })
    }

    /// The original, unnormalised URL string.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The validated scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The validated hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// The contract the Decision Pipeline relies on for feature extraction.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Run extraction and produce the 33-length feature vector.
    ///
    /// Implementations must enforce the masking invariant: a position
    /// gated on a signal source that [`FeatureExtractor::failure_flags`]
    /// reports as failed must be `0`, never `-1`.
    async fn features(&self) -> FeatureVector;

    /// Failure state observed while gathering signals.
    async fn failure_flags(&self) -> FailureFlags;

    /// Human-facing explanation buckets.
    async fn explanations(&self) -> ExtractorExplanations;
}
