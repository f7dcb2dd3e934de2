//! Pluggable signal sources the heuristic extractor gathers evidence from.
//!
//! Each source has a 3-second per-request timeout (spec §5) and reports
//! failure through [`phishguard_core::types::FailureFlags`] rather than
//! propagating an error — a failed signal masks its gated features to 0,
//! it never aborts the analysis.

use std::time::Duration;

use async_trait::async_trait;

/// Per-signal-source request timeout.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Evidence gathered from fetching the page over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpEvidence {
    /// Final response status code.
    pub status: u16,
    /// `true` if the request was redirected to a different registered domain.
    pub cross_domain_redirect: bool,
    /// Number of `<form>` elements on the page.
    pub form_count: u32,
    /// `true` if any form submits to a different registered domain.
    pub external_form_action: bool,
    /// `true` if the page title mentions a well-known brand not matching the domain.
    pub title_brand_mismatch: bool,
    /// `true` if a favicon was present and hashes differ from the claimed brand's.
    pub favicon_mismatch: bool,
}

/// Evidence gathered from a WHOIS lookup.
#[derive(Debug, Clone, Default)]
pub struct WhoisEvidence {
    /// Domain age in days, if determinable.
    pub age_days: Option<i64>,
    /// `true` if registrant info is redacted via a privacy service.
    pub privacy_protected: bool,
}

/// Evidence gathered from DNS resolution.
#[derive(Debug, Clone, Default)]
pub struct DnsEvidence {
    /// `true` if an MX record is present.
    pub has_mx: bool,
    /// Smallest observed TTL across A records.
    pub min_ttl_secs: Option<u32>,
    /// Number of A records returned.
    pub a_record_count: u32,
}

/// Fetches [`HttpEvidence`] for a validated host.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Attempt to gather HTTP evidence, within [`SIGNAL_TIMEOUT`].
    async fn probe(&self, host: &str) -> Result<HttpEvidence, String>;
}

/// Fetches [`WhoisEvidence`] for a registered domain.
#[async_trait]
pub trait WhoisProbe: Send + Sync {
    /// Attempt a WHOIS lookup, within [`SIGNAL_TIMEOUT`].
    async fn probe(&self, registered_domain: &str) -> Result<WhoisEvidence, String>;
}

/// Fetches [`DnsEvidence`] for a host.
#[async_trait]
pub trait DnsProbe: Send + Sync {
    /// Attempt DNS resolution, within [`SIGNAL_TIMEOUT`].
    async fn probe(&self, host: &str) -> Result<DnsEvidence, String>;
}

/// A probe that always fails — useful as a safe default when no live
/// network signal source is configured, and in tests of the masking
/// invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFailProbe;

#[async_trait]
impl HttpProbe for AlwaysFailProbe {
    async fn probe(&self, _host: &str) -> Result<HttpEvidence, String> {
        Err("no http probe configured".to_string())
    }
}

#[async_trait]
impl WhoisProbe for AlwaysFailProbe {
    async fn probe(&self, _registered_domain: &str) -> Result<WhoisEvidence, String> {
        Err("no whois probe configured".to_string())
    }
}

#[async_trait]
impl DnsProbe for AlwaysFailProbe {
    async fn probe(&self, _host: &str) -> Result<DnsEvidence, String> {
        Err("no dns probe configured".to_string())
    }
}
