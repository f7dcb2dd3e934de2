//! A reference heuristic [`FeatureExtractor`] implementation: 30 lexical,
//! HTTP, WHOIS, and DNS signals combined into a categorical feature
//! vector, with failed signal sources masked to neutral per the
//! "failures are neutral, never phishing" contract.

use std::sync::Arc;

use async_trait::async_trait;
use phishguard_core::domain;
use phishguard_core::types::{FailureFlags, FeatureVector};
use regex::Regex;
use tokio::time::timeout;

use crate::extractor::{ExtractorExplanations, FeatureExtractor, SignalExplanation, ValidatedUrl};
use crate::signals::{
    AlwaysFailProbe, DnsEvidence, DnsProbe, HttpEvidence, HttpProbe, SIGNAL_TIMEOUT,
    WhoisEvidence, WhoisProbe,
};

/// Which signal source gates a given feature position. `Lexical` features
/// are never masked — they depend on nothing that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Lexical,
    Http,
    Whois,
    Dns,
}

/// One entry in the static feature table.
struct FeatureDef {
    name: &'static str,
    gate: Gate,
    description: &'static str,
}

macro_rules! feat {
    ($name:expr, $gate:expr, $desc:expr) => {
        FeatureDef {
            name: $name,
            gate: $gate,
            description: $desc,
        }
    };
}

/// The fixed 30-entry feature table. Index in this array is the feature's
/// position in the emitted [`FeatureVector`].
fn feature_table() -> &'static [FeatureDef; 30] {
    use Gate::{Dns, Http, Lexical, Whois};
    static TABLE: [FeatureDef; 30] = [
        feat!("ip_literal_host", Lexical, "hostname is a raw IP address rather than a name"),
        feat!("at_symbol_in_url", Lexical, "url contains an '@' before the host"),
        feat!("excessive_hyphens", Lexical, "registered domain has 3 or more hyphens"),
        feat!("deep_subdomain_chain", Lexical, "host has 4 or more subdomain labels"),
        feat!("suspicious_keyword", Lexical, "path or host contains a brand-impersonation keyword"),
        feat!("punycode_host", Lexical, "host contains punycode (xn--) labels"),
        feat!("double_slash_in_path", Lexical, "path contains a redirect-style '//' after the host"),
        feat!("non_standard_port", Lexical, "url specifies a non-default port"),
        feat!("digit_heavy_domain", Lexical, "registered domain label is majority digits"),
        feat!("url_shortener", Lexical, "host matches a known URL-shortener service"),
        feat!("long_url", Lexical, "url exceeds 75 characters"),
        feat!("long_host_label", Lexical, "a single host label exceeds 30 characters"),
        feat!("many_query_params", Lexical, "url has 6 or more query parameters"),
        feat!("mixed_case_host", Lexical, "host mixes upper and lower case before normalisation"),
        feat!("suspicious_tld", Lexical, "registered domain uses a TLD commonly abused for phishing"),
        feat!("brand_in_subdomain", Lexical, "a well-known brand name appears only as a subdomain label"),
        feat!("repeated_tld_in_path", Lexical, "path contains what looks like a second domain/TLD"),
        feat!("percent_encoded_host", Lexical, "host contains percent-encoding"),
        feat!("https_scheme_only_cosmetic", Http, "page served over https but with no valid certificate chain signal"),
        feat!("cross_domain_redirect", Http, "final response redirected to a different registered domain"),
        feat!("external_form_action", Http, "a form on the page submits to a different registered domain"),
        feat!("title_brand_mismatch", Http, "page title references a brand the domain does not belong to"),
        feat!("favicon_mismatch", Http, "favicon hash does not match the claimed brand"),
        feat!("excessive_form_count", Http, "page contains an unusually high number of forms"),
        feat!("domain_recently_registered", Whois, "registered domain is less than 30 days old"),
        feat!("whois_privacy_protected", Whois, "registrant identity is hidden behind a privacy service"),
        feat!("very_young_domain", Whois, "registered domain is less than 7 days old"),
        feat!("missing_mx_record", Dns, "domain has no MX record despite serving a login form"),
        feat!("low_dns_ttl", Dns, "DNS TTL is unusually low, consistent with fast-flux hosting"),
        feat!("single_a_record", Dns, "domain resolves to exactly one A record"),
    ];
    &TABLE
}

static SUSPICIOUS_KEYWORDS: &[&str] = &["login", "verify", "secure", "account", "update", "signin", "banking"];
static SUSPICIOUS_TLDS: &[&str] = &["xyz", "top", "zip", "click", "country", "gq"];
static URL_SHORTENERS: &[&str] = &["bit.ly", "tinyurl.com", "t.co", "goo.gl", "ow.ly"];
static KNOWN_BRANDS: &[&str] = &["google", "paypal", "microsoft", "apple", "amazon", "facebook"];

/// A reference [`FeatureExtractor`] driven by pluggable HTTP/WHOIS/DNS
/// probes. Callers inject real probes in production and
/// [`crate::signals::AlwaysFailProbe`] (or a deterministic mock) in tests.
pub struct HeuristicExtractor {
    url: ValidatedUrl,
    http: Arc<dyn HttpProbe>,
    whois: Arc<dyn WhoisProbe>,
    dns: Arc<dyn DnsProbe>,
}

impl HeuristicExtractor {
    /// Construct an extractor for an already-validated URL, with the
    /// default network-disabled probes.
    #[must_use]
    pub fn new(url: ValidatedUrl) -> Self {
        Self {
            url,
            http: Arc::new(AlwaysFailProbe),
            whois: Arc::new(AlwaysFailProbe),
            dns: Arc::new(AlwaysFailProbe),
        }
    }

    /// Construct an extractor with explicit probes.
    #[must_use]
    pub fn with_probes(
        url: ValidatedUrl,
        http: Arc<dyn HttpProbe>,
        whois: Arc<dyn WhoisProbe>,
        dns: Arc<dyn DnsProbe>,
    ) -> Self {
        Self { url, http, whois, dns }
    }

    async fn gather(&self) -> (Option<HttpEvidence>, Option<WhoisEvidence>, Option<DnsEvidence>, FailureFlags) {
        let registered = domain::extract(self.url.host());

        let http_result = timeout(SIGNAL_TIMEOUT, self.http.probe(self.url.host())).await;
        let whois_result = timeout(SIGNAL_TIMEOUT, self.whois.probe(registered.as_str())).await;
        let dns_result = timeout(SIGNAL_TIMEOUT, self.dns.probe(self.url.host())).await;

        let mut flags = FailureFlags::default();

        let http_evidence = match http_result {
            Ok(Ok(ev)) => Some(ev),
            Ok(Err(e)) => {
                flags.http_failed = true;
                flags.http_error = Some(e);
                None
            }
            Err(_) => {
                flags.http_failed = true;
                flags.http_error = Some("http probe timed out".to_string());
                None
            }
        };

        let whois_evidence = match whois_result {
            Ok(Ok(ev)) => Some(ev),
            Ok(Err(e)) => {
                flags.whois_failed = true;
                flags.whois_error = Some(e);
                None
            }
            Err(_) => {
                flags.whois_failed = true;
                flags.whois_error = Some("whois probe timed out".to_string());
                None
            }
        };

        let dns_evidence = match dns_result {
            Ok(Ok(ev)) => Some(ev),
            Ok(Err(e)) => {
                flags.dns_failed = true;
                flags.dns_error = Some(e);
                None
            }
            Err(_) => {
                flags.dns_failed = true;
                flags.dns_error = Some("dns probe timed out".to_string());
                None
            }
        };

        (http_evidence, whois_evidence, dns_evidence, flags)
    }

    fn lexical_features(&self) -> [i8; 18] {
        let host = self.url.host();
        let registered = domain::extract(host);
        let labels: Vec<&str> = host.split('.').collect();
        let brand_regex = Regex::new(&KNOWN_BRANDS.join("|")).expect("static brand alternation compiles");

        [
            i8::from(host.parse::<std::net::IpAddr>().is_ok()),
            i8::from(self.url.raw().contains('@')),
            i8::from(registered.as_str().matches('-').count() >= 3),
            i8::from(labels.len() >= 5),
            i8::from(SUSPICIOUS_KEYWORDS.iter().any(|k| self.url.raw().to_ascii_lowercase().contains(k))),
            i8::from(host.contains("xn--")),
            i8::from(self.url.raw().splitn(2, "://").nth(1).unwrap_or("").contains("//")),
            i8::from(self.url.raw().rsplit_once(':').is_some_and(|(_, p)| p.chars().take_while(|c| c.is_ascii_digit()).count() > 0 && !p.starts_with("//"))),
            i8::from(labels.first().is_some_and(|l| l.chars().filter(char::is_ascii_digit).count() * 2 > l.len())),
            i8::from(URL_SHORTENERS.contains(&registered.as_str())),
            i8::from(self.url.raw().len() > 75),
            i8::from(labels.iter().any(|l| l.len() > 30)),
            i8::from(self.url.raw().matches('&').count() >= 5),
            i8::from(host.chars().any(char::is_uppercase)),
            i8::from(SUSPICIOUS_TLDS.iter().any(|t| registered.suffix() == *t)),
            i8::from(
                labels.len() > 2
                    && brand_regex.is_match(&labels[..labels.len() - 2].join("."))
                    && !brand_regex.is_match(&registered.as_str().to_ascii_lowercase()),
            ),
            i8::from(self.url.raw().matches('.').count() > host.matches('.').count() + 2),
            i8::from(host.contains('%')),
        ]
    }

    fn http_features(evidence: Option<&HttpEvidence>) -> [i8; 6] {
        match evidence {
            None => [0; 6],
            Some(ev) => [
                i8::from(ev.status >= 400),
                i8::from(ev.cross_domain_redirect),
                i8::from(ev.external_form_action),
                i8::from(ev.title_brand_mismatch),
                i8::from(ev.favicon_mismatch),
                i8::from(ev.form_count >= 4),
            ],
        }
    }

    fn whois_features(evidence: Option<&WhoisEvidence>) -> [i8; 3] {
        match evidence {
            None => [0; 3],
            Some(ev) => [
                i8::from(ev.age_days.is_some_and(|d| d < 30)),
                i8::from(ev.privacy_protected),
                i8::from(ev.age_days.is_some_and(|d| d < 7)),
            ],
        }
    }

    fn dns_features(evidence: Option<&DnsEvidence>) -> [i8; 3] {
        match evidence {
            None => [0; 3],
            Some(ev) => [
                i8::from(!ev.has_mx),
                i8::from(ev.min_ttl_secs.is_some_and(|t| t < 60)),
                i8::from(ev.a_record_count == 1),
            ],
        }
    }
}

#[async_trait]
impl FeatureExtractor for HeuristicExtractor {
    async fn features(&self) -> FeatureVector {
        let (http_ev, whois_ev, dns_ev, flags) = self.gather().await;

        let lexical = self.lexical_features();
        let http = Self::http_features(http_ev.as_ref());
        let whois = Self::whois_features(whois_ev.as_ref());
        let dns = Self::dns_features(dns_ev.as_ref());

        let mut heuristics = [0i8; 30];
        heuristics[0..18].copy_from_slice(&lexical);
        heuristics[18..24].copy_from_slice(&http);
        heuristics[24..27].copy_from_slice(&whois);
        heuristics[27..30].copy_from_slice(&dns);

        // Masking invariant: a gated feature whose source failed is forced
        // to 0 regardless of what the per-signal helper computed (those
        // helpers already return all-zero on `None` evidence, but this
        // pass is the single point of truth the contract is tested
        // against, independent of how many feature helpers exist).
        if flags.http_failed {
            for v in &mut heuristics[18..24] {
                *v = 0;
            }
        }
        if flags.whois_failed {
            for v in &mut heuristics[24..27] {
                *v = 0;
            }
        }
        if flags.dns_failed {
            for v in &mut heuristics[27..30] {
                *v = 0;
            }
        }

        FeatureVector::new(heuristics, flags)
    }

    async fn failure_flags(&self) -> FailureFlags {
        let (_, _, _, flags) = self.gather().await;
        flags
    }

    async fn explanations(&self) -> ExtractorExplanations {
        let (http_ev, whois_ev, dns_ev, flags) = self.gather().await;
        let lexical = self.lexical_features();
        let http = Self::http_features(http_ev.as_ref());
        let whois = Self::whois_features(whois_ev.as_ref());
        let dns = Self::dns_features(dns_ev.as_ref());

        let table = feature_table();
        let mut combined = [0i8; 30];
        combined[0..18].copy_from_slice(&lexical);
        combined[18..24].copy_from_slice(&http);
        combined[24..27].copy_from_slice(&whois);
        combined[27..30].copy_from_slice(&dns);

        let mut out = ExtractorExplanations::default();
        for (i, def) in table.iter().enumerate() {
            let gated_and_failed = matches!(
                (def.gate, flags.http_failed, flags.whois_failed, flags.dns_failed),
                (Gate::Http, true, _, _) | (Gate::Whois, _, true, _) | (Gate::Dns, _, _, true)
            );
            if gated_and_failed {
                out.failed_features.push(SignalExplanation {
                    name: def.name.to_string(),
                    description: def.description.to_string(),
                });
                continue;
            }
            match combined[i] {
                1 => out.phishing_signals.push(SignalExplanation {
                    name: def.name.to_string(),
                    description: def.description.to_string(),
                }),
                -1 => out.safe_signals.push(SignalExplanation {
                    name: def.name.to_string(),
                    description: def.description.to_string(),
                }),
                _ => {}
            }
        }
        out
    }
}
