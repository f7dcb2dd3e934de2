//! Registered-domain parsing (C1).
//!
//! [`extract`] finds the eTLD+1 ("registered domain") of a URL or bare host
//! string by resolving it against a small embedded public-suffix table.
//!
//! # Adversarial contract
//!
//! `trusted.tld.attacker.tld` must resolve to `attacker.tld`, never to
//! `trusted.tld` — the suffix match always anchors on the *rightmost*
//! labels, so a trusted name appearing as a left-hand subdomain component
//! of an attacker-controlled domain never fools the longest-suffix search.
//! Hyphenated lookalikes (`google-login.com`) are simply themselves; this
//! module performs no similarity scoring. Homoglyph detection is out of
//! scope here — see the feature extractor.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::UrlError;

/// A parsed registered domain: `label.suffix`, lower-cased.
///
/// Two registered domains are equal iff their full `label.suffix` strings
/// match exactly. [`RegisteredDomain::is_empty`] distinguishes the
/// unparseable sentinel from a real domain — the sentinel can never equal
/// an allowlist entry because [`PartialEq`] on the empty string only
/// matches another empty string, and allowlists never contain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisteredDomain(String);

impl RegisteredDomain {
    /// The sentinel returned when a host string cannot be parsed.
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// `true` if this is the unparseable sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The full `label.suffix` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The public-suffix portion alone (e.g. `co.uk` for `example.co.uk`).
    #[must_use]
    pub fn suffix(&self) -> &str {
        suffix_for(&self.0)
    }
}

impl std::fmt::Display for RegisteredDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the suffix portion of an already-built `label.suffix` string by
/// re-resolving against the suffix table. Used by [`RegisteredDomain::suffix`].
fn suffix_for(registered: &str) -> &str {
    let table = suffix_table();
    let labels: Vec<&str> = registered.split('.').collect();
    for i in 0..labels.len() {
        let candidate = labels[i..].join(".");
        if table.contains(candidate.as_str()) {
            return &registered[registered.len() - candidate.len()..];
        }
    }
    registered
}

/// Embedded public-suffix table.
///
/// This is deliberately a small, explicit subset of the real Public Suffix
/// List sufficient to resolve the common cases the governance and trust
/// layers care about (generic TLDs, `.gov` and its multi-label forms, and
/// the handful of two-label ccTLD suffixes exercised by the test suite).
/// A production deployment would instead embed the full PSL via a
/// generated table; the resolution algorithm here is unchanged either way.
fn suffix_table() -> &'static HashSet<&'static str> {
    static TABLE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            // Generic TLDs
            "com", "org", "net", "edu", "mil", "int", "info", "biz", "io", "co", "xyz", "app",
            "dev",
            // Government — bare suffix is itself a trust target per §4.1
            "gov", "gov.uk", "gov.au", "gov.in",
            // Common two-label ccTLD suffixes
            "co.uk", "ac.uk", "org.uk", "co.jp", "co.in", "com.au", "net.au", "org.au", "com.br",
            "co.nz", "co.za",
        ]
        .into_iter()
        .collect()
    })
}

/// Extract the registered domain from a URL or bare host string.
///
/// Strips scheme, userinfo, path, query, fragment, and port; lower-cases
/// the remainder; resolves the longest matching suffix. Returns
/// [`RegisteredDomain::empty`] if no host can be isolated.
#[must_use]
pub fn extract(url_or_host: &str) -> RegisteredDomain {
    let Some(host) = extract_host(url_or_host) else {
        return RegisteredDomain::empty();
    };
    if host.is_empty() {
        return RegisteredDomain::empty();
    }

    let table = suffix_table();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.is_empty() {
        return RegisteredDomain::empty();
    }

    // Search from the longest candidate suffix down to the shortest,
    // anchored at the right edge of the host — this is what guarantees the
    // adversarial contract: `evil.tld` always wins over `trusted.tld` when
    // `trusted.tld` only appears as a left-hand label.
    for take in (1..labels.len()).rev() {
        let candidate_suffix = labels[labels.len() - take..].join(".");
        if table.contains(candidate_suffix.as_str()) {
            let label_start = labels.len() - take - 1;
            let registered = labels[label_start..].join(".");
            return RegisteredDomain(registered);
        }
    }

    // No known multi-label suffix matched; fall back to the last two
    // labels (or the bare single-label host, e.g. "localhost").
    if labels.len() >= 2 {
        RegisteredDomain(labels[labels.len() - 2..].join("."))
    } else {
        RegisteredDomain(labels[0].to_string())
    }
}

/// Split a URL or bare host string into its lower-cased, punycode-
/// canonicalised host and (if present) its raw port literal, stripping
/// scheme/userinfo/path/query/fragment. The port is returned verbatim,
/// whatever its value — callers that don't care about the port (domain
/// extraction, validation) should use [`extract_host`]; [`normalize`] uses
/// the port to preserve non-default values in its output.
fn split_host_and_port(input: &str) -> Option<(Cow<'_, str>, Option<&'_ str>)> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };

    let without_userinfo = match without_scheme.rfind('@') {
        Some(idx) => &without_scheme[idx + 1..],
        None => without_scheme,
    };

    let end = without_userinfo
        .find(['/', '?', '#'])
        .unwrap_or(without_userinfo.len());
    let host_and_port = &without_userinfo[..end];

    // IPv6 literal `[::1]:8080` — keep the bracketed form intact, lift any
    // trailing port out separately.
    let (host_part, port) = if let Some(rest) = host_and_port.strip_prefix('[') {
        match rest.find(']') {
            Some(close) => {
                let bracketed = &host_and_port[..close + 2];
                let after = &host_and_port[close + 2..];
                let port = after
                    .strip_prefix(':')
                    .filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
                (bracketed, port)
            }
            None => (host_and_port, None),
        }
    } else {
        match host_and_port.rfind(':') {
            Some(idx)
                if !host_and_port[idx + 1..].is_empty()
                    && host_and_port[idx + 1..].chars().all(|c| c.is_ascii_digit()) =>
            {
                (&host_and_port[..idx], Some(&host_and_port[idx + 1..]))
            }
            _ => (host_and_port, None),
        }
    };

    if host_part.is_empty() {
        return None;
    }

    let lowered = host_part.to_ascii_lowercase();
    let host = match idna::domain_to_ascii(&lowered) {
        Ok(ascii) => Cow::Owned(ascii),
        Err(_) => Cow::Owned(lowered),
    };
    Some((host, port))
}

/// Pull just the lower-cased, punycode-canonicalised host out of a URL or
/// bare host string, stripping scheme/userinfo/path/query/fragment/port.
/// Domain extraction and validation never care about the port, so any
/// port present (default or not) is discarded here.
fn extract_host(input: &str) -> Option<Cow<'_, str>> {
    split_host_and_port(input).map(|(host, _)| host)
}

/// Validate a URL string per spec §3: bounded length \[4, 2000\], no
/// internal whitespace, must have a parseable host.
pub fn validate_url(raw: &str) -> Result<(), UrlError> {
    let len = raw.len();
    if !(4..=2000).contains(&len) {
        return Err(UrlError::BadLength { len });
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(UrlError::ContainsWhitespace);
    }
    if extract_host(raw).is_none() {
        return Err(UrlError::NoHost {
            raw: raw.to_string(),
        });
    }
    Ok(())
}

/// Normalise a URL per spec §3: lowercased host, default ports stripped,
/// punycode canonicalised, trailing slash of path removed.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();

    let (scheme, rest) = match trimmed.find("://") {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 3..]),
        None => ("https", trimmed.as_str()),
    };

    let path_start = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..path_start];
    let remainder = &rest[path_start..];

    let default_port = match scheme {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    };

    let (host, port) = match split_host_and_port(authority) {
        Some((host, port)) => (host, port),
        None => (Cow::Borrowed(authority), None),
    };
    // Only a port matching the scheme's default is stripped; any other
    // port must survive into the normalised form (spec §3).
    let host = match port {
        Some(p) if default_port == Some(p) => host.to_string(),
        Some(p) => format!("{host}:{p}"),
        None => host.to_string(),
    };

    let mut path_part = remainder.to_string();
    if let Some(query_or_frag) = path_part.find(['?', '#']) {
        let (path, rest) = path_part.split_at(query_or_frag);
        let mut trimmed_path = path.to_string();
        if trimmed_path.len() > 1 && trimmed_path.ends_with('/') {
            trimmed_path.pop();
        }
        path_part = format!("{trimmed_path}{rest}");
    } else if path_part.len() > 1 && path_part.ends_with('/') {
        path_part.pop();
    }

    format!("{scheme}://{host}{path_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_domain() {
        assert_eq!(extract("https://example.com/path").as_str(), "example.com");
    }

    #[test]
    fn extracts_subdomain() {
        assert_eq!(
            extract("https://accounts.google.com").as_str(),
            "google.com"
        );
    }

    #[test]
    fn adversarial_lookalike_resolves_to_attacker_domain() {
        // trusted.tld appears as a left-hand label of the attacker's domain.
        let d = extract("https://google.com.evil.xyz/login");
        assert_eq!(d.as_str(), "evil.xyz");
        assert_ne!(d.as_str(), "google.com");
    }

    #[test]
    fn hyphenated_lookalike_is_itself() {
        assert_eq!(extract("https://google-login.com").as_str(), "google-login.com");
    }

    #[test]
    fn gov_suffix_multi_label() {
        assert_eq!(extract("https://something.gov.uk").as_str(), "something.gov.uk");
        assert_eq!(extract("agency.gov").suffix(), "gov");
    }

    #[test]
    fn host_only_input_parses_like_url() {
        let from_url = extract("https://example.co.uk/a");
        let from_host = extract("example.co.uk");
        assert_eq!(from_url, from_host);
    }

    #[test]
    fn unparseable_input_is_empty_and_never_matches() {
        let d = extract("   ");
        assert!(d.is_empty());
        assert_ne!(d, RegisteredDomain("".to_string()).clone());
        assert_eq!(d, RegisteredDomain::empty());
    }

    #[test]
    fn idempotent_round_trip() {
        let d1 = extract("HTTPS://Example.COM/Path/");
        let d2 = extract(d1.as_str());
        assert_eq!(d1, d2);
    }

    #[test]
    fn validate_rejects_short_and_long_and_whitespace() {
        assert!(validate_url("a").is_err());
        assert!(validate_url(&"a".repeat(2001)).is_err());
        assert!(validate_url("https://exa mple.com").is_err());
        assert!(validate_url("https://example.com").is_ok());
    }

    #[test]
    fn normalize_strips_default_port_and_trailing_slash() {
        assert_eq!(
            normalize("HTTPS://Example.com:443/Path/"),
            "https://example.com/path"
        );
        assert_eq!(normalize("http://example.com:80/"), "http://example.com/");
    }

    #[test]
    fn normalize_preserves_non_default_port() {
        assert_eq!(
            normalize("https://example.com:8443/x/"),
            "https://example.com:8443/x"
        );
        assert_eq!(
            normalize("http://example.com:9999/"),
            "http://example.com:9999/"
        );
    }

    #[test]
    fn normalize_distinguishes_different_non_default_ports() {
        let a = normalize("https://example.com:8443/resource");
        let b = normalize("https://example.com:9999/resource");
        assert_ne!(a, b);
    }
}
