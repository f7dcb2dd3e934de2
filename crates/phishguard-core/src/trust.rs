//! Trusted-Domain Gate (C2).
//!
//! Decides whether a URL's registered domain — or its bare public suffix,
//! which realises "all `.gov`" — is on the allowlist. Mutating the
//! allowlist is gated on the caller supplying proof the governance
//! controller is not frozen; this crate does not depend on
//! `phishguard-governance` directly (that would invert the workspace's
//! dependency order), so the precondition is expressed as a trait the
//! governance crate implements and the pipeline wires together.

use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{self, RegisteredDomain};
use crate::error::TrustGateError;

/// A minimal capability the trust gate needs from governance before
/// accepting a mutation: "is the system currently accepting writes".
///
/// `phishguard-governance` implements this for its controller; tests use
/// the always-open stub below.
pub trait FreezeQuery: Send + Sync {
    /// Returns `Some(reason)` if frozen, `None` if accepting writes.
    fn frozen_reason(&self) -> Option<String>;
}

/// A `FreezeQuery` that never freezes — used in unit tests and anywhere
/// governance coupling is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUnfrozen;

impl FreezeQuery for AlwaysUnfrozen {
    fn frozen_reason(&self) -> Option<String> {
        None
    }
}

/// The same seam as [`FreezeQuery`], for the calibration-health action
/// gate: allowlist expansion is forbidden while calibration is not
/// HEALTHY. `phishguard-governance` implements this for its controller;
/// tests use the always-permits stub below.
pub trait CalibrationGate: Send + Sync {
    /// Returns `Some(reason)` if allowlist expansion is currently
    /// forbidden by calibration health, `None` if permitted.
    fn forbids_allowlist_expansion(&self) -> Option<String>;
}

/// A `CalibrationGate` that never forbids — used in unit tests and
/// anywhere governance coupling is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPermitted;

impl CalibrationGate for AlwaysPermitted {
    fn forbids_allowlist_expansion(&self) -> Option<String> {
        None
    }
}

/// Result of a trust check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustCheck {
    /// Whether the URL's registered domain (or suffix) is trusted.
    pub is_trusted: bool,
    /// The registered domain that was checked.
    pub registered_domain: RegisteredDomain,
    /// The allowlist entry that matched, if any.
    pub matched: Option<String>,
    /// Human-readable reason for the result.
    pub reason: String,
}

/// One entry in the manifest file backing the allowlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDomain {
    /// The domain or suffix string.
    pub domain: String,
    /// Who added it.
    pub added_by: String,
    /// When it was added.
    pub added_date: DateTime<Utc>,
    /// Why it was added.
    pub reason: String,
}

/// The on-disk allowlist manifest (`trusted_domains_manifest.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustManifest {
    /// Manifest schema/content version; must match the regression snapshot.
    pub version: String,
    /// Why the manifest last changed.
    pub change_reason: String,
    /// Who last modified the manifest.
    pub last_modified_by: String,
    /// The allowlisted domains and suffixes.
    pub domains: Vec<ManifestDomain>,
}

/// The process-wide trusted-domain allowlist.
///
/// State is held in-process, initialised from a static seed set plus a
/// manifest file loaded at startup. Mutations consume an override-budget
/// unit and emit an `ALLOWLIST_MODIFICATION` audit entry — both effects
/// happen in the caller (the governance/audit crates), since this type's
/// job is purely the membership decision.
pub struct TrustGate {
    entries: RwLock<HashSet<String>>,
}

/// The built-in seed set present before any manifest is loaded.
fn seed_entries() -> HashSet<String> {
    ["google.com"].into_iter().map(str::to_string).collect()
}

impl Default for TrustGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustGate {
    /// Construct a gate with only the built-in seed entries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(seed_entries()),
        }
    }

    /// Construct a gate from a loaded manifest, merged with the seed set.
    #[must_use]
    pub fn from_manifest(manifest: &TrustManifest) -> Self {
        let mut entries = seed_entries();
        entries.extend(manifest.domains.iter().map(|d| d.domain.clone()));
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// `check(url) → TrustCheck`. Trusted if the registered domain is in
    /// the allowlist, or if its bare public suffix is (realising "all
    /// `.gov`").
    #[must_use]
    pub fn check(&self, url_or_host: &str) -> TrustCheck {
        let registered = domain::extract(url_or_host);
        if registered.is_empty() {
            return TrustCheck {
                is_trusted: false,
                registered_domain: registered,
                matched: None,
                reason: "unparseable host".to_string(),
            };
        }

        let entries = self.entries.read().expect("trust gate lock poisoned");

        if entries.contains(registered.as_str()) {
            return TrustCheck {
                is_trusted: true,
                registered_domain: registered.clone(),
                matched: Some(registered.as_str().to_string()),
                reason: "exact registered-domain match".to_string(),
            };
        }

        let suffix = registered.suffix();
        if entries.contains(suffix) {
            return TrustCheck {
                is_trusted: true,
                registered_domain: registered,
                matched: Some(suffix.to_string()),
                reason: format!("bare suffix '{suffix}' is an allowlisted trust target"),
            };
        }

        TrustCheck {
            is_trusted: false,
            registered_domain: registered,
            matched: None,
            reason: "no allowlist match".to_string(),
        }
    }

    /// Add a domain or suffix to the allowlist.
    ///
    /// Preconditions: governance is not frozen and calibration health
    /// permits allowlist expansion. Budget consumption and audit emission
    /// are the caller's responsibility (see module docs).
    pub fn add(
        &self,
        domain: &str,
        freeze: &dyn FreezeQuery,
        calibration: &dyn CalibrationGate,
    ) -> Result<(), TrustGateError> {
        if let Some(reason) = freeze.frozen_reason() {
            return Err(TrustGateError::SystemFrozen { reason });
        }
        if let Some(reason) = calibration.forbids_allowlist_expansion() {
            return Err(TrustGateError::CalibrationForbidden { reason });
        }
        let mut entries = self.entries.write().expect("trust gate lock poisoned");
        entries.insert(domain.to_ascii_lowercase());
        Ok(())
    }

    /// Remove a domain or suffix from the allowlist.
    pub fn remove(&self, domain: &str, freeze: &dyn FreezeQuery) -> Result<bool, TrustGateError> {
        if let Some(reason) = freeze.frozen_reason() {
            return Err(TrustGateError::SystemFrozen { reason });
        }
        let mut entries = self.entries.write().expect("trust gate lock poisoned");
        Ok(entries.remove(&domain.to_ascii_lowercase()))
    }

    /// Current allowlist size, for status reporting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("trust gate lock poisoned").len()
    }

    /// `true` if the allowlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample of current entries, for the `/api/trusted-domains` surface.
    #[must_use]
    pub fn sample(&self, limit: usize) -> Vec<String> {
        self.entries
            .read()
            .expect("trust gate lock poisoned")
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Validate a loaded manifest against the regression snapshot's
/// `_manifest_version`. Mismatch is a startup failure (§7 of the
/// governing spec).
pub fn validate_manifest_version(
    manifest: &TrustManifest,
    snapshot_version: &str,
) -> Result<(), TrustGateError> {
    if manifest.version != snapshot_version {
        return Err(TrustGateError::ManifestVersionMismatch {
            manifest: manifest.version.clone(),
            snapshot: snapshot_version.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(domains: &[&str]) -> TrustManifest {
        TrustManifest {
            version: "1".to_string(),
            change_reason: "test fixture".to_string(),
            last_modified_by: "tester".to_string(),
            domains: domains
                .iter()
                .map(|d| ManifestDomain {
                    domain: (*d).to_string(),
                    added_by: "tester".to_string(),
                    added_date: Utc::now(),
                    reason: "fixture".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn seeded_google_is_trusted() {
        let gate = TrustGate::new();
        let check = gate.check("https://accounts.google.com");
        assert!(check.is_trusted);
    }

    #[test]
    fn lookalike_is_not_trusted() {
        let gate = TrustGate::new();
        let check = gate.check("https://google.com.evil.xyz/login");
        assert!(!check.is_trusted);
    }

    #[test]
    fn bare_gov_suffix_trusts_any_gov_domain() {
        let gate = TrustGate::from_manifest(&manifest_with(&["gov"]));
        let check = gate.check("https://some-agency.gov");
        assert!(check.is_trusted);
        assert_eq!(check.matched.as_deref(), Some("gov"));
    }

    #[test]
    fn add_refused_while_frozen() {
        struct Frozen;
        impl FreezeQuery for Frozen {
            fn frozen_reason(&self) -> Option<String> {
                Some("incident in progress".to_string())
            }
        }
        let gate = TrustGate::new();
        let result = gate.add("example.com", &Frozen, &AlwaysPermitted);
        assert!(matches!(result, Err(TrustGateError::SystemFrozen { .. })));
    }

    #[test]
    fn add_succeeds_when_unfrozen() {
        let gate = TrustGate::new();
        gate.add("example.com", &AlwaysUnfrozen, &AlwaysPermitted).unwrap();
        assert!(gate.check("https://example.com").is_trusted);
    }

    #[test]
    fn add_refused_while_calibration_degraded() {
        struct Forbidding;
        impl CalibrationGate for Forbidding {
            fn forbids_allowlist_expansion(&self) -> Option<String> {
                Some("calibration status Degraded forbids action 'allowlist_expansion'".to_string())
            }
        }
        let gate = TrustGate::new();
        let result = gate.add("example.com", &AlwaysUnfrozen, &Forbidding);
        assert!(matches!(result, Err(TrustGateError::CalibrationForbidden { .. })));
        assert!(!gate.check("https://example.com").is_trusted);
    }

    #[test]
    fn manifest_version_mismatch_is_rejected() {
        let manifest = manifest_with(&["example.com"]);
        assert!(validate_manifest_version(&manifest, "2").is_err());
        assert!(validate_manifest_version(&manifest, "1").is_ok());
    }
}
