//! Invariant Reporter (C12): the pipeline's single point of contact for
//! reporting results that bear on the non-negotiable safety invariants.
//! A violation here always freezes the system as a side effect.

use phishguard_core::types::{CalibrationStatus, Override, Verdict};

use crate::budget;
use crate::calibration;
use crate::error::GovernanceError;
use crate::freeze;
use crate::overrides;
use crate::store::GovernanceStore;

/// Report the verdict produced for a domain known to be on the trust
/// allowlist. PHISHING is an immediate, non-negotiable invariant
/// violation: the trusted-domain-never-phishing contract has broken
/// somewhere upstream, and the only safe response is a freeze.
/// SUSPICIOUS is zero-tolerance but not a contract break by itself — it
/// charges the budget, which freezes once any SUSPICIOUS-on-trusted
/// verdict is observed. SAFE is a no-op.
pub fn report_trusted_domain_verdict(
    store: &GovernanceStore,
    domain: &str,
    verdict: Verdict,
    risk_score: f64,
) -> Result<(), GovernanceError> {
    match verdict {
        Verdict::Phishing => {
            store.update(|state| {
                state.budget.phishing_trusted_count += 1;
            })?;
            freeze::trigger_freeze(
                store,
                "Trusted domain classified PHISHING",
                "invariant-reporter",
                None,
            )?;
            Err(GovernanceError::InvariantViolation {
                invariant: "TRUSTED_DOMAIN_PHISHING".to_string(),
                detail: format!("domain={domain} risk_score={risk_score}"),
            })
        }
        Verdict::Suspicious => budget::charge_suspicious_trusted(store),
        Verdict::Safe => Ok(()),
    }
}

/// Look up an active override applicable to `domain`, if any. Does not
/// mutate the override itself — overrides are multi-use for their
/// lifetime, consumption here means "considered for this decision", not
/// "spent".
pub fn consume_override(store: &GovernanceStore, domain: &str) -> Result<Option<Override>, GovernanceError> {
    let active = overrides::get_active_overrides(store)?;
    Ok(active
        .into_iter()
        .find(|o| o.affected_domains.iter().any(|d| d == domain || d == "*")))
}

/// `Err` if `status` forbids `action`. Thin wrapper kept alongside the
/// other invariant assertions so callers have one module to import from.
pub fn assert_calibration_allows(status: CalibrationStatus, action: &str) -> Result<(), GovernanceError> {
    calibration::assert_action_allowed(status, action)
}

/// `Err` if the system is currently frozen. The gate every mutating
/// governance operation and every pipeline write-path must pass first.
pub fn assert_system_operational(store: &GovernanceStore) -> Result<(), GovernanceError> {
    if let Some(reason) = freeze::freeze_reason(store)? {
        return Err(GovernanceError::SystemFrozen { reason });
    }
    Ok(())
}
