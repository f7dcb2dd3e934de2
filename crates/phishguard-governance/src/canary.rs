//! Canary evaluation and promotion eligibility (C7 §4.10).

use chrono::Utc;
use phishguard_core::config::GovernancePolicy;
use phishguard_core::types::{CanarySignal, Eligibility, Verdict};

use crate::budget;
use crate::error::GovernanceError;
use crate::store::GovernanceStore;

/// Record one canary evaluation result for `domain`. A PHISHING verdict is
/// a failure: it resets the consecutive-pass streak and charges the
/// canary-failure safety budget, which may trigger a freeze. SAFE and
/// SUSPICIOUS both count as passes.
pub fn record_canary_result(
    store: &GovernanceStore,
    policy: &GovernancePolicy,
    domain: &str,
    verdict: Verdict,
    sample_size: u64,
) -> Result<(), GovernanceError> {
    let now = Utc::now();
    let is_failure = verdict == Verdict::Phishing;

    store.update(|state| {
        let signal = state.canaries.entry(domain.to_string()).or_default();
        signal.test_runs += 1;
        signal.sample_size += sample_size;
        signal.last_run = Some(now);
        signal.last_verdict = Some(verdict);
        if is_failure {
            signal.failures += 1;
            signal.consecutive_passes = 0;
        } else {
            signal.passes += 1;
            signal.consecutive_passes += 1;
        }
    })?;

    if is_failure {
        budget::charge_canary_failure(store, policy.canary_failure_limit)?;
    }
    Ok(())
}

/// Evaluate promotion eligibility for `domain` against the configured
/// thresholds. Always requires a subsequent explicit approval step.
pub fn check_promotion_eligibility(
    store: &GovernanceStore,
    policy: &GovernancePolicy,
    domain: &str,
) -> Result<Eligibility, GovernanceError> {
    let state = store.read_cached()?;
    let signal = state.canaries.get(domain).cloned().unwrap_or_default();

    let mut reasons = Vec::new();
    let enough_runs = signal.test_runs >= policy.promotion_min_test_runs;
    let enough_sample = signal.sample_size >= policy.promotion_min_sample_size;
    let enough_streak = signal.consecutive_passes >= policy.promotion_min_consecutive_passes;
    let perfect_pass_rate = signal.test_runs > 0 && signal.failures == 0;

    if !enough_runs {
        reasons.push(format!(
            "only {} test runs, need {}",
            signal.test_runs, policy.promotion_min_test_runs
        ));
    }
    if !enough_sample {
        reasons.push(format!(
            "only {} sampled, need {}",
            signal.sample_size, policy.promotion_min_sample_size
        ));
    }
    if !enough_streak {
        reasons.push(format!(
            "only {} consecutive passes, need {}",
            signal.consecutive_passes, policy.promotion_min_consecutive_passes
        ));
    }
    if !perfect_pass_rate {
        reasons.push("pass rate is not 100%".to_string());
    }

    let eligible = enough_runs && enough_sample && enough_streak && perfect_pass_rate;
    if eligible {
        reasons.push("all promotion criteria satisfied".to_string());
    }

    Ok(Eligibility {
        eligible,
        requires_approval: true,
        required_metadata: vec!["approved_by", "review_ticket"],
        reasons,
    })
}

/// Re-check eligibility and record a promotion decision. Does not itself
/// add `domain` to the trust manifest — that is the caller's
/// responsibility via the allowlist manifest, kept a separate concern.
pub fn promote_canary(
    store: &GovernanceStore,
    policy: &GovernancePolicy,
    domain: &str,
    approved_by: &str,
    review_ticket: &str,
) -> Result<(), GovernanceError> {
    let eligibility = check_promotion_eligibility(store, policy, domain)?;
    if !eligibility.eligible {
        return Err(GovernanceError::InvalidOverrideRequest {
            reason: format!("{domain} is not eligible for promotion: {:?}", eligibility.reasons),
        });
    }
    if review_ticket.trim().is_empty() {
        return Err(GovernanceError::InvalidOverrideRequest {
            reason: "promotion requires a non-empty review_ticket".to_string(),
        });
    }
    tracing::info!(domain, approved_by, review_ticket, "canary promoted to full trust");
    Ok(())
}
